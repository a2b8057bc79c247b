//! Global visit log
//!
//! Every location the user actually saw, across sessions, kept in SQLite.
//! Unlike the per-session back/forward list this is one row per URL.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::uri::Uri;
use crate::Result;
use tern_storage::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub first_visited_at: DateTime<Utc>,
    pub last_visited_at: DateTime<Utc>,
    pub visit_count: i64,
}

const VISIT_COLUMNS: &str = "id, url, title, first_visited_at, last_visited_at, visit_count";

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<Visit> {
    let first: String = row.get(3)?;
    let last: String = row.get(4)?;
    Ok(Visit {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        first_visited_at: parse_time(&first),
        last_visited_at: parse_time(&last),
        visit_count: row.get(5)?,
    })
}

#[derive(Clone)]
pub struct VisitLog {
    db: Database,
}

impl VisitLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a visit to `uri`. Form submissions are not recorded and
    /// passwords never reach the database.
    pub fn record(&self, uri: &Uri, title: &str) -> Result<bool> {
        if uri.has_post() {
            tracing::trace!(uri = %uri.public_string(), "Not recording POST visit");
            return Ok(false);
        }

        let url = uri.public_string();
        let now = Utc::now().to_rfc3339();
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO visits (url, title, first_visited_at, last_visited_at, visit_count)
                 VALUES (?1, ?2, ?3, ?3, 1)
                 ON CONFLICT(url) DO UPDATE SET
                     title = CASE WHEN excluded.title != '' THEN excluded.title ELSE title END,
                     last_visited_at = excluded.last_visited_at,
                     visit_count = visit_count + 1",
                rusqlite::params![url, title, now],
            )?;
            Ok(())
        })?;

        tracing::debug!(url = %url, "Visit recorded");
        Ok(true)
    }

    /// Update the stored title without counting a visit.
    pub fn update_title(&self, uri: &Uri, title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Ok(());
        }

        Ok(self.db.with_connection(|conn| {
            conn.execute(
                "UPDATE visits SET title = ?1 WHERE url = ?2",
                rusqlite::params![title, uri.public_string()],
            )?;
            Ok(())
        })?)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Visit>> {
        Ok(self.db.with_connection(|conn| {
            let pattern = format!("%{}%", query.to_lowercase());
            let mut stmt = conn.prepare(&format!(
                "SELECT {VISIT_COLUMNS} FROM visits
                 WHERE LOWER(url) LIKE ?1 OR LOWER(title) LIKE ?1
                 ORDER BY last_visited_at DESC, visit_count DESC
                 LIMIT ?2"
            ))?;

            let visits = stmt
                .query_map(rusqlite::params![pattern, limit as i64], visit_from_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(visits)
        })?)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<Visit>> {
        Ok(self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VISIT_COLUMNS} FROM visits ORDER BY last_visited_at DESC LIMIT ?1"
            ))?;

            let visits = stmt
                .query_map([limit as i64], visit_from_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(visits)
        })?)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        Ok(self.db.with_connection(|conn| {
            conn.execute("DELETE FROM visits WHERE id = ?1", [id])?;
            Ok(())
        })?)
    }

    pub fn clear_all(&self) -> Result<()> {
        Ok(self.db.with_connection(|conn| {
            conn.execute("DELETE FROM visits", [])?;
            Ok(())
        })?)
    }

    /// Forget visits last seen within the range (inclusive). Open ends are
    /// unbounded.
    pub fn clear_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let start = start.map(|t| t.to_rfc3339());
        let end = end.map(|t| t.to_rfc3339());

        Ok(self.db.with_connection(|conn| {
            let removed = match (start, end) {
                (Some(start), Some(end)) => conn.execute(
                    "DELETE FROM visits WHERE last_visited_at >= ?1 AND last_visited_at <= ?2",
                    rusqlite::params![start, end],
                )?,
                (Some(start), None) => {
                    conn.execute("DELETE FROM visits WHERE last_visited_at >= ?1", [start])?
                }
                (None, Some(end)) => {
                    conn.execute("DELETE FROM visits WHERE last_visited_at <= ?1", [end])?
                }
                (None, None) => conn.execute("DELETE FROM visits", [])?,
            };
            Ok(removed)
        })?)
    }
}
