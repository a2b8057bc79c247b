//! Client-side image maps
//!
//! An image-map navigation does not display its result. The body is read
//! as HTML and each `<area>` becomes a destination the user can pick.

use scraper::{ElementRef, Html, Selector};

use crate::uri::Uri;

/// One clickable region of an image map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMapChoice {
    pub label: String,
    pub uri: Uri,
    pub target: Option<String>,
}

/// Extract the regions of the map addressed by `base`.
///
/// When `base` has a fragment only the `<map>` of that name is used,
/// otherwise every map in the document contributes.
pub fn parse_image_map(base: &Uri, html: &str, default_target: Option<&str>) -> Vec<ImageMapChoice> {
    let (Ok(map_selector), Ok(area_selector)) =
        (Selector::parse("map"), Selector::parse("area[href], a[href]"))
    else {
        return Vec::new();
    };

    let doc = Html::parse_document(html);
    let wanted = base.fragment().filter(|name| !name.is_empty());

    let mut choices: Vec<ImageMapChoice> = Vec::new();
    for map in doc.select(&map_selector) {
        if let Some(wanted) = wanted {
            if map_name(&map) != Some(wanted) {
                continue;
            }
        }

        for area in map.select(&area_selector) {
            let Some(href) = area.value().attr("href") else {
                continue;
            };
            if area.value().attr("nohref").is_some() {
                continue;
            }
            let Ok(uri) = base.join(href) else {
                tracing::debug!(href, "Skipping image map area with bad href");
                continue;
            };

            if choices.iter().any(|c| c.uri == uri) {
                continue;
            }

            let target = area
                .value()
                .attr("target")
                .map(str::to_string)
                .or_else(|| default_target.map(str::to_string));

            choices.push(ImageMapChoice {
                label: area_label(&area, href),
                uri,
                target,
            });
        }
    }

    choices
}

fn map_name<'a>(map: &ElementRef<'a>) -> Option<&'a str> {
    map.value().attr("name").or_else(|| map.value().attr("id"))
}

fn area_label(area: &ElementRef<'_>, href: &str) -> String {
    let text: String = area.text().collect::<Vec<_>>().join(" ");
    let label = [
        area.value().attr("alt"),
        area.value().attr("title"),
        Some(text.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
    .find(|s| !s.is_empty())
    .unwrap_or_else(|| href.to_string());
    label
}
