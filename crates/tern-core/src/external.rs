//! External protocol handlers
//!
//! URLs such as `mailto:` are passed to a configured program instead of
//! being loaded. Started programs are waited on in the background so they
//! do not linger as zombies.

use std::collections::BTreeMap;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use tern_navigation::{ExternalHandlers, Uri};

#[derive(Debug, Default)]
pub struct CommandHandlers {
    /// Scheme to command line; `%s` is replaced by the URL, otherwise the
    /// URL is appended
    commands: BTreeMap<String, String>,
    runtime: Option<Handle>,
    children: Vec<JoinHandle<Option<ExitStatus>>>,
}

impl CommandHandlers {
    /// Uses the current tokio runtime, if any, to run handlers.
    pub fn new(commands: BTreeMap<String, String>) -> Self {
        Self::with_runtime(commands, Handle::try_current().ok())
    }

    pub fn with_runtime(commands: BTreeMap<String, String>, runtime: Option<Handle>) -> Self {
        Self {
            commands,
            runtime,
            children: Vec::new(),
        }
    }

    /// Handlers started and not yet exited.
    pub fn running(&mut self) -> usize {
        self.children.retain(|child| !child.is_finished());
        self.children.len()
    }

    /// The program and arguments that would handle `uri`.
    pub fn command_line(&self, uri: &Uri) -> Option<Vec<String>> {
        let template = self.commands.get(uri.scheme())?;
        let url = uri.public_string();

        let mut substituted = false;
        let mut args: Vec<String> = template
            .split_whitespace()
            .map(|part| {
                if part.contains("%s") {
                    substituted = true;
                    part.replace("%s", &url)
                } else {
                    part.to_string()
                }
            })
            .collect();
        if args.is_empty() {
            return None;
        }
        if !substituted {
            args.push(url);
        }
        Some(args)
    }
}

impl ExternalHandlers for CommandHandlers {
    fn handles(&self, uri: &Uri) -> bool {
        self.commands.contains_key(uri.scheme())
    }

    fn dispatch(&mut self, uri: &Uri) -> bool {
        let Some(args) = self.command_line(uri) else {
            return false;
        };
        let Some(runtime) = self.runtime.clone() else {
            tracing::warn!(program = %args[0], "No async runtime to run external handler");
            return false;
        };

        let _guard = runtime.enter();
        let spawned = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let program = args[0].clone();
                tracing::info!(program = %program, pid = ?child.id(), "External handler started");

                self.children.retain(|child| !child.is_finished());
                self.children.push(runtime.spawn(async move {
                    match child.wait().await {
                        Ok(status) => {
                            tracing::debug!(program = %program, %status, "External handler exited");
                            Some(status)
                        }
                        Err(e) => {
                            tracing::warn!(program = %program, error = %e, "Lost track of external handler");
                            None
                        }
                    }
                }));
                true
            }
            Err(e) => {
                tracing::warn!(program = %args[0], error = %e, "Failed to start external handler");
                false
            }
        }
    }
}
