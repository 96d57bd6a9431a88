// Interactive selector.
// Hands repository lines to peco, fzf or a configured command and reads back the choice.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GhpickError, Result};
use crate::repository::Repository;

use super::Selector;
use super::command::run;

/// Selectors tried in order when none is configured.
pub const KNOWN_SELECTORS: [&str; 2] = ["peco", "fzf"];

/// A fuzzy finder reading candidates on stdin and printing the pick on stdout.
#[derive(Debug, Clone)]
pub struct CommandSelector {
    program: String,
}

impl CommandSelector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `configured` if set, otherwise the first known selector on `PATH`.
    pub fn detect(configured: Option<&str>) -> Result<Self> {
        if let Some(program) = configured.filter(|p| !p.trim().is_empty()) {
            return Ok(Self::new(program));
        }
        KNOWN_SELECTORS
            .iter()
            .find(|program| which::which(program).is_ok())
            .map(|program| Self::new(*program))
            .ok_or_else(|| GhpickError::Command {
                program: KNOWN_SELECTORS.join("/"),
                message: "neither peco nor fzf found on PATH".to_string(),
            })
    }
}

#[async_trait]
impl Selector for CommandSelector {
    async fn select(&self, lines: Vec<String>, cancel: &CancellationToken) -> Result<String> {
        debug!(program = %self.program, candidates = lines.len(), "starting selector");
        let mut command = Command::new(&self.program);
        // The selector draws its UI on the terminal.
        command.stderr(Stdio::inherit());
        let output = run(command, Some(lines.join("\n")), cancel).await?;

        let selected = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if selected.is_empty() {
            // Esc in fzf exits 130 and peco exits 1; both mean nothing was picked.
            return Err(GhpickError::NotSelected);
        }
        if !output.status.success() {
            return Err(GhpickError::Command {
                program: self.program.clone(),
                message: output.status.to_string(),
            });
        }
        Ok(selected)
    }
}

/// Find the repository a selector line refers to.
pub fn resolve_selection<'a>(selected: &str, repos: &'a [Repository]) -> Result<&'a Repository> {
    let path = selected.trim().trim_start_matches('✓').trim();
    if path.is_empty() {
        return Err(GhpickError::NotSelected);
    }
    repos
        .iter()
        .find(|repo| repo.full_path() == path)
        .ok_or_else(|| GhpickError::UnknownSelection(selected.to_string()))
}
