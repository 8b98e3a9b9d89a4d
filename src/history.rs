//! Read-only access to `.veman_history`, which the activated shell appends to.

use crate::environment::Environment;
use crate::error::VemanError;
use crate::registry;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub env: String,
    /// 1-based.
    pub line_number: usize,
    pub command: String,
}

impl HistoryEntry {
    pub fn render(&self, verbose: bool) -> String {
        if verbose {
            format!("[{}:{}] {}", self.env, self.line_number, self.command)
        } else {
            self.command.clone()
        }
    }
}

pub fn entries(env: &Environment) -> Vec<HistoryEntry> {
    let path = env.history_file();
    let content = match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            eprintln!("Unable to read history file {}: {err}", path.display());
            tracing::debug!(path = %path.display(), error = %err, "history unreadable");
            return Vec::new();
        }
    };
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| HistoryEntry {
            env: env.name.clone(),
            line_number: idx + 1,
            command: line.to_string(),
        })
        .collect()
}

pub fn read(env: &Environment, verbose: bool) -> Vec<String> {
    entries(env)
        .iter()
        .map(|entry| entry.render(verbose))
        .collect()
}

/// History of every managed venv under `root_dir`, in listing order.
pub fn read_aggregate(root_dir: &Path, verbose: bool) -> Result<Vec<String>, VemanError> {
    let mut lines = Vec::new();
    for name in registry::list(root_dir)? {
        let env = Environment::new(root_dir, &name)?;
        lines.extend(read(&env, verbose));
    }
    Ok(lines)
}
