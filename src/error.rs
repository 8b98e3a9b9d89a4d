use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VemanError {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("process error: {0}")]
    Process(String),
    #[error("support for {0} not yet implemented")]
    Unsupported(String),
    #[error("deactivate {active} before {action}")]
    ActiveEnvironment { active: String, action: String },
    #[error("{} is not a managed venv", .0.display())]
    NotManaged(PathBuf),
    #[error("environment {0} not found")]
    NotFound(String),
    #[error("invalid venv name {0:?}: {1}")]
    InvalidName(String, String),
    #[error("neither dependencies, python nor scripts set to be upgraded")]
    NothingToUpgrade,
    #[error("no free temporary venv name left in {}", .0.display())]
    TempNamesExhausted(PathBuf),
    #[error("error writing veman_activate script to {}: {source}", .path.display())]
    Script { path: PathBuf, source: io::Error },
    #[error("{failed} of {total} environments failed to upgrade")]
    BulkUpgrade { failed: usize, total: usize },
    #[error("no managed venvs found")]
    NoEnvironments,
    #[error("quit")]
    Quit,
}

impl VemanError {
    /// Status the process should exit with when this error reaches `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            VemanError::Quit => 0,
            _ => 1,
        }
    }
}
