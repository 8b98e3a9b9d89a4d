//! Generation and version read-back of `bin/veman_activate`, the rc file the
//! spawned shell sources to enter a venv.

use crate::context::{Context, Platform};
use crate::environment::Environment;
use crate::error::VemanError;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SCRIPT_VERSION: &str = "0.2";
/// Scripts written before the version comment existed have a blank second line.
pub const OLDEST_SCRIPT_VERSION: &str = "0.1";
pub const UNKNOWN_SCRIPT_VERSION: &str = "unknown";

const SHEBANG: &str = "#!/bin/bash";
const VERSION_PREFIX: &str = "# veman_activate ";
const SYSTEM_PROFILE: &str = "/etc/profile";

/// Appends activation lines in order. Platform branches only ever add lines.
#[derive(Debug)]
pub struct ScriptBuilder {
    platform: Platform,
    lines: Vec<String>,
}

impl ScriptBuilder {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            lines: vec![
                SHEBANG.to_string(),
                format!("{VERSION_PREFIX}{SCRIPT_VERSION}"),
            ],
        }
    }

    fn push(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    fn source(&mut self, path: &Path) -> &mut Self {
        let line = format!("source {}", shell_single_quote(&path.to_string_lossy()));
        self.push(line)
    }

    fn source_if_exists(&mut self, path: &Path) -> &mut Self {
        let quoted = shell_single_quote(&path.to_string_lossy());
        self.push(format!("if [ -f {quoted} ]; then source {quoted}; fi"))
    }

    fn export_history(&mut self, history: &Path) -> &mut Self {
        let line = format!("export HISTFILE={}", shell_single_quote(&history.to_string_lossy()));
        self.push(line)
    }

    pub fn render(mut self, env: &Environment, home_profile: &Path) -> Vec<String> {
        let history = env.history_file();
        let platform = self.platform.clone();
        match platform {
            Platform::MacOs => {
                // Apple's /etc/bashrc keeps per-session history under ~/.bash_sessions.
                self.push("export SHELL_SESSION_HISTORY=0")
                    .export_history(&history)
                    .source(Path::new(SYSTEM_PROFILE))
                    .source_if_exists(home_profile)
                    .source(&env.native_activate());
            }
            Platform::Linux | Platform::Unsupported(_) => {
                // ~/.bashrc commonly sets HISTFILE itself, so ours goes last.
                self.source_if_exists(home_profile)
                    .source(&env.native_activate())
                    .export_history(&history);
            }
        }
        self.push("")
            .push("alias deactivate=\"deactivate && exit\"");
        self.lines
    }
}

/// Writes a fresh activation script for `env`, replacing any existing one.
pub fn install(env: &Environment, ctx: &Context) -> Result<(), VemanError> {
    let home_profile = ctx.platform.home_profile(&ctx.home);
    let lines = ScriptBuilder::new(ctx.platform.clone()).render(env, &home_profile);
    let mut content = lines.join("\n");
    content.push('\n');
    let path = env.activation_script();
    tracing::debug!(path = %path.display(), version = SCRIPT_VERSION, "writing activation script");
    write_atomic_text_file(&path, &content, 0o755)
        .map_err(|source| VemanError::Script { path, source })
}

/// Returns the version tag embedded on the second line of an activation script.
pub fn read_version(path: &Path) -> Result<String, VemanError> {
    let content = fs::read_to_string(path)?;
    let second = content.lines().nth(1).unwrap_or("");
    if second.trim().is_empty() {
        return Ok(OLDEST_SCRIPT_VERSION.to_string());
    }
    match parse_version_line(second) {
        Some(version) => Ok(version),
        None => {
            eprintln!(
                "Unable to parse veman_activate version in {}",
                path.display()
            );
            tracing::debug!(path = %path.display(), line = second, "unparseable script version");
            Ok(UNKNOWN_SCRIPT_VERSION.to_string())
        }
    }
}

fn parse_version_line(line: &str) -> Option<String> {
    let tag = line.trim().strip_prefix(VERSION_PREFIX.trim_end())?.trim();
    let well_formed = !tag.is_empty()
        && tag
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    well_formed.then(|| tag.to_string())
}

fn shell_single_quote(value: &str) -> String {
    // foo'bar -> 'foo'\''bar'
    let mut out = String::new();
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

fn write_atomic_text_file(path: &Path, content: &str, mode: u32) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let tmp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        path.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "veman".to_string()),
        std::process::id(),
        ts
    ));

    let result = (|| {
        fs::write(&tmp_path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        fs::rename(&tmp_path, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
