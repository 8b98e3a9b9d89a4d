use crate::config::{expand_path, load_config, resolve_config_path, Config};
use crate::error::VemanError;
use dirs::home_dir;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Platforms the activation script knows how to wire up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// BSD-style login profile with session history (`/etc/profile`, `~/.bash_profile`).
    MacOs,
    Linux,
    Unsupported(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            other => Platform::Unsupported(other.to_string()),
        }
    }

    /// The user's own shell profile that the activation script sources.
    pub fn home_profile(&self, home: &Path) -> PathBuf {
        match self {
            Platform::MacOs => home.join(".bash_profile"),
            _ => home.join(".bashrc"),
        }
    }

    fn display_name(&self) -> String {
        match self {
            Platform::MacOs => "Mac OS".to_string(),
            Platform::Linux => "Linux".to_string(),
            Platform::Unsupported(os) => match os.as_str() {
                "windows" => "Windows".to_string(),
                "freebsd" => "FreeBSD".to_string(),
                other => other.to_string(),
            },
        }
    }
}

/// Everything an operation needs to know about the invoking process.
///
/// Built once in `main`; tests construct it directly so no operation reads
/// process-wide state on its own.
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub root_dir: PathBuf,
    pub home: PathBuf,
    pub shell: String,
    pub platform: Platform,
    /// Value of `VIRTUAL_ENV` when veman was started from inside a venv.
    pub active_env: Option<String>,
    /// Interpreter override for the venv builder (`VEMAN_PYTHON` or `builder.python`).
    pub python: Option<String>,
    pub json: bool,
}

impl Context {
    pub fn new(root_dir: PathBuf, home: PathBuf) -> Self {
        Self {
            config_path: home.join(".config").join("veman").join("config.yaml"),
            config: Config::default(),
            root_dir,
            home,
            shell: "/bin/bash".to_string(),
            platform: Platform::Linux,
            active_env: None,
            python: None,
            json: false,
        }
    }

    /// Fails unless the platform and shell are ones veman can generate scripts for.
    pub fn check_supported(&self) -> Result<(), VemanError> {
        if let Platform::Unsupported(_) = self.platform {
            return Err(VemanError::Unsupported(self.platform.display_name()));
        }
        let is_bash = Path::new(&self.shell)
            .file_name()
            .map(|name| name == "bash")
            .unwrap_or(false);
        if !is_bash {
            let shell = if self.shell.is_empty() {
                "an unknown shell".to_string()
            } else {
                self.shell.clone()
            };
            return Err(VemanError::Unsupported(shell));
        }
        Ok(())
    }

    pub fn ensure_root_dir(&self) -> Result<(), VemanError> {
        if !self.root_dir.is_dir() {
            tracing::info!(root = %self.root_dir.display(), "creating venv root directory");
            fs::create_dir_all(&self.root_dir)?;
        }
        Ok(())
    }

    /// Only one venv may be entered at a time.
    pub fn require_inactive(&self, action: &str) -> Result<(), VemanError> {
        match &self.active_env {
            Some(active) => Err(VemanError::ActiveEnvironment {
                active: active.clone(),
                action: action.to_string(),
            }),
            None => Ok(()),
        }
    }
}

pub fn build_context(config_override: Option<&PathBuf>, json: bool) -> Result<Context, VemanError> {
    let config_path = resolve_config_path(config_override);
    let config = load_config(&config_path)?;
    let home = home_dir()
        .ok_or_else(|| VemanError::Config("unable to determine home directory".to_string()))?;

    let root_dir = match env::var("VEMAN_ENV_DIR") {
        Ok(path) if !path.trim().is_empty() => expand_path(path.trim(), &home),
        _ => expand_path(config.paths.env_dir.trim(), &home),
    };
    let root_dir = if root_dir.is_absolute() {
        root_dir
    } else {
        env::current_dir()?.join(root_dir)
    };

    let python = env::var("VEMAN_PYTHON")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            let configured = config.builder.python.trim();
            (!configured.is_empty()).then(|| configured.to_string())
        });

    let active_env = env::var("VIRTUAL_ENV")
        .ok()
        .filter(|value| !value.trim().is_empty());

    Ok(Context {
        config_path,
        config,
        shell: env::var("SHELL").unwrap_or_default(),
        platform: Platform::current(),
        active_env,
        python,
        json,
        ..Context::new(root_dir, home)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn platform_from_os_names() {
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(
            Platform::from_os("windows"),
            Platform::Unsupported("windows".to_string())
        );
    }

    #[test]
    fn home_profile_depends_on_platform() {
        let home = Path::new("/home/u");
        assert_eq!(
            Platform::MacOs.home_profile(home),
            PathBuf::from("/home/u/.bash_profile")
        );
        assert_eq!(
            Platform::Linux.home_profile(home),
            PathBuf::from("/home/u/.bashrc")
        );
    }

    #[test]
    fn unsupported_platform_and_shell_are_rejected() {
        let dir = tempdir().unwrap();
        let mut ctx = Context::new(dir.path().join("env"), dir.path().to_path_buf());
        assert!(ctx.check_supported().is_ok());

        ctx.platform = Platform::from_os("windows");
        let err = ctx.check_supported().unwrap_err();
        assert_eq!(err.to_string(), "support for Windows not yet implemented");

        ctx.platform = Platform::Linux;
        ctx.shell = "/usr/bin/zsh".to_string();
        let err = ctx.check_supported().unwrap_err();
        assert_eq!(err.to_string(), "support for /usr/bin/zsh not yet implemented");

        ctx.shell = "/usr/local/bin/bash".to_string();
        assert!(ctx.check_supported().is_ok());
    }

    #[test]
    fn active_env_blocks_actions() {
        let dir = tempdir().unwrap();
        let mut ctx = Context::new(dir.path().join("env"), dir.path().to_path_buf());
        assert!(ctx.require_inactive("creating a new environment").is_ok());

        ctx.active_env = Some("/tmp/other".to_string());
        let err = ctx.require_inactive("creating a new environment").unwrap_err();
        assert_eq!(
            err.to_string(),
            "deactivate /tmp/other before creating a new environment"
        );
    }

    #[test]
    fn root_dir_is_created_on_demand() {
        let dir = tempdir().unwrap();
        let ctx = Context::new(dir.path().join("a").join("b"), dir.path().to_path_buf());
        ctx.ensure_root_dir().unwrap();
        assert!(ctx.root_dir.is_dir());
        ctx.ensure_root_dir().unwrap();
    }
}
