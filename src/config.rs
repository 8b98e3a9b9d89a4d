use crate::error::VemanError;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_YAML: &str = include_str!("../config/default.yaml");

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub version: u32,
    pub paths: Paths,
    pub builder: Builder,
    pub defaults: Defaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    pub env_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Builder {
    pub python: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    pub prompt: String,
    pub system_site_packages: bool,
    pub with_pip: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            paths: Paths::default(),
            builder: Builder::default(),
            defaults: Defaults::default(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            env_dir: "~/.veman/env".to_string(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            prompt: "".to_string(),
            system_site_packages: false,
            with_pip: true,
        }
    }
}

pub fn resolve_config_path(override_path: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path.clone();
    }
    if let Ok(path) = env::var("VEMAN_CONFIG") {
        return PathBuf::from(path);
    }
    let mut base = default_config_dir();
    base.push("config.yaml");
    base
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(path) = env::var("VEMAN_CONFIG_DIR") {
        return PathBuf::from(path);
    }
    let mut base = home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push(".config");
    base.push("veman");
    base
}

pub fn read_config_from_str(content: &str) -> Result<Config, VemanError> {
    let cfg: Config = serde_yaml::from_str(content)?;
    if cfg.version != 1 {
        return Err(VemanError::Config(format!(
            "unsupported config version {}",
            cfg.version
        )));
    }
    if cfg.paths.env_dir.trim().is_empty() {
        return Err(VemanError::Config("paths.env_dir must not be empty".to_string()));
    }
    Ok(cfg)
}

/// Reads the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config, VemanError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    read_config_from_str(&content).map_err(|err| {
        VemanError::Config(format!(
            "config is invalid. Please edit {} and try again. ({})",
            path.display(),
            err
        ))
    })
}

pub fn expand_path(input: &str, home: &Path) -> PathBuf {
    if input == "~" {
        return home.to_path_buf();
    }
    if let Some(stripped) = input.strip_prefix("~/") {
        return home.join(stripped);
    }
    PathBuf::from(input)
}

pub fn ensure_parent(path: &Path) -> Result<(), VemanError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_unknown_field_errors() {
        let yaml = r#"
version: 1
unknown: true
paths:
  env_dir: ~/.veman/env
"#;
        let result: Result<Config, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn config_defaults_apply() {
        let cfg = read_config_from_str("version: 1").expect("config");
        assert_eq!(cfg.paths.env_dir, "~/.veman/env");
        assert!(cfg.defaults.with_pip);
        assert!(!cfg.defaults.system_site_packages);
        assert!(cfg.builder.python.is_empty());
    }

    #[test]
    fn bundled_default_config_parses() {
        let cfg = read_config_from_str(DEFAULT_CONFIG_YAML).expect("default config");
        assert_eq!(cfg.version, 1);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = read_config_from_str("version: 7").unwrap_err();
        assert!(err.to_string().contains("unsupported config version 7"));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg.version, 1);
    }

    #[test]
    fn invalid_config_file_is_actionable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nbogus: 3\n").unwrap();
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("config is invalid"));
        assert!(err.contains("Please edit"));
    }

    #[test]
    fn expand_tilde_works() {
        let home = Path::new("/home/someone");
        assert_eq!(
            expand_path("~/.veman/env", home),
            PathBuf::from("/home/someone/.veman/env")
        );
        assert_eq!(expand_path("/srv/envs", home), PathBuf::from("/srv/envs"));
    }
}
