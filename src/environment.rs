use crate::error::VemanError;
use crate::probe::{self, EnvState};
use std::fs;
use std::path::{Path, PathBuf};

/// A named venv under the root directory. Only the name and location are
/// stored; every other path is derived from `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub path: PathBuf,
}

impl Environment {
    pub fn new(root_dir: &Path, name: &str) -> Result<Self, VemanError> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            path: root_dir.join(name),
        })
    }

    pub fn activation_script(&self) -> PathBuf {
        self.path.join(probe::VEMAN_ACTIVATE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.path.join(probe::HISTORY_FILE)
    }

    pub fn native_activate(&self) -> PathBuf {
        self.path.join(probe::NATIVE_ACTIVATE)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.path.join(probe::BIN_DIR)
    }

    pub fn state(&self) -> EnvState {
        probe::probe(&self.path)
    }
}

/// Builder configuration captured at create or upgrade time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOptions {
    pub prompt: Option<String>,
    pub system_site_packages: bool,
    pub with_pip: bool,
    pub upgrade_deps: bool,
    pub upgrade_runtime: bool,
}

impl EnvOptions {
    pub fn new(prompt: Option<String>, system_site_packages: bool, with_pip: bool) -> Self {
        Self {
            prompt: prompt.filter(|p| !p.trim().is_empty()),
            system_site_packages,
            with_pip,
            upgrade_deps: false,
            upgrade_runtime: false,
        }
    }

    /// Recovers the creation-time options of an existing venv so an in-place
    /// upgrade does not reset them.
    pub fn from_existing(env: &Environment) -> Self {
        let mut prompt = None;
        let mut system_site_packages = false;
        if let Ok(cfg) = fs::read_to_string(env.path.join(probe::MARKER_FILE)) {
            for line in cfg.lines() {
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                let value = value.trim();
                match key.trim() {
                    "include-system-site-packages" => {
                        system_site_packages = value.eq_ignore_ascii_case("true");
                    }
                    "prompt" => {
                        let unquoted = value
                            .strip_prefix('\'')
                            .and_then(|v| v.strip_suffix('\''))
                            .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                            .unwrap_or(value);
                        prompt = Some(unquoted.to_string());
                    }
                    _ => {}
                }
            }
        }
        let with_pip = env.bin_dir().join("pip").exists();
        Self::new(prompt, system_site_packages, with_pip)
    }
}

pub fn validate_name(name: &str) -> Result<(), VemanError> {
    let invalid = |reason: &str| Err(VemanError::InvalidName(name.to_string(), reason.to_string()));
    if name.trim().is_empty() {
        return invalid("name must not be empty");
    }
    if name == "." || name == ".." {
        return invalid("name must not be a relative directory reference");
    }
    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return invalid("name must not contain a path separator");
    }
    if name.contains('\0') {
        return invalid("name must not contain NUL");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_hang_off_env_path() {
        let env = Environment::new(Path::new("/root/.veman/env"), "foo").unwrap();
        assert_eq!(env.path, PathBuf::from("/root/.veman/env/foo"));
        assert_eq!(
            env.activation_script(),
            PathBuf::from("/root/.veman/env/foo/bin/veman_activate")
        );
        assert_eq!(
            env.history_file(),
            PathBuf::from("/root/.veman/env/foo/.veman_history")
        );
    }

    #[test]
    fn names_with_separators_are_rejected() {
        for bad in ["", "  ", ".", "..", "a/b", "../escape"] {
            assert!(
                matches!(validate_name(bad), Err(VemanError::InvalidName(..))),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_name("veman-temp0").is_ok());
        assert!(validate_name("my.env_2").is_ok());
    }

    #[test]
    fn existing_options_come_from_pyvenv_cfg() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new(dir.path(), "foo").unwrap();
        fs::create_dir_all(env.bin_dir()).unwrap();
        fs::write(
            env.path.join("pyvenv.cfg"),
            "home = /usr/bin\ninclude-system-site-packages = true\nversion = 3.12.1\nprompt = 'dev box'\n",
        )
        .unwrap();
        fs::write(env.bin_dir().join("pip"), "").unwrap();

        let opts = EnvOptions::from_existing(&env);
        assert_eq!(opts.prompt.as_deref(), Some("dev box"));
        assert!(opts.system_site_packages);
        assert!(opts.with_pip);
        assert!(!opts.upgrade_deps && !opts.upgrade_runtime);
    }

    #[test]
    fn missing_pyvenv_cfg_yields_plain_options() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new(dir.path(), "foo").unwrap();
        assert_eq!(EnvOptions::from_existing(&env), EnvOptions::new(None, false, false));
    }

    #[test]
    fn blank_prompt_is_dropped() {
        let opts = EnvOptions::new(Some("  ".to_string()), false, true);
        assert_eq!(opts.prompt, None);
        let opts = EnvOptions::new(Some("dev".to_string()), true, false);
        assert_eq!(opts.prompt.as_deref(), Some("dev"));
        assert!(opts.system_site_packages);
        assert!(!opts.with_pip);
    }
}
