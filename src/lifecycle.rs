//! Create, activate, delete and upgrade of managed venvs.
//!
//! Every operation probes the filesystem right before it mutates anything;
//! nothing about an environment's state is cached between calls. There is no
//! locking of the root directory, so two veman processes working on the same
//! name at once can still race.

use crate::builder::EnvBuilder;
use crate::context::Context;
use crate::environment::{EnvOptions, Environment};
use crate::error::VemanError;
use crate::probe::EnvState;
use crate::prompt::Prompter;
use crate::registry;
use crate::script::{self, SCRIPT_VERSION, UNKNOWN_SCRIPT_VERSION};
use crate::shell::ShellSpawner;
use std::fs;
use std::path::PathBuf;

/// Extension points run around the lifecycle. Both default to doing nothing.
pub trait LifecycleHooks {
    fn post_create(&self, _env: &Environment) {}
    fn post_deactivate(&self, _env: &Environment) {}
}

pub struct NoHooks;

impl LifecycleHooks for NoHooks {}

/// Which parts of a venv an upgrade touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeSelection {
    pub deps: bool,
    pub runtime: bool,
    pub scripts: bool,
}

impl UpgradeSelection {
    pub fn everything() -> Self {
        Self {
            deps: true,
            runtime: true,
            scripts: true,
        }
    }

    /// Builds a selection from command-line flags; giving none of them
    /// means upgrading everything.
    pub fn from_flags(deps: bool, python: bool, scripts: bool) -> Self {
        if !deps && !python && !scripts {
            return Self::everything();
        }
        Self {
            deps,
            runtime: python,
            scripts,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.deps && !self.runtime && !self.scripts
    }
}

#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub upgraded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BulkOutcome {
    pub fn into_result(self) -> Result<Vec<String>, VemanError> {
        if self.failed.is_empty() {
            return Ok(self.upgraded);
        }
        Err(VemanError::BulkUpgrade {
            failed: self.failed.len(),
            total: self.failed.len() + self.upgraded.len(),
        })
    }
}

pub struct Manager<'a, B, S, H> {
    ctx: &'a Context,
    builder: B,
    shell: S,
    hooks: H,
}

impl<'a, B: EnvBuilder, S: ShellSpawner, H: LifecycleHooks> Manager<'a, B, S, H> {
    pub fn new(ctx: &'a Context, builder: B, shell: S, hooks: H) -> Self {
        Self {
            ctx,
            builder,
            shell,
            hooks,
        }
    }

    pub fn environment(&self, name: &str) -> Result<Environment, VemanError> {
        Environment::new(&self.ctx.root_dir, name)
    }

    fn note(&self, message: &str) {
        if self.ctx.json {
            eprintln!("{message}");
        } else {
            println!("{message}");
        }
    }

    /// Whether the registry currently lists `env`.
    pub fn exists(&self, env: &Environment) -> Result<bool, VemanError> {
        Ok(registry::list(&self.ctx.root_dir)?.contains(&env.name))
    }

    /// Builds `env`, optionally replacing a managed venv of the same name.
    ///
    /// Returns `false` when the user declined to overwrite.
    pub fn create<P: Prompter + ?Sized>(
        &self,
        env: &Environment,
        options: &EnvOptions,
        overwrite: bool,
        prompter: &mut P,
    ) -> Result<bool, VemanError> {
        self.ctx.require_inactive("creating a new environment")?;
        match env.state() {
            EnvState::Managed => {
                self.note(&format!("venv with name {} already exists", env.name));
                let confirmed =
                    overwrite || prompter.confirm("Do you want to overwrite existing venv?")?;
                if !confirmed {
                    tracing::info!(env = %env.name, "overwrite declined");
                    return Ok(false);
                }
                self.delete(env)?;
            }
            EnvState::Foreign => {
                // Left behind by a failed create; the builder reuses the directory.
                self.note(&format!(
                    "{} is not managed by veman, rebuilding it",
                    env.path.display()
                ));
            }
            EnvState::Absent => {}
        }

        self.ctx.ensure_root_dir()?;
        self.note(&format!(
            "Creating new venv: {} in {}",
            env.name,
            env.path.display()
        ));
        let options = EnvOptions {
            upgrade_deps: false,
            upgrade_runtime: false,
            ..options.clone()
        };
        self.builder.build(&env.path, &options)?;
        script::install(env, self.ctx)?;
        tracing::info!(env = %env.name, "venv created");
        self.hooks.post_create(env);
        Ok(true)
    }

    /// Enters `env` in a new shell and blocks until that shell exits.
    pub fn activate(&self, env: &Environment) -> Result<(), VemanError> {
        self.ctx.require_inactive("activating another environment")?;
        if env.state() != EnvState::Managed {
            return Err(VemanError::NotManaged(env.path.clone()));
        }
        tracing::info!(env = %env.name, "activating");
        self.shell
            .spawn(&self.ctx.shell, &env.activation_script())?;
        tracing::info!(env = %env.name, "deactivated");
        self.hooks.post_deactivate(env);
        Ok(())
    }

    pub fn delete(&self, env: &Environment) -> Result<(), VemanError> {
        if !self.exists(env)? {
            return Err(VemanError::NotFound(env.name.clone()));
        }
        self.note(&format!("Deleting {}", env.path.display()));
        fs::remove_dir_all(&env.path)?;
        Ok(())
    }

    pub fn upgrade(&self, env: &Environment, selection: UpgradeSelection) -> Result<(), VemanError> {
        if env.state() != EnvState::Managed {
            return Err(VemanError::NotManaged(env.path.clone()));
        }
        if selection.is_empty() {
            return Err(VemanError::NothingToUpgrade);
        }

        if selection.deps || selection.runtime {
            let options = EnvOptions {
                upgrade_deps: selection.deps,
                upgrade_runtime: selection.runtime,
                ..EnvOptions::from_existing(env)
            };
            let mut removed = Vec::new();
            if selection.runtime {
                self.note(&format!("Upgrading python in {}", env.name));
                removed = remove_interpreter_links(env)?;
            }
            if selection.deps {
                self.note(&format!("Upgrading dependencies in {}", env.name));
            }
            if let Err(err) = self.builder.build(&env.path, &options) {
                restore_interpreter_links(&removed);
                return Err(err);
            }
        }

        if selection.scripts {
            let previous = script::read_version(&env.activation_script())
                .unwrap_or_else(|_| UNKNOWN_SCRIPT_VERSION.to_string());
            self.note(&format!(
                "Upgrading scripts in {} ({} -> {})",
                env.name, previous, SCRIPT_VERSION
            ));
            script::install(env, self.ctx)?;
        }
        Ok(())
    }

    /// Upgrades every listed venv; one failure does not stop the rest.
    pub fn upgrade_all(&self, selection: UpgradeSelection) -> Result<BulkOutcome, VemanError> {
        let mut outcome = BulkOutcome::default();
        for name in registry::list(&self.ctx.root_dir)? {
            let result = self
                .environment(&name)
                .and_then(|env| self.upgrade(&env, selection));
            match result {
                Ok(()) => outcome.upgraded.push(name),
                Err(err) => {
                    eprintln!("Failed to upgrade {name}: {err}");
                    tracing::debug!(env = %name, error = %err, "upgrade failed");
                    outcome.failed.push((name, err.to_string()));
                }
            }
        }
        Ok(outcome)
    }
}

/// `python -m venv --upgrade` leaves existing interpreter symlinks in place.
///
/// Returns the removed `(link, target)` pairs.
fn remove_interpreter_links(env: &Environment) -> Result<Vec<(PathBuf, PathBuf)>, VemanError> {
    let mut removed = Vec::new();
    for entry in fs::read_dir(env.bin_dir())? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_interpreter = name == "python" || name.starts_with("python3");
        if is_interpreter && entry.file_type()?.is_symlink() {
            let link = entry.path();
            let target = fs::read_link(&link)?;
            tracing::debug!(link = %link.display(), target = %target.display(), "removing interpreter symlink");
            if let Err(err) = fs::remove_file(&link) {
                restore_interpreter_links(&removed);
                return Err(err.into());
            }
            removed.push((link, target));
        }
    }
    Ok(removed)
}

/// Puts back links taken away by `remove_interpreter_links`.
fn restore_interpreter_links(links: &[(PathBuf, PathBuf)]) {
    for (link, target) in links {
        if link.symlink_metadata().is_ok() {
            continue;
        }
        #[cfg(unix)]
        let restored = std::os::unix::fs::symlink(target, link);
        #[cfg(not(unix))]
        let restored: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "symlinks are not supported on this platform",
        ));
        if let Err(err) = restored {
            eprintln!(
                "Unable to restore {} -> {}: {err}",
                link.display(),
                target.display()
            );
        }
    }
}
