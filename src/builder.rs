use crate::environment::EnvOptions;
use crate::error::VemanError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Materializes or upgrades the venv directory itself.
pub trait EnvBuilder {
    /// Creates a venv at `path`, or upgrades it in place when
    /// `options.upgrade_deps` / `options.upgrade_runtime` are set.
    fn build(&self, path: &Path, options: &EnvOptions) -> Result<(), VemanError>;
}

/// Runs `<python> -m venv`.
#[derive(Debug, Clone, Default)]
pub struct VenvBuilder {
    python: Option<String>,
}

impl VenvBuilder {
    pub fn new(python: Option<String>) -> Self {
        Self { python }
    }

    fn interpreter(&self) -> Result<PathBuf, VemanError> {
        if let Some(python) = &self.python {
            return which::which(python).map_err(|err| {
                VemanError::Config(format!("python interpreter {python} not usable: {err}"))
            });
        }
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| {
                VemanError::Config(
                    "no python3 found on PATH; set VEMAN_PYTHON or builder.python".to_string(),
                )
            })
    }
}

pub fn venv_args(path: &Path, options: &EnvOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-m".into(), "venv".into()];
    if let Some(prompt) = &options.prompt {
        args.push("--prompt".into());
        args.push(prompt.into());
    }
    if options.system_site_packages {
        args.push("--system-site-packages".into());
    }
    if !options.with_pip {
        args.push("--without-pip".into());
    }
    if options.upgrade_runtime {
        args.push("--upgrade".into());
    }
    if options.upgrade_deps {
        args.push("--upgrade-deps".into());
    }
    args.push(path.as_os_str().to_os_string());
    args
}

impl EnvBuilder for VenvBuilder {
    fn build(&self, path: &Path, options: &EnvOptions) -> Result<(), VemanError> {
        let python = self.interpreter()?;
        let args = venv_args(path, options);
        tracing::info!(python = %python.display(), ?args, "running venv builder");
        let output = Command::new(&python)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                VemanError::Process(format!("failed to launch {}: {err}", python.display()))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let mut message = format!("venv builder failed with status {}", output.status);
            if !stderr.is_empty() {
                message = format!("{message}: {stderr}");
            }
            return Err(VemanError::Process(message));
        }
        Ok(())
    }
}
