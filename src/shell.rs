use crate::error::VemanError;
use std::path::Path;
use std::process::Command;

/// Starts an interactive shell that sources `rcfile` and waits for it to exit.
pub trait ShellSpawner {
    fn spawn(&self, shell: &str, rcfile: &Path) -> Result<(), VemanError>;
}

pub struct InteractiveShell;

impl ShellSpawner for InteractiveShell {
    fn spawn(&self, shell: &str, rcfile: &Path) -> Result<(), VemanError> {
        tracing::debug!(shell, rcfile = %rcfile.display(), "spawning shell");
        let status = Command::new(shell)
            .arg("--rcfile")
            .arg(rcfile)
            .status()
            .map_err(|err| VemanError::Process(format!("failed to launch {shell}: {err}")))?;
        if !status.success() {
            return Err(VemanError::Process(format!(
                "{shell} exited with status {status}"
            )));
        }
        Ok(())
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_is_a_failure() {
        let err = InteractiveShell
            .spawn("false", Path::new("/dev/null"))
            .unwrap_err();
        assert!(matches!(err, VemanError::Process(_)));
    }

    #[test]
    fn missing_shell_is_a_failure() {
        let err = InteractiveShell
            .spawn("/no/such/bash", Path::new("/dev/null"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }
}
