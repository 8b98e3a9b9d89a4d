//! Filesystem predicates deciding whether a directory is a venv and whether
//! veman owns it. Every call inspects the filesystem afresh.

use std::path::{Path, PathBuf};

pub const MARKER_FILE: &str = "pyvenv.cfg";
pub const BIN_DIR: &str = "bin";
pub const PYTHON: &str = "bin/python";
pub const NATIVE_ACTIVATE: &str = "bin/activate";
pub const VEMAN_ACTIVATE: &str = "bin/veman_activate";
pub const HISTORY_FILE: &str = ".veman_history";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Absent,
    /// Something exists at the path but veman does not own it.
    Foreign,
    Managed,
}

fn normalize(path: &Path) -> PathBuf {
    // Collecting components drops a trailing separator.
    path.components().collect()
}

pub fn is_environment(path: &Path) -> bool {
    let dir = normalize(path);
    dir.is_dir()
        && dir.join(MARKER_FILE).is_file()
        && dir.join(BIN_DIR).is_dir()
        && dir.join(PYTHON).is_file()
        && dir.join(NATIVE_ACTIVATE).is_file()
}

pub fn is_managed_environment(path: &Path) -> bool {
    is_environment(path) && normalize(path).join(VEMAN_ACTIVATE).is_file()
}

pub fn probe(path: &Path) -> EnvState {
    let dir = normalize(path);
    if is_managed_environment(&dir) {
        EnvState::Managed
    } else if dir.symlink_metadata().is_ok() {
        EnvState::Foreign
    } else {
        EnvState::Absent
    }
}
