use crate::error::VemanError;
use crate::probe::is_managed_environment;
use crate::prompt::Prompter;
use std::fs;
use std::path::Path;

pub const TEMP_PREFIX: &str = "veman-temp";
const TEMP_NAME_LIMIT: usize = 5000;
const QUIT: &str = "q";

/// Names of the managed venvs directly under `root_dir`, sorted.
pub fn list(root_dir: &Path) -> Result<Vec<String>, VemanError> {
    let mut names = Vec::new();
    if !root_dir.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(root_dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_managed_environment(&entry.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Shows `candidates` as a numbered menu until a valid choice or `q`.
///
/// Quitting, or running out of input, yields `VemanError::Quit`.
pub fn resolve_interactive<P: Prompter + ?Sized>(
    prompter: &mut P,
    action: &str,
    candidates: &[String],
) -> Result<String, VemanError> {
    if candidates.is_empty() {
        return Err(VemanError::NoEnvironments);
    }
    prompter.say(&format!("-> Select venv to {action}"));
    for (idx, name) in candidates.iter().enumerate() {
        prompter.say(&format!(" {}) {}", idx + 1, name));
    }
    let prompt = format!("(1-{} or {QUIT})", candidates.len());
    loop {
        let Some(answer) = prompter.read_line(&prompt)? else {
            return Err(VemanError::Quit);
        };
        let answer = answer.trim();
        if answer == QUIT {
            return Err(VemanError::Quit);
        }
        if let Ok(choice) = answer.parse::<usize>() {
            if (1..=candidates.len()).contains(&choice) {
                return Ok(candidates[choice - 1].clone());
            }
        }
    }
}

/// First unused `veman-temp<K>` under `root_dir`.
pub fn next_temp_name(root_dir: &Path) -> Result<String, VemanError> {
    let existing = list(root_dir)?;
    for k in 0..TEMP_NAME_LIMIT {
        let candidate = format!("{TEMP_PREFIX}{k}");
        // Unmanaged leftovers with the same name are skipped as well.
        if !existing.contains(&candidate) && !root_dir.join(&candidate).exists() {
            return Ok(candidate);
        }
    }
    Err(VemanError::TempNamesExhausted(root_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{fake_managed_venv, fake_venv};
    use crate::prompt::testing::ScriptedPrompter;
    use tempfile::tempdir;

    #[test]
    fn empty_root_lists_nothing() {
        let dir = tempdir().unwrap();
        assert!(list(dir.path()).unwrap().is_empty());
        assert!(list(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn list_is_sorted_and_filters_unmanaged() {
        let dir = tempdir().unwrap();
        for name in ["foo", "Bar", "abc"] {
            fake_managed_venv(&dir.path().join(name));
        }
        fake_venv(&dir.path().join("plain"));
        fs::create_dir_all(dir.path().join("junk")).unwrap();
        fs::write(dir.path().join("file"), "").unwrap();
        fake_managed_venv(&dir.path().join("abc").join("nested"));

        let first = list(dir.path()).unwrap();
        assert_eq!(first, vec!["Bar", "abc", "foo"]);
        assert_eq!(list(dir.path()).unwrap(), first);
    }

    #[test]
    fn interactive_selection_reprompts_until_valid() {
        let candidates = vec!["alpha".to_string(), "beta".to_string()];
        let mut prompter = ScriptedPrompter::new(&["", "zero", "0", "3", " 2 "]);
        let chosen = resolve_interactive(&mut prompter, "activate", &candidates).unwrap();
        assert_eq!(chosen, "beta");
        assert_eq!(
            prompter.said,
            vec!["-> Select venv to activate", " 1) alpha", " 2) beta"]
        );
        assert_eq!(prompter.asked.len(), 5);
        assert!(prompter.asked.iter().all(|p| p == "(1-2 or q)"));
    }

    #[test]
    fn quit_sentinel_and_end_of_input_quit() {
        let candidates = vec!["alpha".to_string()];
        let mut prompter = ScriptedPrompter::new(&["9", "q"]);
        let err = resolve_interactive(&mut prompter, "delete", &candidates).unwrap_err();
        assert!(matches!(err, VemanError::Quit));
        assert_eq!(err.exit_code(), 0);

        let mut prompter = ScriptedPrompter::new(&[]);
        let err = resolve_interactive(&mut prompter, "delete", &candidates).unwrap_err();
        assert!(matches!(err, VemanError::Quit));
    }

    #[test]
    fn selection_without_candidates_fails() {
        let mut prompter = ScriptedPrompter::new(&["1"]);
        let err = resolve_interactive(&mut prompter, "delete", &[]).unwrap_err();
        assert!(matches!(err, VemanError::NoEnvironments));
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn temp_names_skip_existing() {
        let dir = tempdir().unwrap();
        assert_eq!(next_temp_name(dir.path()).unwrap(), "veman-temp0");

        fake_managed_venv(&dir.path().join("veman-temp0"));
        fs::create_dir_all(dir.path().join("veman-temp1")).unwrap();
        assert_eq!(next_temp_name(dir.path()).unwrap(), "veman-temp2");
    }

    #[test]
    fn temp_names_exhausted_is_an_error() {
        let dir = tempdir().unwrap();
        for k in 0..TEMP_NAME_LIMIT {
            fs::create_dir(dir.path().join(format!("{TEMP_PREFIX}{k}"))).unwrap();
        }
        let err = next_temp_name(dir.path()).unwrap_err();
        assert!(matches!(err, VemanError::TempNamesExhausted(_)));
    }
}
