use crate::error::VemanError;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use std::io::{self, IsTerminal, Write};

/// Interactive input. Prompts are given without trailing punctuation.
pub trait Prompter {
    fn say(&mut self, line: &str);

    /// Returns `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, VemanError>;

    fn confirm(&mut self, prompt: &str) -> Result<bool, VemanError> {
        let answer = self.read_line(&format!("{prompt} [y/N]"))?;
        Ok(is_yes(answer.as_deref()))
    }
}

fn is_yes(answer: Option<&str>) -> bool {
    matches!(answer.map(str::trim), Some("y" | "Y" | "yes" | "Yes" | "YES"))
}

/// dialoguer widgets on a TTY, plain line reads from stdin otherwise.
///
/// With `json` set, menus and prompts go to stderr so stdout carries only
/// the JSON result.
pub struct TerminalPrompter {
    interactive: bool,
    json: bool,
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new(json: bool) -> Self {
        Self {
            interactive: io::stdin().is_terminal() && io::stderr().is_terminal(),
            json,
            theme: ColorfulTheme::default(),
        }
    }

    fn console(&self) -> Box<dyn Write> {
        if self.json {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        }
    }

    fn read_plain_line(&self, prompt: &str) -> Result<Option<String>, VemanError> {
        let mut console = self.console();
        write!(console, "{prompt}: ")?;
        console.flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            writeln!(console)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl Prompter for TerminalPrompter {
    fn say(&mut self, line: &str) {
        let _ = writeln!(self.console(), "{line}");
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, VemanError> {
        if !self.interactive {
            return self.read_plain_line(prompt);
        }
        let value = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(Some(value))
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, VemanError> {
        if !self.interactive {
            let answer = self.read_plain_line(&format!("{prompt} [y/N]"))?;
            return Ok(is_yes(answer.as_deref()));
        }
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedPrompter;
    use super::*;

    #[test]
    fn confirm_defaults_to_no() {
        let mut prompter = ScriptedPrompter::new(&["", "n", "Y", " yes "]);
        assert!(!prompter.confirm("Overwrite?").unwrap());
        assert!(!prompter.confirm("Overwrite?").unwrap());
        assert!(prompter.confirm("Overwrite?").unwrap());
        assert!(prompter.confirm("Overwrite?").unwrap());
        assert!(!prompter.confirm("Overwrite?").unwrap());
        assert_eq!(prompter.asked[0], "Overwrite? [y/N]");
    }
}
