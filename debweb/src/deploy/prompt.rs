//! Operator decisions
//!
//! The orchestrator never talks to the terminal directly. Decisions come from
//! a [`Prompter`], which is a dialoguer-backed terminal in production and a
//! scripted answer list in tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::artifacts::Artifact;
use crate::errors::DeployError;

/// Source of operator decisions
pub trait Prompter: Send + Sync {
    /// Yes/no question
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, DeployError>;

    /// Pick one of `options`. `None` means the answer was not recognised.
    fn choose(
        &self,
        prompt: &str,
        options: &[&str],
        default: usize,
    ) -> Result<Option<usize>, DeployError>;

    /// Present an artifact for review
    fn show(&self, artifact: &Artifact);
}

/// Interactive terminal prompts
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a blocking terminal read without stalling other tasks on this worker
fn blocking<T>(read: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(read),
        _ => read(),
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, DeployError> {
        let answer = blocking(|| {
            Confirm::with_theme(&self.theme)
                .with_prompt(prompt)
                .default(default)
                .wait_for_newline(false)
                .interact_opt()
        })?;
        Ok(answer.unwrap_or(default))
    }

    fn choose(
        &self,
        prompt: &str,
        options: &[&str],
        default: usize,
    ) -> Result<Option<usize>, DeployError> {
        let answer = blocking(|| {
            Select::with_theme(&self.theme)
                .with_prompt(prompt)
                .items(options)
                .default(default)
                .interact_opt()
        })?;
        Ok(answer)
    }

    fn show(&self, artifact: &Artifact) {
        println!();
        println!(
            "{} {}",
            format!("[{}]", artifact.kind).bold().cyan(),
            artifact.path.display().to_string().bold()
        );
        println!("{}", artifact.content.dimmed());
    }
}

/// Scripted answers for headless runs
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: Mutex<VecDeque<bool>>,
    choices: Mutex<VecDeque<Option<usize>>>,
    shown: Mutex<Vec<PathBuf>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for the next `confirm`
    pub fn confirm_with(self, answer: bool) -> Self {
        self.confirms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(answer);
        self
    }

    /// Queue an answer for the next `choose`
    pub fn choose_with(self, answer: Option<usize>) -> Self {
        self.choices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(answer);
        self
    }

    /// Paths of every artifact presented so far
    pub fn shown(&self) -> Vec<PathBuf> {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool, DeployError> {
        Ok(self
            .confirms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(default))
    }

    fn choose(
        &self,
        _prompt: &str,
        _options: &[&str],
        default: usize,
    ) -> Result<Option<usize>, DeployError> {
        Ok(self
            .choices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Some(default)))
    }

    fn show(&self, artifact: &Artifact) {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(artifact.path.clone());
    }
}
