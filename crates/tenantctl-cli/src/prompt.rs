//! Interactive prompting behind a trait so tests can script answers.

use std::io::{self, IsTerminal};

use async_trait::async_trait;
use inquire::error::InquireResult;
use inquire::{Confirm, Select, Text};

use crate::error::{CliError, CliResult};

/// Source of interactive answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask the user to pick one of `choices`; returns the chosen index.
    async fn select(&self, message: &str, choices: &[String]) -> CliResult<usize>;

    /// Ask the user for free-form text.
    async fn input(&self, message: &str) -> CliResult<String>;

    /// Ask a yes/no question.
    async fn confirm(&self, message: &str) -> CliResult<bool>;
}

/// Prompter reading answers from an interactive terminal.
///
/// Questions are rendered by `inquire` on stderr so stdout stays
/// machine-readable.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    async fn ask<T, F>(question: F) -> CliResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> InquireResult<T> + Send + 'static,
    {
        if !io::stdin().is_terminal() {
            return Err(CliError::Prompt(
                "cannot prompt for input: stdin is not a terminal".to_string(),
            ));
        }

        tokio::task::spawn_blocking(question)
            .await
            .map_err(|err| CliError::Prompt(format!("prompt task failed: {err}")))?
            .map_err(|err| CliError::Prompt(format!("failed to read answer: {err}")))
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn select(&self, message: &str, choices: &[String]) -> CliResult<usize> {
        if choices.is_empty() {
            return Err(CliError::Prompt(format!("{message}: nothing to choose from")));
        }

        let message = message.to_string();
        let choices = choices.to_vec();
        Self::ask(move || {
            Select::new(&message, choices)
                .raw_prompt()
                .map(|choice| choice.index)
        })
        .await
    }

    async fn input(&self, message: &str) -> CliResult<String> {
        let message = message.to_string();
        Self::ask(move || Text::new(&message).prompt()).await
    }

    async fn confirm(&self, message: &str) -> CliResult<bool> {
        let message = message.to_string();
        Self::ask(move || Confirm::new(&message).with_default(false).prompt()).await
    }
}
