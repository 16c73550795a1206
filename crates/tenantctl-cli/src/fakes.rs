//! Test doubles shared by the unit and integration suites.
//!
//! Compiled for unit tests and behind the `test-support` feature.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::CommandContext;
use crate::error::{CliError, CliResult};
use crate::help::HelpSource;
use crate::options::CommandArgs;
use crate::output::Logger;
use crate::prompt::Prompter;
use crate::registry::CommandAction;

/// Action that succeeds without doing anything.
pub struct NoopAction;

#[async_trait]
impl CommandAction for NoopAction {
    async fn run(&self, _ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
        Ok(())
    }
}

/// Prompter answering from pre-recorded scripts and counting every question.
#[derive(Default)]
pub struct ScriptedPrompter {
    choices: Mutex<VecDeque<usize>>,
    answers: Mutex<VecDeque<String>>,
    confirmations: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
}

impl ScriptedPrompter {
    /// Queue the index returned by the next `select`.
    #[must_use]
    pub fn choose(self, index: usize) -> Self {
        self.choices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(index);
        self
    }

    /// Queue the text returned by the next `input`.
    #[must_use]
    pub fn answer(self, text: &str) -> Self {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(text.to_string());
        self
    }

    /// Queue the answer returned by the next `confirm`.
    #[must_use]
    pub fn confirming(self, answer: bool) -> Self {
        self.confirmations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer);
        self
    }

    /// Questions asked so far, answered or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next<T>(&self, queue: &Mutex<VecDeque<T>>, message: &str) -> CliResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| CliError::Prompt(format!("unexpected prompt: {message}")))
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn select(&self, message: &str, _choices: &[String]) -> CliResult<usize> {
        self.next(&self.choices, message)
    }

    async fn input(&self, message: &str) -> CliResult<String> {
        self.next(&self.answers, message)
    }

    async fn confirm(&self, message: &str) -> CliResult<bool> {
        self.next(&self.confirmations, message)
    }
}

/// Logger keeping every emission in memory.
#[derive(Default)]
pub struct RecordingLogger {
    values: Mutex<Vec<Value>>,
    raw: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
}

impl RecordingLogger {
    /// Structured values, in emission order.
    pub fn values(&self) -> Vec<Value> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Pre-rendered text lines.
    pub fn raw(&self) -> Vec<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Diagnostic lines.
    pub fn stderr(&self) -> Vec<String> {
        self.stderr.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }

    fn log_raw(&self, text: &str) {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }

    fn log_to_stderr(&self, text: &str) {
        self.stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}

/// Help source backed by a fixed map.
pub struct StaticHelp(BTreeMap<String, String>);

impl StaticHelp {
    /// Help source serving `documents` as `(command, text)` pairs.
    #[must_use]
    pub fn new(documents: &[(&str, &str)]) -> Self {
        Self(
            documents
                .iter()
                .map(|(name, text)| ((*name).to_string(), (*text).to_string()))
                .collect(),
        )
    }
}

impl HelpSource for StaticHelp {
    fn help_for(&self, command: &str) -> Option<String> {
        self.0.get(command).cloned()
    }
}
