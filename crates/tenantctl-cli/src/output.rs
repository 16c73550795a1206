//! Output channels: console rendering for users and in-memory capture for
//! command composition.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tenantctl_config::OutputMode;
use tracing::warn;

use crate::error::{CliError, CliResult};

/// Sink for everything a command emits.
pub trait Logger: Send + Sync {
    /// Primary structured output.
    fn log(&self, value: Value);

    /// Primary output that is already text.
    fn log_raw(&self, text: &str);

    /// Diagnostics; never part of the primary output.
    fn log_to_stderr(&self, text: &str);
}

/// Logger rendering primary output to stdout in the selected format.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    mode: OutputMode,
}

impl ConsoleLogger {
    /// Console logger rendering in `mode`.
    #[must_use]
    pub const fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Active rendering mode.
    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, value: Value) {
        let rendered = render(&value, self.mode);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{rendered}");
    }

    fn log_raw(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }

    fn log_to_stderr(&self, text: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{text}");
    }
}

/// Everything a captured command wrote to its primary channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    values: Vec<Value>,
    stdout: String,
}

impl CommandOutput {
    /// Structured values in emission order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Raw text output, one line per emission.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Last structured value emitted.
    #[must_use]
    pub fn last(&self) -> Option<&Value> {
        self.values.last()
    }

    /// Deserialize the last structured value emitted by `command`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when the command emitted nothing or the
    /// value does not have the expected shape.
    pub fn parse<T: DeserializeOwned>(&self, command: &str) -> CliResult<T> {
        let value = self.last().ok_or_else(|| {
            CliError::failure(anyhow::anyhow!("command '{command}' produced no output"))
        })?;
        serde_json::from_value(value.clone()).map_err(|err| {
            CliError::failure(
                anyhow::Error::new(err).context(format!("unexpected output from '{command}'")),
            )
        })
    }
}

/// Logger collecting primary output in memory while forwarding diagnostics
/// to a parent logger.
pub struct CaptureLogger<'a> {
    parent: &'a dyn Logger,
    captured: Mutex<CommandOutput>,
}

impl<'a> CaptureLogger<'a> {
    /// Capture logger forwarding diagnostics to `parent`.
    #[must_use]
    pub fn new(parent: &'a dyn Logger) -> Self {
        Self {
            parent,
            captured: Mutex::new(CommandOutput::default()),
        }
    }

    /// Consume the logger and return what it captured.
    #[must_use]
    pub fn into_output(self) -> CommandOutput {
        self.captured
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Logger for CaptureLogger<'_> {
    fn log(&self, value: Value) {
        let mut captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        captured.stdout.push_str(&value.to_string());
        captured.stdout.push('\n');
        captured.values.push(value);
    }

    fn log_raw(&self, text: &str) {
        let mut captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        captured.stdout.push_str(text);
        captured.stdout.push('\n');
    }

    fn log_to_stderr(&self, text: &str) {
        self.parent.log_to_stderr(text);
    }
}

/// Render `value` for display in `mode`.
#[must_use]
pub fn render(value: &Value, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        OutputMode::Text => render_text(value),
        OutputMode::Csv => render_csv(value).unwrap_or_else(|err| {
            warn!(error = %err, "csv rendering failed; writing JSON instead");
            value.to_string()
        }),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}

fn render_text(value: &Value) -> String {
    match value {
        Value::Object(object) => render_key_values(object),
        Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
            let rows: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
            render_table(&rows)
        }
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join("\n"),
        other => scalar(other),
    }
}

fn render_key_values(object: &Map<String, Value>) -> String {
    let width = object.keys().map(String::len).max().unwrap_or(0);
    let mut pairs: Vec<(&String, &Value)> = object.iter().collect();
    pairs.sort_by(|left, right| left.0.cmp(right.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key:<width$}: {}", scalar(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn columns(rows: &[&Map<String, Value>]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns.sort();
    columns
}

fn render_table(rows: &[&Map<String, Value>]) -> String {
    let columns = columns(rows);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).map(scalar).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let separator: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();

    let mut lines = vec![line(&columns), line(&separator)];
    lines.extend(cells.iter().map(|row| line(row)));
    lines.join("\n")
}

fn render_csv(value: &Value) -> anyhow::Result<String> {
    let rows: Vec<&Map<String, Value>> = match value {
        Value::Object(object) => vec![object],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        other => return write_csv(&[], &[vec![scalar(other)]]),
    };
    if rows.is_empty() {
        return Ok(String::new());
    }

    let columns = columns(&rows);
    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).map(scalar).unwrap_or_default())
                .collect()
        })
        .collect();
    write_csv(&columns, &records)
}

fn write_csv(header: &[String], records: &[Vec<String>]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if !header.is_empty() {
        writer.write_record(header)?;
    }
    for record in records {
        writer.write_record(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv output: {}", err.error()))?;
    let text = String::from_utf8(bytes)?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}
