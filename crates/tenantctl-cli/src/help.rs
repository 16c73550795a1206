//! Help documents and generated usage text.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::options::OptionKind;
use crate::registry::{CommandDescriptor, CommandRegistry};

/// Source of long-form help for commands.
pub trait HelpSource: Send + Sync {
    /// Help document for `command`, if one exists.
    fn help_for(&self, command: &str) -> Option<String>;
}

/// Help documents stored as `<root>/<words-joined-by-dashes>.md`.
#[derive(Debug, Clone)]
pub struct FileHelpSource {
    root: PathBuf,
}

impl FileHelpSource {
    /// Help source reading documents below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the document for `command`.
    #[must_use]
    pub fn path_for(&self, command: &str) -> PathBuf {
        let stem = command.split_whitespace().collect::<Vec<_>>().join("-");
        self.root.join(format!("{stem}.md"))
    }
}

impl HelpSource for FileHelpSource {
    fn help_for(&self, command: &str) -> Option<String> {
        let path = self.path_for(command);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %err, "failed to read help file");
                }
                None
            }
        }
    }
}

/// Generated option summary for `descriptor`.
#[must_use]
pub fn usage(descriptor: &CommandDescriptor) -> String {
    let mut lines = vec![format!("Usage: tenantctl {} [options]", descriptor.name())];
    if !descriptor.description().is_empty() {
        lines.push(String::new());
        lines.push(descriptor.description().to_string());
    }
    if !descriptor.aliases().is_empty() {
        lines.push(String::new());
        lines.push(format!("Aliases: {}", descriptor.aliases().join(", ")));
    }
    if !descriptor.options().is_empty() {
        lines.push(String::new());
        lines.push("Options:".to_string());
        for spec in descriptor.options() {
            let short = spec.short.map(|short| format!("-{short}, ")).unwrap_or_default();
            let value = match spec.kind {
                OptionKind::String => " <value>".to_string(),
                OptionKind::Number => " <number>".to_string(),
                OptionKind::Boolean => String::new(),
                OptionKind::Enum(choices) => format!(" <{}>", choices.join("|")),
            };
            let required = if spec.required { " (required)" } else { "" };
            let line = format!(
                "  {short}--{}{value}{required}  {}",
                spec.name, spec.description
            );
            lines.push(line.trim_end().to_string());
        }
    }
    lines.join("\n")
}

/// Generated list of every registered command.
#[must_use]
pub fn command_list(registry: &CommandRegistry) -> String {
    let width = registry.names().map(str::len).max().unwrap_or(0);
    let mut lines = vec![
        "Usage: tenantctl <command> [options]".to_string(),
        String::new(),
        "Commands:".to_string(),
    ];
    lines.extend(registry.descriptors().map(|descriptor| {
        format!("  {:<width$}  {}", descriptor.name(), descriptor.description())
    }));
    lines.join("\n")
}
