//! Output formatting for CLI commands.
//!
//! This module renders deploy results, change lists, stack events and outputs
//! as tables or JSON, and provides the console progress sink.

use colored::{ColoredString, Colorize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{Table, Tabled};

use crate::cloudformation::{IN_PROGRESS_SUFFIX, ResourceChange, StackEvent};
use crate::deploy::{
    CreationOutcome, DeployOutcome, DeployResult, PlanResult, ProgressEvent, ProgressSink,
    is_success,
};

use super::commands::OutputFormat;

/// Column widths of the stack event timeline.
const EVENT_COLUMNS: (usize, usize, usize) = (30, 40, 40);

/// Longest output value shown in text tables.
const MAX_OUTPUT_VALUE_LEN: usize = 50;

/// Output formatter for CLI.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Physical ID")]
    physical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Replacement")]
    replacement: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of a deploy.
    #[must_use]
    pub fn format_deploy_result(&self, result: &DeployResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(output, "Stack {}: ", result.stack_name.bold());

                match result.outcome {
                    DeployOutcome::Applied => {
                        let _ = writeln!(output, "{}", result.status.green());
                    }
                    DeployOutcome::Unchanged => {
                        let _ = writeln!(output, "{}", "no changes required".green());
                    }
                    DeployOutcome::Submitted => {
                        let _ = writeln!(output, "{}", "change set executing, not waiting".yellow());
                    }
                    DeployOutcome::ChangeSetFailed => {
                        let _ = writeln!(output, "{}", "change set failed".red());
                    }
                    DeployOutcome::StackFailed => {
                        let _ = writeln!(output, "{}", result.status.red());
                    }
                }

                if let Some(reason) = &result.reason {
                    let _ = writeln!(output, "  Reason: {reason}");
                }
                if let Some(id) = &result.change_set_id {
                    let _ = writeln!(output, "  Change set: {}", id.dimmed());
                }
                output
            }
        }
    }

    /// Formats the result of a plan.
    #[must_use]
    pub fn format_plan(&self, plan: &PlanResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => match &plan.outcome {
                CreationOutcome::Ready => format!(
                    "\n{} change set for {}: {} changes\n{}",
                    plan.change_set_type,
                    plan.stack_name.bold(),
                    plan.changes.len(),
                    Self::format_changes_text(&plan.changes)
                ),
                CreationOutcome::NoChanges => format!(
                    "{} No changes required - stack {} is up to date.\n",
                    "\u{2713}".green(),
                    plan.stack_name
                ),
                CreationOutcome::Failed { reason } => {
                    format!("{} Change set failed: {reason}\n", "\u{2717}".red())
                }
            },
        }
    }

    /// Formats stack outputs.
    #[must_use]
    pub fn format_outputs(&self, outputs: Option<&BTreeMap<String, String>>) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&outputs.cloned().unwrap_or_default()).unwrap_or_default()
            }
            OutputFormat::Text => outputs.map_or_else(
                || String::from("Stack has no outputs.\n"),
                Self::format_outputs_text,
            ),
        }
    }

    /// Formats a list of resource changes as a table.
    fn format_changes_text(changes: &[ResourceChange]) -> String {
        if changes.is_empty() {
            return String::new();
        }

        let rows: Vec<ChangeRow> = changes
            .iter()
            .map(|c| ChangeRow {
                action: Self::format_action(&c.action),
                logical_id: c.logical_id.clone(),
                physical_id: c.physical_id.clone().unwrap_or_default(),
                resource_type: c.resource_type.clone(),
                replacement: c.replacement.clone().unwrap_or_default(),
                scope: c.scope.join(", "),
                details: c
                    .details
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
            .collect();

        let mut table = Table::new(rows).to_string();
        table.push('\n');
        table
    }

    /// Formats outputs as a table.
    fn format_outputs_text(outputs: &BTreeMap<String, String>) -> String {
        let rows: Vec<OutputRow> = outputs
            .iter()
            .map(|(key, value)| OutputRow {
                key: key.clone(),
                value: Self::truncate(value, MAX_OUTPUT_VALUE_LEN),
            })
            .collect();

        let mut table = Table::new(rows).to_string();
        table.push('\n');
        table
    }

    /// Header line of the stack event timeline.
    #[must_use]
    pub fn event_header() -> String {
        let (time, id, status) = EVENT_COLUMNS;
        format!(
            "{:<time$}{:<id$}{:<status$}",
            "Timestamp".bold(),
            "Logical ID".bold(),
            "Status".bold()
        )
    }

    /// One line of the stack event timeline.
    ///
    /// The status reason is shown only once a resource has settled.
    #[must_use]
    pub fn format_stack_event(event: &StackEvent) -> String {
        let (time, id, status) = EVENT_COLUMNS;
        let mut line = format!(
            "{:<time$}{:<id$}{:<status$}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            Self::truncate(&event.logical_resource_id, id - 1),
            Self::format_status(&event.resource_status),
        );

        if !event.resource_status.ends_with(IN_PROGRESS_SUFFIX)
            && let Some(reason) = &event.status_reason
        {
            let _ = write!(line, "{reason}");
        }
        line
    }

    /// Formats a resource change action.
    fn format_action(action: &str) -> String {
        match action {
            "Add" => "+add".green().to_string(),
            "Modify" => "~modify".yellow().to_string(),
            "Remove" => "-remove".red().to_string(),
            other => other.dimmed().to_string(),
        }
    }

    /// Colors a stack or resource status.
    ///
    /// Width flags pad the visible text, not the escape codes.
    fn format_status(status: &str) -> ColoredString {
        if status.ends_with(IN_PROGRESS_SUFFIX) {
            status.yellow()
        } else if status.contains("FAILED") || status.contains("ROLLBACK") {
            status.red()
        } else {
            status.green()
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

/// Writes progress to stderr as it happens.
#[derive(Debug)]
pub struct ConsoleProgress {
    /// Whether the event timeline header has been written.
    header_written: AtomicBool,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    /// Creates a console sink.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            header_written: AtomicBool::new(false),
        }
    }

    /// Renders an event as the lines to print, if any.
    #[must_use]
    pub fn render(&self, event: &ProgressEvent<'_>) -> Option<String> {
        let text = match *event {
            ProgressEvent::TemplateValidated { path } => {
                format!("{} Template is valid: {}", "\u{2713}".green(), path.display())
            }
            ProgressEvent::ChangeSetCreated { change_set } => format!(
                "Creating {} change set {} for stack {}",
                change_set.change_set_type,
                change_set.name,
                change_set.stack_name.bold()
            ),
            ProgressEvent::WaitingForChangeSet { status, .. } => {
                format!("  waiting for change set ({status})").dimmed().to_string()
            }
            ProgressEvent::ChangeSetReady { .. } => return None,
            ProgressEvent::NoChanges { stack_name } => format!(
                "{} No changes required - stack {stack_name} is up to date.",
                "\u{2713}".green()
            ),
            ProgressEvent::ChangeSetFailed { reason, .. } => {
                format!("{} Change set failed: {reason}", "\u{2717}".red())
            }
            ProgressEvent::ChangesProposed { changes, .. } => format!(
                "\nProposed changes:\n{}",
                OutputFormatter::format_changes_text(changes)
            ),
            ProgressEvent::ExecutionStarted { change_set } => {
                format!("Executing change set {}", change_set.name)
            }
            ProgressEvent::StackEventObserved(stack_event) => {
                let line = OutputFormatter::format_stack_event(stack_event);
                if self.header_written.swap(true, Ordering::Relaxed) {
                    line
                } else {
                    format!("\n{}\n{line}", OutputFormatter::event_header())
                }
            }
            ProgressEvent::StackConverged {
                stack_name,
                status,
                reason,
                ..
            } => {
                let mut text = format!("\nStack {stack_name} reached {}", OutputFormatter::format_status(status));
                if !is_success(status)
                    && let Some(reason) = reason
                {
                    let _ = write!(text, ": {reason}");
                }
                text
            }
            ProgressEvent::OutputsReady(outputs) => format!(
                "\nOutputs:\n{}",
                OutputFormatter::format_outputs_text(outputs)
            ),
        };
        Some(text)
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: &ProgressEvent<'_>) {
        if let Some(text) = self.render(event) {
            eprintln!("{text}");
        }
    }
}
