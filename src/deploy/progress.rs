//! Progress reporting.
//!
//! The deploy flow reports what it is doing as [`ProgressEvent`]s. Where they
//! end up (console tables, structured logs, nowhere) is the sink's business.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::cloudformation::{ChangeSet, ChangeSetStatus, ResourceChange, StackEvent};

/// Something that happened during a deploy.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    /// The service accepted the template.
    TemplateValidated {
        /// Template path.
        path: &'a Path,
    },
    /// A change set was requested.
    ChangeSetCreated {
        /// The new change set.
        change_set: &'a ChangeSet,
    },
    /// The change set is still being computed.
    WaitingForChangeSet {
        /// The change set.
        change_set: &'a ChangeSet,
        /// Last observed status.
        status: &'a ChangeSetStatus,
    },
    /// The change set is ready to execute.
    ChangeSetReady {
        /// The change set.
        change_set: &'a ChangeSet,
    },
    /// The template and parameters match the deployed stack.
    NoChanges {
        /// Stack name.
        stack_name: &'a str,
    },
    /// The change set could not be created.
    ChangeSetFailed {
        /// The change set.
        change_set: &'a ChangeSet,
        /// Reason given by the service.
        reason: &'a str,
    },
    /// The resource changes a change set proposes.
    ChangesProposed {
        /// The change set.
        change_set: &'a ChangeSet,
        /// Proposed changes, in service order.
        changes: &'a [ResourceChange],
    },
    /// Execution of the change set was requested.
    ExecutionStarted {
        /// The change set.
        change_set: &'a ChangeSet,
    },
    /// A new stack event, reported oldest first.
    StackEventObserved(&'a StackEvent),
    /// The stack reached a terminal status.
    StackConverged {
        /// Stack name.
        stack_name: &'a str,
        /// Terminal status.
        status: &'a str,
        /// Reason for the status, if any.
        reason: Option<&'a str>,
        /// Whether the status counts as success.
        success: bool,
    },
    /// The stack's outputs after the deploy.
    OutputsReady(&'a BTreeMap<String, String>),
}

impl ProgressEvent<'_> {
    /// Short machine-readable name of the event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TemplateValidated { .. } => "template_validated",
            Self::ChangeSetCreated { .. } => "change_set_created",
            Self::WaitingForChangeSet { .. } => "waiting_for_change_set",
            Self::ChangeSetReady { .. } => "change_set_ready",
            Self::NoChanges { .. } => "no_changes",
            Self::ChangeSetFailed { .. } => "change_set_failed",
            Self::ChangesProposed { .. } => "changes_proposed",
            Self::ExecutionStarted { .. } => "execution_started",
            Self::StackEventObserved(_) => "stack_event",
            Self::StackConverged { .. } => "stack_converged",
            Self::OutputsReady(_) => "outputs_ready",
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &ProgressEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: &ProgressEvent<'_>) {}
}

/// Turns events into structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: &ProgressEvent<'_>) {
        let kind = event.kind();
        match *event {
            ProgressEvent::TemplateValidated { path } => {
                info!(kind, path = %path.display(), "Template is valid");
            }
            ProgressEvent::ChangeSetCreated { change_set } => {
                info!(
                    kind,
                    stack = %change_set.stack_name,
                    change_set = %change_set.name,
                    change_set_type = %change_set.change_set_type,
                    "Change set created"
                );
            }
            ProgressEvent::WaitingForChangeSet { change_set, status } => {
                info!(kind, change_set = %change_set.name, %status, "Waiting for change set");
            }
            ProgressEvent::ChangeSetReady { change_set } => {
                info!(kind, change_set = %change_set.name, "Change set ready");
            }
            ProgressEvent::NoChanges { stack_name } => {
                info!(kind, stack = %stack_name, "No changes required");
            }
            ProgressEvent::ChangeSetFailed { change_set, reason } => {
                warn!(kind, change_set = %change_set.name, reason, "Change set failed");
            }
            ProgressEvent::ChangesProposed { change_set, changes } => {
                for change in changes {
                    info!(
                        kind,
                        change_set = %change_set.name,
                        action = %change.action,
                        logical_id = %change.logical_id,
                        resource_type = %change.resource_type,
                        replacement = change.replacement.as_deref().unwrap_or("-"),
                        scope = %change.scope.join(","),
                        "Proposed change"
                    );
                    for detail in &change.details {
                        info!(
                            kind,
                            change_set = %change_set.name,
                            logical_id = %change.logical_id,
                            detail = %detail,
                            "Change detail"
                        );
                    }
                }
            }
            ProgressEvent::ExecutionStarted { change_set } => {
                info!(kind, change_set = %change_set.name, "Executing change set");
            }
            ProgressEvent::StackEventObserved(stack_event) => {
                info!(
                    kind,
                    timestamp = %stack_event.timestamp,
                    logical_id = %stack_event.logical_resource_id,
                    status = %stack_event.resource_status,
                    reason = stack_event.status_reason.as_deref().unwrap_or(""),
                    "Stack event"
                );
            }
            ProgressEvent::StackConverged {
                stack_name,
                status,
                reason,
                success,
            } => {
                if success {
                    info!(kind, stack = %stack_name, status, "Stack converged");
                } else {
                    warn!(
                        kind,
                        stack = %stack_name,
                        status,
                        reason = reason.unwrap_or(""),
                        "Stack failed"
                    );
                }
            }
            ProgressEvent::OutputsReady(outputs) => {
                for (key, value) in outputs {
                    info!(kind, key = %key, value = %value, "Stack output");
                }
            }
        }
    }
}
