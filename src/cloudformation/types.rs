//! `CloudFormation` domain types.
//!
//! These types decouple the deployment core from the AWS SDK's generated
//! shapes, so fakes can build them directly in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix shared by every non-terminal stack status.
pub const IN_PROGRESS_SUFFIX: &str = "IN_PROGRESS";

/// Status of a stack that only exists because a `CREATE` change set was made
/// for it and was never executed.
pub const REVIEW_IN_PROGRESS_STATUS: &str = "REVIEW_IN_PROGRESS";

/// A deployed stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stack {
    /// Stack name (identity within an account and region).
    pub name: String,
    /// Service-assigned stack ARN.
    #[serde(default)]
    pub stack_id: Option<String>,
    /// Current stack status, e.g. `UPDATE_COMPLETE`.
    pub status: String,
    /// Reason for the current status, if the service gave one.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Declared outputs in provider order.
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

/// A single stack output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackOutput {
    /// Output key.
    pub key: String,
    /// Output value.
    pub value: String,
    /// Optional description from the template.
    #[serde(default)]
    pub description: Option<String>,
}

/// Change set type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetType {
    /// The stack does not exist yet.
    Create,
    /// The stack exists and will be updated.
    Update,
}

/// Change set status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetStatus {
    /// Queued for creation.
    CreatePending,
    /// Being computed.
    CreateInProgress,
    /// Ready to execute.
    CreateComplete,
    /// Queued for deletion.
    DeletePending,
    /// Being deleted.
    DeleteInProgress,
    /// Deleted.
    DeleteComplete,
    /// Deletion failed.
    DeleteFailed,
    /// Creation failed.
    Failed,
    /// A status this crate does not know about.
    Unknown(String),
}

/// A change set proposed for a stack.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChangeSet {
    /// Change set ARN.
    pub id: String,
    /// Change set name.
    pub name: String,
    /// Stack the change set targets.
    pub stack_name: String,
    /// Whether the change set creates or updates the stack.
    pub change_set_type: ChangeSetType,
}

/// Result of describing a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSetDescription {
    /// Current status.
    pub status: Option<ChangeSetStatus>,
    /// Reason for the current status.
    pub status_reason: Option<String>,
    /// Resource changes on this page.
    pub changes: Vec<ResourceChange>,
    /// Continuation token for the next page of changes.
    pub next_token: Option<String>,
}

/// A resource-level change inside a change set.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ResourceChange {
    /// Action, e.g. `Add`, `Modify`, `Remove`.
    pub action: String,
    /// Logical id in the template.
    pub logical_id: String,
    /// Physical id, absent for resources not created yet.
    pub physical_id: Option<String>,
    /// Resource type, e.g. `AWS::S3::Bucket`.
    pub resource_type: String,
    /// Replacement flag: `True`, `False` or `Conditional`.
    pub replacement: Option<String>,
    /// Attributes touched by the change.
    pub scope: Vec<String>,
    /// Per-attribute details.
    pub details: Vec<ChangeDetail>,
}

/// Detail of why a resource changes.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ChangeDetail {
    /// Attribute being changed, e.g. `Properties`.
    pub attribute: Option<String>,
    /// Name of the property being changed.
    pub name: Option<String>,
    /// Whether the change requires recreation.
    pub requires_recreation: Option<String>,
    /// Entity that caused the change.
    pub causing_entity: Option<String>,
    /// Source of the change, e.g. `DirectModification`.
    pub change_source: Option<String>,
}

/// A stack event.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StackEvent {
    /// Unique event id.
    pub event_id: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Logical id of the resource.
    pub logical_resource_id: String,
    /// Resource type.
    pub resource_type: Option<String>,
    /// Resource status, e.g. `CREATE_IN_PROGRESS`.
    pub resource_status: String,
    /// Reason for the status.
    pub status_reason: Option<String>,
    /// Client request token of the operation that produced the event.
    pub client_token: Option<String>,
}

/// One page of stack events, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackEventPage {
    /// Events on this page.
    pub events: Vec<StackEvent>,
    /// Continuation token for older events.
    pub next_token: Option<String>,
}

/// A template parameter record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

/// Request for creating a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChangeSetRequest {
    /// Target stack.
    pub stack_name: String,
    /// Template body.
    pub template_body: String,
    /// Template parameters.
    pub parameters: Vec<Parameter>,
    /// Change set name.
    pub change_set_name: String,
    /// Idempotency token.
    pub client_token: String,
    /// Change set description.
    pub description: String,
    /// Create or update.
    pub change_set_type: ChangeSetType,
}

impl Stack {
    /// Returns true while the stack is transitioning.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status.ends_with(IN_PROGRESS_SUFFIX)
    }

    /// Returns true if no change set has ever been executed on the stack.
    #[must_use]
    pub fn is_under_review(&self) -> bool {
        self.status == REVIEW_IN_PROGRESS_STATUS
    }
}

impl fmt::Display for ChangeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.attribute, &self.name) {
            (Some(attribute), Some(name)) => write!(f, "{attribute}.{name}")?,
            (Some(attribute), None) => write!(f, "{attribute}")?,
            (None, Some(name)) => write!(f, "{name}")?,
            (None, None) => write!(f, "-")?,
        }
        if let Some(recreation) = &self.requires_recreation {
            write!(f, " recreation={recreation}")?;
        }
        if let Some(source) = &self.change_source {
            write!(f, " source={source}")?;
        }
        if let Some(entity) = &self.causing_entity {
            write!(f, " cause={entity}")?;
        }
        Ok(())
    }
}

impl ChangeSetType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChangeSetStatus {
    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreatePending => "CREATE_PENDING",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::DeletePending => "DELETE_PENDING",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::Failed => "FAILED",
            Self::Unknown(other) => other,
        }
    }
}

impl From<&str> for ChangeSetStatus {
    fn from(value: &str) -> Self {
        match value {
            "CREATE_PENDING" => Self::CreatePending,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "DELETE_PENDING" => Self::DeletePending,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Parameter {
    /// Creates a parameter record.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
