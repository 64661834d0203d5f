//! `CloudFormation` capability trait.
//!
//! This module defines the subset of the `CloudFormation` API the deployment
//! core depends on. The production implementation is
//! [`super::CloudFormationClient`]; tests substitute fakes.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{ChangeSetDescription, CreateChangeSetRequest, Stack, StackEventPage};

/// Operations consumed from the orchestration service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    /// Validates a template body.
    async fn validate_template(&self, template_body: &str) -> Result<()>;

    /// Creates a change set and returns its id.
    async fn create_change_set(&self, request: &CreateChangeSetRequest) -> Result<String>;

    /// Describes one page of a change set.
    async fn describe_change_set(
        &self,
        change_set_id: &str,
        next_token: Option<String>,
    ) -> Result<ChangeSetDescription>;

    /// Starts executing a change set.
    async fn execute_change_set(&self, change_set_id: &str, client_token: &str) -> Result<()>;

    /// Deletes a change set.
    async fn delete_change_set(&self, change_set_id: &str) -> Result<()>;

    /// Describes stacks matching a name.
    ///
    /// Returns an empty list when the stack does not exist.
    async fn describe_stacks(&self, stack_name: &str) -> Result<Vec<Stack>>;

    /// Describes one page of stack events, newest first.
    async fn describe_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<StackEventPage>;
}
