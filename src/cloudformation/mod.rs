//! AWS `CloudFormation` integration module.
//!
//! This module provides the capability trait the deployment core consumes,
//! the domain types exchanged through it, and the AWS SDK implementation.

mod api;
mod client;
mod types;

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
pub(crate) use api::MockCloudFormationApi;
pub use api::CloudFormationApi;
pub use client::CloudFormationClient;
pub use types::{
    ChangeDetail, ChangeSet, ChangeSetDescription, ChangeSetStatus, ChangeSetType,
    CreateChangeSetRequest, IN_PROGRESS_SUFFIX, Parameter, REVIEW_IN_PROGRESS_STATUS,
    ResourceChange, Stack, StackEvent, StackEventPage, StackOutput,
};
