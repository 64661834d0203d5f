//! In-memory `CloudFormation` used by scenario tests.
//!
//! Stacks converge one poll after execution. A change set whose template and
//! parameters match what was last applied fails with the service's
//! "no changes" reason. A `CREATE` change set for an unknown stack leaves a
//! `REVIEW_IN_PROGRESS` stack behind, and a change set type that does not fit
//! the stack is rejected.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::{CloudFormationError, Result};

use super::api::CloudFormationApi;
use super::types::{
    ChangeSetDescription, ChangeSetStatus, ChangeSetType, CreateChangeSetRequest, Parameter,
    REVIEW_IN_PROGRESS_STATUS, ResourceChange, Stack, StackEvent, StackEventPage, StackOutput,
};

/// Reason the service gives for an empty change set.
pub const NO_CHANGES_REASON: &str = "The submitted information didn't contain changes. \
     Submit different information to create a change set.";

/// Events returned per `DescribeStackEvents` page.
const EVENT_PAGE_SIZE: usize = 2;

#[derive(Debug, Default)]
pub struct FakeCloudFormation {
    inner: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    stacks: HashMap<String, FakeStack>,
    change_sets: HashMap<String, FakeChangeSet>,
    outputs: Vec<StackOutput>,
    failure: Option<(String, String)>,
    change_set_failure: Option<String>,
    describe_stacks_error: Option<String>,
    calls: Vec<String>,
    created: Vec<CreateChangeSetRequest>,
    executed_tokens: Vec<String>,
    deleted: Vec<String>,
    next_id: usize,
}

#[derive(Debug)]
struct FakeStack {
    stack: Stack,
    /// Newest first.
    events: Vec<StackEvent>,
    applied: Option<(String, Vec<Parameter>)>,
    pending: Option<PendingExecution>,
}

#[derive(Debug)]
struct PendingExecution {
    change_set_type: ChangeSetType,
    template_body: String,
    parameters: Vec<Parameter>,
    token: String,
    polls_left: u32,
}

#[derive(Debug)]
struct FakeChangeSet {
    request: CreateChangeSetRequest,
    status: ChangeSetStatus,
    status_reason: Option<String>,
    polls_left: u32,
}

impl FakeCloudFormation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outputs every successful execution publishes.
    pub fn with_outputs(self, outputs: &[(&str, &str)]) -> Self {
        self.state().outputs = outputs
            .iter()
            .map(|(k, v)| StackOutput {
                key: (*k).to_string(),
                value: (*v).to_string(),
                description: None,
            })
            .collect();
        self
    }

    /// Seeds an existing, converged stack with one old event.
    pub fn with_stack(self, name: &str, status: &str) -> Self {
        {
            let mut state = self.state();
            let outputs = state.outputs.clone();
            let event = event(name, "old-event", name, status, Utc::now() - Duration::hours(1));
            state.stacks.insert(
                name.to_string(),
                FakeStack {
                    stack: stack(name, status, None, outputs),
                    events: vec![event],
                    applied: None,
                    pending: None,
                },
            );
        }
        self
    }

    /// Makes the next execution end in `status` with `reason`.
    pub fn fail_next_execution(&self, status: &str, reason: &str) {
        self.state().failure = Some((status.to_string(), reason.to_string()));
    }

    /// Makes every new change set fail with `reason`.
    pub fn fail_change_sets(&self, reason: &str) {
        self.state().change_set_failure = Some(reason.to_string());
    }

    /// Lets new change sets succeed again.
    pub fn clear_change_set_failure(&self) {
        self.state().change_set_failure = None;
    }

    /// Makes `DescribeStacks` fail with the given error code.
    pub fn fail_describe_stacks(&self, code: &str) {
        self.state().describe_stacks_error = Some(code.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn created_requests(&self) -> Vec<CreateChangeSetRequest> {
        self.state().created.clone()
    }

    pub fn executed_tokens(&self) -> Vec<String> {
        self.state().executed_tokens.clone()
    }

    pub fn deleted_change_sets(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl FakeState {
    fn record(&mut self, call: &str) {
        self.calls.push(call.to_string());
    }

    fn advance(&mut self, name: &str) {
        let outputs = self.outputs.clone();
        let failure = self.failure.clone();

        let Some(fake) = self.stacks.get_mut(name) else {
            return;
        };
        let Some(pending) = fake.pending.as_mut() else {
            return;
        };
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return;
        }

        let Some(pending) = fake.pending.take() else {
            return;
        };
        let prefix = pending.change_set_type.as_str();
        let now = Utc::now();
        let count = fake.events.len();

        let (status, reason) = match failure {
            Some((status, reason)) => {
                self.failure = None;
                (status, Some(reason))
            }
            None => {
                fake.applied = Some((pending.template_body, pending.parameters));
                fake.stack.outputs = outputs;
                (format!("{prefix}_COMPLETE"), None)
            }
        };

        let mut resource = event(name, &format!("evt-{count}"), "Bucket", &format!("{prefix}_COMPLETE"), now);
        resource.client_token = Some(pending.token.clone());
        let mut done = event(name, &format!("evt-{}", count + 1), name, &status, now);
        done.status_reason.clone_from(&reason);
        done.client_token = Some(pending.token);

        fake.events.insert(0, resource);
        fake.events.insert(0, done);
        fake.stack.status = status;
        fake.stack.status_reason = reason;
    }
}

#[async_trait]
impl CloudFormationApi for FakeCloudFormation {
    async fn validate_template(&self, _template_body: &str) -> Result<()> {
        self.state().record("ValidateTemplate");
        Ok(())
    }

    async fn create_change_set(&self, request: &CreateChangeSetRequest) -> Result<String> {
        let mut state = self.state();
        state.record("CreateChangeSet");
        state.created.push(request.clone());

        let under_review = state.stacks.get(&request.stack_name).map(|s| s.stack.is_under_review());
        match (request.change_set_type, under_review) {
            (ChangeSetType::Create, Some(false)) => {
                return Err(CloudFormationError::service(
                    "CreateChangeSet",
                    Some(String::from("ValidationError")),
                    format!("Stack [{}] already exists and cannot be created again with the changeSet", request.stack_name),
                )
                .into());
            }
            (ChangeSetType::Update, None) => {
                return Err(CloudFormationError::service(
                    "CreateChangeSet",
                    Some(String::from("ValidationError")),
                    format!("Stack [{}] does not exist", request.stack_name),
                )
                .into());
            }
            (ChangeSetType::Update, Some(true)) => {
                return Err(CloudFormationError::service(
                    "CreateChangeSet",
                    Some(String::from("ValidationError")),
                    format!("Stack:{} is in {REVIEW_IN_PROGRESS_STATUS} state and can not be updated.", request.stack_name),
                )
                .into());
            }
            (ChangeSetType::Create, None) => {
                let name = request.stack_name.clone();
                state.stacks.insert(
                    name.clone(),
                    FakeStack {
                        stack: stack(&name, REVIEW_IN_PROGRESS_STATUS, None, vec![]),
                        events: vec![],
                        applied: None,
                        pending: None,
                    },
                );
            }
            _ => {}
        }

        state.next_id += 1;

        let id = format!("arn:aws:cloudformation:fake:changeSet/{}/{}", request.change_set_name, state.next_id);

        let unchanged = state
            .stacks
            .get(&request.stack_name)
            .and_then(|s| s.applied.as_ref())
            .is_some_and(|(body, params)| {
                *body == request.template_body && *params == request.parameters
            });

        let (status, status_reason) = if let Some(reason) = state.change_set_failure.clone() {
            (ChangeSetStatus::Failed, Some(reason))
        } else if unchanged {
            (ChangeSetStatus::Failed, Some(NO_CHANGES_REASON.to_string()))
        } else {
            (ChangeSetStatus::CreateComplete, None)
        };

        state.change_sets.insert(
            id.clone(),
            FakeChangeSet {
                request: request.clone(),
                status,
                status_reason,
                polls_left: 1,
            },
        );

        Ok(id)
    }

    async fn describe_change_set(
        &self,
        change_set_id: &str,
        _next_token: Option<String>,
    ) -> Result<ChangeSetDescription> {
        let mut state = self.state();
        state.record("DescribeChangeSet");

        let change_set = state.change_sets.get_mut(change_set_id).ok_or_else(|| {
            CloudFormationError::service("DescribeChangeSet", Some(String::from("ChangeSetNotFound")), change_set_id)
        })?;

        if change_set.polls_left > 0 {
            change_set.polls_left -= 1;
            return Ok(ChangeSetDescription {
                status: Some(ChangeSetStatus::CreateInProgress),
                ..ChangeSetDescription::default()
            });
        }

        let action = match change_set.request.change_set_type {
            ChangeSetType::Create => "Add",
            ChangeSetType::Update => "Modify",
        };

        let changes = if change_set.status == ChangeSetStatus::CreateComplete {
            vec![ResourceChange {
                action: action.to_string(),
                logical_id: String::from("Bucket"),
                resource_type: String::from("AWS::S3::Bucket"),
                replacement: Some(String::from("False")),
                ..ResourceChange::default()
            }]
        } else {
            vec![]
        };

        Ok(ChangeSetDescription {
            status: Some(change_set.status.clone()),
            status_reason: change_set.status_reason.clone(),
            changes,
            next_token: None,
        })
    }

    async fn execute_change_set(&self, change_set_id: &str, client_token: &str) -> Result<()> {
        let mut state = self.state();
        state.record("ExecuteChangeSet");
        state.executed_tokens.push(client_token.to_string());

        let request = state
            .change_sets
            .get(change_set_id)
            .map(|c| c.request.clone())
            .ok_or_else(|| {
                CloudFormationError::service("ExecuteChangeSet", Some(String::from("ChangeSetNotFound")), change_set_id)
            })?;

        let name = request.stack_name.clone();
        let status = format!("{}_IN_PROGRESS", request.change_set_type.as_str());
        let now = Utc::now();

        let fake = state.stacks.entry(name.clone()).or_insert_with(|| FakeStack {
            stack: stack(&name, &status, None, vec![]),
            events: vec![],
            applied: None,
            pending: None,
        });

        let mut started = event(&name, &format!("evt-{}", fake.events.len()), &name, &status, now);
        started.client_token = Some(client_token.to_string());
        fake.events.insert(0, started);
        fake.stack.status = status;
        fake.stack.status_reason = None;
        fake.pending = Some(PendingExecution {
            change_set_type: request.change_set_type,
            template_body: request.template_body,
            parameters: request.parameters,
            token: client_token.to_string(),
            polls_left: 1,
        });

        Ok(())
    }

    async fn delete_change_set(&self, change_set_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record("DeleteChangeSet");
        state.change_sets.remove(change_set_id);
        state.deleted.push(change_set_id.to_string());
        Ok(())
    }

    async fn describe_stacks(&self, stack_name: &str) -> Result<Vec<Stack>> {
        let mut state = self.state();
        state.record("DescribeStacks");

        if let Some(code) = state.describe_stacks_error.clone() {
            return Err(CloudFormationError::service("DescribeStacks", Some(code), "denied").into());
        }

        state.advance(stack_name);

        Ok(state
            .stacks
            .get(stack_name)
            .map(|s| vec![s.stack.clone()])
            .unwrap_or_default())
    }

    async fn describe_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<StackEventPage> {
        let mut state = self.state();
        state.record("DescribeStackEvents");

        let events = state
            .stacks
            .get(stack_name)
            .map(|s| s.events.clone())
            .unwrap_or_default();

        let start = next_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + EVENT_PAGE_SIZE).min(events.len());

        Ok(StackEventPage {
            events: events.get(start..end).map(<[StackEvent]>::to_vec).unwrap_or_default(),
            next_token: (end < events.len()).then(|| end.to_string()),
        })
    }
}

pub fn stack(name: &str, status: &str, reason: Option<&str>, outputs: Vec<StackOutput>) -> Stack {
    Stack {
        name: name.to_string(),
        stack_id: Some(format!("arn:aws:cloudformation:fake:stack/{name}")),
        status: status.to_string(),
        status_reason: reason.map(String::from),
        outputs,
    }
}

pub fn event(
    stack_name: &str,
    id: &str,
    logical_id: &str,
    status: &str,
    timestamp: chrono::DateTime<Utc>,
) -> StackEvent {
    let resource_type = if logical_id == stack_name {
        "AWS::CloudFormation::Stack"
    } else {
        "AWS::S3::Bucket"
    };

    StackEvent {
        event_id: id.to_string(),
        timestamp,
        logical_resource_id: logical_id.to_string(),
        resource_type: Some(resource_type.to_string()),
        resource_status: status.to_string(),
        status_reason: None,
        client_token: None,
    }
}
