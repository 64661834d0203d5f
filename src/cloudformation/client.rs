//! AWS SDK implementation of [`CloudFormationApi`].
//!
//! This module translates between the SDK's generated shapes and the crate's
//! domain types, and folds SDK errors into [`CloudFormationError`].

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::config::Credentials;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::primitives::DateTime as SdkDateTime;
use aws_sdk_cloudformation::types as sdk;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::config::AwsSettings;
use crate::error::{CfnDeployError, CloudFormationError, Result, TemplateError};

use super::api::CloudFormationApi;
use super::types::{
    ChangeDetail, ChangeSetDescription, ChangeSetStatus, CreateChangeSetRequest, ResourceChange,
    Stack, StackEvent, StackEventPage, StackOutput,
};

/// Error code the service uses for request validation failures.
const VALIDATION_ERROR_CODE: &str = "ValidationError";

/// Provider name attached to static credentials.
const CREDENTIALS_PROVIDER: &str = "cfn-deploy";

/// `CloudFormation` client backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    /// SDK client.
    client: Client,
}

impl CloudFormationClient {
    /// Creates a client for the given region and credentials.
    ///
    /// Falls back to the SDK's default credential chain when no static
    /// credentials are configured.
    pub async fn new(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let Some(credentials) = &settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                CREDENTIALS_PROVIDER,
            ));
        }

        let config = loader.load().await;
        debug!("Created CloudFormation client for region {}", settings.region);

        Self {
            client: Client::new(&config),
        }
    }

    /// Creates a client from an existing SDK client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudFormationApi for CloudFormationClient {
    async fn validate_template(&self, template_body: &str) -> Result<()> {
        trace!("ValidateTemplate ({} bytes)", template_body.len());

        match self
            .client
            .validate_template()
            .template_body(template_body)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.code() == Some(VALIDATION_ERROR_CODE) => {
                Err(CfnDeployError::Template(TemplateError::Invalid {
                    message: err.message().unwrap_or("rejected by service").to_string(),
                }))
            }
            Err(err) => Err(sdk_error("ValidateTemplate", &err)),
        }
    }

    async fn create_change_set(&self, request: &CreateChangeSetRequest) -> Result<String> {
        trace!("CreateChangeSet {}", request.change_set_name);

        let parameters = request
            .parameters
            .iter()
            .map(|p| {
                sdk::Parameter::builder()
                    .parameter_key(&p.key)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect();

        let output = self
            .client
            .create_change_set()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_parameters(Some(parameters))
            .change_set_name(&request.change_set_name)
            .client_token(&request.client_token)
            .description(&request.description)
            .change_set_type(sdk::ChangeSetType::from(request.change_set_type.as_str()))
            .send()
            .await
            .map_err(|e| sdk_error("CreateChangeSet", &e))?;

        output.id().map(String::from).ok_or_else(|| {
            CloudFormationError::invalid_response("CreateChangeSet", "missing change set id")
                .into()
        })
    }

    async fn describe_change_set(
        &self,
        change_set_id: &str,
        next_token: Option<String>,
    ) -> Result<ChangeSetDescription> {
        trace!("DescribeChangeSet {change_set_id}");

        let output = self
            .client
            .describe_change_set()
            .change_set_name(change_set_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeChangeSet", &e))?;

        Ok(ChangeSetDescription {
            status: output.status().map(|s| ChangeSetStatus::from(s.as_str())),
            status_reason: output.status_reason().map(String::from),
            changes: output
                .changes()
                .iter()
                .filter_map(sdk::Change::resource_change)
                .map(to_resource_change)
                .collect(),
            next_token: output.next_token().map(String::from),
        })
    }

    async fn execute_change_set(&self, change_set_id: &str, client_token: &str) -> Result<()> {
        trace!("ExecuteChangeSet {change_set_id}");

        self.client
            .execute_change_set()
            .change_set_name(change_set_id)
            .client_request_token(client_token)
            .send()
            .await
            .map_err(|e| sdk_error("ExecuteChangeSet", &e))?;

        Ok(())
    }

    async fn delete_change_set(&self, change_set_id: &str) -> Result<()> {
        trace!("DeleteChangeSet {change_set_id}");

        self.client
            .delete_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteChangeSet", &e))?;

        Ok(())
    }

    async fn describe_stacks(&self, stack_name: &str) -> Result<Vec<Stack>> {
        trace!("DescribeStacks {stack_name}");

        let output = match self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if is_stack_missing(&err) => {
                debug!("Stack {stack_name} does not exist");
                return Ok(vec![]);
            }
            Err(err) => return Err(sdk_error("DescribeStacks", &err)),
        };

        Ok(output.stacks().iter().map(to_stack).collect())
    }

    async fn describe_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<StackEventPage> {
        trace!("DescribeStackEvents {stack_name}");

        let output = self
            .client
            .describe_stack_events()
            .stack_name(stack_name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeStackEvents", &e))?;

        let events = output
            .stack_events()
            .iter()
            .map(to_stack_event)
            .collect::<Result<Vec<_>>>()?;

        Ok(StackEventPage {
            events,
            next_token: output.next_token().map(String::from),
        })
    }
}

/// Converts an SDK error into a crate error, keeping the service code.
fn sdk_error<E>(operation: &str, err: &SdkError<E>) -> CfnDeployError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(err).to_string(), String::from);

    CloudFormationError::service(operation, err.code().map(String::from), message).into()
}

/// Returns true if `DescribeStacks` failed only because the stack is absent.
fn is_stack_missing<E: ProvideErrorMetadata>(err: &SdkError<E>) -> bool {
    err.code() == Some(VALIDATION_ERROR_CODE)
        && err.message().is_some_and(|m| m.contains("does not exist"))
}

fn to_stack(stack: &sdk::Stack) -> Stack {
    Stack {
        name: stack.stack_name().unwrap_or_default().to_string(),
        stack_id: stack.stack_id().map(String::from),
        status: stack
            .stack_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        status_reason: stack.stack_status_reason().map(String::from),
        outputs: stack
            .outputs()
            .iter()
            .map(|o| StackOutput {
                key: o.output_key().unwrap_or_default().to_string(),
                value: o.output_value().unwrap_or_default().to_string(),
                description: o.description().map(String::from),
            })
            .collect(),
    }
}

fn to_resource_change(change: &sdk::ResourceChange) -> ResourceChange {
    ResourceChange {
        action: change
            .action()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default(),
        logical_id: change.logical_resource_id().unwrap_or_default().to_string(),
        physical_id: change.physical_resource_id().map(String::from),
        resource_type: change.resource_type().unwrap_or_default().to_string(),
        replacement: change.replacement().map(|r| r.as_str().to_string()),
        scope: change
            .scope()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        details: change
            .details()
            .iter()
            .map(|d| ChangeDetail {
                attribute: d
                    .target()
                    .and_then(sdk::ResourceTargetDefinition::attribute)
                    .map(|a| a.as_str().to_string()),
                name: d.target().and_then(|t| t.name()).map(String::from),
                requires_recreation: d
                    .target()
                    .and_then(sdk::ResourceTargetDefinition::requires_recreation)
                    .map(|r| r.as_str().to_string()),
                causing_entity: d.causing_entity().map(String::from),
                change_source: d.change_source().map(|s| s.as_str().to_string()),
            })
            .collect(),
    }
}

fn to_stack_event(event: &sdk::StackEvent) -> Result<StackEvent> {
    let event_id = event.event_id().ok_or_else(|| {
        CloudFormationError::invalid_response("DescribeStackEvents", "event without id")
    })?;

    let timestamp = event.timestamp().and_then(to_utc).ok_or_else(|| {
        CloudFormationError::invalid_response(
            "DescribeStackEvents",
            format!("event {event_id} without a valid timestamp"),
        )
    })?;

    Ok(StackEvent {
        event_id: event_id.to_string(),
        timestamp,
        logical_resource_id: event.logical_resource_id().unwrap_or_default().to_string(),
        resource_type: event.resource_type().map(String::from),
        resource_status: event
            .resource_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        status_reason: event.resource_status_reason().map(String::from),
        client_token: event.client_request_token().map(String::from),
    })
}

fn to_utc(timestamp: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
