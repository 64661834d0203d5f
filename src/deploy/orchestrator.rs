//! The deploy state machine.
//!
//! A deploy validates its options and template, proposes a change set, and
//! either stops there (nothing to change, or the change set failed) or
//! executes it and watches the stack converge.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cloudformation::{ChangeSet, ChangeSetType, CloudFormationApi, ResourceChange};
use crate::config::{DeployOptions, OptionsValidator, ValidatedOptions};
use crate::error::{DeployError, Result, TemplateError};
use crate::template::TemplateSource;

use super::change_set::{ChangeSetManager, CreationOutcome, Proposal, Proposed};
use super::lookup::StackLookup;
use super::monitor::DeploymentMonitor;
use super::outputs::OutputExtractor;
use super::poll::{Cancellation, PollSettings};
use super::progress::{ProgressEvent, ProgressSink};

/// Status reported for a change set that was executed without waiting.
pub const SUBMITTED_STATUS: &str = "EXECUTE_IN_PROGRESS";

/// Status reported for a change set that could not be created.
pub const CHANGE_SET_FAILED_STATUS: &str = "FAILED";

/// How a deploy ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    /// The change set was executed and the stack converged successfully.
    Applied,
    /// The stack already matched the template and parameters.
    Unchanged,
    /// The change set was executed and not waited for.
    Submitted,
    /// The change set could not be created.
    ChangeSetFailed,
    /// The stack reached a failed or rolled-back status.
    StackFailed,
}

/// Result of a deploy.
///
/// Failures of the change set or the stack are reported here, not as errors.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeployResult {
    /// Whether the deploy succeeded.
    pub success: bool,
    /// How the deploy ended.
    pub outcome: DeployOutcome,
    /// Stack name.
    pub stack_name: String,
    /// Final stack status.
    pub status: String,
    /// Reason for a failure, when known.
    pub reason: Option<String>,
    /// Stack outputs; `None` when the stack declares none.
    pub outputs: Option<BTreeMap<String, String>>,
    /// Change set ARN.
    pub change_set_id: Option<String>,
    /// Change set type.
    pub change_set_type: Option<ChangeSetType>,
}

/// Result of a plan.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanResult {
    /// Stack name.
    pub stack_name: String,
    /// Change set type the deploy would use.
    pub change_set_type: ChangeSetType,
    /// How change set creation ended.
    pub outcome: CreationOutcome,
    /// Proposed changes; empty unless the change set was ready.
    pub changes: Vec<ResourceChange>,
}

/// Composes lookup, change sets, monitoring and output extraction into one
/// deploy.
pub struct DeploymentOrchestrator<'a, C, T>
where
    C: CloudFormationApi + ?Sized,
    T: TemplateSource + ?Sized,
{
    /// `CloudFormation` API.
    api: &'a C,
    /// Template source.
    templates: &'a T,
    /// Progress sink.
    progress: &'a dyn ProgressSink,
    /// Poll intervals and default timeout.
    settings: PollSettings,
    /// Cancellation flag for every poll loop.
    cancellation: Cancellation,
    /// Options validator.
    validator: OptionsValidator,
    /// Output extractor.
    extractor: OutputExtractor,
}

impl<'a, C, T> DeploymentOrchestrator<'a, C, T>
where
    C: CloudFormationApi + ?Sized,
    T: TemplateSource + ?Sized,
{
    /// Creates an orchestrator with default poll settings.
    #[must_use]
    pub fn new(api: &'a C, templates: &'a T, progress: &'a dyn ProgressSink) -> Self {
        Self {
            api,
            templates,
            progress,
            settings: PollSettings::default(),
            cancellation: Cancellation::new(),
            validator: OptionsValidator::new(),
            extractor: OutputExtractor::new(),
        }
    }

    /// Sets the poll settings.
    #[must_use]
    pub const fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Deploys a template.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid options, a missing or invalid template,
    /// a failed request, a timeout or a cancellation. A failed change set or
    /// stack is returned as an unsuccessful [`DeployResult`].
    pub async fn deploy(&self, options: &DeployOptions) -> Result<DeployResult> {
        let options = self.validator.validate(options)?;
        let template_body = self.load_template(&options.template_path).await?;

        let client_token = options
            .client_token
            .clone()
            .unwrap_or_else(generate_client_token);
        let settings = self.settings_for(&options);

        info!("Deploying stack {}", options.stack_name);

        let changes = ChangeSetManager::new(self.api, self.progress, &settings, &self.cancellation);
        let Proposed {
            change_set,
            existing,
        } = changes
            .propose(&Proposal {
                stack_name: &options.stack_name,
                template_body: &template_body,
                parameters: &options.parameters,
                client_token: &client_token,
                description: &options.description,
            })
            .await?;

        match changes.await_creation(&change_set).await? {
            CreationOutcome::NoChanges => {
                info!("No changes required for stack {}", options.stack_name);
                let outputs = existing.as_ref().and_then(|s| self.extractor.extract(s));
                self.report_outputs(outputs.as_ref());

                return Ok(DeployResult {
                    success: true,
                    outcome: DeployOutcome::Unchanged,
                    stack_name: options.stack_name,
                    status: existing.map(|s| s.status).unwrap_or_default(),
                    reason: None,
                    outputs,
                    change_set_id: Some(change_set.id),
                    change_set_type: Some(change_set.change_set_type),
                });
            }
            CreationOutcome::Failed { reason } => {
                return Ok(DeployResult {
                    success: false,
                    outcome: DeployOutcome::ChangeSetFailed,
                    stack_name: options.stack_name,
                    status: String::from(CHANGE_SET_FAILED_STATUS),
                    reason: Some(reason),
                    outputs: None,
                    change_set_id: Some(change_set.id),
                    change_set_type: Some(change_set.change_set_type),
                });
            }
            CreationOutcome::Ready => {}
        }

        self.report_changes(&changes, &change_set).await?;

        let floor = Utc::now();
        changes.execute(&change_set, &client_token).await?;

        if !options.wait_for_stack {
            info!("Not waiting for stack {} to converge", options.stack_name);
            return Ok(DeployResult {
                success: true,
                outcome: DeployOutcome::Submitted,
                stack_name: options.stack_name,
                status: String::from(SUBMITTED_STATUS),
                reason: None,
                outputs: None,
                change_set_id: Some(change_set.id),
                change_set_type: Some(change_set.change_set_type),
            });
        }

        let monitor = DeploymentMonitor::new(self.api, self.progress, &settings, &self.cancellation);
        let convergence = monitor.watch(&options.stack_name, floor, &client_token).await?;

        let (outcome, outputs) = if convergence.success {
            let outputs = self.extractor.extract(&convergence.stack);
            self.report_outputs(outputs.as_ref());
            (DeployOutcome::Applied, outputs)
        } else {
            warn!(
                "Deploy of stack {} failed with {}",
                options.stack_name,
                convergence.status()
            );
            (DeployOutcome::StackFailed, None)
        };

        Ok(DeployResult {
            success: convergence.success,
            outcome,
            stack_name: options.stack_name,
            reason: convergence.stack.status_reason,
            status: convergence.stack.status,
            outputs,
            change_set_id: Some(change_set.id),
            change_set_type: Some(change_set.change_set_type),
        })
    }

    /// Proposes a change set, lists its changes and discards it.
    ///
    /// Plans always use a fresh token, so a later deploy can reuse the
    /// caller's token.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid options, a missing or invalid template,
    /// a failed request, a timeout or a cancellation.
    pub async fn plan(&self, options: &DeployOptions) -> Result<PlanResult> {
        let options = self.validator.validate(options)?;
        let template_body = self.load_template(&options.template_path).await?;
        let client_token = generate_client_token();
        let settings = self.settings_for(&options);

        info!("Planning stack {}", options.stack_name);

        let changes = ChangeSetManager::new(self.api, self.progress, &settings, &self.cancellation);
        let Proposed { change_set, .. } = changes
            .propose(&Proposal {
                stack_name: &options.stack_name,
                template_body: &template_body,
                parameters: &options.parameters,
                client_token: &client_token,
                description: &options.description,
            })
            .await?;

        let outcome = changes.await_creation(&change_set).await?;
        let proposed = if outcome == CreationOutcome::Ready {
            let proposed = self.report_changes(&changes, &change_set).await?;
            changes.discard(&change_set).await?;
            proposed
        } else {
            Vec::new()
        };

        Ok(PlanResult {
            stack_name: options.stack_name,
            change_set_type: change_set.change_set_type,
            outcome,
            changes: proposed,
        })
    }

    /// Checks that a template exists and the service accepts it.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is missing, too large or invalid.
    pub async fn validate_template(&self, template_path: &Path) -> Result<()> {
        self.load_template(template_path).await.map(|_| ())
    }

    /// Returns the current outputs of a stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack does not exist or the lookup fails.
    pub async fn stack_outputs(&self, stack_name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let stack = StackLookup::new(self.api)
            .find(stack_name)
            .await?
            .ok_or_else(|| DeployError::StackNotFound {
                stack_name: stack_name.to_string(),
            })?;

        Ok(self.extractor.extract(&stack))
    }

    /// Reads a template and validates it locally and with the service.
    async fn load_template(&self, path: &Path) -> Result<String> {
        if !self.templates.exists(path).await {
            return Err(TemplateError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let body = self.templates.read(path).await?;
        self.validator.validate_template_body(&body)?;
        self.api.validate_template(&body).await?;

        self.progress.emit(&ProgressEvent::TemplateValidated { path });
        Ok(body)
    }

    async fn report_changes(
        &self,
        changes: &ChangeSetManager<'_, C>,
        change_set: &ChangeSet,
    ) -> Result<Vec<ResourceChange>> {
        let proposed = changes.list_changes(change_set).await?;
        self.progress.emit(&ProgressEvent::ChangesProposed {
            change_set,
            changes: &proposed,
        });
        Ok(proposed)
    }

    fn report_outputs(&self, outputs: Option<&BTreeMap<String, String>>) {
        if let Some(outputs) = outputs {
            self.progress.emit(&ProgressEvent::OutputsReady(outputs));
        }
    }

    fn settings_for(&self, options: &ValidatedOptions) -> PollSettings {
        self.settings
            .with_timeout(options.timeout.or(self.settings.timeout))
    }
}

/// Generates a random idempotency token.
#[must_use]
pub fn generate_client_token() -> String {
    Uuid::new_v4().simple().to_string()
}
