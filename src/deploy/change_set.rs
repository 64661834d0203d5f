//! Change set lifecycle: propose, wait, inspect, execute, discard.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cloudformation::{
    ChangeSet, ChangeSetStatus, ChangeSetType, CloudFormationApi, CreateChangeSetRequest,
    Parameter, ResourceChange, Stack,
};
use crate::error::Result;

use super::lookup::StackLookup;
use super::poll::{Cancellation, PollSettings, Poller};
use super::progress::{ProgressEvent, ProgressSink};

/// Prefix of every change set name.
pub const CHANGE_SET_NAME_PREFIX: &str = "ChangeSet-";

/// Status reasons the service gives for a change set with nothing to do.
const NO_CHANGES_MARKERS: &[&str] = &["didn't contain changes", "No updates are to be performed"];

/// What to propose.
#[derive(Debug, Clone, Copy)]
pub struct Proposal<'a> {
    /// Target stack.
    pub stack_name: &'a str,
    /// Template body.
    pub template_body: &'a str,
    /// Template parameters.
    pub parameters: &'a BTreeMap<String, String>,
    /// Idempotency token; also names the change set.
    pub client_token: &'a str,
    /// Change set description.
    pub description: &'a str,
}

/// A created change set and the stack it was classified against.
#[derive(Debug, Clone)]
pub struct Proposed {
    /// The change set.
    pub change_set: ChangeSet,
    /// The stack as it was before the change set, if it existed.
    pub existing: Option<Stack>,
}

/// How change set creation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreationOutcome {
    /// The change set can be executed.
    Ready,
    /// The change set proposed nothing and was deleted.
    NoChanges,
    /// The change set could not be created.
    Failed {
        /// Reason given by the service.
        reason: String,
    },
}

/// Drives change sets through their lifecycle.
pub struct ChangeSetManager<'a, C: CloudFormationApi + ?Sized> {
    api: &'a C,
    progress: &'a dyn ProgressSink,
    interval: Duration,
    timeout: Option<Duration>,
    cancellation: &'a Cancellation,
}

impl<'a, C: CloudFormationApi + ?Sized> ChangeSetManager<'a, C> {
    /// Creates a manager.
    #[must_use]
    pub const fn new(
        api: &'a C,
        progress: &'a dyn ProgressSink,
        settings: &PollSettings,
        cancellation: &'a Cancellation,
    ) -> Self {
        Self {
            api,
            progress,
            interval: settings.change_set_interval,
            timeout: settings.timeout,
            cancellation,
        }
    }

    /// Creates a change set.
    ///
    /// The type is `CREATE` when the stack does not exist yet, or exists only
    /// as the placeholder of an unexecuted `CREATE` change set, and `UPDATE`
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the create request fails.
    pub async fn propose(&self, proposal: &Proposal<'_>) -> Result<Proposed> {
        let existing = StackLookup::new(self.api).find(proposal.stack_name).await?;
        let change_set_type = classify(existing.as_ref());
        let name = change_set_name(proposal.client_token);

        let request = CreateChangeSetRequest {
            stack_name: proposal.stack_name.to_string(),
            template_body: proposal.template_body.to_string(),
            parameters: proposal
                .parameters
                .iter()
                .map(|(k, v)| Parameter::new(k, v))
                .collect(),
            change_set_name: name.clone(),
            client_token: proposal.client_token.to_string(),
            description: proposal.description.to_string(),
            change_set_type,
        };

        let id = self.api.create_change_set(&request).await?;
        info!("Created {change_set_type} change set {name} for {}", proposal.stack_name);

        let change_set = ChangeSet {
            id,
            name,
            stack_name: proposal.stack_name.to_string(),
            change_set_type,
        };
        self.progress.emit(&ProgressEvent::ChangeSetCreated {
            change_set: &change_set,
        });

        Ok(Proposed {
            change_set,
            existing,
        })
    }

    /// Waits until the change set is ready or has failed.
    ///
    /// A failed change set is deleted once its reason has been read. A failed
    /// delete is logged and does not change the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails, the wait times out, or it is
    /// cancelled.
    pub async fn await_creation(&self, change_set: &ChangeSet) -> Result<CreationOutcome> {
        let poller = Poller::start(
            format!("change set {}", change_set.name),
            self.interval,
            self.timeout,
            self.cancellation,
        );

        loop {
            poller.check()?;
            let description = self.api.describe_change_set(&change_set.id, None).await?;

            match description.status {
                Some(ChangeSetStatus::CreateComplete) => {
                    self.progress.emit(&ProgressEvent::ChangeSetReady { change_set });
                    return Ok(CreationOutcome::Ready);
                }
                Some(ChangeSetStatus::Failed) => {
                    let reason = description.status_reason.unwrap_or_default();
                    let no_changes = is_no_changes(&reason);
                    self.discard_failed(change_set).await;

                    if no_changes {
                        info!("Change set {} contains no changes", change_set.name);
                        self.progress.emit(&ProgressEvent::NoChanges {
                            stack_name: &change_set.stack_name,
                        });
                        return Ok(CreationOutcome::NoChanges);
                    }

                    warn!("Change set {} failed: {reason}", change_set.name);
                    self.progress.emit(&ProgressEvent::ChangeSetFailed {
                        change_set,
                        reason: &reason,
                    });
                    return Ok(CreationOutcome::Failed { reason });
                }
                Some(
                    status @ (ChangeSetStatus::DeletePending
                    | ChangeSetStatus::DeleteInProgress
                    | ChangeSetStatus::DeleteComplete
                    | ChangeSetStatus::DeleteFailed),
                ) => {
                    let reason = format!("Change set was deleted during creation ({status})");
                    self.progress.emit(&ProgressEvent::ChangeSetFailed {
                        change_set,
                        reason: &reason,
                    });
                    return Ok(CreationOutcome::Failed { reason });
                }
                Some(status) => {
                    debug!("Change set {} is {status}", change_set.name);
                    self.progress.emit(&ProgressEvent::WaitingForChangeSet {
                        change_set,
                        status: &status,
                    });
                }
                None => debug!("Change set {} has no status yet", change_set.name),
            }

            poller.sleep().await;
        }
    }

    /// Lists every change the change set proposes, following continuation
    /// tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if a describe request fails.
    pub async fn list_changes(&self, change_set: &ChangeSet) -> Result<Vec<ResourceChange>> {
        let mut changes = Vec::new();
        let mut next_token = None;

        loop {
            let page = self.api.describe_change_set(&change_set.id, next_token).await?;
            changes.extend(page.changes);

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!("Change set {} proposes {} changes", change_set.name, changes.len());
        Ok(changes)
    }

    /// Starts executing the change set and returns without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the execute request fails.
    pub async fn execute(&self, change_set: &ChangeSet, client_token: &str) -> Result<()> {
        self.api.execute_change_set(&change_set.id, client_token).await?;
        info!("Executing change set {}", change_set.name);
        self.progress.emit(&ProgressEvent::ExecutionStarted { change_set });
        Ok(())
    }

    /// Deletes the change set.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete request fails.
    pub async fn discard(&self, change_set: &ChangeSet) -> Result<()> {
        self.api.delete_change_set(&change_set.id).await?;
        debug!("Deleted change set {}", change_set.name);
        Ok(())
    }

    async fn discard_failed(&self, change_set: &ChangeSet) {
        if let Err(err) = self.discard(change_set).await {
            warn!("Could not delete failed change set {}: {err}", change_set.name);
        }
    }
}

/// Chooses the change set type for a stack lookup result.
///
/// A stack in `REVIEW_IN_PROGRESS` was never deployed and only accepts
/// `CREATE` change sets.
#[must_use]
pub fn classify(existing: Option<&Stack>) -> ChangeSetType {
    match existing {
        Some(stack) if !stack.is_under_review() => ChangeSetType::Update,
        _ => ChangeSetType::Create,
    }
}

/// Names the change set for a token.
#[must_use]
pub fn change_set_name(client_token: &str) -> String {
    format!("{CHANGE_SET_NAME_PREFIX}{client_token}")
}

/// Returns true if a failure reason means there was nothing to change.
#[must_use]
pub fn is_no_changes(reason: &str) -> bool {
    NO_CHANGES_MARKERS.iter().any(|m| reason.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudformation::fake::{FakeCloudFormation, stack};
    use crate::cloudformation::{ChangeSetDescription, MockCloudFormationApi};
    use crate::deploy::progress::NullProgress;
    use crate::deploy::progress::recording::RecordingProgress;
    use crate::error::{CfnDeployError, CloudFormationError, DeployError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn proposal<'a>(params: &'a BTreeMap<String, String>, token: &'a str) -> Proposal<'a> {
        Proposal {
            stack_name: "app",
            template_body: "Resources: {}",
            parameters: params,
            client_token: token,
            description: "Stack Updates.",
        }
    }

    #[tokio::test]
    async fn test_propose_create_for_new_stack() {
        let fake = FakeCloudFormation::new();
        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let manager = ChangeSetManager::new(&fake, &NullProgress, &settings, &cancellation);

        let params = BTreeMap::from([
            (String::from("Env"), String::from("prod")),
            (String::from("Size"), String::from("small")),
        ]);
        let proposed = assert_ok!(manager.propose(&proposal(&params, "42")).await);

        assert_eq!(proposed.change_set.change_set_type, ChangeSetType::Create);
        assert_eq!(proposed.change_set.name, "ChangeSet-42");
        assert!(proposed.existing.is_none());

        let request = &fake.created_requests()[0];
        assert_eq!(request.client_token, "42");
        assert_eq!(request.description, "Stack Updates.");
        assert_eq!(
            request.parameters,
            vec![Parameter::new("Env", "prod"), Parameter::new("Size", "small")]
        );
    }

    #[tokio::test]
    async fn test_propose_update_for_existing_stack() {
        let fake = FakeCloudFormation::new().with_stack("app", "CREATE_COMPLETE");
        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let manager = ChangeSetManager::new(&fake, &NullProgress, &settings, &cancellation);

        let params = BTreeMap::new();
        let proposed = assert_ok!(manager.propose(&proposal(&params, "42")).await);
        assert_eq!(proposed.change_set.change_set_type, ChangeSetType::Update);
        assert!(proposed.existing.is_some());
    }

    #[tokio::test]
    async fn test_await_creation_ready() {
        let fake = FakeCloudFormation::new();
        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let progress = RecordingProgress::default();
        let manager = ChangeSetManager::new(&fake, &progress, &settings, &cancellation);

        let params = BTreeMap::new();
        let proposed = assert_ok!(manager.propose(&proposal(&params, "42")).await);
        let outcome = assert_ok!(manager.await_creation(&proposed.change_set).await);

        assert_eq!(outcome, CreationOutcome::Ready);
        assert_eq!(
            progress.kinds(),
            vec!["change_set_created", "waiting_for_change_set", "change_set_ready"]
        );
        assert!(fake.deleted_change_sets().is_empty());
    }

    #[tokio::test]
    async fn test_failed_change_set_is_reported_and_deleted() {
        let fake = FakeCloudFormation::new();
        fake.fail_change_sets("Template format error: Unresolved resource dependencies");
        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let manager = ChangeSetManager::new(&fake, &NullProgress, &settings, &cancellation);

        let params = BTreeMap::new();
        let proposed = assert_ok!(manager.propose(&proposal(&params, "42")).await);
        let outcome = assert_ok!(manager.await_creation(&proposed.change_set).await);

        assert_eq!(
            outcome,
            CreationOutcome::Failed {
                reason: String::from("Template format error: Unresolved resource dependencies")
            }
        );
        assert_eq!(fake.deleted_change_sets(), vec![proposed.change_set.id]);
    }

    #[tokio::test]
    async fn test_list_changes_follows_pages() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_change_set().times(2).returning(|_, token| {
            let (logical_id, next_token) = match token.as_deref() {
                None => ("Bucket", Some(String::from("page-2"))),
                Some(_) => ("Queue", None),
            };
            Ok(ChangeSetDescription {
                status: Some(ChangeSetStatus::CreateComplete),
                changes: vec![ResourceChange {
                    action: String::from("Add"),
                    logical_id: logical_id.to_string(),
                    ..ResourceChange::default()
                }],
                next_token,
                ..ChangeSetDescription::default()
            })
        });

        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let manager = ChangeSetManager::new(&api, &NullProgress, &settings, &cancellation);
        let change_set = ChangeSet {
            id: String::from("cs-1"),
            name: String::from("ChangeSet-42"),
            stack_name: String::from("app"),
            change_set_type: ChangeSetType::Create,
        };

        let changes = assert_ok!(manager.list_changes(&change_set).await);
        let ids: Vec<_> = changes.iter().map(|c| c.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["Bucket", "Queue"]);
    }

    #[tokio::test]
    async fn test_cancelled_wait_sends_no_request() {
        // No expectations: any call panics.
        let api = MockCloudFormationApi::new();
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let settings = PollSettings::immediate();
        let manager = ChangeSetManager::new(&api, &NullProgress, &settings, &cancellation);
        let change_set = ChangeSet {
            id: String::from("cs-1"),
            name: String::from("ChangeSet-42"),
            stack_name: String::from("app"),
            change_set_type: ChangeSetType::Create,
        };

        let err = assert_err!(manager.await_creation(&change_set).await);
        assert!(matches!(err, CfnDeployError::Deploy(DeployError::Cancelled { .. })));
    }

    #[test]
    fn test_no_changes_reasons() {
        assert!(is_no_changes(
            "The submitted information didn't contain changes. Submit different information to create a change set."
        ));
        assert!(is_no_changes("No updates are to be performed."));
        assert!(!is_no_changes("Template format error"));
        assert!(!is_no_changes(""));
    }

    #[test]
    fn test_classify() {
        let deployed = stack("app", "CREATE_COMPLETE", None, vec![]);
        assert_eq!(classify(Some(&deployed)), ChangeSetType::Update);
        assert_eq!(classify(None), ChangeSetType::Create);

        let placeholder = stack("app", "REVIEW_IN_PROGRESS", None, vec![]);
        assert_eq!(classify(Some(&placeholder)), ChangeSetType::Create);
    }

    fn change_set() -> ChangeSet {
        ChangeSet {
            id: String::from("cs-1"),
            name: String::from("ChangeSet-42"),
            stack_name: String::from("app"),
            change_set_type: ChangeSetType::Update,
        }
    }

    fn described(status: Option<ChangeSetStatus>, reason: Option<&str>) -> ChangeSetDescription {
        ChangeSetDescription {
            status,
            status_reason: reason.map(String::from),
            ..ChangeSetDescription::default()
        }
    }

    #[tokio::test]
    async fn test_deleted_during_creation_is_failed() {
        for status in [
            ChangeSetStatus::DeletePending,
            ChangeSetStatus::DeleteInProgress,
            ChangeSetStatus::DeleteComplete,
            ChangeSetStatus::DeleteFailed,
        ] {
            // No delete expectation: the change set is already going away.
            let mut api = MockCloudFormationApi::new();
            let returned = status.clone();
            api.expect_describe_change_set()
                .times(1)
                .returning(move |_, _| Ok(described(Some(returned.clone()), None)));

            let cancellation = Cancellation::new();
            let settings = PollSettings::immediate();
            let progress = RecordingProgress::default();
            let manager = ChangeSetManager::new(&api, &progress, &settings, &cancellation);

            let outcome = assert_ok!(manager.await_creation(&change_set()).await);
            let CreationOutcome::Failed { reason } = outcome else {
                panic!("expected failure for {status}");
            };
            assert!(reason.contains(&status.to_string()));
            assert_eq!(progress.kinds(), vec!["change_set_failed"]);
        }
    }

    #[tokio::test]
    async fn test_unknown_and_missing_status_keep_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut api = MockCloudFormationApi::new();
        api.expect_describe_change_set().times(4).returning(move |_, _| {
            let status = match counter.fetch_add(1, Ordering::SeqCst) {
                0 => None,
                1 => Some(ChangeSetStatus::Unknown(String::from("CREATE_QUEUED"))),
                2 => Some(ChangeSetStatus::CreatePending),
                _ => Some(ChangeSetStatus::CreateComplete),
            };
            Ok(described(status, None))
        });

        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let progress = RecordingProgress::default();
        let manager = ChangeSetManager::new(&api, &progress, &settings, &cancellation);

        let outcome = assert_ok!(manager.await_creation(&change_set()).await);
        assert_eq!(outcome, CreationOutcome::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            progress.kinds(),
            vec!["waiting_for_change_set", "waiting_for_change_set", "change_set_ready"]
        );
    }

    #[tokio::test]
    async fn test_no_changes_survives_failed_delete() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_change_set().times(1).returning(|_, _| {
            Ok(described(
                Some(ChangeSetStatus::Failed),
                Some("No updates are to be performed."),
            ))
        });
        api.expect_delete_change_set().times(1).returning(|_| {
            Err(CloudFormationError::service(
                "DeleteChangeSet",
                Some(String::from("Throttling")),
                "Rate exceeded",
            )
            .into())
        });

        let cancellation = Cancellation::new();
        let settings = PollSettings::immediate();
        let manager = ChangeSetManager::new(&api, &NullProgress, &settings, &cancellation);

        let outcome = assert_ok!(manager.await_creation(&change_set()).await);
        assert_eq!(outcome, CreationOutcome::NoChanges);
    }
}
