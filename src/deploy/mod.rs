//! Deployment core.
//!
//! This module contains the deploy state machine and its parts:
//! - Stack lookup and output extraction
//! - Change set lifecycle management
//! - Convergence monitoring with ordered event reporting
//! - Poll loops with deadlines and cancellation
//! - Progress reporting through a pluggable sink

mod change_set;
mod lookup;
mod monitor;
mod orchestrator;
mod outputs;
mod poll;
mod progress;

pub use change_set::{
    CHANGE_SET_NAME_PREFIX, ChangeSetManager, CreationOutcome, Proposal, Proposed,
    change_set_name, classify, is_no_changes,
};
pub use lookup::StackLookup;
pub use monitor::{Convergence, DeploymentMonitor, SUCCESS_STATUSES, is_success};
pub use orchestrator::{
    CHANGE_SET_FAILED_STATUS, DeployOutcome, DeployResult, DeploymentOrchestrator, PlanResult,
    SUBMITTED_STATUS, generate_client_token,
};
pub use outputs::OutputExtractor;
pub use poll::{
    Cancellation, DEFAULT_CHANGE_SET_INTERVAL, DEFAULT_STACK_INTERVAL, PollSettings, Poller,
};
pub use progress::{NullProgress, ProgressEvent, ProgressSink, TracingProgress};
