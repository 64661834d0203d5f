// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # cfn-deploy
//!
//! Safe, inspectable deployments of AWS `CloudFormation` templates using change sets.
//!
//! ## Overview
//!
//! A deploy is a two-phase protocol:
//!
//! 1. **Propose**: create a change set for the stack (`CREATE` if the stack does
//!    not exist yet, `UPDATE` otherwise) and wait for the service to compute it
//! 2. **Apply**: list the proposed changes, execute the change set and follow
//!    the stack's events until it reaches a terminal status
//!
//! Re-deploying an unchanged template is a no-op: the empty change set is
//! deleted and the stack's current outputs are returned. Change set creation
//! and execution share one idempotency token, so a re-run with the same token
//! resumes an interrupted deploy instead of repeating it.
//!
//! ## Modules
//!
//! - [`config`]: Deploy options, deploy files and AWS settings
//! - [`template`]: Template sources
//! - [`cloudformation`]: `CloudFormation` API trait, domain types and SDK client
//! - [`deploy`]: The deploy state machine and its parts
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # cfn-deploy.yaml
//! name: my-app-prod
//! template: infra/stack.yaml
//! parameters:
//!   Environment: prod
//!   InstanceCount: 2
//! timeout_secs: 1800
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod cloudformation;
pub mod config;
pub mod deploy;
pub mod error;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, ConsoleProgress, OutputFormatter};
pub use cloudformation::{CloudFormationApi, CloudFormationClient};
pub use config::{AwsSettings, ConfigParser, DeployOptions, OptionsValidator};
pub use deploy::{
    Cancellation, ChangeSetManager, DeployOutcome, DeployResult, DeploymentMonitor,
    DeploymentOrchestrator, OutputExtractor, PollSettings, ProgressEvent, ProgressSink,
    StackLookup,
};
pub use error::{CfnDeployError, Result};
pub use template::{FileTemplateSource, TemplateSource};
