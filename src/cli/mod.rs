//! CLI module for cfn-deploy.
//!
//! This module provides the command-line interface for deploying,
//! planning and inspecting `CloudFormation` stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat, StackArgs};
pub use output::{ConsoleProgress, OutputFormatter};
