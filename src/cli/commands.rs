//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{OptionOverrides, parse_parameter_assignment};
use crate::error::Result;

/// cfn-deploy - Change set based `CloudFormation` deployments.
#[derive(Parser, Debug)]
#[command(name = "cfn-deploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the deploy file.
    #[arg(short, long, global = true, env = "CFN_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// AWS region (falls back to `AWS_REGION`, `AMAZON_REGION`, `AWS_DEFAULT_REGION`).
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// AWS access key id (falls back to `AWS_ACCESS_KEY_ID`, `ACCESS_KEY`).
    #[arg(long, global = true)]
    pub access_key_id: Option<String>,

    /// AWS secret access key (falls back to `AWS_SECRET_ACCESS_KEY`, `SECRET_KEY`).
    #[arg(long, global = true)]
    pub secret_access_key: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a change set, execute it and wait for the stack.
    Deploy {
        /// Stack and template options.
        #[command(flatten)]
        stack: StackArgs,

        /// Return as soon as execution has started.
        #[arg(long)]
        no_wait: bool,
    },

    /// Create a change set, show its changes and delete it.
    Plan {
        /// Stack and template options.
        #[command(flatten)]
        stack: StackArgs,
    },

    /// Validate a template with the service.
    Validate {
        /// Template path (defaults to the deploy file's template).
        #[arg(short, long)]
        template: Option<PathBuf>,
    },

    /// Show the current outputs of a stack.
    Outputs {
        /// Stack name (defaults to the deploy file's name).
        #[arg(short, long)]
        name: Option<String>,
    },
}

/// Options shared by `deploy` and `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct StackArgs {
    /// Stack name.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Template path.
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Template parameter as KEY=VALUE (repeatable).
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// YAML or JSON file of template parameters.
    #[arg(long)]
    pub parameters_file: Option<PathBuf>,

    /// Change set description.
    #[arg(long, env = "BUILD_TAG")]
    pub description: Option<String>,

    /// Idempotency token shared by change set creation and execution.
    #[arg(long, env = "BUILD_NUMBER")]
    pub client_token: Option<String>,

    /// Upper bound on each wait, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl StackArgs {
    /// Converts the flags into option overrides.
    ///
    /// `--param` values win over `file_parameters`.
    ///
    /// # Errors
    ///
    /// Returns an error if a `--param` is not `KEY=VALUE`.
    pub fn overrides(
        &self,
        file_parameters: BTreeMap<String, String>,
    ) -> Result<OptionOverrides> {
        let mut parameters = file_parameters;
        for assignment in &self.params {
            let (key, value) = parse_parameter_assignment(assignment)?;
            parameters.insert(key, value);
        }

        Ok(OptionOverrides {
            name: self.name.clone(),
            template_path: self.template.clone(),
            parameters,
            description: self.description.clone(),
            client_token: self.client_token.clone(),
            wait_for_stack: None,
            timeout_secs: self.timeout,
        })
    }
}
