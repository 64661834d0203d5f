//! cfn-deploy CLI entrypoint.
//!
//! This is the main entrypoint for the cfn-deploy command-line tool.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cfn_deploy::cli::{Cli, Commands, ConsoleProgress, LogFormat, OutputFormat, OutputFormatter, StackArgs};
use cfn_deploy::cloudformation::CloudFormationClient;
use cfn_deploy::config::{AwsSettings, ConfigParser, DeployOptions, find_config_file};
use cfn_deploy::deploy::{
    Cancellation, CreationOutcome, DeploymentOrchestrator, ProgressSink, TracingProgress,
};
use cfn_deploy::error::{ConfigError, Result};
use cfn_deploy::template::FileTemplateSource;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so stdout only carries command results.
fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

/// Main async entry point.
///
/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let Cli {
        config,
        output,
        region,
        access_key_id,
        secret_access_key,
        command,
        ..
    } = cli;

    let formatter = OutputFormatter::new(output);
    let (parser, options) = load_options(config.as_ref())?;

    let settings = AwsSettings::from_env(
        region.as_deref(),
        access_key_id.as_deref(),
        secret_access_key.as_deref(),
    )?;
    let client = CloudFormationClient::new(&settings).await;
    let templates = FileTemplateSource::new();

    let console = ConsoleProgress::new();
    let progress: &dyn ProgressSink = match output {
        OutputFormat::Text => &console,
        OutputFormat::Json => &TracingProgress,
    };

    let orchestrator = DeploymentOrchestrator::new(&client, &templates, progress)
        .with_cancellation(cancel_on_ctrl_c());

    match command {
        Commands::Deploy { stack, no_wait } => {
            let wait = no_wait.then_some(false);
            let options = merge_stack_args(&parser, options, &stack, wait)?;

            let result = orchestrator.deploy(&options).await?;
            write_stdout(&formatter.format_deploy_result(&result))?;
            Ok(result.success)
        }
        Commands::Plan { stack } => {
            let options = merge_stack_args(&parser, options, &stack, None)?;

            let plan = orchestrator.plan(&options).await?;
            write_stdout(&formatter.format_plan(&plan))?;
            Ok(!matches!(plan.outcome, CreationOutcome::Failed { .. }))
        }
        Commands::Validate { template } => {
            let path = template
                .or(options.template_path)
                .ok_or_else(|| ConfigError::missing("template_path"))?;

            orchestrator.validate_template(&path).await?;
            Ok(true)
        }
        Commands::Outputs { name } => {
            let name = name.or(options.name).ok_or_else(|| ConfigError::missing("name"))?;

            let outputs = orchestrator.stack_outputs(&name).await?;
            write_stdout(&formatter.format_outputs(outputs.as_ref()))?;
            Ok(true)
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the deploy file (if any), `.env` and environment overrides.
fn load_options(config_path: Option<&PathBuf>) -> Result<(ConfigParser, DeployOptions)> {
    let config_file = match config_path {
        Some(path) => Some(path.clone()),
        None => find_config_file(std::env::current_dir()?).ok(),
    };

    let parser = ConfigParser::new().with_base_path(
        config_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;

    let mut options = match &config_file {
        Some(path) => parser.load_file(path)?,
        None => {
            debug!("No deploy file found; using command-line options only");
            DeployOptions::default()
        }
    };
    ConfigParser::apply_env_overrides(&mut options);

    Ok((parser, options))
}

/// Applies `deploy`/`plan` flags on top of file options.
fn merge_stack_args(
    parser: &ConfigParser,
    options: DeployOptions,
    stack: &StackArgs,
    wait_for_stack: Option<bool>,
) -> Result<DeployOptions> {
    let file_parameters = match &stack.parameters_file {
        Some(path) => parser.load_parameters_file(path)?,
        None => BTreeMap::new(),
    };

    let mut overrides = stack.overrides(file_parameters)?;
    overrides.wait_for_stack = wait_for_stack;
    Ok(options.merge(overrides))
}

/// Returns a flag raised on the first Ctrl-C.
fn cancel_on_ctrl_c() -> Cancellation {
    let cancellation = Cancellation::new();
    let handle = cancellation.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current request");
            handle.cancel();
        }
    });

    cancellation
}

/// Writes a command result to stdout.
fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
