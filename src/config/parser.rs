//! Loading of deploy files, parameter files and environment overrides.
//!
//! Precedence, lowest first: deploy file, `CFN_DEPLOY_*` environment
//! variables, command-line flags (applied by the caller via
//! [`DeployOptions::merge`]).

use crate::error::{CfnDeployError, ConfigError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::options::{DeployOptions, parameter_map};

/// Deploy file names searched for, in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["cfn-deploy.yaml", "cfn-deploy.yml", "deploy.yaml"];

/// Environment variable overriding the stack name.
pub const ENV_STACK_NAME: &str = "CFN_DEPLOY_STACK_NAME";

/// Environment variable overriding the template path.
pub const ENV_TEMPLATE: &str = "CFN_DEPLOY_TEMPLATE";

/// Environment variable overriding the change set description.
pub const ENV_DESCRIPTION: &str = "CFN_DEPLOY_DESCRIPTION";

/// Parser for deploy options.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

/// A parameters file: either a plain map or the service's own record list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterFile {
    Map(#[serde(deserialize_with = "parameter_map")] BTreeMap<String, String>),
    Records(Vec<ParameterRecord>),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterRecord {
    parameter_key: String,
    parameter_value: String,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads options from a YAML deploy file.
    ///
    /// A relative `template_path` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployOptions> {
        let path = path.as_ref();
        info!("Loading deploy options from: {}", path.display());

        let content = read_file(path)?;
        let mut options = self.parse_yaml(&content, Some(path))?;

        if let Some(template) = options.template_path.as_mut()
            && template.is_relative()
            && let Some(dir) = path.parent()
        {
            *template = dir.join(&*template);
        }

        Ok(options)
    }

    /// Parses options from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployOptions> {
        debug!("Parsing deploy options");

        let options: DeployOptions = serde_yaml::from_str(content).map_err(|e| {
            CfnDeployError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        if let Some(name) = &options.name {
            debug!("Parsed deploy options for stack: {name}");
        }
        Ok(options)
    }

    /// Loads template parameters from a YAML or JSON file.
    ///
    /// Accepts a `Key: value` map, or a list of
    /// `{"ParameterKey": .., "ParameterValue": ..}` records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has neither shape.
    pub fn load_parameters_file(&self, path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
        let path = path.as_ref();
        debug!("Loading parameters from: {}", path.display());

        let content = read_file(path)?;
        let file: ParameterFile = serde_yaml::from_str(&content).map_err(|e| {
            CfnDeployError::Config(ConfigError::ParseError {
                message: format!("Parameters must be a map or a list of ParameterKey/ParameterValue records: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        Ok(match file {
            ParameterFile::Map(map) => map,
            ParameterFile::Records(records) => records
                .into_iter()
                .map(|r| (r.parameter_key, r.parameter_value))
                .collect(),
        })
    }

    /// Applies `CFN_DEPLOY_*` overrides from the process environment.
    pub fn apply_env_overrides(options: &mut DeployOptions) {
        Self::apply_overrides_from(options, |name| std::env::var(name).ok());
    }

    /// Applies `CFN_DEPLOY_*` overrides read through `lookup`.
    pub fn apply_overrides_from<F>(options: &mut DeployOptions, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_STACK_NAME) {
            debug!("Overriding name from environment");
            options.name = Some(name);
        }

        if let Some(template) = lookup(ENV_TEMPLATE) {
            debug!("Overriding template_path from environment");
            options.template_path = Some(PathBuf::from(template));
        }

        if let Some(description) = lookup(ENV_DESCRIPTION) {
            debug!("Overriding description from environment");
            options.description = description;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                CfnDeployError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Parses a `KEY=VALUE` parameter assignment.
///
/// Only the first `=` splits; the value may itself contain `=`.
///
/// # Errors
///
/// Returns an error if there is no `=` or the key is empty.
pub fn parse_parameter_assignment(assignment: &str) -> Result<(String, String)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::validation(
            format!("Parameter '{assignment}' must be written as KEY=VALUE"),
            "parameters",
        )
        .into()),
    }
}

/// Finds a deploy file in the start directory or its parents.
///
/// # Errors
///
/// Returns an error if no deploy file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found deploy file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(CfnDeployError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CfnDeployError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    std::fs::read_to_string(path).map_err(|e| {
        CfnDeployError::Config(ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}
