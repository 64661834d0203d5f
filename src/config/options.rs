//! Deployment options.
//!
//! This module defines the options a deploy is driven by. Options may come
//! from a `cfn-deploy.yaml` file, environment overrides, and command-line
//! flags; they are checked by [`super::OptionsValidator`] before use.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Change set description used when none is configured.
pub const DEFAULT_DESCRIPTION: &str = "Stack Updates.";

/// Options for a single deploy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeployOptions {
    /// Stack name.
    #[serde(default)]
    pub name: Option<String>,
    /// Path to the template file.
    #[serde(default, alias = "template")]
    pub template_path: Option<PathBuf>,
    /// Template parameters.
    #[serde(default, deserialize_with = "parameter_map")]
    pub parameters: BTreeMap<String, String>,
    /// Change set description.
    #[serde(default = "default_description")]
    pub description: String,
    /// Idempotency token shared by change set creation and execution.
    #[serde(default)]
    pub client_token: Option<String>,
    /// Whether to wait for the stack to converge after execution.
    #[serde(default = "default_wait_for_stack")]
    pub wait_for_stack: bool,
    /// Upper bound on each wait, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Options that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOptions {
    /// Stack name.
    pub stack_name: String,
    /// Path to the template file.
    pub template_path: PathBuf,
    /// Template parameters.
    pub parameters: BTreeMap<String, String>,
    /// Change set description.
    pub description: String,
    /// Caller-supplied idempotency token.
    pub client_token: Option<String>,
    /// Whether to wait for the stack to converge.
    pub wait_for_stack: bool,
    /// Upper bound on each wait.
    pub timeout: Option<Duration>,
    /// Non-fatal issues found during validation.
    pub warnings: Vec<String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            name: None,
            template_path: None,
            parameters: BTreeMap::new(),
            description: default_description(),
            client_token: None,
            wait_for_stack: default_wait_for_stack(),
            timeout_secs: None,
        }
    }
}

impl DeployOptions {
    /// Creates options for a stack and template.
    #[must_use]
    pub fn new(name: impl Into<String>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            template_path: Some(template_path.into()),
            ..Self::default()
        }
    }

    /// Adds a template parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Sets the change set description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the idempotency token.
    #[must_use]
    pub fn with_client_token(mut self, token: impl Into<String>) -> Self {
        self.client_token = Some(token.into());
        self
    }

    /// Sets whether to wait for the stack to converge.
    #[must_use]
    pub const fn with_wait_for_stack(mut self, wait: bool) -> Self {
        self.wait_for_stack = wait;
        self
    }

    /// Sets the wait timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Overlays every value set in `other` onto these options.
    ///
    /// Parameters are merged key by key; `other` wins on conflicts.
    #[must_use]
    pub fn merge(mut self, other: OptionOverrides) -> Self {
        if let Some(name) = other.name {
            self.name = Some(name);
        }
        if let Some(path) = other.template_path {
            self.template_path = Some(path);
        }
        self.parameters.extend(other.parameters);
        if let Some(description) = other.description {
            self.description = description;
        }
        if let Some(token) = other.client_token {
            self.client_token = Some(token);
        }
        if let Some(wait) = other.wait_for_stack {
            self.wait_for_stack = wait;
        }
        if let Some(secs) = other.timeout_secs {
            self.timeout_secs = Some(secs);
        }
        self
    }
}

/// Values that override file-based options, e.g. from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    /// Stack name.
    pub name: Option<String>,
    /// Template path.
    pub template_path: Option<PathBuf>,
    /// Parameters to add or replace.
    pub parameters: BTreeMap<String, String>,
    /// Change set description.
    pub description: Option<String>,
    /// Idempotency token.
    pub client_token: Option<String>,
    /// Whether to wait for convergence.
    pub wait_for_stack: Option<bool>,
    /// Wait timeout in seconds.
    pub timeout_secs: Option<u64>,
}

fn default_description() -> String {
    String::from(DEFAULT_DESCRIPTION)
}

const fn default_wait_for_stack() -> bool {
    true
}

/// A scalar parameter value as written in YAML or JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarValue {
    /// Returns the value as sent to the service.
    ///
    /// Floats are refused: their written form (`1.10`, `2.0`) is lost once
    /// parsed, so they must be quoted.
    fn into_parameter(self, key: &str) -> Result<String, String> {
        match self {
            Self::Text(s) => Ok(s),
            Self::Integer(i) => Ok(i.to_string()),
            Self::Bool(b) => Ok(b.to_string()),
            Self::Float(f) => Err(format!(
                "parameter '{key}' has numeric value {f}; quote it to keep its exact text"
            )),
        }
    }
}

/// Deserializes a parameter map, stringifying scalar values.
pub(crate) fn parameter_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, ScalarValue>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(k, v)| {
            let value = v.into_parameter(&k).map_err(<D::Error as serde::de::Error>::custom)?;
            Ok((k, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DeployOptions::default();
        assert_eq!(options.description, DEFAULT_DESCRIPTION);
        assert!(options.wait_for_stack);
        assert!(options.name.is_none());
    }

    #[test]
    fn test_merge_overrides() {
        let base = DeployOptions::new("app", "stack.yaml")
            .with_parameter("Env", "dev")
            .with_parameter("Size", "small");

        let merged = base.merge(OptionOverrides {
            name: Some(String::from("app-prod")),
            parameters: BTreeMap::from([(String::from("Env"), String::from("prod"))]),
            wait_for_stack: Some(false),
            ..OptionOverrides::default()
        });

        assert_eq!(merged.name.as_deref(), Some("app-prod"));
        assert_eq!(merged.parameters.get("Env").map(String::as_str), Some("prod"));
        assert_eq!(merged.parameters.get("Size").map(String::as_str), Some("small"));
        assert!(!merged.wait_for_stack);
        assert_eq!(merged.template_path, Some(PathBuf::from("stack.yaml")));
    }

    #[test]
    fn test_scalar_parameters_are_stringified() {
        let yaml = r"
name: app
template: stack.yaml
parameters:
  Port: 8080
  Enabled: true
  Version: '1.10'
  Env: prod
";
        let options: DeployOptions = serde_yaml::from_str(yaml).expect("valid yaml");
        assert_eq!(options.parameters["Port"], "8080");
        assert_eq!(options.parameters["Enabled"], "true");
        assert_eq!(options.parameters["Version"], "1.10");
        assert_eq!(options.parameters["Env"], "prod");
    }

    #[test]
    fn test_unquoted_float_parameter_rejected() {
        let yaml = r"
name: app
template: stack.yaml
parameters:
  Version: 1.10
";
        let err = serde_yaml::from_str::<DeployOptions>(yaml).unwrap_err();
        assert!(err.to_string().contains("Version"));
        assert!(err.to_string().contains("quote"));

        let whole = serde_yaml::from_str::<DeployOptions>("parameters:\n  Whole: 2.0\n");
        assert!(whole.is_err());
    }
}
