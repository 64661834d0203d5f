//! Validation for deployment options.
//!
//! This module checks options against the service's naming rules before any
//! request is sent, so operator mistakes fail fast.

use crate::error::{ConfigError, Result};
use std::time::Duration;
use tracing::{debug, warn};

use super::options::{DeployOptions, ValidatedOptions};

/// Longest stack name the service accepts.
const MAX_STACK_NAME_LEN: usize = 128;

/// Longest token that still fits in a `ChangeSet-<token>` name.
const MAX_CLIENT_TOKEN_LEN: usize = 118;

/// Largest template body the service accepts inline.
pub const MAX_TEMPLATE_BODY_BYTES: usize = 51_200;

/// Validator for deployment options.
#[derive(Debug, Default)]
pub struct OptionsValidator;

/// A single validation error.
#[derive(Debug)]
struct ValidationError {
    field: &'static str,
    message: String,
}

impl OptionsValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates deployment options.
    ///
    /// # Errors
    ///
    /// Returns an error for the first missing or invalid option.
    pub fn validate(&self, options: &DeployOptions) -> Result<ValidatedOptions> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let stack_name = match options.name.as_deref().map(str::trim) {
            None | Some("") => return Err(ConfigError::missing("name").into()),
            Some(name) => name.to_string(),
        };

        let template_path = match &options.template_path {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => return Err(ConfigError::missing("template_path").into()),
        };

        Self::validate_stack_name(&stack_name, &mut errors);
        Self::validate_parameters(options, &mut errors, &mut warnings);
        Self::validate_client_token(options.client_token.as_deref(), &mut errors, &mut warnings);

        if options.timeout_secs == Some(0) {
            errors.push(ValidationError {
                field: "timeout_secs",
                message: String::from("Timeout must be at least one second"),
            });
        }

        if let Some(first) = errors.into_iter().next() {
            return Err(ConfigError::validation(first.message, first.field).into());
        }

        for warning in &warnings {
            warn!("{warning}");
        }
        debug!("Deploy options for stack {stack_name} are valid");

        Ok(ValidatedOptions {
            stack_name,
            template_path,
            parameters: options.parameters.clone(),
            description: options.description.clone(),
            client_token: options.client_token.clone(),
            wait_for_stack: options.wait_for_stack,
            timeout: options.timeout_secs.map(Duration::from_secs),
            warnings,
        })
    }

    /// Checks that a template body can be sent inline.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is empty or too large.
    pub fn validate_template_body(&self, body: &str) -> Result<()> {
        if body.trim().is_empty() {
            return Err(ConfigError::validation("Template is empty", "template_path").into());
        }

        if body.len() > MAX_TEMPLATE_BODY_BYTES {
            return Err(ConfigError::validation(
                format!(
                    "Template is {} bytes; inline templates are limited to {MAX_TEMPLATE_BODY_BYTES} bytes",
                    body.len()
                ),
                "template_path",
            )
            .into());
        }

        Ok(())
    }

    fn validate_stack_name(name: &str, errors: &mut Vec<ValidationError>) {
        if name.len() > MAX_STACK_NAME_LEN {
            errors.push(ValidationError {
                field: "name",
                message: format!("Stack name must be at most {MAX_STACK_NAME_LEN} characters"),
            });
        }

        if !is_valid_stack_name(name) {
            errors.push(ValidationError {
                field: "name",
                message: format!(
                    "Stack name '{name}' is invalid. Must start with a letter and contain only letters, digits and hyphens."
                ),
            });
        }
    }

    fn validate_parameters(
        options: &DeployOptions,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<String>,
    ) {
        for (key, value) in &options.parameters {
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
                errors.push(ValidationError {
                    field: "parameters",
                    message: format!("Parameter key '{key}' must be alphanumeric"),
                });
            }

            if value.is_empty() {
                warnings.push(format!("parameters.{key}: empty value"));
            }
        }
    }

    fn validate_client_token(
        token: Option<&str>,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<String>,
    ) {
        let Some(token) = token else {
            warnings.push(String::from(
                "No client token supplied; a random token will be used and a re-run will not resume this deploy",
            ));
            return;
        };

        if token.len() > MAX_CLIENT_TOKEN_LEN {
            errors.push(ValidationError {
                field: "client_token",
                message: format!("Client token must be at most {MAX_CLIENT_TOKEN_LEN} characters"),
            });
        }

        if !is_valid_client_token(token) {
            errors.push(ValidationError {
                field: "client_token",
                message: format!(
                    "Client token '{token}' is invalid. Must start with a letter or digit and contain only letters, digits and hyphens."
                ),
            });
        }
    }
}

/// Checks `[A-Za-z][-A-Za-z0-9]*`.
fn is_valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Checks `[A-Za-z0-9][-A-Za-z0-9]*`.
fn is_valid_client_token(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}
