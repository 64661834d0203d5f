//! Error types for the cfn-deploy system.
//!
//! Operator mistakes (bad options, missing template) abort a deploy before any
//! change is proposed. Failures of the stack itself are not errors: they are
//! reported through [`crate::deploy::DeployResult`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the cfn-deploy system.
#[derive(Debug, Error)]
pub enum CfnDeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template source errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// `CloudFormation` API errors.
    #[error("CloudFormation API error: {0}")]
    CloudFormation(#[from] CloudFormationError),

    /// Deployment flow errors.
    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required option was not supplied.
    #[error("Missing required option: {field}")]
    MissingField {
        /// Name of the missing option.
        field: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Template source errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template path does not resolve to a file.
    #[error("Template file does not exist: {path}")]
    NotFound {
        /// Path to the missing template.
        path: PathBuf,
    },

    /// The template exists but could not be read.
    #[error("Failed to read template {path}: {message}")]
    Unreadable {
        /// Path to the template.
        path: PathBuf,
        /// Underlying read failure.
        message: String,
    },

    /// The service rejected the template.
    #[error("Template is invalid: {message}")]
    Invalid {
        /// Validation message from the service.
        message: String,
    },
}

/// `CloudFormation` API errors.
#[derive(Debug, Error)]
pub enum CloudFormationError {
    /// The service returned an error response.
    #[error("{operation} failed: {message}")]
    ServiceError {
        /// API operation that failed.
        operation: String,
        /// Service error code, when present.
        code: Option<String>,
        /// Error message.
        message: String,
    },

    /// The response did not contain a required field.
    #[error("Invalid response from {operation}: {message}")]
    InvalidResponse {
        /// API operation that returned the response.
        operation: String,
        /// Description of the response issue.
        message: String,
    },
}

/// Deployment flow errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The stack disappeared while it was being monitored.
    #[error("Stack not found: {stack_name}")]
    StackNotFound {
        /// Name of the missing stack.
        stack_name: String,
    },

    /// A poll loop ran past its deadline.
    #[error("Timed out after {waited_secs}s waiting for {waiting_for}")]
    Timeout {
        /// What the poll loop was waiting for.
        waiting_for: String,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },

    /// A poll loop observed the cancellation flag.
    #[error("Cancelled while waiting for {waiting_for}")]
    Cancelled {
        /// What the poll loop was waiting for.
        waiting_for: String,
    },
}

/// Result type alias for cfn-deploy operations.
pub type Result<T> = std::result::Result<T, CfnDeployError>;

impl CfnDeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error was raised before anything was sent to the service.
    #[must_use]
    pub const fn is_operator_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Template(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing-option error.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl CloudFormationError {
    /// Creates a service error for an operation.
    #[must_use]
    pub fn service(
        operation: impl Into<String>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ServiceError {
            operation: operation.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates an invalid-response error for an operation.
    #[must_use]
    pub fn invalid_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns the service error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ServiceError { code, .. } => code.as_deref(),
            Self::InvalidResponse { .. } => None,
        }
    }
}
