//! Configuration module for cfn-deploy.
//!
//! This module handles all configuration-related functionality:
//! - Deploy options and their YAML representation
//! - Loading deploy files, parameter files and environment overrides
//! - Validation of options before any request is sent
//! - AWS region and credential resolution

mod aws;
mod options;
mod parser;
mod validator;

pub use aws::{ACCESS_KEY_VARS, AwsSettings, REGION_VARS, SECRET_KEY_VARS, StaticCredentials};
pub use options::{DEFAULT_DESCRIPTION, DeployOptions, OptionOverrides, ValidatedOptions};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_DESCRIPTION, ENV_STACK_NAME, ENV_TEMPLATE,
    find_config_file, parse_parameter_assignment,
};
pub use validator::{MAX_TEMPLATE_BODY_BYTES, OptionsValidator};
