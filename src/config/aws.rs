//! AWS region and credential resolution.
//!
//! Values given explicitly (e.g. on the command line) win over environment
//! variables. Each setting has a list of variables checked in order.

use std::fmt;

use crate::error::{ConfigError, Result};

/// Variables checked for the region, in order.
pub const REGION_VARS: &[&str] = &["AWS_REGION", "AMAZON_REGION", "AWS_DEFAULT_REGION"];

/// Variables checked for the access key id, in order.
pub const ACCESS_KEY_VARS: &[&str] = &["AWS_ACCESS_KEY_ID", "ACCESS_KEY"];

/// Variables checked for the secret access key, in order.
pub const SECRET_KEY_VARS: &[&str] = &["AWS_SECRET_ACCESS_KEY", "SECRET_KEY"];

/// Resolved AWS connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    /// Region to deploy into.
    pub region: String,
    /// Static credentials; `None` uses the SDK's default provider chain.
    pub credentials: Option<StaticCredentials>,
}

/// A static access key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl AwsSettings {
    /// Resolves settings from explicit values and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no region is found or only half of a key pair is.
    pub fn from_env(
        region: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
    ) -> Result<Self> {
        Self::resolve(region, access_key_id, secret_access_key, |name| {
            std::env::var(name).ok()
        })
    }

    /// Resolves settings using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no region is found or only half of a key pair is.
    pub fn resolve<F>(
        region: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = first_set(region, REGION_VARS, &lookup).ok_or_else(|| {
            ConfigError::MissingEnvVar {
                name: REGION_VARS[0].to_string(),
            }
        })?;

        let access_key_id = first_set(access_key_id, ACCESS_KEY_VARS, &lookup);
        let secret_access_key = first_set(secret_access_key, SECRET_KEY_VARS, &lookup);

        let credentials = match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar {
                    name: SECRET_KEY_VARS[0].to_string(),
                }
                .into());
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar {
                    name: ACCESS_KEY_VARS[0].to_string(),
                }
                .into());
            }
        };

        Ok(Self {
            region,
            credentials,
        })
    }
}

/// Returns the explicit value, else the first non-empty variable.
fn first_set<F>(explicit: Option<&str>, vars: &[&str], lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .map(String::from)
        .into_iter()
        .chain(vars.iter().filter_map(|name| lookup(name)))
        .find(|v| !v.trim().is_empty())
}
