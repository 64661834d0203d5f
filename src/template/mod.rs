//! Template sources.
//!
//! The deployment core reads template bodies through [`TemplateSource`], so
//! tests can serve templates from memory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{Result, TemplateError};

/// Provider of template bodies.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Checks whether a template exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Reads the template at `path`.
    async fn read(&self, path: &Path) -> Result<String>;
}

/// Reads templates from the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct FileTemplateSource {
    /// Directory relative paths are resolved against.
    base_dir: Option<PathBuf>,
}

impl FileTemplateSource {
    /// Creates a source that resolves paths against the working directory.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Creates a source that resolves relative paths against `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl TemplateSource for FileTemplateSource {
    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(self.resolve(path))
            .await
            .is_ok_and(|m| m.is_file())
    }

    async fn read(&self, path: &Path) -> Result<String> {
        let resolved = self.resolve(path);
        debug!("Reading template from: {}", resolved.display());

        fs::read_to_string(&resolved).await.map_err(|e| {
            let err = if e.kind() == std::io::ErrorKind::NotFound {
                TemplateError::NotFound { path: resolved }
            } else {
                TemplateError::Unreadable {
                    path: resolved,
                    message: e.to_string(),
                }
            };
            err.into()
        })
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::HashMap;

    /// Serves templates from memory.
    #[derive(Debug, Default)]
    pub struct MemoryTemplateSource {
        templates: HashMap<PathBuf, String>,
    }

    impl MemoryTemplateSource {
        pub fn with_template(mut self, path: &str, body: &str) -> Self {
            self.templates.insert(PathBuf::from(path), body.to_string());
            self
        }
    }

    #[async_trait]
    impl TemplateSource for MemoryTemplateSource {
        async fn exists(&self, path: &Path) -> bool {
            self.templates.contains_key(path)
        }

        async fn read(&self, path: &Path) -> Result<String> {
            self.templates.get(path).cloned().ok_or_else(|| {
                TemplateError::NotFound {
                    path: path.to_path_buf(),
                }
                .into()
            })
        }
    }
}
