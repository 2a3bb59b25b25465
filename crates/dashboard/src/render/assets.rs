//! Raw template and script content, addressed by file name.
//!
//! The composer only needs `string(name)`. [`MemoryAssets`] loads a
//! directory once at startup so the request path never touches the disk.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::info;

/// Errors from an asset lookup.
#[derive(Debug, Error)]
pub enum AssetError {
    /// No asset is stored under the requested name.
    #[error("asset not found: {0}")]
    NotFound(String),
}

/// Named text assets.
#[cfg_attr(test, mockall::automock)]
pub trait AssetStore: Send + Sync {
    /// Contents of the asset stored as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::NotFound`] if `name` is unknown.
    fn string(&self, name: &str) -> Result<String, AssetError>;
}

/// In-memory asset box keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, String>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset, returning the box for chaining.
    pub fn with(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    /// Load every regular file directly inside `dir`, keyed by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or one of its files cannot be read,
    /// or a file is not valid UTF-8.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files = HashMap::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read asset directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read asset {}", path.display()))?;
            files.insert(name.to_owned(), content);
        }
        info!(dir = %dir.display(), count = files.len(), "assets loaded");
        Ok(Self { files })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetStore for MemoryAssets {
    fn string(&self, name: &str) -> Result<String, AssetError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_owned()))
    }
}
