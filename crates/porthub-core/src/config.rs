//! Registry configuration loaded from TOML.
//!
//! ```toml
//! extension_scheme = "chrome-extension"
//! manifest = "dist/manifest.json"
//!
//! [[pages]]
//! context = "popup"
//! file = "popup.html"
//! ```
//!
//! Explicit `pages` come first in tie-break order; the manifest (or the
//! built-in defaults) fills in every context not listed.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::classifier::{DEFAULT_EXTENSION_SCHEME, LocationClassifier, PageDescriptors};
use crate::error::ConfigError;
use crate::types::Context;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub extension_scheme: Option<String>,
    /// Host manifest to derive page descriptors from.
    pub manifest: Option<PathBuf>,
    pub pages: Vec<PageEntry>,
}

/// Explicit descriptor. `context` uses the kebab-case labels; an unknown
/// label fails at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageEntry {
    pub context: Context,
    pub file: String,
}

impl RegistryConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a config file. A relative `manifest` path is resolved against
    /// the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        let base = path.parent().unwrap_or(Path::new(""));
        config.manifest = config
            .manifest
            .map(|m| if m.is_relative() { base.join(m) } else { m });
        tracing::debug!(path = %path.display(), pages = config.pages.len(), "loaded registry config");
        Ok(config)
    }

    pub fn extension_scheme(&self) -> &str {
        self.extension_scheme
            .as_deref()
            .unwrap_or(DEFAULT_EXTENSION_SCHEME)
    }

    /// Resolve the descriptor table: explicit pages, then manifest/defaults.
    pub fn descriptors(&self) -> Result<PageDescriptors, ConfigError> {
        let base = match &self.manifest {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let manifest: serde_json::Value = serde_json::from_str(&raw)?;
                PageDescriptors::from_manifest(&manifest)
            }
            None => PageDescriptors::default(),
        };

        let mut explicit = PageDescriptors::empty();
        for page in &self.pages {
            explicit.push(page.context, &page.file);
        }

        Ok(base.overlay(&explicit))
    }

    pub fn classifier(&self) -> Result<LocationClassifier, ConfigError> {
        Ok(LocationClassifier::new(
            self.descriptors()?,
            self.extension_scheme(),
        ))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
