//! Mock configuration and configuration file loading.
//!
//! The mock configuration tells the package generator how to fake each
//! dependency. mockroot itself only routes the right section to the right
//! generator call; the meaning of `options` belongs to the generator.
//!
//! ```toml
//! [mocks."example.com/db"]
//! interfaces = true
//! passthrough = ["Open"]
//!
//! [mocks."example.com/db".options]
//! strict = true
//! ```

use crate::error::{Error, Result};
use crate::identity::DependencyId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-run mock configuration, keyed by dependency identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    /// Settings applied when a dependency has no entry of its own.
    #[serde(default)]
    pub defaults: PackageMockConfig,

    /// Per-dependency settings.
    #[serde(default)]
    pub mocks: BTreeMap<DependencyId, PackageMockConfig>,
}

/// How a single dependency should be mocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageMockConfig {
    /// Whether exported interfaces get generated stand-ins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<bool>,

    /// Symbols that call through to the real implementation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough: Vec<String>,

    /// Generator-specific settings, passed along verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl MockConfig {
    /// Load a mock configuration file (`.toml`, `.json`, `.yaml`/`.yml`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        load_file(path)
    }

    /// The effective settings for `id`: its own entry layered over the
    /// defaults.
    #[must_use]
    pub fn for_dependency(&self, id: &DependencyId) -> PackageMockConfig {
        match self.mocks.get(id) {
            Some(own) => self.defaults.overlay(own),
            None => self.defaults.clone(),
        }
    }
}

impl PackageMockConfig {
    fn overlay(&self, own: &Self) -> Self {
        let mut options = self.options.clone();
        options.extend(own.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            interfaces: own.interfaces.or(self.interfaces),
            passthrough: if own.passthrough.is_empty() {
                self.passthrough.clone()
            } else {
                own.passthrough.clone()
            },
            options,
        }
    }
}

/// Configuration file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
    Yaml,
}

impl Format {
    fn for_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            other => Err(Error::config(
                path,
                format!(
                    "unsupported file extension {}",
                    other.map_or_else(|| "(none)".to_string(), |e| format!("'.{e}'"))
                ),
            )),
        }
    }
}

/// Read and deserialize a configuration file, picking the format from the
/// file extension.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
/// if it cannot be parsed.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = Format::for_path(path)?;
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::io(e, path, "read configuration file"))?;

    let parsed = match format {
        Format::Toml => toml::from_str(&contents).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| Error::config(path, message))
}
