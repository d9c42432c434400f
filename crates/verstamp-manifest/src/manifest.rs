use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// On-disk JSON manifest bundled with each plugin artifact.
///
/// Keys are PascalCase as the host runtime writes them. Unknown keys are
/// ignored so newer manifests keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
pub struct PluginManifest {
    pub group: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<Author>,
    pub website: Option<String>,
    pub server_version: Option<String>,
    pub main: Option<String>,
    pub dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
pub struct Author {
    pub name: String,
    pub email: Option<String>,
    pub url: Option<String>,
}

impl PluginManifest {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("manifest is not a valid JSON object")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    /// Declared version exactly as written, ignoring empty values. Matches
    /// what the build resolver stamps, surrounding spaces included.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }

    pub fn semver(&self) -> Option<semver::Version> {
        self.version().and_then(|v| semver::Version::parse(v).ok())
    }

    /// `Group:Name` identifier used by the host to reference plugins.
    pub fn identifier(&self) -> Option<String> {
        match (self.group.as_deref(), self.name.as_deref()) {
            (Some(group), Some(name)) => Some(format!("{group}:{name}")),
            (None, Some(name)) => Some(name.to_string()),
            _ => None,
        }
    }

    pub fn depends_on(&self, plugin: &str) -> bool {
        self.dependencies.contains_key(plugin) || self.optional_dependencies.contains_key(plugin)
    }
}
