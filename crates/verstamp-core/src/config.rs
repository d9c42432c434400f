use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use verstamp_manifest::{MANIFEST_FILE_NAME, VERSION_KEY};

use crate::resolver::{Extraction, VersionResolver, DEFAULT_VERSION};

/// Root configuration structure deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub manifest: ManifestSettings,
    pub release: ReleaseSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSettings {
    pub resource_root: PathBuf,
    pub file_name: String,
    pub field: String,
    pub default_version: String,
    pub extraction: Extraction,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::from("src/main/resources"),
            file_name: MANIFEST_FILE_NAME.into(),
            field: VERSION_KEY.into(),
            default_version: DEFAULT_VERSION.into(),
            extraction: Extraction::Pattern,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseSettings {
    pub artifact: String,
    pub releases_url: Option<String>,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            artifact: "JemAnnouncements".into(),
            releases_url: Some("https://github.com/Jemsire/JemAnnouncements/releases".into()),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let expanded = interpolate_env(raw);
        Ok(toml::from_str::<Config>(&expanded)?)
    }

    /// Validates structural invariants and provides actionable error messages.
    pub fn validate(&self) -> Result<()> {
        let manifest = &self.manifest;
        if manifest.file_name.trim().is_empty() {
            bail!("manifest.file_name must not be empty");
        }
        if manifest.field.trim().is_empty() {
            bail!("manifest.field must not be empty");
        }
        if manifest.default_version.trim().is_empty() {
            bail!("manifest.default_version must not be empty");
        }
        if self.release.artifact.trim().is_empty() {
            bail!("release.artifact must not be empty");
        }
        Ok(())
    }

    /// `<resource-root>/<file-name>`, anchored at `base_dir` when relative.
    pub fn manifest_path(&self, base_dir: &Path) -> PathBuf {
        let root = if self.manifest.resource_root.is_absolute() {
            self.manifest.resource_root.clone()
        } else {
            base_dir.join(&self.manifest.resource_root)
        };
        root.join(&self.manifest.file_name)
    }

    pub fn resolver(&self) -> Result<VersionResolver> {
        self.validate()?;
        let manifest = &self.manifest;
        Ok(VersionResolver::new(
            &manifest.field,
            &manifest.default_version,
            manifest.extraction,
        )?)
    }
}

/// Expands `${NAME}` and `${NAME:default}` references from the environment.
pub fn interpolate_env(input: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| Regex::new(r"\$\{([A-Z0-9_]+)(?::([^}]+))?\}").unwrap());
    let result = regex.replace_all(input, |caps: &regex::Captures| {
        let key = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(key).unwrap_or_else(|_| default.to_string())
    });
    result.into_owned()
}
