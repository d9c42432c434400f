use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use verstamp_manifest::VERSION_KEY;

/// Version stamped on the build when the manifest cannot supply one.
pub const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The manifest exists but could not be read. Only a missing file
    /// degrades to the default version.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid resolver settings: {0}")]
    InvalidSettings(String),
}

/// How the version field is located inside the manifest text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Extraction {
    /// Tolerant `"Key" : "value"` match anywhere in the text. Accepts
    /// near-valid JSON.
    #[default]
    Pattern,
    /// Parse the document as JSON and read the top-level string field.
    Structured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    Manifest,
    Default,
}

/// Final version string for the build. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    value: String,
    source: VersionSource,
}

impl ResolvedVersion {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> VersionSource {
        self.source
    }

    pub fn is_default(&self) -> bool {
        self.source == VersionSource::Default
    }

    /// Strict semver view of the value, when it happens to be one.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(&self.value).ok()
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone)]
pub struct VersionResolver {
    key: String,
    default_version: String,
    extraction: Extraction,
    pattern: Regex,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new(VERSION_KEY, DEFAULT_VERSION, Extraction::Pattern)
            .expect("built-in resolver settings are valid")
    }
}

impl VersionResolver {
    pub fn new(
        key: &str,
        default_version: &str,
        extraction: Extraction,
    ) -> Result<Self, ResolveError> {
        if key.trim().is_empty() {
            return Err(ResolveError::InvalidSettings(
                "version key must not be empty".into(),
            ));
        }
        if default_version.trim().is_empty() {
            return Err(ResolveError::InvalidSettings(
                "default version must not be empty".into(),
            ));
        }
        let pattern = Regex::new(&format!(r#""{}"\s*:\s*"([^"]+)""#, regex::escape(key)))
            .map_err(|err| ResolveError::InvalidSettings(err.to_string()))?;
        Ok(Self {
            key: key.to_string(),
            default_version: default_version.to_string(),
            extraction,
            pattern,
        })
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    pub fn extraction(&self) -> Extraction {
        self.extraction
    }

    /// Reads the manifest at `path` and returns the version it declares.
    ///
    /// A missing file, an empty file, malformed content or an absent field
    /// all yield the default version. Read failures other than not-found
    /// are returned as [`ResolveError::Read`].
    pub fn resolve(&self, path: &Path) -> Result<ResolvedVersion, ResolveError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "manifest not found, using default version");
                return Ok(self.fallback());
            }
            Err(source) => {
                return Err(ResolveError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        let resolved = self.resolve_content(&content);
        if resolved.is_default() {
            debug!(
                path = %path.display(),
                key = %self.key,
                "manifest has no usable version field, using default version"
            );
        }
        Ok(resolved)
    }

    /// Resolves against manifest text already in memory.
    ///
    /// Values carrying control characters are discarded: the version ends
    /// up in line-oriented outputs such as cargo build-script directives.
    pub fn resolve_content(&self, content: &str) -> ResolvedVersion {
        let extracted = self.extract(content).filter(|value| {
            let clean = !value.chars().any(char::is_control);
            if !clean {
                warn!(key = %self.key, "manifest version contains control characters, ignoring it");
            }
            clean
        });
        match extracted {
            Some(value) => {
                let resolved = ResolvedVersion {
                    value,
                    source: VersionSource::Manifest,
                };
                if resolved.semver().is_none() {
                    warn!(version = %resolved, "manifest version is not a strict semantic version");
                }
                resolved
            }
            None => self.fallback(),
        }
    }

    fn extract(&self, content: &str) -> Option<String> {
        match self.extraction {
            Extraction::Pattern => self
                .pattern
                .captures(content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            Extraction::Structured => {
                let document: Value =
                    serde_json::from_str(content.trim_start_matches('\u{feff}')).ok()?;
                document
                    .get(&self.key)?
                    .as_str()
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            }
        }
    }

    fn fallback(&self) -> ResolvedVersion {
        ResolvedVersion {
            value: self.default_version.clone(),
            source: VersionSource::Default,
        }
    }
}

/// Resolves `path` with the built-in key, default and pattern extraction.
pub fn resolve(path: &Path) -> Result<ResolvedVersion, ResolveError> {
    VersionResolver::default().resolve(path)
}
