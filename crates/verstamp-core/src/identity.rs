use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use crate::{
    config::Config,
    resolver::{ResolveError, ResolvedVersion, VersionResolver},
};

/// Build configuration carrying the artifact's version.
///
/// The manifest is read on the first call to [`BuildIdentity::version`];
/// the result is kept for the rest of the build process.
#[derive(Debug)]
pub struct BuildIdentity {
    resolver: VersionResolver,
    manifest_path: PathBuf,
    resolved: OnceLock<ResolvedVersion>,
}

impl BuildIdentity {
    pub fn new(resolver: VersionResolver, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            manifest_path: manifest_path.into(),
            resolved: OnceLock::new(),
        }
    }

    /// Builds an identity from configuration, resolving relative paths
    /// against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(config.resolver()?, config.manifest_path(base_dir)))
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    pub fn version(&self) -> Result<&ResolvedVersion, ResolveError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }
        let resolved = self.resolver.resolve(&self.manifest_path)?;
        Ok(self.resolved.get_or_init(|| resolved))
    }
}
