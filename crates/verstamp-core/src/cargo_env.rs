use std::io::Write;

use anyhow::{bail, Context, Result};

use crate::identity::BuildIdentity;

/// Environment variable a build script exports the version under by default.
pub const DEFAULT_ENV_VAR: &str = "VERSTAMP_VERSION";

/// Writes the cargo directives that stamp a crate with the resolved version.
///
/// Rebuilds are keyed on the manifest path, so adding, editing or removing
/// the manifest re-runs the build script.
pub fn emit_directives<W: Write>(out: &mut W, env_var: &str, identity: &BuildIdentity) -> Result<()> {
    if env_var.is_empty() || !env_var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid environment variable name `{env_var}`");
    }
    let version = identity
        .version()
        .context("failed to resolve build version")?;
    writeln!(
        out,
        "cargo:rerun-if-changed={}",
        identity.manifest_path().display()
    )?;
    writeln!(out, "cargo:rustc-env={env_var}={version}")?;
    Ok(())
}
