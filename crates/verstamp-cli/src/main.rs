use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use verstamp_core::{
    cargo_env::{self, DEFAULT_ENV_VAR},
    config::Config,
    release, BuildIdentity, Extraction,
};
use verstamp_manifest::PluginManifest;

const EXAMPLE_CONFIG: &str = include_str!("../../../demos/config/minimal.verstamp.toml");

#[derive(Parser, Debug)]
#[command(
    name = "verstamp",
    author,
    version,
    about = "Resolve a plugin's build version from its manifest"
)]
struct Cli {
    /// Sets the log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Configuration file; relative paths inside it resolve against its directory.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Manifest to read, overriding `<resource_root>/<file_name>`.
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved build version.
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Parse the manifest as JSON instead of pattern matching.
        #[arg(long)]
        structured: bool,
    },
    /// Inspect the plugin manifest.
    Manifest {
        #[command(subcommand)]
        command: ManifestCommands,
    },
    /// Compare the build version against the latest published release.
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Latest release tag, e.g. `v1.2.0`.
        #[arg(long, value_name = "TAG", required_unless_present = "release_json")]
        latest: Option<String>,

        /// Saved release API response carrying a `tag_name` field.
        #[arg(long, value_name = "FILE", conflicts_with = "latest")]
        release_json: Option<PathBuf>,
    },
    /// Print cargo build-script directives stamping the version.
    Emit {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, value_name = "NAME", default_value = DEFAULT_ENV_VAR)]
        env: String,
    },
    /// Interact with configuration files.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Dump the resolved configuration and version as JSON.
    Diag {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ManifestCommands {
    /// Shows the fields the host runtime reads from the manifest.
    Show {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validates the provided configuration file.
    Validate {
        #[arg(value_name = "FILE")]
        config: PathBuf,
    },
    /// Prints the bundled example configuration.
    Example,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Resolve { source, structured } => handle_resolve(&mut out, &source, structured),
        Commands::Manifest { command } => handle_manifest(&mut out, command),
        Commands::Check {
            source,
            latest,
            release_json,
        } => handle_check(&mut out, &source, latest, release_json),
        Commands::Emit { source, env } => handle_emit(&mut out, &source, &env),
        Commands::Config { command } => handle_config(&mut out, command),
        Commands::Diag { source } => handle_diag(&mut out, &source),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
    Ok(())
}

fn handle_resolve<W: Write>(out: &mut W, source: &SourceArgs, structured: bool) -> Result<()> {
    let (mut config, base_dir) = load_config(source.config.as_deref())?;
    if structured {
        config.manifest.extraction = Extraction::Structured;
    }
    let identity = build_identity(&config, &base_dir, source)?;
    let version = identity.version()?;
    if version.is_default() {
        info!(
            manifest = %identity.manifest_path().display(),
            "no version in manifest, falling back to default"
        );
    }
    writeln!(out, "{version}")?;
    Ok(())
}

fn handle_manifest<W: Write>(out: &mut W, command: ManifestCommands) -> Result<()> {
    match command {
        ManifestCommands::Show { source } => {
            let (config, base_dir) = load_config(source.config.as_deref())?;
            let path = source
                .manifest
                .clone()
                .unwrap_or_else(|| config.manifest_path(&base_dir));
            if !path.exists() {
                writeln!(out, "no manifest found at {}", path.display())?;
                return Ok(());
            }
            let manifest = PluginManifest::load(&path)?;
            writeln!(
                out,
                "- {} v{}{}",
                manifest.identifier().unwrap_or_else(|| "<unnamed>".into()),
                manifest.version().unwrap_or("<none>"),
                manifest
                    .description
                    .as_ref()
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default()
            )?;
            if let Some(main) = &manifest.main {
                writeln!(out, "  main: {main}")?;
            }
            for author in &manifest.authors {
                writeln!(out, "  author: {}", author.name)?;
            }
            for (name, range) in &manifest.dependencies {
                writeln!(out, "  depends: {name} {range}")?;
            }
            for (name, range) in &manifest.optional_dependencies {
                writeln!(out, "  optional: {name} {range}")?;
            }
            if manifest.version().is_some() && manifest.semver().is_none() {
                warn!("manifest version is not a strict semantic version");
            }
        }
    }
    Ok(())
}

fn handle_check<W: Write>(
    out: &mut W,
    source: &SourceArgs,
    latest: Option<String>,
    release_json: Option<PathBuf>,
) -> Result<()> {
    let (config, base_dir) = load_config(source.config.as_deref())?;
    let identity = build_identity(&config, &base_dir, source)?;
    let current = identity.version()?;

    let latest = match (latest, release_json) {
        (Some(tag), _) => tag,
        (None, Some(path)) => {
            let payload = fs::read_to_string(&path)
                .with_context(|| format!("failed to read release payload {}", path.display()))?;
            release::extract_tag_name(&payload)
                .with_context(|| format!("no tag_name in {}", path.display()))?
        }
        (None, None) => anyhow::bail!("either --latest or --release-json is required"),
    };

    let status = release::check(current.as_str(), &latest);
    if status.is_available() {
        info!(artifact = %config.release.artifact, %status, "newer release published");
        if let Some(url) = &config.release.releases_url {
            info!("download: {url}");
        }
    }
    writeln!(out, "{status}")?;
    Ok(())
}

fn handle_emit<W: Write>(out: &mut W, source: &SourceArgs, env_var: &str) -> Result<()> {
    let (config, base_dir) = load_config(source.config.as_deref())?;
    let identity = build_identity(&config, &base_dir, source)?;
    cargo_env::emit_directives(out, env_var, &identity)
}

fn handle_config<W: Write>(out: &mut W, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { config } => {
            let cfg = Config::load(&config)?;
            cfg.validate()?;
            writeln!(out, "configuration OK: {}", config.display())?;
        }
        ConfigCommands::Example => {
            writeln!(out, "{}", EXAMPLE_CONFIG)?;
        }
    }
    Ok(())
}

fn handle_diag<W: Write>(out: &mut W, source: &SourceArgs) -> Result<()> {
    let (config, base_dir) = load_config(source.config.as_deref())?;
    let identity = build_identity(&config, &base_dir, source)?;
    let version = identity.version()?;
    let report = serde_json::json!({
        "config": config,
        "manifest_path": identity.manifest_path(),
        "version": version,
        "tool_version": verstamp_core::version(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

/// Loads the config file if given, returning it with the directory its
/// relative paths are anchored at.
fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let cfg = Config::load(path)?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            Ok((cfg, base))
        }
        None => Ok((Config::default(), PathBuf::from("."))),
    }
}

fn build_identity(config: &Config, base_dir: &Path, source: &SourceArgs) -> Result<BuildIdentity> {
    match &source.manifest {
        Some(manifest) => Ok(BuildIdentity::new(config.resolver()?, manifest.clone())),
        None => BuildIdentity::from_config(config, base_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest_only(path: PathBuf) -> SourceArgs {
        SourceArgs {
            config: None,
            manifest: Some(path),
        }
    }

    fn output<F>(run: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = Vec::new();
        run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn check_requires_a_release_source() {
        assert!(Cli::try_parse_from(["verstamp", "check"]).is_err());
        assert!(Cli::try_parse_from(["verstamp", "check", "--latest", "v1.0.0"]).is_ok());
        assert!(Cli::try_parse_from([
            "verstamp",
            "check",
            "--latest",
            "v1.0.0",
            "--release-json",
            "release.json"
        ])
        .is_err());
    }

    #[test]
    fn bundled_example_config_is_valid() {
        let cfg = Config::from_toml_str(EXAMPLE_CONFIG).unwrap();
        cfg.validate().unwrap();
    }

    #[test]
    fn explicit_manifest_overrides_config_path() {
        let source = SourceArgs {
            config: None,
            manifest: Some(PathBuf::from("custom/manifest.json")),
        };
        let identity = build_identity(&Config::default(), Path::new("."), &source).unwrap();
        assert_eq!(identity.manifest_path(), Path::new("custom/manifest.json"));
    }

    #[test]
    fn resolve_flag_switches_to_structured_extraction() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("manifest.json"), r#"{"Version": "2.0.0",}"#).unwrap();
        let config_path = dir.path().join("verstamp.toml");
        fs::write(
            &config_path,
            "[manifest]\nresource_root = \".\"\nextraction = \"pattern\"\n",
        )
        .unwrap();
        let source = SourceArgs {
            config: Some(config_path),
            manifest: None,
        };

        assert_eq!(output(|out| handle_resolve(out, &source, false)), "2.0.0\n");
        assert_eq!(output(|out| handle_resolve(out, &source, true)), "1.0.0\n");
    }

    #[test]
    fn check_reads_tag_from_release_payload() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, r#"{"Version": "1.0.0"}"#).unwrap();
        let payload = dir.path().join("release.json");
        fs::write(&payload, r#"{"tag_name": "v1.1.0", "name": "1.1.0"}"#).unwrap();

        let text = output(|out| handle_check(out, &manifest_only(manifest), None, Some(payload)));
        assert_eq!(text, "update available: 1.0.0 -> 1.1.0\n");
    }

    #[test]
    fn check_fails_when_payload_has_no_tag() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, r#"{"Version": "1.0.0"}"#).unwrap();
        let payload = dir.path().join("release.json");
        fs::write(&payload, r#"{"name": "untagged"}"#).unwrap();

        let mut out = Vec::new();
        let err = handle_check(&mut out, &manifest_only(manifest), None, Some(payload)).unwrap_err();
        assert!(err.to_string().contains("no tag_name"));
        assert!(out.is_empty());
    }

    #[test]
    fn check_with_explicit_tag_reports_up_to_date() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, r#"{"Version": "1.1.0"}"#).unwrap();

        let text = output(|out| {
            handle_check(out, &manifest_only(manifest), Some("v1.1.0".into()), None)
        });
        assert_eq!(text, "up to date (version 1.1.0)\n");
    }

    #[test]
    fn emit_writes_cargo_directives() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, r#"{"Version": "0.9.0-beta"}"#).unwrap();

        let text = output(|out| handle_emit(out, &manifest_only(manifest.clone()), "PLUGIN_VERSION"));
        assert_eq!(
            text,
            format!(
                "cargo:rerun-if-changed={}\ncargo:rustc-env=PLUGIN_VERSION=0.9.0-beta\n",
                manifest.display()
            )
        );
    }

    #[test]
    fn manifest_show_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");

        let text = output(|out| {
            handle_manifest(
                out,
                ManifestCommands::Show {
                    source: manifest_only(manifest.clone()),
                },
            )
        });
        assert_eq!(text, format!("no manifest found at {}\n", manifest.display()));
    }

    #[test]
    fn manifest_show_prints_summary() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.json");
        fs::write(
            &manifest,
            r#"{"Group": "com.jemsire", "Name": "JemAnnouncements", "Version": "1.4.2",
                "Authors": [{"Name": "Jemsire"}], "Dependencies": {"Hytale:Core": "*"}}"#,
        )
        .unwrap();

        let text = output(|out| {
            handle_manifest(
                out,
                ManifestCommands::Show {
                    source: manifest_only(manifest),
                },
            )
        });
        assert_eq!(
            text,
            "- com.jemsire:JemAnnouncements v1.4.2\n  author: Jemsire\n  depends: Hytale:Core *\n"
        );
    }

    #[test]
    fn config_validate_accepts_valid_file() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("verstamp.toml");
        fs::write(&config, EXAMPLE_CONFIG).unwrap();

        let text = output(|out| handle_config(out, ConfigCommands::Validate { config: config.clone() }));
        assert_eq!(text, format!("configuration OK: {}\n", config.display()));
    }
}
