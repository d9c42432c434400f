pub mod manifest;

pub use manifest::{Author, PluginManifest};

/// File name the host runtime expects at the root of the plugin's resources.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Key holding the plugin version inside the manifest.
pub const VERSION_KEY: &str = "Version";
