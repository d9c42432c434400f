pub mod cargo_env;
pub mod config;
pub mod identity;
pub mod release;
pub mod resolver;

pub use identity::BuildIdentity;
pub use resolver::{
    resolve, Extraction, ResolveError, ResolvedVersion, VersionResolver, VersionSource,
    DEFAULT_VERSION,
};

/// Returns the crate version baked in at compile time.
pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
