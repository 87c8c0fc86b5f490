//! upack - universal package toolkit
//!
//! Builds content-addressed package archives from masked directory trees,
//! resolves feed endpoints and credentials, and performs idempotent,
//! lock-protected local installations with registry bookkeeping.
//!
//! # Overview
//!
//! A universal package is a self-describing zip container: a `upack.json`
//! metadata block keyed by group/name/version plus content entries under
//! `package/`. The pipeline is:
//!
//! - **Feed locator** ([`core::feed`]): parses `host/{upack|nuget}/<feed>`
//!   URLs into their components.
//! - **Credential resolver** ([`core::config`]): turns a package-source
//!   reference into a fully populated [`core::config::FeedConfiguration`],
//!   filling only fields the caller left blank.
//! - **Builder** ([`ops::build`]): streams a masked file set into a new
//!   archive with merged metadata.
//! - **Installer** ([`ops::install`]): downloads via the
//!   [`io::fetch::FeedClient`] seam, extracts, and records the install.
//! - **Local registry** ([`store::registry`]): an exclusively locked,
//!   append-only record of installations per machine/user scope.
//!
//! # Directory Layout
//!
//! ```text
//! /var/lib/upack/installedPackages.json   # machine-scope registry
//! ~/.upack/installedPackages.json         # user-scope registry
//! ```

pub mod core;
pub mod io;
pub mod ops;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use core::config::{FeedConfiguration, PackageSourceRef, resolve_feed_config};
pub use core::feed::{FeedLocation, parse_feed_url};
pub use ops::{build_package, install_package};
pub use store::{LocalRegistry, RegistryScope};
pub use types::PackageIdentity;

use std::path::PathBuf;

use dirs::home_dir;

/// Package archive file extension.
pub const UPACK_EXTENSION: &str = "upack";

/// User Agent string
pub const USER_AGENT: &str = concat!("upack/", env!("CARGO_PKG_VERSION"));

/// Provenance tag written into registry records.
pub const INSTALLED_USING: &str = concat!("upack/", env!("CARGO_PKG_VERSION"));

/// Returns the user-scope data directory, or None if the user's home
/// cannot be resolved.
pub fn try_user_data_dir() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("UPACK_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".upack"))
}

/// User-scope data directory (`~/.upack`).
///
/// # Panics
/// Panics if the home directory cannot be determined.
pub fn user_data_dir() -> PathBuf {
    try_user_data_dir().expect("Could not determine home directory")
}

/// Machine-scope data directory.
pub fn machine_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/upack")
}
