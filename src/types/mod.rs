//! Core identity types.

pub mod identity;

pub use identity::{IdentityError, PackageIdentity};
