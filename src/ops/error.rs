//! Domain-specific errors for package operations

use thiserror::Error;

use crate::io::archive::ArchiveError;
use crate::io::fetch::FetchError;
use crate::store::registry::RegistryError;
use crate::types::IdentityError;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid package identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("Invalid file mask: {0}")]
    Mask(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Registry update failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Installation cancelled")]
    Cancelled,
}
