//! Persistent installed-package state.

pub mod registry;

pub use registry::{
    InstalledPackageRecord, LocalRegistry, RegistryError, RegistryLock, RegistryScope,
};
