//! Local installed-package registry.
//!
//! A scoped, file-backed append log of installation records, shared by
//! every installer invocation on the machine. Writers hold a cross-process
//! exclusive lock for the duration of a registration; the lock is an
//! adjacent `.lock` file created atomically and removed by the guard on
//! every exit path.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{machine_data_dir, user_data_dir};

/// Registry file name within the scope's data directory.
pub const REGISTRY_FILE: &str = "installedPackages.json";

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Registry parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Registry lock wait cancelled")]
    Cancelled,
}

/// Which machine scope a registry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryScope {
    /// Machine-wide registry, shared by all users.
    Machine,
    /// Per-user registry.
    #[default]
    User,
    /// No registry bookkeeping.
    None,
}

impl std::str::FromStr for RegistryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "machine" => Ok(Self::Machine),
            "user" => Ok(Self::User),
            "none" => Ok(Self::None),
            other => Err(format!("unknown registry scope '{other}'")),
        }
    }
}

/// One installed-package record.
///
/// Field names are fixed for on-disk compatibility; records are appended
/// once per successful installation and never mutated. A reinstall appends
/// a new record for the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackageRecord {
    #[serde(rename = "Group", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "InstallPath")]
    pub install_path: String,
    #[serde(rename = "FeedUrl", skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    /// ISO-8601 timestamp.
    #[serde(rename = "InstallationDate")]
    pub installation_date: String,
    /// Free-text provenance tag.
    #[serde(rename = "InstalledUsing")]
    pub installed_using: String,
}

/// Exclusive write lock over one registry scope.
///
/// Dropping the guard releases the lock; `release` may also be called
/// explicitly and is idempotent.
#[derive(Debug)]
pub struct RegistryLock {
    lock_path: PathBuf,
    held: bool,
}

impl RegistryLock {
    /// Release the lock. Safe to call more than once.
    pub fn release(&mut self) {
        if self.held {
            self.held = false;
            if let Err(e) = fs::remove_file(&self.lock_path) {
                debug!("failed to remove registry lock {}: {e}", self.lock_path.display());
            }
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// A scoped local registry.
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    path: PathBuf,
}

impl LocalRegistry {
    /// Open the registry for a scope, creating its directory if needed.
    ///
    /// Returns `None` for [`RegistryScope::None`].
    pub fn open(scope: RegistryScope) -> Result<Option<Self>, RegistryError> {
        let dir = match scope {
            RegistryScope::Machine => machine_data_dir(),
            RegistryScope::User => user_data_dir(),
            RegistryScope::None => return Ok(None),
        };
        Ok(Some(Self::open_at(&dir)?))
    }

    /// Open a registry rooted at a specific directory (also used by tests).
    pub fn open_at(dir: &Path) -> Result<Self, RegistryError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(REGISTRY_FILE),
        })
    }

    /// Path of the backing registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the exclusive cross-process lock for this registry.
    ///
    /// Blocks (asynchronously) while another process holds the lock;
    /// unwinds with [`RegistryError::Cancelled`] when the token fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<RegistryLock, RegistryError> {
        let lock_path = self.path.with_extension("json.lock");

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    // Holder PID, for diagnosing stale locks.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(RegistryLock {
                        lock_path,
                        held: true,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(RegistryError::Cancelled),
                        () = tokio::time::sleep(LOCK_RETRY_INTERVAL) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Append a record while holding the lock.
    ///
    /// The lock handle is taken by reference as proof of acquisition; the
    /// write is read-modify-write with an atomic rename so a crash never
    /// leaves a torn file.
    pub fn register(
        &self,
        _lock: &RegistryLock,
        record: &InstalledPackageRecord,
    ) -> Result<(), RegistryError> {
        let mut records = self.read_records()?;
        records.push(record.clone());
        self.write_records(&records)
    }

    /// All records currently in the registry, in append order.
    pub fn list(&self) -> Result<Vec<InstalledPackageRecord>, RegistryError> {
        self.read_records()
    }

    fn read_records(&self) -> Result<Vec<InstalledPackageRecord>, RegistryError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_records(&self, records: &[InstalledPackageRecord]) -> Result<(), RegistryError> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
