//! Package installation operation.
//!
//! Downloads a package through the [`FeedClient`] collaborator, spools it
//! to a private temporary file, extracts the content entries into the
//! target directory, and records the installation in the scoped local
//! registry. Extraction is best effort: a failure partway through leaves
//! already extracted files on disk for inspection.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::INSTALLED_USING;
use crate::core::config::FeedConfiguration;
use crate::core::feed::{FeedKind, FeedLocation};
use crate::io::archive::PackageReader;
use crate::io::fetch::FeedClient;
use crate::ops::error::InstallError;
use crate::store::registry::{InstalledPackageRecord, LocalRegistry, RegistryScope};
use crate::types::PackageIdentity;

/// Inputs to [`install_package`].
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Resolved feed configuration (api_url and feed_name populated).
    pub config: FeedConfiguration,
    /// Package to install.
    pub identity: PackageIdentity,
    /// Directory the content entries are extracted into.
    pub target_dir: PathBuf,
    /// Which registry records the installation; `None` skips bookkeeping.
    pub scope: RegistryScope,
    /// Registry root override; defaults to the scope's data directory.
    pub registry_root: Option<PathBuf>,
}

/// Download, extract, and register a package.
pub async fn install_package(
    client: &dyn FeedClient,
    request: &InstallRequest,
    cancel: &CancellationToken,
) -> Result<(), InstallError> {
    let identity = &request.identity;

    // 1. Obtain the package byte-stream from the feed.
    info!(
        "fetching {identity} from {}/{}",
        request.config.api_url(),
        request.config.feed_name()
    );
    let mut stream = client
        .fetch_package(&request.config, identity, cancel)
        .await?;

    // 2. Spool into a private temporary file so extraction can seek.
    let spool = tempfile::tempfile()?;
    let mut spool = tokio::fs::File::from_std(spool);
    let mut spooled: u64 = 0;
    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(InstallError::Cancelled),
            chunk = stream.next() => chunk,
        };
        match chunk {
            Some(chunk) => {
                let chunk = chunk?;
                spool.write_all(&chunk).await?;
                spooled += chunk.len() as u64;
            }
            None => break,
        }
    }
    spool.flush().await?;
    info!("spooled {spooled} bytes for {identity}");

    // 3. Extract all content entries into the target directory.
    let spool = spool.into_std().await;
    let target_dir = request.target_dir.clone();
    let (extracted, package_meta) = tokio::task::spawn_blocking(
        move || -> Result<(Vec<PathBuf>, Option<PackageIdentity>), InstallError> {
            let mut reader = PackageReader::new(spool)?;
            let meta = reader.metadata().ok().and_then(|m| m.identity().ok());
            let extracted = reader.extract_into(&target_dir)?;
            Ok((extracted, meta))
        },
    )
    .await
    .map_err(|e| InstallError::Io(std::io::Error::other(e)))??;

    if let Some(meta_identity) = package_meta {
        info!("package metadata identifies {meta_identity}");
    }
    info!(
        "extracted {} entries into {}",
        extracted.len(),
        request.target_dir.display()
    );

    // 4. Record the installation, if a registry scope was requested.
    let registry = match &request.registry_root {
        Some(root) if request.scope != RegistryScope::None => {
            Some(LocalRegistry::open_at(root)?)
        }
        Some(_) => None,
        None => LocalRegistry::open(request.scope)?,
    };

    if let Some(registry) = registry {
        let record = InstalledPackageRecord {
            group: identity.group().map(ToString::to_string),
            name: identity.name().to_string(),
            version: identity.version().to_string(),
            install_path: request.target_dir.display().to_string(),
            feed_url: Some(resolved_feed_url(&request.config)),
            installation_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            installed_using: INSTALLED_USING.to_string(),
        };

        let mut lock = registry.acquire(cancel).await?;
        let result = registry.register(&lock, &record);
        lock.release();
        result?;
        info!("registered {identity} in {}", registry.path().display());
    }

    info!("installed {identity} into {}", request.target_dir.display());
    Ok(())
}

/// The feed URL recorded with an installation.
fn resolved_feed_url(config: &FeedConfiguration) -> String {
    FeedLocation {
        service_root: config.api_url().trim_end_matches('/').to_string(),
        kind: FeedKind::Upack,
        feed_name: config.feed_name().to_string(),
    }
    .to_url()
}
