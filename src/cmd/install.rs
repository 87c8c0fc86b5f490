//! Install command - download, extract, and register a package

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use upack::core::config::{EmptyContext, FeedConfiguration, PackageSourceRef, resolve_feed_config};
use upack::io::fetch::HttpFeedClient;
use upack::ops::{InstallRequest, install_package};
use upack::store::RegistryScope;
use upack::types::PackageIdentity;

#[allow(clippy::too_many_arguments)]
pub async fn install(
    spec: &str,
    target: PathBuf,
    url: Option<String>,
    feed: Option<String>,
    feed_url: Option<String>,
    api_key: Option<String>,
    user: Option<String>,
    password: Option<String>,
    scope: RegistryScope,
    registry_root: Option<PathBuf>,
) -> Result<()> {
    let identity = PackageIdentity::parse_spec(spec)?;

    let config = FeedConfiguration {
        api_url: None,
        feed_name: feed,
        user_name: user,
        password,
        api_key,
        package_source_name: None,
        feed_url,
    };

    let source = match url {
        Some(url) => PackageSourceRef::Url(url),
        None => PackageSourceRef::None,
    };
    let config = resolve_feed_config(config, &source, &EmptyContext)?;

    // Cooperative cancellation on Ctrl-C.
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let request = InstallRequest {
        config,
        identity: identity.clone(),
        target_dir: target.clone(),
        scope,
        registry_root,
    };

    let client = HttpFeedClient::new();
    install_package(&client, &request, &cancel).await?;
    println!("Installed {identity} into {}", target.display());
    Ok(())
}
