//! Feed client: fetches package byte-streams from a universal feed.
//!
//! The network seam is the [`FeedClient`] trait; the default implementation
//! streams over HTTP with `reqwest`. No retry policy lives here — a failed
//! fetch is surfaced to the caller.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::USER_AGENT;
use crate::core::config::FeedConfiguration;
use crate::types::PackageIdentity;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed configuration is missing {0}")]
    MissingConfig(&'static str),

    #[error("Fetch cancelled")]
    Cancelled,
}

/// A streaming package body.
pub type PackageStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Collaborator interface: fetch a package byte-stream for an identity
/// from a resolved feed configuration.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Begin streaming the named package version.
    async fn fetch_package(
        &self,
        config: &FeedConfiguration,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> Result<PackageStream, FetchError>;
}

/// HTTP feed client backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpFeedClient {
    client: Client,
}

impl HttpFeedClient {
    /// Create a client with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Download endpoint for a package version:
    /// `{api}/upack/{feed}/download/{group/}{name}/{version}`.
    fn download_url(
        config: &FeedConfiguration,
        identity: &PackageIdentity,
    ) -> Result<String, FetchError> {
        let api_url = config
            .api_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(FetchError::MissingConfig("api_url"))?;
        let feed_name = config
            .feed_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(FetchError::MissingConfig("feed_name"))?;

        let mut url = format!(
            "{}/upack/{}/download/",
            api_url.trim_end_matches('/'),
            feed_name
        );
        if let Some(group) = identity.group() {
            url.push_str(group);
            url.push('/');
        }
        url.push_str(identity.name());
        url.push('/');
        url.push_str(&identity.version().to_string());
        Ok(url)
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_package(
        &self,
        config: &FeedConfiguration,
        identity: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> Result<PackageStream, FetchError> {
        let url = Self::download_url(config, identity)?;

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);

        if let Some(api_key) = config.api_key.as_deref().filter(|s| !s.is_empty()) {
            request = request.header("X-ApiKey", api_key);
        } else if let Some(user) = config.user_name.as_deref().filter(|s| !s.is_empty()) {
            request = request.basic_auth(user, config.password.as_deref());
        }

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
            resp = request.send() => resp?,
        };
        let response = response.error_for_status()?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from));
        Ok(Box::pin(stream))
    }
}
