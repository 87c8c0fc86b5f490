//! Feed configuration resolution.
//!
//! A partially populated [`FeedConfiguration`] plus a [`PackageSourceRef`]
//! resolve into a complete configuration (API URL, feed name, credentials).
//! Caller-supplied fields always take precedence: resolution fills blanks,
//! it never overwrites.

use base64::Engine as _;
use thiserror::Error;
use tracing::debug;

use crate::core::feed::parse_feed_url;

#[derive(Error, Debug)]
pub enum FeedConfigError {
    #[error("Package source '{0}' not found")]
    UnknownPackageSource(String),

    #[error("Service credentials '{0}' not found")]
    UnknownServiceCredentials(String),

    #[error("'{name}' is a {actual} credential, not a feed service credential")]
    WrongCredentialKind { name: String, actual: String },

    #[error("Package source '{name}' does not refer to a valid feed URL: {url}")]
    NotAFeedUrl { name: String, url: String },

    #[error("Package source '{name}' has unsupported resource type {resource_type}")]
    UnsupportedResourceType { name: String, resource_type: String },

    #[error("Failed to decode protected secret: {0}")]
    Secret(String),

    #[error("ServiceUrl and FeedName are required")]
    MissingServiceUrl,
}

/// A fully or partially populated feed configuration.
///
/// After [`resolve_feed_config`] succeeds, `api_url` and `feed_name` are
/// guaranteed non-empty. Username/password and API key may coexist when the
/// upstream source supplies both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedConfiguration {
    pub api_url: Option<String>,
    pub feed_name: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    /// Name of the package source this configuration came from, if any.
    pub package_source_name: Option<String>,
    /// Fallback feed URL consulted when the source leaves the API URL or
    /// feed name unset.
    pub feed_url: Option<String>,
}

impl FeedConfiguration {
    /// API URL, known non-empty after successful resolution.
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or("")
    }

    /// Feed name, known non-empty after successful resolution.
    pub fn feed_name(&self) -> &str {
        self.feed_name.as_deref().unwrap_or("")
    }
}

/// The four source-identifier formats a package source can use.
///
/// Dispatch over this sum is exhaustive; adding a format is a
/// compile-visible change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSourceRef {
    /// A named secure-resource definition.
    SecureResource(String),
    /// Named service credentials for a package host.
    ProGetService(String),
    /// A literal URL.
    Url(String),
    /// No source reference.
    None,
}

/// Credential kind attached to a secure resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureResourceCredentials {
    UsernamePassword {
        user_name: String,
        /// Protected (encoded) password; run through the context's
        /// reversible decode before use.
        password: String,
    },
    Token {
        token: String,
    },
    /// Any other resource type; named for the error message.
    Other(String),
}

/// A named secure-resource definition: endpoint plus credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureResource {
    pub endpoint_url: String,
    pub credentials: SecureResourceCredentials,
}

/// Named service credentials for a package host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub feed_name: Option<String>,
}

/// A named credential object as stored by the host; resolution only
/// accepts the service kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedCredentials {
    Service(ServiceCredentials),
    /// A credential of some other kind; named for the error message.
    Other(String),
}

/// Collaborator seam: named lookups and the reversible secret decode.
pub trait ResolverContext {
    /// Look up a secure resource by name.
    fn secure_resource(&self, name: &str) -> Option<SecureResource>;

    /// Look up named credentials by name.
    fn named_credentials(&self, name: &str) -> Option<NamedCredentials>;

    /// Reverse the protection encoding applied to stored secrets.
    ///
    /// The default encoding is base64 over UTF-8.
    fn decode_secret(&self, value: &str) -> Result<String, FeedConfigError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(value)
            .map_err(|e| FeedConfigError::Secret(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| FeedConfigError::Secret(e.to_string()))
    }
}

/// An empty context: every named lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContext;

impl ResolverContext for EmptyContext {
    fn secure_resource(&self, _name: &str) -> Option<SecureResource> {
        None
    }

    fn named_credentials(&self, _name: &str) -> Option<NamedCredentials> {
        None
    }
}

/// Set `slot` only when it is currently unset or empty.
fn fill_if_absent(slot: &mut Option<String>, value: Option<&str>) {
    if slot.as_deref().is_some_and(|s| !s.is_empty()) {
        return;
    }
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        *slot = Some(v.to_string());
    }
}

fn is_unset(slot: &Option<String>) -> bool {
    slot.as_deref().is_none_or(str::is_empty)
}

/// Resolve a feed configuration from a package source reference.
///
/// Dispatches exhaustively over the source tag, filling only fields the
/// caller left blank, then falls back to parsing `feed_url` when the API
/// URL or feed name is still missing. Fails when both stages leave either
/// required field empty.
pub fn resolve_feed_config(
    mut config: FeedConfiguration,
    source: &PackageSourceRef,
    ctx: &dyn ResolverContext,
) -> Result<FeedConfiguration, FeedConfigError> {
    match source {
        PackageSourceRef::SecureResource(name) => {
            let resource = ctx
                .secure_resource(name)
                .ok_or_else(|| FeedConfigError::UnknownPackageSource(name.clone()))?;

            let location =
                parse_feed_url(&resource.endpoint_url).ok_or_else(|| FeedConfigError::NotAFeedUrl {
                    name: name.clone(),
                    url: resource.endpoint_url.clone(),
                })?;

            fill_if_absent(&mut config.api_url, Some(&location.service_root));
            fill_if_absent(&mut config.feed_name, Some(&location.feed_name));

            match resource.credentials {
                SecureResourceCredentials::UsernamePassword {
                    user_name,
                    password,
                } => {
                    let decoded = ctx.decode_secret(&password)?;
                    fill_if_absent(&mut config.user_name, Some(&user_name));
                    fill_if_absent(&mut config.password, Some(&decoded));
                }
                SecureResourceCredentials::Token { token } => {
                    fill_if_absent(&mut config.api_key, Some(&token));
                }
                SecureResourceCredentials::Other(resource_type) => {
                    return Err(FeedConfigError::UnsupportedResourceType {
                        name: name.clone(),
                        resource_type,
                    });
                }
            }

            fill_if_absent(&mut config.package_source_name, Some(name));
        }

        PackageSourceRef::ProGetService(name) => {
            let creds = match ctx.named_credentials(name) {
                None => return Err(FeedConfigError::UnknownServiceCredentials(name.clone())),
                Some(NamedCredentials::Other(actual)) => {
                    return Err(FeedConfigError::WrongCredentialKind {
                        name: name.clone(),
                        actual,
                    });
                }
                Some(NamedCredentials::Service(creds)) => creds,
            };

            fill_if_absent(&mut config.api_url, creds.api_url.as_deref());
            fill_if_absent(&mut config.api_key, creds.api_key.as_deref());
            fill_if_absent(&mut config.user_name, creds.user_name.as_deref());
            fill_if_absent(&mut config.password, creds.password.as_deref());
            fill_if_absent(&mut config.feed_name, creds.feed_name.as_deref());
            fill_if_absent(&mut config.package_source_name, Some(name));
        }

        PackageSourceRef::Url(url) => {
            fill_if_absent(&mut config.api_url, Some(url));
        }

        PackageSourceRef::None => {}
    }

    // Second stage: fall back to the feed URL when the source left the
    // required fields unset.
    if is_unset(&config.api_url) || is_unset(&config.feed_name) {
        if let Some(feed_url) = config.feed_url.clone() {
            if let Some(location) = parse_feed_url(&feed_url) {
                debug!("falling back to feed URL {feed_url} for service root and feed name");
                fill_if_absent(&mut config.api_url, Some(&location.service_root));
                fill_if_absent(&mut config.feed_name, Some(&location.feed_name));
            }
        }
    }

    if is_unset(&config.api_url) || is_unset(&config.feed_name) {
        return Err(FeedConfigError::MissingServiceUrl);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeContext {
        resource: Option<SecureResource>,
        credentials: Option<NamedCredentials>,
    }

    impl ResolverContext for FakeContext {
        fn secure_resource(&self, _name: &str) -> Option<SecureResource> {
            self.resource.clone()
        }

        fn named_credentials(&self, _name: &str) -> Option<NamedCredentials> {
            self.credentials.clone()
        }
    }

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    #[test]
    fn test_secure_resource_username_password() {
        let ctx = FakeContext {
            resource: Some(SecureResource {
                endpoint_url: "https://proget.example.com/upack/tools".to_string(),
                credentials: SecureResourceCredentials::UsernamePassword {
                    user_name: "svc".to_string(),
                    password: b64("hunter2"),
                },
            }),
            credentials: None,
        };

        let config = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::SecureResource("src".to_string()),
            &ctx,
        )
        .unwrap();

        assert_eq!(config.api_url(), "https://proget.example.com");
        assert_eq!(config.feed_name(), "tools");
        assert_eq!(config.user_name.as_deref(), Some("svc"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_secure_resource_token() {
        let ctx = FakeContext {
            resource: Some(SecureResource {
                endpoint_url: "https://h/upack/f".to_string(),
                credentials: SecureResourceCredentials::Token {
                    token: "abc".to_string(),
                },
            }),
            credentials: None,
        };

        let config = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::SecureResource("src".to_string()),
            &ctx,
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert!(config.user_name.is_none());
    }

    #[test]
    fn test_secure_resource_missing() {
        let ctx = FakeContext {
            resource: None,
            credentials: None,
        };
        let err = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::SecureResource("ghost".to_string()),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, FeedConfigError::UnknownPackageSource(_)));
    }

    #[test]
    fn test_secure_resource_bad_endpoint() {
        let ctx = FakeContext {
            resource: Some(SecureResource {
                endpoint_url: "https://example.com/not-a-feed".to_string(),
                credentials: SecureResourceCredentials::Token {
                    token: "t".to_string(),
                },
            }),
            credentials: None,
        };
        let err = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::SecureResource("src".to_string()),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, FeedConfigError::NotAFeedUrl { .. }));
    }

    #[test]
    fn test_secure_resource_unsupported_type() {
        let ctx = FakeContext {
            resource: Some(SecureResource {
                endpoint_url: "https://h/upack/f".to_string(),
                credentials: SecureResourceCredentials::Other("SshKey".to_string()),
            }),
            credentials: None,
        };
        let err = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::SecureResource("src".to_string()),
            &ctx,
        )
        .unwrap_err();
        match err {
            FeedConfigError::UnsupportedResourceType { resource_type, .. } => {
                assert_eq!(resource_type, "SshKey");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_proget_service_fills_blanks() {
        let ctx = FakeContext {
            resource: None,
            credentials: Some(NamedCredentials::Service(ServiceCredentials {
                api_url: Some("https://proget".to_string()),
                api_key: Some("key".to_string()),
                user_name: Some("u".to_string()),
                password: Some("p".to_string()),
                feed_name: Some("feed".to_string()),
            })),
        };

        let config = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::ProGetService("svc".to_string()),
            &ctx,
        )
        .unwrap();

        assert_eq!(config.api_url(), "https://proget");
        assert_eq!(config.feed_name(), "feed");
        assert_eq!(config.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_proget_service_wrong_kind() {
        let ctx = FakeContext {
            resource: None,
            credentials: Some(NamedCredentials::Other("GitHub".to_string())),
        };
        let err = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::ProGetService("svc".to_string()),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, FeedConfigError::WrongCredentialKind { .. }));
    }

    #[test]
    fn test_merge_not_overwrite() {
        // A caller-supplied api_url survives resolution from every tag.
        let caller = FeedConfiguration {
            api_url: Some("https://mine".to_string()),
            feed_name: Some("myfeed".to_string()),
            ..Default::default()
        };

        let ctx = FakeContext {
            resource: Some(SecureResource {
                endpoint_url: "https://other/upack/f".to_string(),
                credentials: SecureResourceCredentials::Token {
                    token: "t".to_string(),
                },
            }),
            credentials: Some(NamedCredentials::Service(ServiceCredentials {
                api_url: Some("https://other".to_string()),
                feed_name: Some("otherfeed".to_string()),
                ..Default::default()
            })),
        };

        for source in [
            PackageSourceRef::SecureResource("s".to_string()),
            PackageSourceRef::ProGetService("s".to_string()),
            PackageSourceRef::Url("https://other".to_string()),
            PackageSourceRef::None,
        ] {
            let resolved = resolve_feed_config(caller.clone(), &source, &ctx).unwrap();
            assert_eq!(resolved.api_url(), "https://mine", "overwritten by {source:?}");
            assert_eq!(resolved.feed_name(), "myfeed");
        }
    }

    #[test]
    fn test_url_ref_needs_feed_name_fallback() {
        let config = FeedConfiguration {
            feed_url: Some("https://h/upack/fallback".to_string()),
            ..Default::default()
        };
        let resolved = resolve_feed_config(
            config,
            &PackageSourceRef::Url("https://direct".to_string()),
            &EmptyContext,
        )
        .unwrap();

        // api_url came from the explicit source, feed name from the fallback.
        assert_eq!(resolved.api_url(), "https://direct");
        assert_eq!(resolved.feed_name(), "fallback");
    }

    #[test]
    fn test_none_with_feed_url_fallback() {
        let config = FeedConfiguration {
            feed_url: Some("https://h/upack/f".to_string()),
            ..Default::default()
        };
        let resolved =
            resolve_feed_config(config, &PackageSourceRef::None, &EmptyContext).unwrap();
        assert_eq!(resolved.api_url(), "https://h");
        assert_eq!(resolved.feed_name(), "f");
    }

    #[test]
    fn test_unresolvable_fails() {
        let err = resolve_feed_config(
            FeedConfiguration::default(),
            &PackageSourceRef::None,
            &EmptyContext,
        )
        .unwrap_err();
        assert!(matches!(err, FeedConfigError::MissingServiceUrl));
        assert_eq!(err.to_string(), "ServiceUrl and FeedName are required");
    }

    #[test]
    fn test_bad_fallback_url_fails() {
        let config = FeedConfiguration {
            feed_url: Some("https://example.com/no-feed-here".to_string()),
            ..Default::default()
        };
        let err =
            resolve_feed_config(config, &PackageSourceRef::None, &EmptyContext).unwrap_err();
        assert!(matches!(err, FeedConfigError::MissingServiceUrl));
    }

    #[test]
    fn test_decode_secret_default_base64() {
        let err = EmptyContext.decode_secret("!!not base64!!").unwrap_err();
        assert!(matches!(err, FeedConfigError::Secret(_)));
        assert_eq!(EmptyContext.decode_secret(&b64("s3cret")).unwrap(), "s3cret");
    }
}
