//! Feed URL parsing.
//!
//! A feed URL has the shape `[scheme://]host[:port]/{upack|nuget}/<feedName>[/]`.
//! Parsing is pure and total: anything that does not match the shape yields
//! `None`, never an error.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// The kind of feed a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Upack,
    NuGet,
}

impl FeedKind {
    /// The path segment used in feed URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upack => "upack",
            Self::NuGet => "nuget",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three components of a parsed feed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLocation {
    /// Service root, e.g. `https://proget.example.com` or `proget.example.com`.
    pub service_root: String,
    /// Feed kind segment.
    pub kind: FeedKind,
    /// Percent-decoded feed name.
    pub feed_name: String,
}

impl FeedLocation {
    /// Reconstruct an equivalent feed URL from the parsed components.
    pub fn to_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.service_root,
            self.kind.as_str(),
            percent_encode(&self.feed_name)
        )
    }
}

fn feed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:([a-z][a-z0-9+.-]*)://)?([^/?#]+)/(upack|nuget)/([^/?#]+)/?$")
            .expect("feed pattern is valid")
    })
}

/// Parse a feed URL into its (service root, feed kind, feed name) components.
///
/// Matching is case-insensitive; the feed name is percent-decoded. Returns
/// `None` for any string not matching the feed URL shape.
pub fn parse_feed_url(url: &str) -> Option<FeedLocation> {
    let caps = feed_pattern().captures(url)?;

    let host = caps.get(2)?.as_str();
    let service_root = match caps.get(1) {
        Some(scheme) => format!("{}://{host}", scheme.as_str()),
        None => host.to_string(),
    };

    let kind = match caps.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "upack" => FeedKind::Upack,
        "nuget" => FeedKind::NuGet,
        _ => return None,
    };

    let feed_name = percent_decode(caps.get(4)?.as_str());

    Some(FeedLocation {
        service_root,
        kind,
        feed_name,
    })
}

/// Decode `%XX` escapes; malformed escapes are passed through verbatim.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Encode everything outside the unreserved set as `%XX`.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
