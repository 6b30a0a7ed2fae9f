//! Socket URL and document URI helpers.
//!
//! The language server listens on a well-known service path below the page path:
//!
//! ```text
//! {ws|wss}://<host>:<port><page-path>/<service-path>
//! ```
//!
//! with duplicate slashes collapsed.

use crate::error::BridgeError;
use std::path::Path;
use url::Url;

/// Where the editor page was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// `true` when the page was served from a secure origin (`https`).
    pub secure: bool,
    /// Host name (without port).
    pub host: String,
    /// Page path (e.g. `/editor/`).
    pub path: String,
}

impl PageLocation {
    /// Create a page location.
    pub fn new(secure: bool, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            secure,
            host: host.into(),
            path: path.into(),
        }
    }

    /// Derive a page location from a page URL such as `https://example.org/editor/`.
    pub fn from_page_url(page_url: &str) -> Result<Self, BridgeError> {
        let url = Url::parse(page_url).map_err(|source| BridgeError::InvalidUrl {
            url: page_url.to_string(),
            source,
        })?;
        Ok(Self {
            secure: url.scheme() == "https",
            host: url.host_str().unwrap_or("localhost").to_string(),
            path: url.path().to_string(),
        })
    }
}

/// Websocket scheme for a page origin: `wss` iff the page is secure.
pub fn scheme_for(secure: bool) -> &'static str {
    if secure { "wss" } else { "ws" }
}

/// Collapse runs of `/` and guarantee a leading `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for ch in path.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Build the websocket URL of the language service.
pub fn socket_url(
    location: &PageLocation,
    port: u16,
    service_path: &str,
) -> Result<String, BridgeError> {
    let path = normalize_path(&format!("{}/{}", location.path, service_path));
    let raw = format!(
        "{}://{}:{}{}",
        scheme_for(location.secure),
        location.host,
        port,
        path
    );

    Url::parse(&raw).map_err(|source| BridgeError::InvalidUrl {
        url: raw.clone(),
        source,
    })?;
    Ok(raw)
}

/// `file://` URI for a local document.
///
/// Relative paths are resolved against the current directory; paths that cannot be expressed as
/// a file URL yield `None`.
pub fn document_uri_for_path(path: &Path) -> Option<String> {
    let abs = std::fs::canonicalize(path)
        .ok()
        .or_else(|| std::env::current_dir().ok().map(|dir| dir.join(path)))?;
    Url::from_file_path(abs).ok().map(String::from)
}
