//! Stream Endpoint
//!
//! Derives the WebSocket stream URL from the configured HTTP API base URL
//! and attaches the bearer credential as a connection-establishment query
//! parameter. The credential never travels as an application frame.

use std::fmt;

use url::Url;

use crate::error::ChatError;

/// Default path of the chat stream below the API base URL
pub const DEFAULT_STREAM_PATH: &str = "/api/v1/chat/stream";

/// Query parameter carrying the bearer credential
const TOKEN_PARAM: &str = "token";

/// Opaque bearer credential
///
/// `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a credential
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Access the raw credential
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<redacted>)")
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// WebSocket URL of the chat stream (without credentials)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Use an already-derived WebSocket URL as is
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidEndpoint` unless the URL parses and is
    /// `ws://` or `wss://`.
    pub fn new(url: impl AsRef<str>) -> Result<Self, ChatError> {
        let url = parse(url.as_ref())?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self(url)),
            other => Err(ChatError::InvalidEndpoint(format!(
                "expected ws:// or wss:// URL, got {other}://"
            ))),
        }
    }

    /// Derive the stream endpoint from an HTTP API base URL
    ///
    /// `http` maps to `ws` and `https` to `wss`; `ws`/`wss` base URLs are
    /// accepted unchanged. The stream path is joined onto the base path.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidEndpoint` for any other scheme or a URL
    /// without a host.
    pub fn from_base_url(base_url: &str, stream_path: &str) -> Result<Self, ChatError> {
        let mut url = parse(base_url.trim())?;

        let ws_scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ChatError::InvalidEndpoint(format!(
                    "unsupported scheme {other}"
                )))
            }
        };
        if !url.has_host() {
            return Err(ChatError::InvalidEndpoint(format!(
                "missing host in base URL {base_url}"
            )));
        }
        url.set_scheme(ws_scheme).map_err(|()| {
            ChatError::InvalidEndpoint(format!("cannot use {ws_scheme} for {base_url}"))
        })?;

        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            stream_path.trim_start_matches('/')
        );
        url.set_path(&path);
        url.set_fragment(None);

        Ok(Self(url))
    }

    /// The endpoint URL
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// URL to connect to, carrying the credential as a query parameter
    #[must_use]
    pub fn authenticated_url(&self, token: &AuthToken) -> String {
        let mut url = self.0.clone();
        url.query_pairs_mut()
            .append_pair(TOKEN_PARAM, token.expose());
        url.into()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse(raw: &str) -> Result<Url, ChatError> {
    Url::parse(raw).map_err(|e| ChatError::InvalidEndpoint(format!("{raw}: {e}")))
}
