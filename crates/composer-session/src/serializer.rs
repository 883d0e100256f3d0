//! Session write-back encodings.
//!
//! A [`SessionSerializer`] is picked once at setup: either
//! [`NoSessionSerializer`] or the cookie-backed [`CookieSessionSerializer`].

use crate::session::{SessionEntries, SessionRoot};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use composer_core::{ComposerError, ComposerResult, SessionConfig};
use http::header::{COOKIE, SET_COOKIE};
use http::{request, response, HeaderValue};
use tracing::{debug, warn};

/// Reads the root session of an inbound request and writes it back onto the
/// outgoing response.
///
/// Chosen once at setup; the rest of the composer only sees this trait.
pub trait SessionSerializer: Send + Sync {
    /// Obtains the session of an inbound request. Never fails: unreadable
    /// state yields an empty session.
    fn read_from(&self, request: &request::Parts) -> SessionRoot;

    /// Encodes `entries` onto the response. `entries` holds no removal
    /// markers; `dirty` tells whether the session changed while handling the
    /// request.
    fn write_to(
        &self,
        response: response::Parts,
        entries: &SessionEntries,
        dirty: bool,
    ) -> ComposerResult<response::Parts>;
}

/// Serializer for deployments without sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessionSerializer;

impl SessionSerializer for NoSessionSerializer {
    fn read_from(&self, _request: &request::Parts) -> SessionRoot {
        SessionRoot::empty()
    }

    fn write_to(
        &self,
        response: response::Parts,
        _entries: &SessionEntries,
        _dirty: bool,
    ) -> ComposerResult<response::Parts> {
        Ok(response)
    }
}

/// Keeps the session in a cookie holding base64url-encoded JSON.
#[derive(Debug, Clone)]
pub struct CookieSessionSerializer {
    cookie_name: String,
    cookie_path: String,
    max_age_secs: Option<u64>,
}

impl CookieSessionSerializer {
    /// A serializer for the cookie `cookie_name` on path `/`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            cookie_path: "/".to_string(),
            max_age_secs: None,
        }
    }

    /// A serializer using the cookie settings of `config`.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            cookie_path: config.cookie_path.clone(),
            max_age_secs: config.max_age_secs,
        }
    }

    /// Sets the `Max-Age` attribute of written cookies.
    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Encodes entries into a cookie value.
    pub fn encode(entries: &SessionEntries) -> ComposerResult<String> {
        let json = serde_json::to_vec(entries).map_err(|e| {
            ComposerError::SessionSerialization(format!("Failed to encode session: {e}"))
        })?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a cookie value into entries. Keys are lower-cased.
    pub fn decode(value: &str) -> ComposerResult<SessionEntries> {
        let bytes = URL_SAFE_NO_PAD.decode(value.trim()).map_err(|e| {
            ComposerError::SessionSerialization(format!("Session cookie is not base64: {e}"))
        })?;
        let entries: SessionEntries = serde_json::from_slice(&bytes).map_err(|e| {
            ComposerError::SessionSerialization(format!("Session cookie is not a JSON object: {e}"))
        })?;
        Ok(entries
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect())
    }

    fn find_cookie<'a>(&self, request: &'a request::Parts) -> Option<&'a str> {
        request
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value)
    }

    fn set_cookie(&self, value: &str, max_age: Option<u64>) -> String {
        let mut cookie = format!("{}={}; Path={}", self.cookie_name, value, self.cookie_path);
        if let Some(secs) = max_age {
            cookie.push_str(&format!("; Max-Age={secs}"));
        }
        cookie.push_str("; HttpOnly");
        cookie
    }
}

impl SessionSerializer for CookieSessionSerializer {
    fn read_from(&self, request: &request::Parts) -> SessionRoot {
        let Some(value) = self.find_cookie(request) else {
            return SessionRoot::empty();
        };
        match Self::decode(value) {
            Ok(entries) => SessionRoot::of(entries),
            Err(e) => {
                warn!(cookie = %self.cookie_name, error = %e, "Discarding unreadable session cookie");
                SessionRoot::empty()
            }
        }
    }

    fn write_to(
        &self,
        mut response: response::Parts,
        entries: &SessionEntries,
        dirty: bool,
    ) -> ComposerResult<response::Parts> {
        if !dirty {
            return Ok(response);
        }
        // All entries removed: expire the cookie.
        let cookie = if entries.is_empty() {
            self.set_cookie("", Some(0))
        } else {
            self.set_cookie(&Self::encode(entries)?, self.max_age_secs)
        };
        let value = HeaderValue::from_str(&cookie).map_err(|e| {
            ComposerError::SessionSerialization(format!("Invalid session cookie header: {e}"))
        })?;
        response.headers.append(SET_COOKIE, value);
        debug!(cookie = %self.cookie_name, entries = entries.len(), "Session cookie written");
        Ok(response)
    }
}
