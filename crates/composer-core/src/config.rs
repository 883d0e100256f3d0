//! TOML configuration for the composer.
//!
//! Every section and field is optional; missing values fall back to the
//! header and markup conventions in the crate root.

use crate::{ComposerError, ComposerResult, CONTENT_ELEMENT, STYLESHEET_HEADER};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposerConfig {
    /// Fragment extraction settings.
    #[serde(default)]
    pub composing: ComposingConfig,
    /// Session storage settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Settings for extracting content and assets from fragments.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposingConfig {
    /// Element whose inner markup is the embeddable part of a fragment.
    #[serde(default = "default_content_element")]
    pub content_element: String,
    /// Response header carrying a stylesheet URL for the fragment.
    #[serde(default = "default_stylesheet_header")]
    pub stylesheet_header: String,
}

impl Default for ComposingConfig {
    fn default() -> Self {
        Self {
            content_element: default_content_element(),
            stylesheet_header: default_stylesheet_header(),
        }
    }
}

/// Where the root session of an inbound request lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStorage {
    /// Sessions are neither read nor written.
    None,
    /// Sessions are carried in a cookie.
    Cookie,
}

/// Settings for session read and write-back.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Which serializer reads and writes the root session.
    #[serde(default = "default_storage")]
    pub storage: SessionStorage,
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// `Path` attribute of the session cookie.
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
    /// `Max-Age` of the session cookie. Session cookie when unset.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
    /// Stamp a fresh id on sessions that arrive without one.
    #[serde(default = "default_generate_id")]
    pub generate_id: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            cookie_name: default_cookie_name(),
            cookie_path: default_cookie_path(),
            max_age_secs: None,
            generate_id: default_generate_id(),
        }
    }
}

fn default_content_element() -> String {
    CONTENT_ELEMENT.to_string()
}
fn default_stylesheet_header() -> String {
    STYLESHEET_HEADER.to_string()
}
fn default_storage() -> SessionStorage {
    SessionStorage::Cookie
}
fn default_cookie_name() -> String {
    "rdsession".to_string()
}
fn default_cookie_path() -> String {
    "/".to_string()
}
fn default_generate_id() -> bool {
    true
}

impl ComposerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> ComposerResult<Self> {
        let config: ComposerConfig = toml::from_str(content)
            .map_err(|e| ComposerError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML config file.
    pub fn load(path: &Path) -> ComposerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComposerError::Config(format!(
                "Failed to read config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks names that end up in markup matching and HTTP headers.
    pub fn validate(&self) -> ComposerResult<()> {
        let element = &self.composing.content_element;
        let valid_element = element
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && element
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':');
        if !valid_element {
            return Err(ComposerError::Config(format!(
                "Invalid content element name '{element}'"
            )));
        }

        http::HeaderName::from_bytes(self.composing.stylesheet_header.as_bytes()).map_err(|_| {
            ComposerError::Config(format!(
                "Invalid stylesheet header name '{}'",
                self.composing.stylesheet_header
            ))
        })?;

        let cookie = &self.session.cookie_name;
        let valid_cookie = !cookie.is_empty()
            && cookie
                .bytes()
                .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b));
        if !valid_cookie {
            return Err(ComposerError::Config(format!(
                "Invalid session cookie name '{cookie}'"
            )));
        }

        let path = &self.session.cookie_path;
        if path.is_empty() || path.chars().any(|c| c == ';' || c.is_control()) {
            return Err(ComposerError::Config(format!(
                "Invalid session cookie path '{}'",
                path.escape_default()
            )));
        }
        Ok(())
    }
}
