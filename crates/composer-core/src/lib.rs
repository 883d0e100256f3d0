//! Core types shared across the composer crates.
//!
//! The composer assembles one HTML page from fragments rendered by
//! independent backend services. This crate holds what every part of it
//! agrees on: the error type, the header and markup conventions, and the
//! configuration.
//!
//! # Main types
//!
//! - [`ComposerError`]: unified error enum for parsing, composition and sessions.
//! - [`ComposerResult`]: convenience alias for `Result<T, ComposerError>`.
//! - [`ComposerConfig`]: TOML configuration.

/// Configuration loading and validation.
pub mod config;
/// Error definitions.
pub mod error;

pub use config::{ComposerConfig, ComposingConfig, SessionConfig, SessionStorage};
pub use error::{ComposerError, ComposerResult};

/// Prefix of response and request headers carrying session entries.
pub const SESSION_HEADER_PREFIX: &str = "x-rd-";

/// Reserved session key holding the session id.
pub const SESSION_ID_KEY: &str = "session-id";

/// Response header naming a stylesheet the fragment depends on.
pub const STYLESHEET_HEADER: &str = "x-uic-stylesheet";

/// Default element whose inner markup is the embeddable part of a fragment.
pub const CONTENT_ELEMENT: &str = "rewe-digital-content";

/// Attribute a `<link>` must carry for it to be injected into the page head.
pub const ASSET_OPTIONS_ATTRIBUTE: &str = "data-rd-options";

/// Value that must occur in [`ASSET_OPTIONS_ATTRIBUTE`] to opt a link in.
pub const ASSET_INCLUDE_OPTION: &str = "include";
