//! Composition of HTML fragments into one page.
//!
//! Fetched fragment responses go through the [`ContentExtractor`], which
//! runs the markup [`parser`] with a [`ContentMarkupHandler`] to find the
//! embeddable range and the `<link>` assets a fragment declares. Extracted
//! [`Content`] becomes a [`Composition`] node; nodes nest, and rendering the
//! root splices every child into its parent's template, injects the
//! deduplicated asset links into `<head>` and merges all sessions.
//!
//! # Main types
//!
//! - [`ContentRange`]: byte range into one fragment's text.
//! - [`ContentExtractor`]: fragment response to [`Content`].
//! - [`Composition`]: node of the composition tree.

/// Composition tree and rendering.
pub mod composition;
/// Fragment content extraction.
pub mod extractor;
/// Parse-event handlers for assets and content markers.
pub mod handler;
/// Streaming HTML tokenizer.
pub mod parser;
/// Byte ranges into fragment text.
pub mod range;

pub use composition::Composition;
pub use extractor::{Content, ContentExtractor};
pub use handler::{AssetMarkupHandler, ContentMarkupHandler};
pub use parser::{MarkupEvent, MarkupHandler};
pub use range::ContentRange;
