//! Fragment content extraction.
//!
//! Turns a fetched fragment response into [`Content`]: the markup inside the
//! content marker plus the asset links the fragment declared.

use crate::handler::ContentMarkupHandler;
use crate::parser;
use crate::range::ContentRange;
use bytes::Bytes;
use composer_core::{ComposerError, ComposerResult, ComposingConfig, CONTENT_ELEMENT, STYLESHEET_HEADER};
use http::{HeaderName, Response};
use serde::Serialize;
use tracing::{debug, warn};

/// The embeddable part of one fetched fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Content {
    body: Option<String>,
    asset_links: Vec<String>,
}

impl Content {
    /// Content of a fragment that could not be fetched.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Content with the given body and asset links.
    pub fn new(body: Option<String>, asset_links: Vec<String>) -> Self {
        Self { body, asset_links }
    }

    /// Extracted markup, `None` for a degraded fragment.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Rendered `<link>` tags, in document order, duplicates included.
    pub fn asset_links(&self) -> &[String] {
        &self.asset_links
    }

    /// Splits the content into body and asset links.
    pub fn into_parts(self) -> (Option<String>, Vec<String>) {
        (self.body, self.asset_links)
    }
}

/// Turns fetched fragment responses into [`Content`].
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    content_element: String,
    stylesheet_header: HeaderName,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self {
            content_element: CONTENT_ELEMENT.to_string(),
            stylesheet_header: HeaderName::from_static(STYLESHEET_HEADER),
        }
    }
}

impl ContentExtractor {
    /// An extractor using the default marker element and stylesheet header.
    pub fn new() -> Self {
        Self::default()
    }

    /// An extractor using the names from `config`.
    pub fn from_config(config: &ComposingConfig) -> ComposerResult<Self> {
        let stylesheet_header = HeaderName::from_bytes(config.stylesheet_header.as_bytes())
            .map_err(|e| {
                ComposerError::Config(format!(
                    "Invalid stylesheet header '{}': {e}",
                    config.stylesheet_header
                ))
            })?;
        Ok(Self {
            content_element: config.content_element.clone(),
            stylesheet_header,
        })
    }

    /// Extracts content and asset links from a fetched fragment.
    ///
    /// A non-success status or a missing payload degrades to
    /// [`Content::empty`] and is only logged. Markup the parser rejects is
    /// an error.
    pub fn extract(&self, response: &Response<Option<Bytes>>, path: &str) -> ComposerResult<Content> {
        let status = response.status();
        let payload = match response.body() {
            Some(payload) if status.is_success() => payload,
            _ => {
                warn!(
                    path = %path,
                    status = status.as_u16(),
                    "Missing content, returning empty default"
                );
                return Ok(Content::empty());
            }
        };

        let text = String::from_utf8_lossy(payload);
        let (range, mut asset_links) = self
            .extract_text(&text)
            .inspect_err(|e| warn!(path = %path, error = %e, "Fragment markup rejected"))?;
        let body = range.slice(&text).unwrap_or_default().to_string();

        if let Some(href) = response
            .headers()
            .get(&self.stylesheet_header)
            .and_then(|v| v.to_str().ok())
        {
            asset_links.push(stylesheet_link(href));
        }

        debug!(
            path = %path,
            bytes = body.len(),
            links = asset_links.len(),
            "Extracted fragment content"
        );
        Ok(Content::new(Some(body), asset_links))
    }

    /// Parses fragment markup, returning the content range (the whole text
    /// when there is no marker element) and the asset links found.
    pub fn extract_text(&self, text: &str) -> ComposerResult<(ContentRange, Vec<String>)> {
        let mut handler = ContentMarkupHandler::new(self.content_element.as_str());
        parser::parse(text, &mut handler)?;
        let range = handler
            .content_range()
            .unwrap_or_else(|| ContentRange::whole(text));
        Ok((range, handler.into_asset_links()))
    }
}

fn stylesheet_link(href: &str) -> String {
    format!("<link rel=\"stylesheet\" href=\"{href}\" />")
}
