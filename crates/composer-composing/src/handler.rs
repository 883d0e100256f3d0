//! Parse-event handlers that pull asset links and the content range out of
//! a fragment.
//!
//! Handlers keep per-parse state and are used for exactly one parse.

use crate::parser::{is_element, MarkupEvent, MarkupHandler};
use crate::range::ContentRange;
use composer_core::{ASSET_INCLUDE_OPTION, ASSET_OPTIONS_ATTRIBUTE};

const HEAD_ELEMENT: &str = "head";
const LINK_ELEMENT: &str = "link";

/// Where the asset collector is relative to the document head.
#[derive(Debug, Default)]
enum HeadState {
    #[default]
    Idle,
    InHead,
    /// Inside `<head>`, collecting the attributes of a `<link>`.
    CapturingLink(Vec<(String, String)>),
}

/// Collects the `<link>` elements of `<head>` that opt into injection via
/// `data-rd-options="include"`.
#[derive(Debug, Default)]
pub struct AssetMarkupHandler {
    state: HeadState,
    links: Vec<String>,
}

impl AssetMarkupHandler {
    /// A handler for one parse.
    pub fn new() -> Self {
        Self::default()
    }

    /// Links collected so far, rendered, in document order.
    pub fn asset_links(&self) -> &[String] {
        &self.links
    }

    /// Consumes the handler, returning the collected links.
    pub fn into_asset_links(self) -> Vec<String> {
        self.links
    }

    fn start_link(&mut self) {
        self.state = HeadState::CapturingLink(Vec::new());
    }

    /// Ends a pending link capture, keeping the link if it opted in.
    fn flush_link(&mut self) {
        if !matches!(self.state, HeadState::CapturingLink(_)) {
            return;
        }
        if let HeadState::CapturingLink(attributes) =
            std::mem::replace(&mut self.state, HeadState::InHead)
        {
            if is_included(&attributes) {
                self.links.push(render_link(&attributes));
            }
        }
    }

    fn in_head(&self) -> bool {
        !matches!(self.state, HeadState::Idle)
    }
}

impl MarkupHandler for AssetMarkupHandler {
    fn handle(&mut self, event: &MarkupEvent<'_>) {
        match *event {
            MarkupEvent::OpenElementStart { name, .. } => {
                self.flush_link();
                if is_element(name, HEAD_ELEMENT) {
                    self.state = HeadState::InHead;
                } else if self.in_head() && is_element(name, LINK_ELEMENT) {
                    self.start_link();
                }
            }
            MarkupEvent::StandaloneElementStart { name, .. } => {
                self.flush_link();
                if self.in_head() && is_element(name, LINK_ELEMENT) {
                    self.start_link();
                }
            }
            MarkupEvent::Attribute { name, value } => {
                if let HeadState::CapturingLink(attributes) = &mut self.state {
                    match attributes.iter_mut().find(|(n, _)| n == name) {
                        Some(existing) => existing.1 = value.to_string(),
                        None => attributes.push((name.to_string(), value.to_string())),
                    }
                }
            }
            MarkupEvent::CloseElement { name, .. } => {
                if is_element(name, LINK_ELEMENT) {
                    self.flush_link();
                } else if is_element(name, HEAD_ELEMENT) {
                    self.flush_link();
                    self.state = HeadState::Idle;
                }
            }
            MarkupEvent::DocumentEnd { .. } => self.flush_link(),
            _ => {}
        }
    }
}

fn is_included(attributes: &[(String, String)]) -> bool {
    attributes
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(ASSET_OPTIONS_ATTRIBUTE))
        .is_some_and(|(_, value)| value.contains(ASSET_INCLUDE_OPTION))
}

fn render_link(attributes: &[(String, String)]) -> String {
    let mut link = String::from("<link ");
    for (name, value) in attributes {
        link.push_str(name);
        link.push_str("=\"");
        link.push_str(value);
        link.push_str("\" ");
    }
    link.push_str("/>");
    link
}

/// Where the content marker element is in the parse.
#[derive(Debug, Clone, Copy)]
enum MarkerState {
    Searching,
    Open { start: usize },
    Found(ContentRange),
}

/// Collects asset links and the inner range of the first content marker
/// element (e.g. `<rewe-digital-content>`).
///
/// Only the first marker counts; later or nested markers are ignored.
#[derive(Debug)]
pub struct ContentMarkupHandler {
    assets: AssetMarkupHandler,
    content_element: String,
    marker: MarkerState,
}

impl ContentMarkupHandler {
    /// A handler for one parse looking for `content_element`.
    pub fn new(content_element: impl Into<String>) -> Self {
        Self {
            assets: AssetMarkupHandler::new(),
            content_element: content_element.into(),
            marker: MarkerState::Searching,
        }
    }

    /// Range between the marker's opening and closing tags, if a marker was
    /// opened and closed.
    pub fn content_range(&self) -> Option<ContentRange> {
        match self.marker {
            MarkerState::Found(range) => Some(range),
            MarkerState::Searching | MarkerState::Open { .. } => None,
        }
    }

    /// Links collected so far.
    pub fn asset_links(&self) -> &[String] {
        self.assets.asset_links()
    }

    /// Consumes the handler, returning the collected links.
    pub fn into_asset_links(self) -> Vec<String> {
        self.assets.into_asset_links()
    }
}

impl MarkupHandler for ContentMarkupHandler {
    fn handle(&mut self, event: &MarkupEvent<'_>) {
        self.assets.handle(event);
        match (*event, self.marker) {
            (MarkupEvent::OpenElementEnd { name, offset }, MarkerState::Searching)
                if is_element(name, &self.content_element) =>
            {
                self.marker = MarkerState::Open { start: offset };
            }
            (MarkupEvent::CloseElement { name, start: end, .. }, MarkerState::Open { start })
                if is_element(name, &self.content_element) =>
            {
                if let Ok(range) = ContentRange::new(start, end) {
                    self.marker = MarkerState::Found(range);
                }
            }
            _ => {}
        }
    }
}
