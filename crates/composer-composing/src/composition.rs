//! The composition tree.
//!
//! A [`Composition`] pairs a template with the range of it that gets
//! embedded, the asset links it declared, its session and the child
//! compositions replacing parts of that range. Rendering walks the tree
//! once, copying template text between children and recursing into them.

use crate::extractor::Content;
use crate::range::ContentRange;
use composer_core::{ComposerError, ComposerResult};
use composer_session::Session;
use std::collections::HashSet;
use tracing::debug;

const HEAD_CLOSE: &str = "</head>";

/// One node of the composition tree. Immutable: every transformation
/// returns a new value.
#[derive(Debug, Clone)]
pub struct Composition {
    template: String,
    content_range: ContentRange,
    /// Where this node goes in its parent's template.
    placement: ContentRange,
    asset_links: Vec<String>,
    children: Vec<Composition>,
    session: Session,
}

impl Composition {
    /// Builds a node with an empty session.
    ///
    /// Fails if `content_range` is not a valid range of `template`, or if the
    /// children's placements are not ascending, non-overlapping, inside
    /// `content_range` and on character boundaries.
    pub fn new(
        template: impl Into<String>,
        content_range: ContentRange,
        asset_links: Vec<String>,
        children: Vec<Composition>,
    ) -> ComposerResult<Self> {
        let template = template.into();
        if content_range.slice(&template).is_none() {
            return Err(ComposerError::Structure(format!(
                "Content range {}..{} is not within a template of {} bytes",
                content_range.start(),
                content_range.end(),
                template.len()
            )));
        }
        check_children(&template, content_range, &children)?;
        Ok(Self {
            placement: ContentRange::whole(&template),
            template,
            content_range,
            asset_links,
            children,
            session: Session::empty(),
        })
    }

    /// Builds a node from extracted fragment content. A degraded fragment
    /// becomes an empty template.
    pub fn from_content(content: Content, children: Vec<Composition>) -> ComposerResult<Self> {
        let (body, asset_links) = content.into_parts();
        let template = body.unwrap_or_default();
        let range = ContentRange::whole(&template);
        Self::new(template, range, asset_links, children)
    }

    /// Places this node at `[start, end)` of its parent's template.
    pub fn for_range(self, start: usize, end: usize) -> ComposerResult<Self> {
        Ok(Self {
            placement: ContentRange::new(start, end)?,
            ..self
        })
    }

    /// Replaces this node's session.
    pub fn with_session(self, session: Session) -> Self {
        Self { session, ..self }
    }

    /// Where this node goes in its parent's template.
    pub fn placement(&self) -> ContentRange {
        self.placement
    }

    /// This node's own session, without its children's.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Renders this node's body with its children spliced in. No asset
    /// injection happens here.
    pub fn render(&self) -> ComposerResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut links = Vec::new();
        self.render_into(&mut out, &mut links)?;
        Ok(out)
    }

    /// Asset links of this node and all descendants, each node's own links
    /// before its descendants', deduplicated keeping first occurrences.
    pub fn asset_links(&self) -> Vec<String> {
        let mut links = self.asset_links.clone();
        self.collect_child_links(&mut links);
        dedupe(links)
    }

    /// Renders the page and injects the deduplicated asset links before the
    /// first `</head>`. Without a `</head>` the links are dropped.
    pub fn body_with_assets(&self) -> ComposerResult<String> {
        let mut body = String::with_capacity(self.template.len());
        let mut links = self.asset_links.clone();
        self.render_into(&mut body, &mut links)?;
        Ok(inject_asset_links(body, &dedupe(links)))
    }

    /// Merges the sessions of the tree: children left to right, each already
    /// merged with its own descendants, then this node's session on top.
    ///
    /// A node carrying a [`SessionRoot`](composer_session::SessionRoot) yields a root: its id and values win
    /// over the descendants', and it turns dirty when they add anything.
    pub fn merged_session(&self) -> Session {
        let below = self
            .children
            .iter()
            .fold(Session::empty(), |merged, child| {
                merged.with_values_merged_from(&child.merged_session())
            });
        match &self.session {
            Session::Root(root) => Session::Root(root.with_values_merged_beneath(&below)),
            Session::Fragment(_) => below.with_values_merged_from(&self.session),
        }
    }

    /// Hands the rendered page and the merged session to `combine`.
    pub fn to_response<R>(&self, combine: impl FnOnce(String, Session) -> R) -> ComposerResult<R> {
        Ok(combine(self.body_with_assets()?, self.merged_session()))
    }

    /// Appends this node's body to `out` and its descendants' asset links
    /// to `links`.
    fn render_into(&self, out: &mut String, links: &mut Vec<String>) -> ComposerResult<()> {
        let mut cursor = self.content_range.start();
        for child in &self.children {
            cursor = self.copy_template(out, cursor, child.placement.start())?;
            links.extend(child.asset_links.iter().cloned());
            child.render_into(out, links)?;
            cursor = child.placement.end();
        }
        self.copy_template(out, cursor, self.content_range.end())?;
        Ok(())
    }

    /// Copies `template[from..to]` to `out` and returns the new cursor.
    fn copy_template(&self, out: &mut String, from: usize, to: usize) -> ComposerResult<usize> {
        let chunk = self.template.get(from..to).ok_or_else(|| {
            ComposerError::Structure(format!(
                "Cannot copy template bytes {from}..{to} of {}",
                self.template.len()
            ))
        })?;
        out.push_str(chunk);
        Ok(to)
    }

    fn collect_child_links(&self, links: &mut Vec<String>) {
        for child in &self.children {
            links.extend(child.asset_links.iter().cloned());
            child.collect_child_links(links);
        }
    }
}

fn check_children(
    template: &str,
    content_range: ContentRange,
    children: &[Composition],
) -> ComposerResult<()> {
    let mut cursor = content_range.start();
    for (index, child) in children.iter().enumerate() {
        let placement = child.placement;
        if placement.start() < cursor {
            return Err(ComposerError::Structure(format!(
                "Child {index} at {}..{} overlaps or precedes the text before it (cursor {cursor})",
                placement.start(),
                placement.end()
            )));
        }
        if !content_range.contains(&placement) {
            return Err(ComposerError::Structure(format!(
                "Child {index} at {}..{} is outside the content range {}..{}",
                placement.start(),
                placement.end(),
                content_range.start(),
                content_range.end()
            )));
        }
        if placement.slice(template).is_none() {
            return Err(ComposerError::Structure(format!(
                "Child {index} at {}..{} splits a character",
                placement.start(),
                placement.end()
            )));
        }
        cursor = placement.end();
    }
    Ok(())
}

fn dedupe(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

fn inject_asset_links(body: String, links: &[String]) -> String {
    if links.is_empty() {
        return body;
    }
    let Some(at) = body.find(HEAD_CLOSE) else {
        debug!(links = links.len(), "No </head> in composed page, asset links dropped");
        return body;
    };
    let assets = links.join("\n");
    let mut out = String::with_capacity(body.len() + assets.len() + 1);
    out.push_str(&body[..at]);
    out.push_str(&assets);
    out.push('\n');
    out.push_str(&body[at..]);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::extractor::ContentExtractor;
    use composer_session::{SessionFragment, SessionRoot};

    fn leaf(body: &str) -> Composition {
        Composition::from_content(Content::new(Some(body.to_string()), vec![]), vec![]).unwrap()
    }

    fn spanning(template: &str, pattern: &str) -> (usize, usize) {
        let start = template.find(pattern).unwrap();
        (start, start + pattern.len())
    }

    #[test]
    fn test_splices_child_into_template() {
        let template = "<div>BEFORE<marker></marker>AFTER</div>";
        let (start, end) = spanning(template, "<marker></marker>");
        let child = leaf("X").for_range(start, end).unwrap();
        let root = Composition::new(template, ContentRange::whole(template), vec![], vec![child])
            .unwrap();
        assert_eq!(root.render().unwrap(), "<div>BEFOREXAFTER</div>");
    }

    #[test]
    fn test_renders_only_content_range() {
        let template = "<html><c>inner</c></html>";
        let (start, end) = spanning(template, "inner");
        let node = Composition::new(template, ContentRange::new(start, end).unwrap(), vec![], vec![])
            .unwrap();
        assert_eq!(node.render().unwrap(), "inner");
    }

    #[test]
    fn test_rejects_overlapping_children() {
        let template = "0123456789";
        let a = leaf("a").for_range(1, 5).unwrap();
        let b = leaf("b").for_range(4, 6).unwrap();
        let err = Composition::new(template, ContentRange::whole(template), vec![], vec![a, b])
            .unwrap_err();
        assert!(matches!(err, ComposerError::Structure(_)));
    }

    #[test]
    fn test_rejects_unordered_children() {
        let template = "0123456789";
        let a = leaf("a").for_range(6, 8).unwrap();
        let b = leaf("b").for_range(1, 2).unwrap();
        assert!(Composition::new(template, ContentRange::whole(template), vec![], vec![a, b]).is_err());
    }

    #[test]
    fn test_rejects_child_outside_content_range() {
        let template = "0123456789";
        let child = leaf("a").for_range(7, 12).unwrap();
        let range = ContentRange::new(0, 8).unwrap();
        assert!(Composition::new(template, range, vec![], vec![child]).is_err());
    }

    #[test]
    fn test_rejects_range_splitting_a_character() {
        let template = "añb";
        let child = leaf("x").for_range(1, 2).unwrap();
        assert!(Composition::new(template, ContentRange::whole(template), vec![], vec![child]).is_err());
        assert!(Composition::new(template, ContentRange::new(0, 2).unwrap(), vec![], vec![]).is_err());
    }

    #[test]
    fn test_adjacent_children_are_allowed() {
        let template = "[a][b]";
        let a = leaf("A").for_range(0, 3).unwrap();
        let b = leaf("B").for_range(3, 6).unwrap();
        let root = Composition::new(template, ContentRange::whole(template), vec![], vec![a, b]).unwrap();
        assert_eq!(root.render().unwrap(), "AB");
    }

    #[test]
    fn test_no_head_drops_assets() {
        let node = Composition::new(
            "<div></div>",
            ContentRange::whole("<div></div>"),
            vec!["<link />".to_string()],
            vec![],
        )
        .unwrap();
        assert_eq!(node.body_with_assets().unwrap(), "<div></div>");
    }

    #[test]
    fn test_empty_asset_list_leaves_head_untouched() {
        let page = "<html><head></head><body></body></html>";
        let node = Composition::new(page, ContentRange::whole(page), vec![], vec![]).unwrap();
        assert_eq!(node.body_with_assets().unwrap(), page);
    }

    #[test]
    fn test_for_range_sets_placement() {
        let node = leaf("x");
        assert_eq!(node.placement(), ContentRange::whole("x"));
        let placed = node.for_range(4, 9).unwrap();
        assert_eq!(placed.placement(), ContentRange::new(4, 9).unwrap());
        assert!(leaf("x").for_range(5, 2).is_err());
    }

    #[test]
    fn test_children_inside_marker_range() {
        let template = "<html><body><rewe-digital-content>[<slot></slot>]</rewe-digital-content></body></html>";
        let (range, _) = ContentExtractor::new().extract_text(template).unwrap();
        assert!(range.start() > 0);
        let (start, end) = spanning(template, "<slot></slot>");
        let child = leaf("X").for_range(start, end).unwrap();
        let node = Composition::new(template, range, vec![], vec![child]).unwrap();
        assert_eq!(node.render().unwrap(), "[X]");
    }

    #[test]
    fn test_root_session_survives_forged_child_id() {
        let template = "<html><head></head><body><slot></slot></body></html>";
        let (start, end) = spanning(template, "<slot></slot>");
        let child = leaf("X")
            .for_range(start, end)
            .unwrap()
            .with_session(Session::from(SessionFragment::from_entries([
                ("session-id", "forged"),
                ("basket", "3"),
            ])));
        let root = Composition::new(template, ContentRange::whole(template), vec![], vec![child])
            .unwrap()
            .with_session(Session::from(SessionRoot::of([("session-id", "initial")])));

        let merged = root.merged_session();
        assert!(matches!(merged, Session::Root(_)));
        assert_eq!(merged.id(), Some("initial"));
        assert_eq!(merged.get("basket"), Some("3"));
        assert!(merged.is_dirty());

        let (body, session) = root.to_response(|body, session| (body, session)).unwrap();
        assert_eq!(body, "<html><head></head><body>X</body></html>");
        assert_eq!(session, merged);
    }

    #[test]
    fn test_root_session_stays_clean_without_new_values() {
        let child = leaf("X")
            .for_range(0, 1)
            .unwrap()
            .with_session(Session::from(SessionFragment::from_entries([("basket", "2")])));
        let root = Composition::new("_", ContentRange::whole("_"), vec![], vec![child])
            .unwrap()
            .with_session(Session::from(SessionRoot::of([("basket", "2")])));
        assert!(!root.merged_session().is_dirty());
    }

    #[test]
    fn test_own_fragment_session_wins_over_children() {
        let child = leaf("X")
            .for_range(0, 1)
            .unwrap()
            .with_session(Session::from(SessionFragment::from_entries([("k", "child")])));
        let node = Composition::new("_", ContentRange::whole("_"), vec![], vec![child])
            .unwrap()
            .with_session(Session::from(SessionFragment::from_entries([("k", "own")])));
        let merged = node.merged_session();
        assert!(matches!(merged, Session::Fragment(_)));
        assert_eq!(merged.get("k"), Some("own"));
    }
}
