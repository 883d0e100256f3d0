//! Single-pass, non-validating HTML tokenizer.
//!
//! The parser walks the text once and reports what it sees to a
//! [`MarkupHandler`] as [`MarkupEvent`]s. Every offset is a byte offset into
//! the parsed `&str` and always falls on a character boundary. Nothing is
//! decoded: attribute values and text are reported as written.
//!
//! The tokenizer is lenient where browsers are (a `<` that does not start a
//! tag is text, unbalanced elements are fine) and fails on constructs it
//! cannot find the end of, such as an unterminated tag or comment.

use crate::range::ContentRange;
use composer_core::{ComposerError, ComposerResult};

/// Elements that never have content and are reported as standalone.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is text up to their closing tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Something the tokenizer found in the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupEvent<'a> {
    /// `<name` of an element with content. `offset` is the `<`.
    OpenElementStart {
        /// Element name as written.
        name: &'a str,
        /// Offset of the opening `<`.
        offset: usize,
    },
    /// The `>` closing an open tag. `offset` is just past it.
    OpenElementEnd {
        /// Element name as written.
        name: &'a str,
        /// Offset just past the closing `>`.
        offset: usize,
    },
    /// `<name` of a void or self-closing element.
    StandaloneElementStart {
        /// Element name as written.
        name: &'a str,
        /// Offset of the opening `<`.
        offset: usize,
    },
    /// The `>` or `/>` ending a standalone element.
    StandaloneElementEnd {
        /// Element name as written.
        name: &'a str,
        /// Offset just past the closing `>`.
        offset: usize,
        /// Whether the tag was written as `<name/>`.
        minimized: bool,
    },
    /// A whole closing tag `</name>`.
    CloseElement {
        /// Element name as written.
        name: &'a str,
        /// Offset of the `<` of `</name>`.
        start: usize,
        /// Offset just past the `>`.
        end: usize,
    },
    /// An attribute of the element most recently started.
    Attribute {
        /// Attribute name as written.
        name: &'a str,
        /// Raw value without surrounding quotes. Empty for bare attributes.
        value: &'a str,
    },
    /// Character data between markup.
    Text(ContentRange),
    /// `<!-- ... -->`
    Comment(ContentRange),
    /// `<![CDATA[ ... ]]>`
    Cdata(ContentRange),
    /// `<!DOCTYPE ...>` and other `<!...>` declarations.
    DocType(ContentRange),
    /// `<? ... >`
    ProcessingInstruction(ContentRange),
    /// End of input. `offset` is the text length.
    DocumentEnd {
        /// Length of the parsed text.
        offset: usize,
    },
}

/// Receives parse events. One handler instance serves exactly one parse.
pub trait MarkupHandler {
    /// Called once per event, in document order.
    fn handle(&mut self, event: &MarkupEvent<'_>);
}

/// Parses `text`, feeding every event to `handler`.
pub fn parse<H: MarkupHandler + ?Sized>(text: &str, handler: &mut H) -> ComposerResult<()> {
    Tokenizer::new(text).run(handler)
}

/// Case-insensitive element name comparison.
pub fn is_element(name: &str, expected: &str) -> bool {
    name.eq_ignore_ascii_case(expected)
}

struct Tag<'a> {
    name: &'a str,
    attributes: Vec<(&'a str, &'a str)>,
    end: usize,
    minimized: bool,
}

struct Tokenizer<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    text_start: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            text_start: 0,
        }
    }

    fn run<H: MarkupHandler + ?Sized>(mut self, handler: &mut H) -> ComposerResult<()> {
        while let Some(lt) = find_byte(self.bytes, self.pos, b'<') {
            let next = self.bytes.get(lt + 1).copied();
            match next {
                Some(b'!') | Some(b'?') | Some(b'/') => {}
                Some(b) if b.is_ascii_alphabetic() => {}
                // A stray `<` is text.
                _ => {
                    self.pos = lt + 1;
                    continue;
                }
            }
            self.flush_text(lt, handler);
            self.pos = self.markup(lt, handler)?;
            self.text_start = self.pos;
        }
        self.flush_text(self.bytes.len(), handler);
        handler.handle(&MarkupEvent::DocumentEnd {
            offset: self.bytes.len(),
        });
        Ok(())
    }

    fn flush_text<H: MarkupHandler + ?Sized>(&self, until: usize, handler: &mut H) {
        if until > self.text_start {
            handler.handle(&MarkupEvent::Text(ContentRange::between(
                self.text_start,
                until,
            )));
        }
    }

    /// Handles the construct starting at `lt` and returns the offset past it.
    fn markup<H: MarkupHandler + ?Sized>(&self, lt: usize, handler: &mut H) -> ComposerResult<usize> {
        let rest = &self.bytes[lt..];
        if rest.starts_with(b"<!--") {
            let end = self.find_str(lt + 4, "-->", lt, "Unterminated comment")? + 3;
            handler.handle(&MarkupEvent::Comment(ContentRange::between(lt, end)));
            Ok(end)
        } else if rest.starts_with(b"<![CDATA[") {
            let end = self.find_str(lt + 9, "]]>", lt, "Unterminated CDATA section")? + 3;
            handler.handle(&MarkupEvent::Cdata(ContentRange::between(lt, end)));
            Ok(end)
        } else if rest.starts_with(b"<!") {
            let end = self.find_str(lt + 2, ">", lt, "Unterminated declaration")? + 1;
            handler.handle(&MarkupEvent::DocType(ContentRange::between(lt, end)));
            Ok(end)
        } else if rest.starts_with(b"<?") {
            let end = self.find_str(lt + 2, ">", lt, "Unterminated processing instruction")? + 1;
            handler.handle(&MarkupEvent::ProcessingInstruction(
                ContentRange::between(lt, end),
            ));
            Ok(end)
        } else if rest.starts_with(b"</") {
            self.close_tag(lt, handler)
        } else {
            self.open_tag(lt, handler)
        }
    }

    fn close_tag<H: MarkupHandler + ?Sized>(&self, lt: usize, handler: &mut H) -> ComposerResult<usize> {
        let name_start = lt + 2;
        if !self
            .bytes
            .get(name_start)
            .is_some_and(u8::is_ascii_alphabetic)
        {
            return Err(self.error(lt, "Malformed closing tag"));
        }
        let name_end = self.scan_name(name_start);
        let end = self.find_str(name_end, ">", lt, "Unterminated closing tag")? + 1;
        handler.handle(&MarkupEvent::CloseElement {
            name: &self.text[name_start..name_end],
            start: lt,
            end,
        });
        Ok(end)
    }

    fn open_tag<H: MarkupHandler + ?Sized>(&self, lt: usize, handler: &mut H) -> ComposerResult<usize> {
        let tag = self.scan_tag(lt)?;
        let standalone = tag.minimized || VOID_ELEMENTS.iter().any(|v| is_element(tag.name, v));

        if standalone {
            handler.handle(&MarkupEvent::StandaloneElementStart {
                name: tag.name,
                offset: lt,
            });
        } else {
            handler.handle(&MarkupEvent::OpenElementStart {
                name: tag.name,
                offset: lt,
            });
        }
        for &(name, value) in &tag.attributes {
            handler.handle(&MarkupEvent::Attribute { name, value });
        }
        if standalone {
            handler.handle(&MarkupEvent::StandaloneElementEnd {
                name: tag.name,
                offset: tag.end,
                minimized: tag.minimized,
            });
            return Ok(tag.end);
        }
        handler.handle(&MarkupEvent::OpenElementEnd {
            name: tag.name,
            offset: tag.end,
        });

        if RAW_TEXT_ELEMENTS.iter().any(|r| is_element(tag.name, r)) {
            // Skip to the matching close tag; what lies between is text.
            let closing = format!("</{}", tag.name);
            let resume = find_ignore_case(self.bytes, tag.end, closing.as_bytes())
                .unwrap_or(self.bytes.len());
            self.flush_raw_text(tag.end, resume, handler);
            return Ok(resume);
        }
        Ok(tag.end)
    }

    fn flush_raw_text<H: MarkupHandler + ?Sized>(&self, start: usize, end: usize, handler: &mut H) {
        if end > start {
            handler.handle(&MarkupEvent::Text(ContentRange::between(start, end)));
        }
    }

    fn scan_tag(&self, lt: usize) -> ComposerResult<Tag<'a>> {
        let name_start = lt + 1;
        let name_end = self.scan_name(name_start);
        let mut tag = Tag {
            name: &self.text[name_start..name_end],
            attributes: Vec::new(),
            end: name_end,
            minimized: false,
        };
        let mut i = name_end;
        loop {
            i = self.skip_whitespace(i);
            let Some(&b) = self.bytes.get(i) else {
                return Err(self.error(lt, format!("Unterminated tag <{}", tag.name)));
            };
            match b {
                b'>' => {
                    tag.end = i + 1;
                    return Ok(tag);
                }
                b'/' if self.bytes.get(i + 1) == Some(&b'>') => {
                    tag.end = i + 2;
                    tag.minimized = true;
                    return Ok(tag);
                }
                b'/' => i += 1,
                _ => {
                    let (attribute, next) = self.scan_attribute(i, lt)?;
                    tag.attributes.push(attribute);
                    i = next;
                }
            }
        }
    }

    fn scan_attribute(&self, start: usize, lt: usize) -> ComposerResult<((&'a str, &'a str), usize)> {
        let mut i = start + 1;
        while let Some(&b) = self.bytes.get(i) {
            if b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/') {
                break;
            }
            i += 1;
        }
        let name = &self.text[start..i];

        let after_name = self.skip_whitespace(i);
        if self.bytes.get(after_name) != Some(&b'=') {
            return Ok(((name, ""), i));
        }
        let value_start = self.skip_whitespace(after_name + 1);
        match self.bytes.get(value_start) {
            None => Err(self.error(lt, format!("Unterminated tag, attribute '{name}' has no value"))),
            Some(&quote @ (b'"' | b'\'')) => {
                let close = find_byte(self.bytes, value_start + 1, quote).ok_or_else(|| {
                    self.error(value_start, format!("Unterminated value of attribute '{name}'"))
                })?;
                Ok(((name, &self.text[value_start + 1..close]), close + 1))
            }
            Some(_) => {
                let mut end = value_start;
                while let Some(&b) = self.bytes.get(end) {
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    end += 1;
                }
                Ok(((name, &self.text[value_start..end]), end))
            }
        }
    }

    fn scan_name(&self, start: usize) -> usize {
        let mut i = start;
        while let Some(&b) = self.bytes.get(i) {
            if b.is_ascii_whitespace() || b == b'>' || b == b'/' {
                break;
            }
            i += 1;
        }
        i
    }

    fn skip_whitespace(&self, mut i: usize) -> usize {
        while self.bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        i
    }

    fn find_str(&self, from: usize, needle: &str, lt: usize, message: &str) -> ComposerResult<usize> {
        self.text
            .get(from..)
            .and_then(|rest| rest.find(needle))
            .map(|at| from + at)
            .ok_or_else(|| self.error(lt, message))
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> ComposerError {
        ComposerError::markup_parse(self.text, offset, message)
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|b| *b == needle)
        .map(|at| from + at)
}

fn find_ignore_case(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|at| from + at)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    /// Records events as owned strings for easy assertions.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl MarkupHandler for Recorder {
        fn handle(&mut self, event: &MarkupEvent<'_>) {
            let line = match event {
                MarkupEvent::OpenElementStart { name, offset } => format!("open {name}@{offset}"),
                MarkupEvent::OpenElementEnd { name, offset } => format!("open-end {name}@{offset}"),
                MarkupEvent::StandaloneElementStart { name, .. } => format!("standalone {name}"),
                MarkupEvent::StandaloneElementEnd { minimized, .. } => {
                    format!("standalone-end minimized={minimized}")
                }
                MarkupEvent::CloseElement { name, start, end } => {
                    format!("close {name}@{start}..{end}")
                }
                MarkupEvent::Attribute { name, value } => format!("attr {name}={value}"),
                MarkupEvent::Text(r) => format!("text {}..{}", r.start(), r.end()),
                MarkupEvent::Comment(_) => "comment".to_string(),
                MarkupEvent::Cdata(_) => "cdata".to_string(),
                MarkupEvent::DocType(_) => "doctype".to_string(),
                MarkupEvent::ProcessingInstruction(_) => "pi".to_string(),
                MarkupEvent::DocumentEnd { offset } => format!("end@{offset}"),
            };
            self.events.push(line);
        }
    }

    fn events(text: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        parse(text, &mut recorder).unwrap();
        recorder.events
    }

    #[test]
    fn test_open_and_close_offsets() {
        assert_eq!(
            events("<div>hi</div>"),
            vec![
                "open div@0",
                "open-end div@5",
                "text 5..7",
                "close div@7..13",
                "end@13"
            ]
        );
    }

    #[test]
    fn test_attributes_in_encounter_order() {
        let events = events(r#"<a href="/x" data-id='7' hidden title=plain>"#);
        assert_eq!(
            &events[1..5],
            &["attr href=/x", "attr data-id=7", "attr hidden=", "attr title=plain"]
        );
    }

    #[test]
    fn test_void_and_minimized_elements_are_standalone() {
        let events = events(r#"<link rel="x"><br/><custom-thing />"#);
        assert_eq!(
            events,
            vec![
                "standalone link",
                "attr rel=x",
                "standalone-end minimized=false",
                "standalone br",
                "standalone-end minimized=true",
                "standalone custom-thing",
                "standalone-end minimized=true",
                "end@35"
            ]
        );
    }

    #[test]
    fn test_comments_doctype_and_cdata() {
        let events = events("<!DOCTYPE html><!-- <b> --><![CDATA[<x>]]><?xml v?>");
        assert_eq!(events, vec!["doctype", "comment", "cdata", "pi", "end@51"]);
    }

    #[test]
    fn test_script_content_is_text() {
        let events = events("<script>if (a<b) { x = '</div>'; }</SCRIPT>");
        assert_eq!(
            events,
            vec![
                "open script@0",
                "open-end script@8",
                "text 8..34",
                "close SCRIPT@34..43",
                "end@43"
            ]
        );
    }

    #[test]
    fn test_stray_less_than_is_text() {
        assert_eq!(events("a < b <3"), vec!["text 0..8", "end@8"]);
    }

    #[test]
    fn test_multibyte_text_offsets() {
        let text = "<p>grüße</p>";
        let events = events(text);
        let close = text.find("</p>").unwrap();
        assert_eq!(events[2], format!("text 3..{close}"));
    }

    #[test]
    fn test_unterminated_constructs_fail() {
        for bad in [
            "<div class=\"x",
            "<div",
            "<!-- open",
            "<![CDATA[ open",
            "<!DOCTYPE",
            "</div",
            "</ div>",
            "<a href=",
        ] {
            let mut recorder = Recorder::default();
            let err = parse(bad, &mut recorder).unwrap_err();
            assert!(
                matches!(err, ComposerError::MarkupParse { .. }),
                "expected parse error for {bad:?}, got {err}"
            );
        }
    }

    #[test]
    fn test_error_reports_line() {
        let mut recorder = Recorder::default();
        let err = parse("<html>\n<body>\n<p class=\"oops>", &mut recorder).unwrap_err();
        match err {
            ComposerError::MarkupParse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
