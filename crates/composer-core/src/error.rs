//! Error type shared by all composer crates.

use thiserror::Error;

/// A convenience `Result` alias using [`ComposerError`].
pub type ComposerResult<T> = Result<T, ComposerError>;

/// Top-level error type for the composer.
///
/// A fragment that could not be fetched is not an error: extraction degrades
/// to empty content and logs a warning instead.
#[derive(Error, Debug)]
pub enum ComposerError {
    /// The markup parser rejected a fragment.
    #[error("Markup parse error at line {line}, column {column}: {message}")]
    MarkupParse {
        /// What went wrong.
        message: String,
        /// Byte offset into the parsed text.
        offset: usize,
        /// 1-based line of `offset`.
        line: usize,
        /// 1-based column (in characters) of `offset`.
        column: usize,
    },

    /// Child ranges of a composition overlap, are out of order or out of bounds.
    #[error("Structural violation: {0}")]
    Structure(String),

    /// The session write-back serializer failed.
    #[error("Session serialization error: {0}")]
    SessionSerialization(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposerError {
    /// Builds a [`ComposerError::MarkupParse`] for `offset` in `text`,
    /// resolving the line and column the offset falls on.
    pub fn markup_parse(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(text.len());
        let mut line = 1;
        let mut line_start = 0;
        for (i, b) in text.as_bytes()[..offset].iter().enumerate() {
            if *b == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        let column = text
            .get(line_start..offset)
            .map_or(offset - line_start, |prefix| prefix.chars().count())
            + 1;
        Self::MarkupParse {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_parse_position_first_line() {
        let err = ComposerError::markup_parse("<div", 4, "unterminated tag");
        match err {
            ComposerError::MarkupParse { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_markup_parse_position_later_line() {
        let text = "<p>\nab\n<a href=\"x";
        let err = ComposerError::markup_parse(text, 10, "unterminated attribute value");
        assert_eq!(
            err.to_string(),
            "Markup parse error at line 3, column 4: unterminated attribute value"
        );
    }

    #[test]
    fn test_markup_parse_offset_clamped() {
        let err = ComposerError::markup_parse("abc", 99, "eof");
        assert!(matches!(err, ComposerError::MarkupParse { offset: 3, .. }));
    }
}
