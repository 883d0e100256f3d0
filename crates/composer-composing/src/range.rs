//! Byte ranges into fragment text.

use composer_core::{ComposerError, ComposerResult};
use serde::Serialize;

/// A half-open byte range `[start, end)` into one specific text buffer.
///
/// A range is only meaningful for the buffer it was computed from. Slicing
/// goes through [`ContentRange::slice`], which refuses ranges that are out
/// of bounds or do not fall on UTF-8 character boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContentRange {
    start: usize,
    end: usize,
}

impl ContentRange {
    /// Creates a range. Fails if `start > end`.
    pub fn new(start: usize, end: usize) -> ComposerResult<Self> {
        if start > end {
            return Err(ComposerError::Structure(format!(
                "Range start {start} is after its end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A range the caller already knows to be ordered.
    pub(crate) fn between(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// The range covering all of `text`.
    pub fn whole(text: &str) -> Self {
        Self {
            start: 0,
            end: text.len(),
        }
    }

    /// First byte of the range.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains(&self, other: &ContentRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The text this range covers, if it is in bounds and on char boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}
