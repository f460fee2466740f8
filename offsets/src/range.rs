//! Character ranges and range-based text splitting.
//!
//! Offsets count Unicode scalar values, not bytes, so a range stays valid no
//! matter how the text is encoded on the wire.

use serde::{Deserialize, Serialize};

use crate::error::{RangeError, Result};

/// A half-open `[start, end)` range of character offsets with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharRange {
    /// First character covered by the range.
    pub start: usize,

    /// One past the last character covered by the range.
    pub end: usize,
}

impl CharRange {
    /// Create a range, rejecting `end <= start`.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if end <= start {
            return Err(RangeError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create a range that must also fit inside a text of `len` characters.
    pub fn within(start: usize, end: usize, len: usize) -> Result<Self> {
        let range = Self::new(start, end)?;
        if end > len {
            return Err(RangeError::OutOfBounds { end, len });
        }
        Ok(range)
    }

    /// Number of characters covered.
    pub fn char_count(&self) -> usize {
        self.end - self.start
    }

    /// Whether `offset` falls inside the range.
    pub fn contains(&self, offset: usize) -> bool {
        (self.start..self.end).contains(&offset)
    }

    /// Whether two ranges share at least one character.
    pub fn overlaps(&self, other: &CharRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the range fits inside a text of `len` characters.
    pub fn fits(&self, len: usize) -> bool {
        self.end <= len
    }
}

/// The three parts of a text split around a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    pub before: &'a str,
    pub mid: &'a str,
    pub after: &'a str,
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the character at `chars`, or `text.len()` when `chars` equals
/// the character count.
fn byte_offset(text: &str, chars: usize) -> Option<usize> {
    text.char_indices()
        .map(|(index, _)| index)
        .chain(std::iter::once(text.len()))
        .nth(chars)
}

/// Slice `text` by character offsets. Returns `None` when the range does not
/// fit the text.
pub fn slice_chars(text: &str, range: CharRange) -> Option<&str> {
    let start = byte_offset(text, range.start)?;
    let end = byte_offset(text, range.end)?;
    text.get(start..end)
}

/// Split `text` into the parts before, inside and after `[start, end)`.
///
/// Invalid ranges (`end <= start` or `end` past the text) leave the whole
/// text in `before`. `before + mid + after == text` holds for every input.
pub fn split_by_range(text: &str, start: usize, end: usize) -> Split<'_> {
    let whole = Split {
        before: text,
        mid: "",
        after: "",
    };
    if end <= start {
        return whole;
    }

    let (Some(start), Some(end)) = (byte_offset(text, start), byte_offset(text, end)) else {
        return whole;
    };

    Split {
        before: &text[..start],
        mid: &text[start..end],
        after: &text[end..],
    }
}
