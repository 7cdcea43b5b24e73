//! Rope-based text buffer abstraction.
//!
//! The completion engine only ever edits a single line at a time (the line
//! holding the insertion point), so the mutation surface here is line scoped:
//! `replace_line` swaps a whole line, `splice` replaces a byte range inside one
//! line. Both keep the trailing newline untouched.

use std::ops::Range;

use anyhow::{Result, bail};
use ropey::Rope;

pub mod class;

/// A text buffer backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
}

/// A position inside a buffer expressed as (line index, byte offset within that line).
/// Byte offsets are expected on UTF-8 code unit boundaries; callers that walk
/// text use the `grapheme` and `class` helpers to stay on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub byte: usize,
}

impl Position {
    pub fn new(line: usize, byte: usize) -> Self {
        Self { line, byte }
    }
    pub fn origin() -> Self {
        Self { line: 0, byte: 0 }
    }
    pub fn clamp_to<F>(&mut self, line_count: usize, mut line_len_fn: F)
    where
        F: FnMut(usize) -> usize,
    {
        if line_count == 0 {
            self.line = 0;
            self.byte = 0;
            return;
        }
        if self.line >= line_count {
            self.line = line_count - 1;
        }
        let max_len = line_len_fn(self.line);
        if self.byte > max_len {
            self.byte = max_len;
        }
    }
}

impl Buffer {
    /// Construct a buffer from an in-memory string slice.
    pub fn from_str(name: impl Into<String>, content: &str) -> Result<Self> {
        Ok(Self {
            rope: Rope::from_str(content),
            name: name.into(),
        })
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Return the requested line as an owned `String` (including trailing newline if present).
    pub fn line(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            Some(self.rope.line(idx).to_string())
        } else {
            None
        }
    }

    /// Return the requested line without its trailing newline.
    pub fn line_content(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            Some(self.line_content_string(idx))
        } else {
            None
        }
    }

    /// Byte length of a line (excluding any newline) for clamping purposes.
    pub fn line_byte_len(&self, idx: usize) -> usize {
        if idx >= self.rope.len_lines() {
            return 0;
        }
        let line = self.rope.line(idx);
        let len = line.len_bytes();
        if len > 0 && line.byte(len - 1) == b'\n' {
            len - 1
        } else {
            len
        }
    }

    /// Whole buffer contents.
    pub fn contents(&self) -> String {
        self.rope.to_string()
    }

    fn line_content_string(&self, idx: usize) -> String {
        let mut s = self.rope.line(idx).to_string();
        if s.ends_with('\n') {
            s.pop();
        }
        s
    }

    fn char_index(&self, line: usize, byte_in_line: usize) -> usize {
        let line_start_byte = self.rope.line_to_byte(line);
        self.rope.byte_to_char(line_start_byte + byte_in_line)
    }

    /// Replace the text of line `idx` (newline excluded) with `text`.
    pub fn replace_line(&mut self, idx: usize, text: &str) -> Result<()> {
        if idx >= self.rope.len_lines() {
            bail!("line {idx} out of range ({} lines)", self.rope.len_lines());
        }
        let len = self.line_byte_len(idx);
        self.splice(idx, 0..len, text)
    }

    /// Replace the byte range `range` inside line `line` with `text`.
    ///
    /// The range must lie within the line content (newline excluded) and on
    /// character boundaries.
    pub fn splice(&mut self, line: usize, range: Range<usize>, text: &str) -> Result<()> {
        if line >= self.rope.len_lines() {
            bail!("line {line} out of range ({} lines)", self.rope.len_lines());
        }
        let content = self.line_content_string(line);
        if range.start > range.end
            || range.end > content.len()
            || !content.is_char_boundary(range.start)
            || !content.is_char_boundary(range.end)
        {
            bail!(
                "splice range {}..{} invalid for line {line} of length {}",
                range.start,
                range.end,
                content.len()
            );
        }
        let start_char = self.char_index(line, range.start);
        let end_char = self.char_index(line, range.end);
        if start_char != end_char {
            self.rope.remove(start_char..end_char);
        }
        if !text.is_empty() {
            self.rope.insert(start_char, text);
        }
        Ok(())
    }
}

/// Grapheme helpers. These are pure functions operating on a single line.
pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;

    /// Previous grapheme boundary (returns 0 if already at or below 1st boundary).
    pub fn prev_boundary(line: &str, byte: usize) -> usize {
        if byte == 0 || byte > line.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// `byte` clamped to the line and moved back onto a char boundary.
    pub fn floor_char(line: &str, byte: usize) -> usize {
        let mut byte = byte.min(line.len());
        while !line.is_char_boundary(byte) {
            byte -= 1;
        }
        byte
    }
}

#[cfg(test)]
mod tests {
    use super::grapheme;
    use super::*;

    #[test]
    fn create_buffer_and_read_line() {
        let b = Buffer::from_str("test", "hello\nworld").unwrap();
        assert_eq!(b.line_count(), 2);
        assert_eq!(b.line(0).unwrap(), "hello\n");
        assert_eq!(b.line(1).unwrap(), "world");
        assert_eq!(b.line_content(0).unwrap(), "hello");
        assert_eq!(b.line_byte_len(0), 5);
        assert!(b.line_content(2).is_none());
    }

    #[test]
    fn splice_inside_line_keeps_newline() {
        let mut b = Buffer::from_str("t", "foo bar\nnext").unwrap();
        b.splice(0, 4..7, "bazooka").unwrap();
        assert_eq!(b.line(0).unwrap(), "foo bazooka\n");
        assert_eq!(b.line(1).unwrap(), "next");
    }

    #[test]
    fn splice_pure_insert_and_delete() {
        let mut b = Buffer::from_str("t", "ab").unwrap();
        b.splice(0, 1..1, "XY").unwrap();
        assert_eq!(b.line_content(0).unwrap(), "aXYb");
        b.splice(0, 0..3, "").unwrap();
        assert_eq!(b.line_content(0).unwrap(), "b");
    }

    #[test]
    fn splice_multibyte_line() {
        let mut b = Buffer::from_str("t", "zero\nÄpfel grün").unwrap();
        let len = b.line_byte_len(1);
        b.splice(1, len - "grün".len()..len, "rot").unwrap();
        assert_eq!(b.line_content(1).unwrap(), "Äpfel rot");
    }

    #[test]
    fn splice_rejects_bad_ranges() {
        let mut b = Buffer::from_str("t", "é\nx").unwrap();
        assert!(b.splice(0, 0..1, "e").is_err(), "mid-codepoint end");
        assert!(b.splice(0, 0..5, "").is_err(), "past line end");
        assert!(b.splice(4, 0..0, "").is_err(), "no such line");
    }

    #[test]
    fn replace_line_swaps_content() {
        let mut b = Buffer::from_str("t", "one\ntwo\nthree").unwrap();
        b.replace_line(1, "deux").unwrap();
        assert_eq!(b.contents(), "one\ndeux\nthree");
    }

    #[test]
    fn grapheme_combining_mark() {
        let s = "xe\u{301}";
        assert_eq!(grapheme::prev_boundary(s, s.len()), 1);
        assert_eq!(grapheme::prev_boundary(s, 1), 0);
    }

    #[test]
    fn grapheme_cjk() {
        let s = "漢字";
        assert_eq!(grapheme::prev_boundary(s, s.len()), "漢".len());
        assert_eq!(grapheme::prev_boundary(s, 0), 0);
    }

    #[test]
    fn floor_char_inside_a_codepoint() {
        let s = "über";
        assert_eq!(grapheme::floor_char(s, 1), 0);
        assert_eq!(grapheme::floor_char(s, 2), 2);
        assert_eq!(grapheme::floor_char(s, 99), s.len());
    }
}
