//! Editor state: the set of open documents and their undo history.
//!
//! A `Document` owns one rope buffer, the cursor inside it and a checkpointing
//! undo engine. Documents carry the flags completion sources care about:
//! `listed` (appears in the document list), `loaded` (text is in memory) and
//! `visible` (shown in some window). An unloaded document keeps only its path;
//! consumers read it from disk when they need its text.
//!
//! `DocumentSet` keeps the documents in creation order and tracks which one
//! is current. Iteration over "the others" starts after the current document
//! and wraps around, which gives a stable scan order for completion.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use core_text::{Buffer, Position, grapheme};
use tracing::debug;

pub mod undo;
use undo::UndoEngine;
pub use undo::UNDO_HISTORY_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub usize);

pub struct Document {
    id: DocumentId,
    buffer: Buffer,
    cursor: Position,
    undo: UndoEngine,
    pub path: Option<PathBuf>,
    pub listed: bool,
    pub loaded: bool,
    pub visible: bool,
}

impl Document {
    /// In-memory document with the given name and text.
    pub fn new(name: impl Into<String>, content: &str) -> Result<Self> {
        let norm = normalize_line_endings(content);
        Ok(Self {
            id: DocumentId(0),
            buffer: Buffer::from_str(name, &norm.normalized)?,
            cursor: Position::origin(),
            undo: UndoEngine::new(),
            path: None,
            listed: true,
            loaded: true,
            visible: false,
        })
    }

    /// Read a file into a loaded document.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("file")
            .to_string();
        let mut doc = Self::new(name, &content)?;
        debug!(target: "io", file = %path.display(), size_bytes = content.len(), line_count = doc.line_count(), "file_read_ok");
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Listed document whose text has not been read yet.
    pub fn unloaded(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path.to_string_lossy().to_string();
        let mut doc = Self::new(name, "")?;
        doc.path = Some(path);
        doc.loaded = false;
        Ok(doc)
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.buffer.name
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn line_count(&self) -> usize {
        if self.loaded { self.buffer.line_count() } else { 0 }
    }

    pub fn line(&self, idx: usize) -> Option<String> {
        if !self.loaded {
            return None;
        }
        self.buffer.line_content(idx)
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn set_cursor(&mut self, mut pos: Position) {
        let buffer = &self.buffer;
        pos.clamp_to(buffer.line_count(), |l| buffer.line_byte_len(l));
        if let Some(text) = buffer.line_content(pos.line) {
            pos.byte = grapheme::floor_char(&text, pos.byte);
        }
        self.cursor = pos;
    }

    pub fn replace_line(&mut self, idx: usize, text: &str) -> Result<()> {
        self.buffer.replace_line(idx, text)
    }

    pub fn splice(&mut self, line: usize, range: std::ops::Range<usize>, text: &str) -> Result<()> {
        self.buffer.splice(line, range, text)
    }

    /// Close the current undo unit; following edits undo back to here.
    pub fn checkpoint(&mut self) {
        self.undo.checkpoint(self.cursor, &self.buffer);
    }

    pub fn undo(&mut self) -> bool {
        self.undo.undo(&mut self.cursor, &mut self.buffer)
    }

    pub fn redo(&mut self) -> bool {
        self.undo.redo(&mut self.cursor, &mut self.buffer)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.undo_depth()
    }

    pub fn contents(&self) -> String {
        self.buffer.contents()
    }
}

/// Open documents in creation order plus the index of the current one.
#[derive(Default)]
pub struct DocumentSet {
    docs: Vec<Document>,
    current: usize,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut doc: Document) -> DocumentId {
        let id = DocumentId(self.docs.len());
        doc.id = id;
        self.docs.push(doc);
        id
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn set_current(&mut self, id: DocumentId) -> bool {
        if id.0 < self.docs.len() {
            self.current = id.0;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&Document> {
        self.docs.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Document> {
        self.docs.get_mut(self.current)
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.docs.get(id.0)
    }

    /// Documents other than the current one, starting after it and wrapping.
    pub fn others(&self) -> impl Iterator<Item = &Document> {
        let (before, rest) = self.docs.split_at(self.current.min(self.docs.len()));
        rest.iter().skip(1).chain(before.iter())
    }

    /// Borrow the current document mutably alongside read access to the rest.
    pub fn split_current(&mut self) -> Option<(&mut Document, OtherDocuments<'_>)> {
        if self.current >= self.docs.len() {
            return None;
        }
        let (before, rest) = self.docs.split_at_mut(self.current);
        let (current, after) = rest.split_first_mut()?;
        Some((
            current,
            OtherDocuments {
                after,
                before,
            },
        ))
    }
}

/// Read-only view of the non-current documents, in scan order.
pub struct OtherDocuments<'a> {
    after: &'a [Document],
    before: &'a [Document],
}

impl<'a> OtherDocuments<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Document> + use<'a> {
        self.after.iter().chain(self.before.iter())
    }

    pub fn get(&self, id: DocumentId) -> Option<&'a Document> {
        self.iter().find(|d| d.id == id)
    }
}

/// Line ending style detected when reading a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Cr,
    Crlf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub normalized: String,
    pub original: LineEnding,
}

/// Normalize CRLF and solitary CR to LF, reporting the majority style
/// (ties resolved by precedence CRLF > LF > CR).
pub fn normalize_line_endings(input: &str) -> NormalizedText {
    let bytes = input.as_bytes();
    let (mut crlf, mut lf, mut cr) = (0usize, 0usize, 0usize);
    let mut out = String::with_capacity(input.len());
    let mut seg_start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                out.push_str(&input[seg_start..i]);
                out.push('\n');
                if bytes.get(i + 1) == Some(&b'\n') {
                    crlf += 1;
                    i += 2;
                } else {
                    cr += 1;
                    i += 1;
                }
                seg_start = i;
            }
            b'\n' => {
                lf += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    out.push_str(&input[seg_start..]);
    let mut original = LineEnding::Lf;
    let mut max = 0usize;
    for (style, count) in [(LineEnding::Crlf, crlf), (LineEnding::Lf, lf), (LineEnding::Cr, cr)] {
        if count > max {
            max = count;
            original = style;
        }
    }
    NormalizedText {
        normalized: out,
        original,
    }
}
