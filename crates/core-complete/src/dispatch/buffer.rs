//! Keyword and line scans over documents.
//!
//! The current document is searched outward from the anchor: the rest of
//! the anchor line in the scan direction, the following lines, then (after
//! wrapping) the lines on the other side, and finally the part of the anchor
//! line behind the anchor. Every position is visited once, so the scan ends
//! after exactly one wrap and never reports a match twice. The match at the
//! anchor itself (the text being completed) is skipped.
//!
//! Other documents are searched top to bottom (bottom to top when going
//! backward) without wrapping. Unloaded ones are read through the file
//! source.

use std::ops::Range;

use ahash::AHashSet;
use core_state::DocumentId;
use tracing::{debug, trace};

use super::file::FileScan;
use super::{CursorStep, ScanContext};
use crate::collab::{DocumentInfo, StatusClass};
use crate::mode::{Direction, OtherScope};

#[derive(Debug, Clone, Copy)]
enum Part {
    Whole,
    /// Matches starting after this byte.
    After(usize),
    /// Matches starting before this byte.
    Before(usize),
}

#[derive(Debug, Clone)]
struct Span {
    lines: Range<usize>,
    part: Part,
    /// Crossing into this span wraps around the document.
    wraps: bool,
}

pub(crate) struct BufferScan {
    doc: Option<DocumentId>,
    name: Option<String>,
    dir: Direction,
    spans: Vec<Span>,
    span: usize,
    /// Next line in the active span.
    at: Option<usize>,
}

impl BufferScan {
    /// Scan of the document being edited, starting at the anchor.
    pub fn current(scx: &ScanContext<'_>) -> Self {
        let anchor = scx.query.anchor;
        let count = scx.buffer.line_count();
        let l = anchor.line.min(count.saturating_sub(1));
        let after = Span {
            lines: l..l + 1,
            part: Part::After(anchor.byte),
            wraps: false,
        };
        let before = Span {
            lines: l..l + 1,
            part: Part::Before(anchor.byte),
            wraps: false,
        };
        let below = l + 1..count;
        let above = 0..l;
        let spans = match scx.direction {
            Direction::Forward => vec![
                after,
                Span { lines: below, part: Part::Whole, wraps: false },
                Span { lines: above, part: Part::Whole, wraps: true },
                before,
            ],
            Direction::Backward => vec![
                before,
                Span { lines: above, part: Part::Whole, wraps: false },
                Span { lines: below, part: Part::Whole, wraps: true },
                after,
            ],
        };
        Self::with_spans(None, None, scx.direction, spans)
    }

    /// Whole-document scan of another loaded document.
    pub fn other(info: &DocumentInfo, line_count: usize, dir: Direction) -> Self {
        let spans = vec![Span {
            lines: 0..line_count,
            part: Part::Whole,
            wraps: false,
        }];
        Self::with_spans(Some(info.id), Some(info.name.clone()), dir, spans)
    }

    fn with_spans(doc: Option<DocumentId>, name: Option<String>, dir: Direction, spans: Vec<Span>) -> Self {
        let mut scan = Self {
            doc,
            name,
            dir,
            spans,
            span: 0,
            at: None,
        };
        scan.enter_span();
        scan
    }

    fn enter_span(&mut self) {
        self.at = self.spans.get(self.span).and_then(|s| {
            if s.lines.is_empty() {
                None
            } else {
                match self.dir {
                    Direction::Forward => Some(s.lines.start),
                    Direction::Backward => Some(s.lines.end - 1),
                }
            }
        });
    }

    /// Next line to visit and the part of it to search.
    fn advance(&mut self) -> Option<(usize, Part)> {
        loop {
            let span = self.spans.get(self.span)?;
            if let Some(line) = self.at {
                let part = span.part;
                self.at = match self.dir {
                    Direction::Forward => Some(line + 1).filter(|n| *n < span.lines.end),
                    Direction::Backward => line.checked_sub(1).filter(|n| *n >= span.lines.start),
                };
                return Some((line, part));
            }
            self.span += 1;
            if self.spans.get(self.span).is_some_and(|s| s.wraps) {
                trace!(target: "complete.scan", "scan_wrapped");
            }
            self.enter_span();
        }
    }

    pub fn step(&mut self, scx: &mut ScanContext<'_>) -> CursorStep {
        let Some((idx, part)) = self.advance() else {
            return CursorStep::Done;
        };
        let line = match self.doc {
            None => scx.buffer.get_line(idx),
            Some(id) => scx.documents.line(id, idx),
        };
        let Some(line) = line else {
            return CursorStep::More;
        };
        let query = scx.query;
        let mut found: Vec<(usize, String)> = query
            .pattern
            .matches(&line)
            .into_iter()
            .filter(|(start, _)| match part {
                Part::Whole => true,
                Part::After(a) => *start > a,
                Part::Before(a) => *start < a,
            })
            .map(|(start, w)| (start, w.to_string()))
            .collect();
        if self.dir == Direction::Backward {
            found.reverse();
        }
        for (_, word) in found {
            scx.offer(&word, self.name.as_deref(), scx.direction);
        }
        CursorStep::More
    }
}

enum OtherActive {
    Loaded(BufferScan),
    Unloaded(FileScan),
}

/// Queue of other documents for one `complete` token.
pub(crate) struct OtherScan {
    queue: std::collections::VecDeque<DocumentInfo>,
    active: Option<OtherActive>,
}

impl OtherScan {
    pub fn new(scope: OtherScope, scx: &ScanContext<'_>, scanned: &mut AHashSet<DocumentId>) -> Option<Self> {
        let queue: std::collections::VecDeque<DocumentInfo> = scx
            .documents
            .documents()
            .into_iter()
            .filter(|d| match scope {
                OtherScope::Visible => d.loaded && d.visible,
                OtherScope::Loaded => d.loaded && d.listed,
                OtherScope::Unloaded => d.listed && !d.loaded,
                OtherScope::Unlisted => !d.listed,
            })
            .filter(|d| scanned.insert(d.id))
            .collect();
        debug!(target: "complete.scan", ?scope, documents = queue.len(), "other_documents_queued");
        (!queue.is_empty()).then_some(Self {
            queue,
            active: None,
        })
    }

    pub fn step(&mut self, scx: &mut ScanContext<'_>) -> CursorStep {
        if self.active.is_none() {
            let Some(info) = self.queue.pop_front() else {
                return CursorStep::Done;
            };
            scx.backends
                .status
                .publish(&format!("Scanning: {}", info.name), StatusClass::Progress);
            self.active = if info.loaded {
                let count = scx.documents.line_count(info.id);
                Some(OtherActive::Loaded(BufferScan::other(&info, count, scx.direction)))
            } else {
                info.path
                    .as_ref()
                    .and_then(|p| FileScan::document(p.clone(), info.name.clone(), scx))
                    .map(OtherActive::Unloaded)
            };
            return CursorStep::More;
        }
        let outcome = match self.active.as_mut() {
            None => return CursorStep::More,
            Some(OtherActive::Loaded(scan)) => scan.step(scx),
            Some(OtherActive::Unloaded(scan)) => scan.step(scx),
        };
        match outcome {
            CursorStep::Done => {
                self.active = None;
                CursorStep::More
            }
            other => other,
        }
    }
}
