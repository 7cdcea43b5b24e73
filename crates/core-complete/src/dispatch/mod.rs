//! Source dispatcher: walks the session's sources one small step at a time.
//!
//! Each call to `Dispatcher::step` does one bounded unit of work (one line of
//! a document or word list, or one batch from an external collaborator) and
//! reports where the scan stands. The session interleaves steps with input
//! polling, so a long dictionary never freezes typing. The active source and
//! its read position live in a `SourceCursor`; dropping the session drops it.

mod buffer;
mod callback;
mod external;
mod file;

use ahash::AHashSet;
use core_config::CompletionConfig;
use core_state::DocumentId;
use core_text::Position;
use tracing::{debug, trace};

use crate::candidate::{Candidate, CandidateFlags, CandidateId, CandidateStore};
use crate::collab::{Backends, OpenDocuments, StatusClass, TextBuffer};
use crate::error::CompletionError;
use crate::infercase::infer_case;
use crate::mode::{CompletionMode, Direction, SourceKind};
use crate::pattern::SearchPattern;

pub(crate) use callback::{FindStart, parse_callback_result, parse_find_start};

use buffer::BufferScan;
use file::FileScan;

/// What the session searches for, fixed for one run of the dispatcher.
#[derive(Debug, Clone)]
pub(crate) struct Query {
    pub mode: CompletionMode,
    /// Start of the completed text.
    pub anchor: Position,
    /// Text the search patterns were built from.
    pub search_text: String,
    pub pattern: SearchPattern,
    pub ignore_case: bool,
    pub infer_case: bool,
    /// Script function for callback based modes.
    pub function: Option<String>,
}

#[derive(Debug)]
pub(crate) enum StepState {
    Continue,
    SourceExhausted,
    AllExhausted,
    Abort(CompletionError),
}

/// Everything one step may touch.
pub(crate) struct ScanContext<'a> {
    pub store: &'a mut CandidateStore,
    pub buffer: &'a dyn TextBuffer,
    pub documents: &'a dyn OpenDocuments,
    pub backends: &'a mut Backends,
    pub config: &'a CompletionConfig,
    pub query: &'a Query,
    pub direction: Direction,
    /// Candidates added during this step, in insertion order.
    pub added: Vec<CandidateId>,
    /// Set by a callback asking to be re-run on every leader change.
    pub refresh_always: bool,
}

impl ScanContext<'_> {
    /// Offer text found by a document or word-list scan. Case inference
    /// applies here only. Returns true when a new candidate was linked.
    pub fn offer(&mut self, text: &str, source: Option<&str>, dir: Direction) -> bool {
        let mut cand = Candidate::new(text);
        if self.query.ignore_case && self.query.infer_case && !self.query.search_text.is_empty() {
            cand.text = infer_case(&self.query.search_text, &cand.text);
        }
        self.offer_candidate(cand, source, dir)
    }

    pub fn offer_candidate(&mut self, mut cand: Candidate, source: Option<&str>, dir: Direction) -> bool {
        if self.query.ignore_case {
            cand.flags |= CandidateFlags::ICASE;
        }
        match self.store.add(cand, source, dir) {
            Ok(id) => {
                self.added.push(id);
                true
            }
            Err(_) => false,
        }
    }

    /// Add a batch from a collaborator: a backward search is honored for the
    /// first candidate only, the rest follow it forward.
    pub fn offer_batch(&mut self, batch: impl IntoIterator<Item = Candidate>, source: Option<&str>) -> usize {
        let mut dir = self.direction;
        let mut added = 0;
        for cand in batch {
            if self.offer_candidate(cand, source, dir) {
                dir = Direction::Forward;
                added += 1;
            }
        }
        added
    }

    /// Modes that name a single source report a missing one to the user.
    pub fn explicit(&self) -> bool {
        !self.query.mode.uses_token_list()
    }

    pub fn report_no_source(&mut self, what: &str) {
        if self.explicit() {
            let err = CompletionError::no_source(what);
            self.backends
                .status
                .publish(&err.to_string(), StatusClass::Error(err.kind()));
        }
        debug!(target: "complete.scan", what, "source_unavailable_skipped");
    }
}

enum SourceCursor {
    Buffer(BufferScan),
    Others(buffer::OtherScan),
    File(FileScan),
    OneShot(SourceKind),
}

pub(crate) enum CursorStep {
    More,
    Done,
    Abort(CompletionError),
}

pub(crate) struct Dispatcher {
    tokens: Vec<SourceKind>,
    next: usize,
    active: Option<SourceCursor>,
    scanned: AHashSet<DocumentId>,
    finished: bool,
}

impl Dispatcher {
    pub fn new(tokens: Vec<SourceKind>) -> Self {
        trace!(target: "complete.scan", sources = tokens.len(), "dispatcher_new");
        Self {
            tokens,
            next: 0,
            active: None,
            scanned: AHashSet::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one bounded unit of work.
    pub fn step(&mut self, scx: &mut ScanContext<'_>) -> StepState {
        if self.finished {
            return StepState::AllExhausted;
        }
        if self.active.is_none() {
            let Some(kind) = self.tokens.get(self.next).cloned() else {
                self.finished = true;
                trace!(target: "complete.scan", "all_sources_exhausted");
                return StepState::AllExhausted;
            };
            self.next += 1;
            trace!(target: "complete.scan", source = kind.label(), "source_open");
            self.active = self.open(kind, scx);
            return StepState::Continue;
        }
        let Some(cursor) = self.active.as_mut() else {
            return StepState::Continue;
        };
        let outcome = match cursor {
            SourceCursor::Buffer(scan) => scan.step(scx),
            SourceCursor::Others(scan) => scan.step(scx),
            SourceCursor::File(scan) => scan.step(scx),
            SourceCursor::OneShot(kind) => external::run(kind, scx),
        };
        match outcome {
            CursorStep::More => StepState::Continue,
            CursorStep::Abort(err) => {
                self.active = None;
                self.finished = true;
                StepState::Abort(err)
            }
            CursorStep::Done => {
                self.active = None;
                if self.next >= self.tokens.len() {
                    self.finished = true;
                    trace!(target: "complete.scan", "all_sources_exhausted");
                    StepState::AllExhausted
                } else {
                    StepState::SourceExhausted
                }
            }
        }
    }

    fn open(&mut self, kind: SourceKind, scx: &mut ScanContext<'_>) -> Option<SourceCursor> {
        match kind {
            SourceKind::CurrentDocument => Some(SourceCursor::Buffer(BufferScan::current(scx))),
            SourceKind::OtherDocuments(scope) => {
                buffer::OtherScan::new(scope, scx, &mut self.scanned).map(SourceCursor::Others)
            }
            SourceKind::Dictionary { file } => {
                FileScan::word_lists(file, false, scx).map(SourceCursor::File)
            }
            SourceKind::Thesaurus { file } => {
                FileScan::word_lists(file, true, scx).map(SourceCursor::File)
            }
            other => Some(SourceCursor::OneShot(other)),
        }
    }
}

/// Sources searched by `mode`.
pub(crate) fn sources_for(mode: CompletionMode, config: &CompletionConfig) -> Vec<SourceKind> {
    match mode {
        CompletionMode::Keyword => crate::mode::parse_complete_option(&config.complete),
        CompletionMode::WholeLine => crate::mode::parse_complete_option(&config.complete)
            .into_iter()
            .filter(|kind| matches!(kind, SourceKind::CurrentDocument | SourceKind::OtherDocuments(_)))
            .collect(),
        CompletionMode::KeywordLocal => vec![SourceKind::CurrentDocument],
        CompletionMode::Files => vec![SourceKind::Filenames],
        CompletionMode::Tags => vec![SourceKind::Tags],
        CompletionMode::PathPatterns => vec![SourceKind::IncludePatterns],
        CompletionMode::PathDefines => vec![SourceKind::IncludeDefines],
        CompletionMode::Dictionary => vec![SourceKind::Dictionary { file: None }],
        CompletionMode::Thesaurus if config.thesaurusfunc.is_some() => {
            vec![SourceKind::ThesaurusFunction]
        }
        CompletionMode::Thesaurus => vec![SourceKind::Thesaurus { file: None }],
        CompletionMode::CommandLine => vec![SourceKind::CommandLine],
        CompletionMode::Function | CompletionMode::Omni => vec![SourceKind::UserFunction],
        CompletionMode::Spell => vec![SourceKind::Spell],
    }
}
