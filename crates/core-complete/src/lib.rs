//! Insert-mode completion engine.
//!
//! Pressing a completion key starts a session anchored at the start of the
//! word before the cursor. The dispatcher walks the configured sources one
//! step at a time (current document, other documents, word lists, tags,
//! files, user functions and the rest), feeding a de-duplicating candidate
//! store. Between steps the governor peeks at typed-ahead keys so cycling
//! keeps working while a slow source is scanned and any other key stops the
//! scan. Typing while the menu is up narrows the candidates through the
//! leader; accept or cancel ends the session.
//!
//! The engine owns no editor state. The current document, the other
//! documents, pending keys and every external source reach it through the
//! traits in [`collab`]; [`adapters`] implements them over `core-state` and
//! the local filesystem.

pub mod adapters;
pub mod candidate;
pub mod collab;
mod dispatch;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod governor;
pub mod infercase;
pub mod keys;
mod leader;
pub mod mode;
pub mod pattern;
pub mod presentation;
pub mod session;

pub use adapters::{FsFileSource, FsPathExpander};
pub use candidate::{Candidate, CandidateFlags, CandidateId, CandidateStore, Extras, reduce_longest};
pub use collab::{
    Backends, CommandExpansion, CommandGrammar, DocumentInfo, EditContext, FileSource, IncludeScanner,
    LineIter, LineRange, LogStatus, MenuRow, MenuWidget, NoDocuments, NoMenu, OpenDocuments, PathExpander,
    ScriptHost, SpellEngine, StatusClass, StatusLine, TagEntry, TagIndex, TextBuffer,
};
pub use engine::{CompleteDone, CompletedItem, CompletionEngine, DoneReason, KeyOutcome};
pub use error::{CompletionError, ErrorKind, StoreError};
pub use fuzzy::{FrizbeeScorer, FuzzyScorer};
pub use governor::{Governor, Poll};
pub use infercase::infer_case;
pub use keys::{CycleKey, KeyRole, accepts_char, classify, cycle_key};
pub use mode::{CompletionMode, Direction, OtherScope, SourceKind, parse_complete_option};
pub use pattern::SearchPattern;
pub use presentation::Presentation;
pub use session::CompletionSession;
