//! Error taxonomy for completion sessions.
//!
//! None of these abort the editor. Inbound operations hand them back to the
//! caller, and the status line receives the matching `ErrorKind` so the user
//! sees a short message while the session ends (or, for an unreadable
//! source, simply moves on to the next one).

use std::fmt;

use thiserror::Error;

/// Coarse class of a completion failure, used for status-line styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoCandidateSource,
    SourceUnavailable,
    UserCallbackFailed,
    BufferMutationConflict,
    Interrupted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NoCandidateSource => "no-candidate-source",
            ErrorKind::SourceUnavailable => "source-unavailable",
            ErrorKind::UserCallbackFailed => "user-callback-failed",
            ErrorKind::BufferMutationConflict => "buffer-mutation-conflict",
            ErrorKind::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The requested mode has nothing to search (empty dictionary option,
    /// no function configured, missing collaborator).
    #[error("no candidate source: {what}")]
    NoCandidateSource { what: String },
    #[error("cannot read {what}: {reason}")]
    SourceUnavailable { what: String, reason: String },
    #[error("completion function failed: {0}")]
    UserCallbackFailed(String),
    #[error("buffer changed under completion: {0}")]
    BufferMutationConflict(String),
    #[error("interrupted")]
    Interrupted,
}

impl CompletionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompletionError::NoCandidateSource { .. } => ErrorKind::NoCandidateSource,
            CompletionError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            CompletionError::UserCallbackFailed(_) => ErrorKind::UserCallbackFailed,
            CompletionError::BufferMutationConflict(_) => ErrorKind::BufferMutationConflict,
            CompletionError::Interrupted => ErrorKind::Interrupted,
        }
    }

    pub(crate) fn no_source(what: impl Into<String>) -> Self {
        CompletionError::NoCandidateSource { what: what.into() }
    }

    pub(crate) fn conflict(what: impl Into<String>) -> Self {
        CompletionError::BufferMutationConflict(what.into())
    }
}

/// Rejections from the candidate store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A candidate with the same text is already present and neither side
    /// allows duplicates. Not a failure; the caller just skips it.
    #[error("duplicate candidate")]
    Duplicate,
    #[error("empty candidate text")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(
            CompletionError::no_source("dictionary").kind(),
            ErrorKind::NoCandidateSource
        );
        assert_eq!(
            CompletionError::conflict("line shrank").kind(),
            ErrorKind::BufferMutationConflict
        );
        assert_eq!(CompletionError::Interrupted.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn messages_name_the_source() {
        let e = CompletionError::SourceUnavailable {
            what: "/tmp/words".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(e.to_string(), "cannot read /tmp/words: permission denied");
        assert_eq!(ErrorKind::UserCallbackFailed.to_string(), "user-callback-failed");
    }
}
