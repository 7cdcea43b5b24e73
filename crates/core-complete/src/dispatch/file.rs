//! Line-by-line scans of files: dictionaries, thesauri and unloaded
//! documents. One step reads one line.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

use core_text::class::keywords;
use tracing::{debug, warn};

use super::{CursorStep, ScanContext};
use crate::collab::{LineIter, StatusClass};
use crate::error::CompletionError;
use crate::mode::Direction;

pub(crate) struct FileScan {
    files: VecDeque<PathBuf>,
    lines: Option<LineIter>,
    /// Name recorded as the candidates' source.
    current: Option<String>,
    thesaurus: bool,
    what: &'static str,
    /// Fixed display name (unloaded documents); word lists use the path.
    display: Option<String>,
    /// Direction for the next add; backward is honored once per scan.
    dir: Direction,
    opened: usize,
    missing: usize,
    failed: usize,
}

impl FileScan {
    /// Scan of the configured word lists (or the one file named by the token).
    pub fn word_lists(file: Option<PathBuf>, thesaurus: bool, scx: &mut ScanContext<'_>) -> Option<Self> {
        let what = if thesaurus { "thesaurus" } else { "dictionary" };
        let files: VecDeque<PathBuf> = match file {
            Some(f) => VecDeque::from([f]),
            None if thesaurus => scx.config.thesaurus.iter().cloned().collect(),
            None => scx.config.dictionary.iter().cloned().collect(),
        };
        if files.is_empty() {
            scx.report_no_source(&format!("'{what}' option is empty"));
            return None;
        }
        if scx.backends.files.is_none() {
            scx.report_no_source(&format!("no file reader for {what}"));
            return None;
        }
        Some(Self::new(files, thesaurus, what, None, scx.direction))
    }

    /// Keyword scan of a document that is listed but not loaded.
    pub fn document(path: PathBuf, name: String, scx: &ScanContext<'_>) -> Option<Self> {
        scx.backends.files.as_ref()?;
        Some(Self::new(
            VecDeque::from([path]),
            false,
            "document",
            Some(name),
            scx.direction,
        ))
    }

    fn new(
        files: VecDeque<PathBuf>,
        thesaurus: bool,
        what: &'static str,
        display: Option<String>,
        dir: Direction,
    ) -> Self {
        Self {
            files,
            lines: None,
            current: None,
            thesaurus,
            what,
            display,
            dir,
            opened: 0,
            missing: 0,
            failed: 0,
        }
    }

    pub fn step(&mut self, scx: &mut ScanContext<'_>) -> CursorStep {
        let Some(lines) = self.lines.as_mut() else {
            return self.open_next(scx);
        };
        match lines.next() {
            None => {
                self.lines = None;
                CursorStep::More
            }
            Some(Err(e)) => {
                warn!(target: "complete.scan", what = self.what, error = %e, "read_failed");
                self.lines = None;
                CursorStep::More
            }
            Some(Ok(line)) => {
                self.scan_line(&line, scx);
                CursorStep::More
            }
        }
    }

    fn open_next(&mut self, scx: &mut ScanContext<'_>) -> CursorStep {
        let Some(path) = self.files.pop_front() else {
            if self.opened == 0 && self.missing > 0 && self.failed == 0 {
                let err = CompletionError::no_source(format!("no {} file found", self.what));
                scx.backends
                    .status
                    .publish(&err.to_string(), StatusClass::Error(err.kind()));
            }
            return CursorStep::Done;
        };
        let Some(files) = scx.backends.files.as_ref() else {
            return CursorStep::Done;
        };
        match files.open_read_lines(&path) {
            Ok(iter) => {
                self.opened += 1;
                let name = self
                    .display
                    .clone()
                    .unwrap_or_else(|| path.display().to_string());
                debug!(target: "complete.scan", what = self.what, "file_opened");
                scx.backends
                    .status
                    .publish(&format!("Scanning {}: {name}", self.what), StatusClass::Progress);
                self.current = Some(name);
                self.lines = Some(iter);
            }
            Err(e) => {
                let not_found = e
                    .chain()
                    .filter_map(|c| c.downcast_ref::<io::Error>())
                    .any(|io| io.kind() == io::ErrorKind::NotFound);
                if not_found {
                    self.missing += 1;
                } else {
                    self.failed += 1;
                    let err = CompletionError::SourceUnavailable {
                        what: path.display().to_string(),
                        reason: e.to_string(),
                    };
                    scx.backends
                        .status
                        .publish(&err.to_string(), StatusClass::Error(err.kind()));
                }
                warn!(target: "complete.scan", what = self.what, not_found, error = %e, "open_failed");
            }
        }
        CursorStep::More
    }

    fn scan_line(&mut self, line: &str, scx: &mut ScanContext<'_>) {
        let query = scx.query;
        let matches = query.pattern.matches(line);
        if matches.is_empty() {
            return;
        }
        let source = self.current.as_deref();
        if self.thesaurus {
            // the matching word, then every other word on the line
            let (at, word) = matches[0];
            if scx.offer(word, source, self.dir) {
                self.dir = Direction::Forward;
            }
            for (start, other) in keywords(line) {
                if start != at && scx.offer(other, source, self.dir) {
                    self.dir = Direction::Forward;
                }
            }
            return;
        }
        for (_, word) in matches {
            if scx.offer(word, source, self.dir) {
                self.dir = Direction::Forward;
            }
        }
    }
}
