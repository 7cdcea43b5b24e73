//! Session controller: one completion from the trigger key to accept or
//! cancel.
//!
//! A `CompletionSession` owns everything a completion needs between keys:
//! the query (mode, anchor, pattern), the original text, the leader, the
//! candidate store, the dispatcher's source cursor and the presentation.
//! The engine lends it the collaborators for the duration of each call
//! through `Env` and `EditContext`; nothing is global.
//!
//! The text between the anchor and the cursor is the only part of the buffer
//! a session writes, and every write goes through `write_text`, which checks
//! that the text is still what the session last put there.

use core_config::CompletionConfig;
use core_text::{Position, grapheme};
use core_text::class::{
    first_non_blank, is_fname_char, is_ident_char, run_start_before, word_start_before,
};
use serde_json::Value;
use tracing::{debug, trace};

use crate::candidate::{Candidate, CandidateId, CandidateStore, reduce_longest};
use crate::collab::{Backends, EditContext, LineRange, MenuRow, StatusClass, TextBuffer};
use crate::dispatch::{
    Dispatcher, FindStart, Query, ScanContext, StepState, parse_find_start, sources_for,
};
use crate::error::CompletionError;
use crate::fuzzy::FuzzyScorer;
use crate::governor::{Governor, Poll};
use crate::mode::{CompletionMode, Direction};
use crate::pattern::SearchPattern;
use crate::presentation::{Presentation, enough_matches, menu_wanted};

/// Long-lived engine state lent to a session for one call.
pub(crate) struct Env<'a> {
    pub backends: &'a mut Backends,
    pub config: &'a CompletionConfig,
    pub scorer: &'a dyn FuzzyScorer,
}

/// Result of trying to start a session.
pub(crate) enum Begin {
    Started(Box<CompletionSession>),
    /// The completion function asked to cancel without an error.
    Cancelled { leave_mode: bool },
}

pub struct CompletionSession {
    pub(crate) query: Query,
    /// Text between anchor and cursor when the session started.
    pub(crate) original: String,
    /// Text the session last wrote at the anchor.
    pub(crate) inserted: String,
    pub(crate) leader: Option<String>,
    pub(crate) store: CandidateStore,
    pub(crate) dispatcher: Dispatcher,
    governor: Governor,
    pub(crate) presentation: Option<Presentation>,
    /// Highlighted candidate.
    pub(crate) shown: CandidateId,
    /// Direction new candidates are linked in.
    pub(crate) direction: Direction,
    /// Direction the highlight last moved in.
    pub(crate) shows_dir: Direction,
    /// Highlight moves requested beyond the candidates found so far.
    pub(crate) pending: i64,
    /// Candidate count once the scan finished.
    pub(crate) matches: Option<usize>,
    started: bool,
    /// The buffer holds a candidate rather than the leader.
    pub(crate) used_match: bool,
    pub(crate) enter_selects: bool,
    pub(crate) interrupted: bool,
    restarting: bool,
    pub(crate) refresh_always: bool,
    pub(crate) menu_visible: bool,
}

impl CompletionSession {
    /// Find the anchor for `mode`, snapshot the original text and set up the
    /// store and dispatcher. Nothing is searched yet.
    pub(crate) fn start(
        mode: CompletionMode,
        direction: Direction,
        env: &mut Env<'_>,
        cx: &mut EditContext<'_>,
    ) -> Result<Begin, CompletionError> {
        let cursor = cx.buffer.cursor();
        let line = cx
            .buffer
            .get_line(cursor.line)
            .ok_or_else(|| CompletionError::conflict("cursor line does not exist"))?;
        let cursor_byte = grapheme::floor_char(&line, cursor.byte);

        let function = match mode {
            CompletionMode::Function => env.config.completefunc.clone(),
            CompletionMode::Omni => env.config.omnifunc.clone(),
            CompletionMode::Thesaurus => env.config.thesaurusfunc.clone(),
            _ => None,
        };
        let anchor_byte = match mode {
            CompletionMode::WholeLine => first_non_blank(&line).min(cursor_byte),
            CompletionMode::Files => run_start_before(&line, cursor_byte, is_fname_char),
            m if m.ident_only() => run_start_before(&line, cursor_byte, is_ident_char),
            CompletionMode::CommandLine => match env.backends.cmdline.as_ref() {
                Some(grammar) => {
                    let upto = line.get(..cursor_byte).unwrap_or(line.as_str());
                    let expansion = grammar.expand(upto).map_err(|e| CompletionError::SourceUnavailable {
                        what: "command line".to_string(),
                        reason: e.to_string(),
                    })?;
                    grapheme::floor_char(&line, expansion.start.min(cursor_byte))
                }
                None => return Err(CompletionError::no_source("no command grammar")),
            },
            CompletionMode::Function | CompletionMode::Omni => {
                let Some(func) = function.as_deref() else {
                    return Err(CompletionError::no_source(format!(
                        "'{}' is not set",
                        if mode == CompletionMode::Omni { "omnifunc" } else { "completefunc" }
                    )));
                };
                match find_start(func, &line, cursor, env, cx)? {
                    FindStart::Column(col) => col,
                    FindStart::Cancel { leave_mode } => return Ok(Begin::Cancelled { leave_mode }),
                }
            }
            CompletionMode::Thesaurus if function.is_some() => {
                let func = function.as_deref().unwrap_or_default();
                match find_start(func, &line, cursor, env, cx)? {
                    FindStart::Column(col) => col,
                    FindStart::Cancel { leave_mode } => return Ok(Begin::Cancelled { leave_mode }),
                }
            }
            _ => word_start_before(&line, cursor_byte),
        };

        let original = line[anchor_byte..cursor_byte].to_string();
        let ignore_case = env.config.ignorecase
            && !(env.config.smartcase && original.chars().any(char::is_uppercase));
        let query = Query {
            mode,
            anchor: Position::new(cursor.line, anchor_byte),
            pattern: build_pattern(mode, &original, ignore_case)?,
            search_text: original.clone(),
            ignore_case,
            infer_case: env.config.infercase,
            function,
        };

        cx.buffer.begin_undo_checkpoint();
        let mut store = CandidateStore::new();
        store.init(&original);
        env.backends.status.publish(mode.message(), StatusClass::Mode);
        debug!(
            target: "complete.session",
            mode = %mode,
            line = cursor.line,
            anchor = anchor_byte,
            typed_len = original.len(),
            ignore_case,
            "session_started"
        );

        Ok(Begin::Started(Box::new(Self {
            dispatcher: Dispatcher::new(sources_for(mode, env.config)),
            governor: Governor::new(env.config.poll_frequency),
            query,
            inserted: original.clone(),
            original,
            leader: None,
            store,
            presentation: None,
            shown: CandidateId::ORIGIN,
            direction,
            shows_dir: direction,
            pending: 0,
            matches: None,
            started: false,
            used_match: true,
            enter_selects: false,
            interrupted: false,
            restarting: false,
            refresh_always: false,
            menu_visible: false,
        })))
    }

    pub fn mode(&self) -> CompletionMode {
        self.query.mode
    }

    pub fn anchor(&self) -> Position {
        self.query.anchor
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn leader(&self) -> Option<&str> {
        self.leader.as_deref()
    }

    pub fn inserted(&self) -> &str {
        &self.inserted
    }

    /// Highlighted candidate; `None` while the highlight is on the original text.
    pub fn shown(&self) -> Option<&Candidate> {
        self.store.get(self.shown).filter(|c| !c.is_origin())
    }

    /// Candidates found so far, in list order, without the origin.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.store.iter().map(|(_, c)| c).filter(|c| !c.is_origin())
    }

    pub fn rows(&self) -> &[MenuRow] {
        self.presentation.as_ref().map(Presentation::rows).unwrap_or_default()
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.presentation.as_ref().and_then(Presentation::selected)
    }

    pub fn menu_visible(&self) -> bool {
        self.menu_visible
    }

    pub fn is_scan_complete(&self) -> bool {
        self.dispatcher.is_finished()
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Candidate count, known once every source was scanned.
    pub fn match_count(&self) -> Option<usize> {
        self.matches
    }

    pub fn enter_selects(&self) -> bool {
        self.enter_selects
    }

    /// Run the dispatcher until every source is exhausted or a typed-ahead
    /// key interrupts it. Cycling keys found while polling move the
    /// highlight without stopping the scan.
    pub(crate) fn expand(&mut self, env: &mut Env<'_>, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        self.interrupted = false;
        let page = env.config.page_step();
        let before = self.store.len();
        loop {
            let (state, added, refresh) = {
                let mut scx = ScanContext {
                    store: &mut self.store,
                    buffer: &*cx.buffer,
                    documents: cx.documents,
                    backends: &mut *env.backends,
                    config: env.config,
                    query: &self.query,
                    direction: self.direction,
                    added: Vec::new(),
                    refresh_always: false,
                };
                let state = self.dispatcher.step(&mut scx);
                (state, scx.added, scx.refresh_always)
            };
            self.refresh_always |= refresh;
            if !added.is_empty() {
                self.presentation = None;
                if env.config.completeopt.longest {
                    for id in added {
                        self.take_longest(id, &mut *cx.buffer)?;
                    }
                }
            }
            match state {
                StepState::Abort(err) => return Err(err),
                StepState::AllExhausted => break,
                StepState::Continue | StepState::SourceExhausted => {}
            }
            match self.governor.poll(&mut *cx.input, self.query.mode, page) {
                Poll::Waiting => continue,
                Poll::Idle => {}
                Poll::Cycle(key) => {
                    self.shows_dir = key.direction;
                    self.next(env, cx, false, key.count, key.insert)?;
                }
                Poll::Interrupt(_) => self.interrupted = true,
            }
            self.apply_pending(env, cx)?;
            if self.interrupted {
                break;
            }
        }
        if self.dispatcher.is_finished() {
            self.matches = Some(self.store.make_cyclic());
        }
        self.started = true;
        debug!(
            target: "complete.session",
            added = self.store.len() - before,
            total = self.store.len() - 1,
            interrupted = self.interrupted,
            finished = self.dispatcher.is_finished(),
            "expand_done"
        );
        Ok(())
    }

    /// Highlight moves that could not be made while the list was short.
    fn apply_pending(&mut self, env: &mut Env<'_>, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        if self.pending != 0 && !env.config.completeopt.noinsert {
            let todo = usize::try_from(self.pending.unsigned_abs()).unwrap_or(usize::MAX);
            self.pending = 0;
            self.next(env, cx, false, todo, true)?;
        }
        Ok(())
    }

    fn take_longest(&mut self, id: CandidateId, buf: &mut dyn TextBuffer) -> Result<(), CompletionError> {
        let Some(cand) = self.store.get(id) else {
            return Ok(());
        };
        if reduce_longest(&mut self.leader, cand) {
            let text = self.leader.clone().unwrap_or_default();
            self.write_text(buf, &text)?;
            self.used_match = false;
            trace!(target: "complete.leader", len = text.len(), "longest_reduced");
        }
        Ok(())
    }

    /// User-level move: `count` candidates in `dir`, searching further when
    /// the list runs out.
    pub(crate) fn advance(
        &mut self,
        env: &mut Env<'_>,
        cx: &mut EditContext<'_>,
        dir: Direction,
        count: usize,
        commit: bool,
    ) -> Result<(), CompletionError> {
        self.shows_dir = dir;
        self.next(env, cx, true, count.max(1), commit)?;
        self.show(env);
        self.report(env, false);
        Ok(())
    }

    /// Resume an interrupted scan when nothing is typed ahead.
    pub(crate) fn resume(&mut self, env: &mut Env<'_>, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        if self.dispatcher.is_finished() || cx.input.peek().is_some() {
            return Ok(());
        }
        trace!(target: "complete.session", "resume_scan");
        self.expand(env, cx)?;
        self.apply_pending(env, cx)?;
        self.show(env);
        Ok(())
    }

    /// Move the highlight `count` times and write the result.
    ///
    /// With `allow_expansion` the dispatcher runs again when the list ends
    /// before the move does; without it the missing moves are remembered
    /// as pending. Returns false when nothing moved.
    pub(crate) fn next(
        &mut self,
        env: &mut Env<'_>,
        cx: &mut EditContext<'_>,
        allow_expansion: bool,
        count: usize,
        insert: bool,
    ) -> Result<bool, CompletionError> {
        let started = self.started;
        let opt = env.config.completeopt;
        if self.leader.is_some() && self.shown != CandidateId::ORIGIN && !self.fuzzy(env) {
            self.update_shown_match();
        }
        // with `longest` the first key sticks at the common prefix
        let mut advance = count != 1 || !allow_expansion || !opt.longest;
        if self.restarting {
            advance = false;
            self.restarting = false;
        }
        if !self.find_next(env, cx, allow_expansion, count, advance)? {
            return Ok(false);
        }

        if opt.noinsert && !started {
            let text = self.original.clone();
            self.write_text(&mut *cx.buffer, &text)?;
            self.used_match = false;
        } else if insert {
            if !opt.longest || self.used_match {
                self.insert_shown(&mut *cx.buffer)?;
            } else {
                let text = self.leader_or_original();
                self.write_text(&mut *cx.buffer, &text)?;
            }
        } else {
            self.used_match = false;
        }
        if !allow_expansion {
            self.show(env);
        }
        self.enter_selects = if opt.noinsert && !started {
            true
        } else {
            !insert && self.menu_visible
        };
        trace!(
            target: "complete.session",
            shown = self.shown.index(),
            count,
            insert,
            pending = self.pending,
            "highlight_moved"
        );
        Ok(true)
    }

    fn find_next(
        &mut self,
        env: &mut Env<'_>,
        cx: &mut EditContext<'_>,
        allow_expansion: bool,
        count: usize,
        advance: bool,
    ) -> Result<bool, CompletionError> {
        let fuzzy = self.fuzzy(env);
        if fuzzy && self.presentation.is_none() {
            self.rebuild_presentation(env);
        }
        let noselect = env.config.completeopt.noselect;
        let mut todo = count;
        let mut found: Option<CandidateId> = None;
        while todo > 0 {
            todo -= 1;
            let neighbour = if fuzzy {
                self.presentation
                    .as_ref()
                    .and_then(|p| p.fuzzy_step(self.shows_dir))
            } else {
                self.store.step(self.shown, self.shows_dir)
            };
            let found_end = match (neighbour, self.shows_dir) {
                (Some(next), _) if fuzzy => {
                    self.shown = next;
                    if let Some(p) = self.presentation.as_mut() {
                        p.select(next);
                    }
                    next == CandidateId::ORIGIN
                }
                (Some(next), Direction::Forward) => {
                    self.shown = next;
                    self.store.is_first(next)
                        || self.store.next(next).is_some_and(|n| self.store.is_first(n))
                }
                (Some(prev), Direction::Backward) => {
                    let at_first = self.store.is_first(self.shown);
                    self.shown = prev;
                    at_first || self.store.is_first(prev)
                }
                (None, dir) => {
                    let sign = if dir == Direction::Backward { -1 } else { 1 };
                    if !allow_expansion {
                        if advance {
                            self.pending += sign * (todo as i64 + 1);
                        }
                        return Ok(false);
                    }
                    if !noselect && advance {
                        self.pending += sign;
                    }
                    let before = self.store.len();
                    self.expand(env, cx)?;
                    while self.pending != 0 && self.direction == self.shows_dir && advance {
                        if self.pending > 0
                            && let Some(n) = self.store.next(self.shown)
                        {
                            self.shown = n;
                            self.pending -= 1;
                        }
                        if self.pending < 0
                            && let Some(p) = self.store.prev(self.shown)
                        {
                            self.shown = p;
                            self.pending += 1;
                        } else {
                            break;
                        }
                    }
                    if self.store.len() == before && self.store.step(self.shown, dir).is_none() {
                        // nothing new and nowhere to go
                        break;
                    }
                    false
                }
            };

            let usable = match (self.store.get(self.shown), self.leader.as_deref()) {
                (Some(c), Some(leader)) => {
                    c.is_origin() || c.matches_leader(leader) || (fuzzy && c.score > 0)
                }
                _ => true,
            };
            if usable {
                found = Some(self.shown);
            } else {
                todo += 1;
            }
            if found_end {
                if let Some(f) = found {
                    self.shown = f;
                    break;
                }
                // first usable match after wrapping around
                todo = 1;
            }
        }
        Ok(true)
    }

    /// Point the highlight at the candidate actually shown under the leader.
    fn update_shown_match(&mut self) {
        let Some(leader) = self.leader.clone() else {
            return;
        };
        let ok = |store: &CandidateStore, id| store.get(id).is_some_and(|c| c.matches_leader(&leader));
        while !ok(&self.store, self.shown)
            && let Some(n) = self.store.next(self.shown)
            && !self.store.is_first(n)
        {
            self.shown = n;
        }
        if self.shows_dir == Direction::Backward
            && !ok(&self.store, self.shown)
            && self
                .store
                .next(self.shown)
                .is_none_or(|n| self.store.is_first(n))
        {
            while !ok(&self.store, self.shown)
                && let Some(p) = self.store.prev(self.shown)
                && !self.store.is_first(p)
            {
                self.shown = p;
            }
        }
    }

    fn fuzzy(&self, env: &Env<'_>) -> bool {
        env.config.completeopt.fuzzy && self.leader.as_deref().is_some_and(|l| !l.is_empty())
    }

    pub(crate) fn leader_or_original(&self) -> String {
        self.leader.clone().unwrap_or_else(|| self.original.clone())
    }

    /// Write the highlighted candidate; the origin writes the leader.
    pub(crate) fn insert_shown(&mut self, buf: &mut dyn TextBuffer) -> Result<(), CompletionError> {
        let (text, is_origin) = match self.store.get(self.shown) {
            Some(c) if !c.is_origin() => (c.text.clone(), false),
            _ => (self.leader_or_original(), true),
        };
        self.write_text(buf, &text)?;
        self.used_match = !is_origin;
        Ok(())
    }

    /// Replace the text at the anchor with `text`.
    ///
    /// Fails without editing when the buffer no longer holds the text this
    /// session wrote last. Only the part after the common prefix is spliced,
    /// so writing the same text twice is a no-op.
    pub(crate) fn write_text(&mut self, buf: &mut dyn TextBuffer, text: &str) -> Result<(), CompletionError> {
        let anchor = self.query.anchor;
        let line = buf
            .get_line(anchor.line)
            .ok_or_else(|| CompletionError::conflict("anchor line was deleted"))?;
        let end = anchor.byte + self.inserted.len();
        if line.get(anchor.byte..end) != Some(self.inserted.as_str()) {
            return Err(CompletionError::conflict("text at the completion start changed"));
        }
        if self.inserted != text {
            let keep = common_prefix_len(&self.inserted, text);
            buf.splice(
                LineRange {
                    line: anchor.line,
                    start: anchor.byte + keep,
                    end,
                },
                &text[keep..],
            )
            .map_err(|e| CompletionError::conflict(e.to_string()))?;
            trace!(target: "complete.session", kept = keep, written = text.len() - keep, "text_written");
            self.inserted = text.to_string();
        }
        buf.set_cursor(Position::new(anchor.line, anchor.byte + text.len()));
        Ok(())
    }

    pub(crate) fn rebuild_presentation(&mut self, env: &Env<'_>) {
        self.presentation = Some(Presentation::build(
            &mut self.store,
            self.leader.as_deref(),
            &env.config.completeopt,
            env.scorer,
            &mut self.shown,
        ));
    }

    /// Hand the menu widget the current rows, or take the menu down when
    /// there is nothing worth showing.
    pub(crate) fn show(&mut self, env: &mut Env<'_>) {
        let opt = env.config.completeopt;
        if !menu_wanted(&opt) || !enough_matches(&self.store, &opt) {
            self.hide_menu(env);
            return;
        }
        match self.presentation.as_mut() {
            Some(p) => p.select(self.shown),
            None => self.rebuild_presentation(env),
        }
        let Some(p) = self.presentation.as_ref().filter(|p| !p.is_empty()) else {
            self.hide_menu(env);
            return;
        };
        env.backends.menu.display(p.rows(), p.selected());
        self.menu_visible = true;
    }

    pub(crate) fn hide_menu(&mut self, env: &mut Env<'_>) {
        if self.menu_visible {
            env.backends.menu.undisplay();
            self.menu_visible = false;
        }
    }

    /// Status line after a move. `quiet_origin` skips "Back at original"
    /// when the highlight has simply not moved yet.
    pub(crate) fn report(&mut self, env: &mut Env<'_>, quiet_origin: bool) {
        if self.store.len() <= 1 {
            if self.dispatcher.is_finished() {
                env.backends.status.publish("Pattern not found", StatusClass::NotFound);
            }
            return;
        }
        let Some(shown) = self.store.get(self.shown) else {
            return;
        };
        let source = shown.source.clone();
        if shown.is_origin() {
            if !quiet_origin {
                env.backends.status.publish("Back at original", StatusClass::Warning);
            }
        } else if self.matches == Some(1) {
            env.backends.status.publish("The only match", StatusClass::Info);
        } else {
            self.store.update_sequence_numbers(self.direction);
            if let Some(n) = self.store.get(self.shown).and_then(|c| c.number) {
                let msg = match self.matches {
                    Some(m) => format!("match {n} of {m}"),
                    None => format!("match {n}"),
                };
                env.backends.status.publish(&msg, StatusClass::Info);
            }
        }
        if let Some(src) = source {
            env.backends
                .status
                .publish(&format!("match in file {src}"), StatusClass::Info);
        }
    }

    /// Throw away every candidate and search again for the current leader.
    pub(crate) fn restart(&mut self, env: &mut Env<'_>, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        let text = self.leader_or_original();
        self.query.ignore_case = env.config.ignorecase
            && !(env.config.smartcase && text.chars().any(char::is_uppercase));
        self.query.pattern = build_pattern(self.query.mode, &text, self.query.ignore_case)?;
        self.query.search_text = text;
        self.store.init(&self.original);
        self.presentation = None;
        self.shown = CandidateId::ORIGIN;
        self.pending = 0;
        self.matches = None;
        self.refresh_always = false;
        self.dispatcher = Dispatcher::new(sources_for(self.query.mode, env.config));
        self.restarting = true;
        debug!(target: "complete.session", search_len = self.query.search_text.len(), "restart");
        self.expand(env, cx)
    }
}

fn build_pattern(mode: CompletionMode, text: &str, ignore_case: bool) -> Result<SearchPattern, CompletionError> {
    let pattern = if mode == CompletionMode::WholeLine {
        SearchPattern::whole_line(text, ignore_case)
    } else {
        SearchPattern::keyword(text, ignore_case)
    };
    pattern.map_err(|e| CompletionError::no_source(format!("bad search pattern: {e}")))
}

/// First call of a completion function: `func(1, "")` answers the start column.
fn find_start(
    func: &str,
    line: &str,
    cursor: Position,
    env: &mut Env<'_>,
    cx: &mut EditContext<'_>,
) -> Result<FindStart, CompletionError> {
    let host = env
        .backends
        .script
        .as_mut()
        .ok_or_else(|| CompletionError::no_source("no script host"))?;
    let value = host
        .call(func, &[Value::from(1), Value::from("")])
        .map_err(|e| CompletionError::UserCallbackFailed(format!("{func}: {e}")))?;
    if cx.buffer.cursor() != cursor || cx.buffer.get_line(cursor.line).as_deref() != Some(line) {
        return Err(CompletionError::conflict("completion function deleted text"));
    }
    let start = parse_find_start(&value, line, grapheme::floor_char(line, cursor.byte))?;
    trace!(target: "complete.session", function = func, ?start, "find_start");
    Ok(start)
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}
