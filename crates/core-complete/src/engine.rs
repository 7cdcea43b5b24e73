//! Entry point for the key-dispatch loop.
//!
//! `CompletionEngine` holds the configuration and the long-lived
//! collaborators and owns at most one live session. The editor hands every
//! key typed in insert mode to `feed`; keys the engine does not want come
//! back as `KeyOutcome::PassThrough` for normal processing. `tick` lets an
//! interrupted scan continue while the user is idle.

use core_config::CompletionConfig;
use core_events::KeyEvent;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, trace, warn};

use crate::collab::{Backends, EditContext, StatusClass};
use crate::error::CompletionError;
use crate::fuzzy::{FrizbeeScorer, FuzzyScorer};
use crate::keys::{self, KeyRole};
use crate::mode::{CompletionMode, Direction};
use crate::session::{Begin, CompletionSession, Env};

const CTRL_X_MESSAGE: &str = " ^X mode (^]^D^E^F^I^K^L^N^O^Ps^U^V^Y)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Consumed,
    /// Not a completion key; the caller handles it as usual.
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneReason {
    Accept,
    Cancel,
}

/// The candidate a session ended on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedItem {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,
}

/// Left behind by every session that ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteDone {
    pub mode: &'static str,
    pub reason: DoneReason,
    /// Set when the session ended with a candidate in the buffer.
    pub item: Option<CompletedItem>,
}

pub struct CompletionEngine {
    config: CompletionConfig,
    backends: Backends,
    scorer: Box<dyn FuzzyScorer>,
    session: Option<Box<CompletionSession>>,
    ctrl_x_pending: bool,
    last_done: Option<CompleteDone>,
}

impl CompletionEngine {
    pub fn new(config: CompletionConfig, backends: Backends) -> Self {
        Self {
            config,
            backends,
            scorer: Box::new(FrizbeeScorer::default()),
            session: None,
            ctrl_x_pending: false,
            last_done: None,
        }
    }

    pub fn with_scorer(mut self, scorer: impl FuzzyScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn backends_mut(&mut self) -> &mut Backends {
        &mut self.backends
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CompletionSession> {
        self.session.as_deref()
    }

    /// `<C-x>` was typed and the next key picks the mode.
    pub fn ctrl_x_pending(&self) -> bool {
        self.ctrl_x_pending
    }

    pub fn last_done(&self) -> Option<&CompleteDone> {
        self.last_done.as_ref()
    }

    pub fn take_done(&mut self) -> Option<CompleteDone> {
        self.last_done.take()
    }

    /// Start completing for a trigger key without moving the highlight off
    /// the original text. `<C-n>`/`<C-p>` start keyword completion; after
    /// `<C-x>` the key picks a sub-mode. A trigger typed while a session is
    /// live moves that session's highlight instead.
    pub fn begin(&mut self, cx: &mut EditContext<'_>, key: KeyEvent) -> Result<KeyOutcome, CompletionError> {
        let picked = if self.ctrl_x_pending {
            self.ctrl_x_pending = false;
            CompletionMode::from_ctrl_x_key(key)
        } else if key.is_ctrl('n') {
            Some((CompletionMode::Keyword, Direction::Forward))
        } else if key.is_ctrl('p') {
            Some((CompletionMode::Keyword, Direction::Backward))
        } else {
            None
        };
        let Some((mode, dir)) = picked else {
            return Ok(KeyOutcome::PassThrough);
        };
        if self.is_active() {
            self.advance(cx, dir, 1, true)?;
        } else {
            self.start(cx, mode, dir, false)?;
        }
        Ok(KeyOutcome::Consumed)
    }

    /// Start a session in `mode`. Returns false when the completion function
    /// cancelled it.
    pub fn begin_mode(
        &mut self,
        cx: &mut EditContext<'_>,
        mode: CompletionMode,
        dir: Direction,
    ) -> Result<bool, CompletionError> {
        self.start(cx, mode, dir, false)
    }

    /// Handle one key typed in insert mode.
    pub fn feed(&mut self, cx: &mut EditContext<'_>, key: KeyEvent) -> Result<KeyOutcome, CompletionError> {
        let Some(session) = self.session.as_deref() else {
            return self.feed_idle(cx, key);
        };
        let role = keys::classify(key, session.mode(), session.menu_visible(), self.config.page_step());
        let enter_selects = session.enter_selects();
        trace!(target: "complete.session", %key, "feed");
        match role {
            KeyRole::Cycle(c) => {
                self.advance(cx, c.direction, c.count, c.insert)?;
            }
            KeyRole::Accept => {
                self.accept(cx)?;
            }
            KeyRole::Enter if enter_selects => {
                self.accept(cx)?;
            }
            KeyRole::Enter | KeyRole::Other => {
                self.finish(DoneReason::Accept);
                return Ok(KeyOutcome::PassThrough);
            }
            KeyRole::Dismiss => self.dismiss(cx)?,
            KeyRole::Backspace => {
                let handled = self
                    .with_session(cx, |s, env, cx| s.backspace(env, cx))?
                    .unwrap_or(false);
                if !handled {
                    self.finish(DoneReason::Accept);
                    return Ok(KeyOutcome::PassThrough);
                }
            }
            KeyRole::AddFromMatch => {
                self.with_session(cx, |s, env, cx| s.add_from_match(env, cx))?;
            }
            KeyRole::CtrlX => {
                self.finish(DoneReason::Accept);
                self.enter_ctrl_x();
            }
            KeyRole::Insert(c) => {
                self.with_session(cx, |s, env, cx| s.append_char(env, cx, c))?;
            }
        }
        Ok(KeyOutcome::Consumed)
    }

    fn feed_idle(&mut self, cx: &mut EditContext<'_>, key: KeyEvent) -> Result<KeyOutcome, CompletionError> {
        if self.ctrl_x_pending {
            self.ctrl_x_pending = false;
            let Some((mode, dir)) = CompletionMode::from_ctrl_x_key(key) else {
                trace!(target: "complete.session", %key, "ctrl_x_left");
                return Ok(KeyOutcome::PassThrough);
            };
            self.start(cx, mode, dir, true)?;
            return Ok(KeyOutcome::Consumed);
        }
        if key.is_ctrl('x') {
            self.enter_ctrl_x();
            return Ok(KeyOutcome::Consumed);
        }
        let dir = if key.is_ctrl('n') {
            Direction::Forward
        } else if key.is_ctrl('p') {
            Direction::Backward
        } else {
            return Ok(KeyOutcome::PassThrough);
        };
        self.start(cx, CompletionMode::Keyword, dir, true)?;
        Ok(KeyOutcome::Consumed)
    }

    fn enter_ctrl_x(&mut self) {
        self.ctrl_x_pending = true;
        self.backends.status.publish(CTRL_X_MESSAGE, StatusClass::Mode);
    }

    /// Move the highlight `count` candidates; `commit` also writes it.
    pub fn advance(
        &mut self,
        cx: &mut EditContext<'_>,
        dir: Direction,
        count: usize,
        commit: bool,
    ) -> Result<(), CompletionError> {
        self.with_session(cx, |s, env, cx| s.advance(env, cx, dir, count, commit))?;
        Ok(())
    }

    /// Replace the leader; writing the same leader twice edits nothing.
    pub fn set_leader(&mut self, cx: &mut EditContext<'_>, text: &str) -> Result<(), CompletionError> {
        self.with_session(cx, |s, env, cx| s.set_leader(env, cx, text))?;
        Ok(())
    }

    /// Continue an interrupted scan if no key is waiting.
    pub fn tick(&mut self, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        self.with_session(cx, |s, env, cx| s.resume(env, cx))?;
        Ok(())
    }

    /// Take the highlighted candidate (the leader when the original text is
    /// highlighted) and end the session.
    pub fn accept(&mut self, cx: &mut EditContext<'_>) -> Result<Option<CompletedItem>, CompletionError> {
        if self
            .with_session(cx, |s, _env, cx| s.insert_shown(&mut *cx.buffer))?
            .is_none()
        {
            return Ok(None);
        }
        self.finish(DoneReason::Accept);
        Ok(self.last_done.as_ref().and_then(|d| d.item.clone()))
    }

    /// `<C-e>`: put the leader (or the original text) back and end.
    fn dismiss(&mut self, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        self.with_session(cx, |s, _env, cx| {
            let text = s.leader_or_original();
            s.write_text(&mut *cx.buffer, &text)
        })?;
        self.finish(DoneReason::Cancel);
        Ok(())
    }

    /// Restore the text exactly as it was before the session and end it.
    pub fn cancel(&mut self, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        self.ctrl_x_pending = false;
        self.with_session(cx, |s, _env, cx| {
            let text = s.original.clone();
            s.write_text(&mut *cx.buffer, &text)
        })?;
        self.finish(DoneReason::Cancel);
        Ok(())
    }

    fn start(
        &mut self,
        cx: &mut EditContext<'_>,
        mode: CompletionMode,
        dir: Direction,
        select_first: bool,
    ) -> Result<bool, CompletionError> {
        if self.session.is_some() {
            self.finish(DoneReason::Accept);
        }
        self.ctrl_x_pending = false;
        let Self {
            session,
            backends,
            config,
            scorer,
            ctrl_x_pending,
            ..
        } = self;
        let mut env = Env {
            backends,
            config,
            scorer: &**scorer,
        };
        let started = match CompletionSession::start(mode, dir, &mut env, cx) {
            Ok(Begin::Started(s)) => s,
            Ok(Begin::Cancelled { leave_mode }) => {
                *ctrl_x_pending = !leave_mode;
                info!(target: "complete.session", %mode, leave_mode, "cancelled_by_function");
                return Ok(false);
            }
            Err(err) => {
                warn!(target: "complete.session", %mode, kind = %err.kind(), error = %err, "start_failed");
                env.backends
                    .status
                    .publish(&err.to_string(), StatusClass::Error(err.kind()));
                return Err(err);
            }
        };
        let s = session.insert(started);
        let run = if select_first {
            s.advance(&mut env, cx, dir, 1, true)
        } else {
            s.expand(&mut env, cx).map(|()| {
                s.show(&mut env);
                s.report(&mut env, true);
            })
        };
        if let Err(err) = run {
            Self::abort(session, &mut env, &err);
            return Err(err);
        }
        Ok(true)
    }

    /// Run `f` on the live session. A failure ends the session without
    /// touching the buffer again.
    fn with_session<R>(
        &mut self,
        cx: &mut EditContext<'_>,
        f: impl FnOnce(&mut CompletionSession, &mut Env<'_>, &mut EditContext<'_>) -> Result<R, CompletionError>,
    ) -> Result<Option<R>, CompletionError> {
        let Self {
            session,
            backends,
            config,
            scorer,
            ..
        } = self;
        let Some(s) = session.as_deref_mut() else {
            return Ok(None);
        };
        let mut env = Env {
            backends,
            config,
            scorer: &**scorer,
        };
        match f(s, &mut env, cx) {
            Ok(r) => Ok(Some(r)),
            Err(err) => {
                Self::abort(session, &mut env, &err);
                Err(err)
            }
        }
    }

    fn abort(session: &mut Option<Box<CompletionSession>>, env: &mut Env<'_>, err: &CompletionError) {
        if let Some(s) = session.as_deref_mut() {
            s.hide_menu(env);
        }
        *session = None;
        env.backends
            .status
            .publish(&err.to_string(), StatusClass::Error(err.kind()));
        warn!(target: "complete.session", kind = %err.kind(), error = %err, "session_aborted");
    }

    /// End the session, keeping whatever text is in the buffer.
    fn finish(&mut self, reason: DoneReason) {
        let Some(mut s) = self.session.take() else {
            return;
        };
        let mut env = Env {
            backends: &mut self.backends,
            config: &self.config,
            scorer: &*self.scorer,
        };
        s.hide_menu(&mut env);
        let item = match reason {
            DoneReason::Accept => completed_item(&s),
            DoneReason::Cancel => None,
        };
        info!(
            target: "complete.session",
            mode = %s.mode(),
            ?reason,
            candidates = s.candidates().count(),
            with_item = item.is_some(),
            "session_done"
        );
        self.last_done = Some(CompleteDone {
            mode: s.mode().name(),
            reason,
            item,
        });
    }
}

fn completed_item(s: &CompletionSession) -> Option<CompletedItem> {
    let c = s.shown()?;
    if c.text != s.inserted() {
        return None;
    }
    Some(CompletedItem {
        word: c.text.clone(),
        abbr: c.extras.abbr.clone(),
        menu: c.extras.menu.clone(),
        kind: c.extras.kind.clone(),
        info: c.extras.info.clone(),
        user_data: c.extras.user_data.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NoDocuments;
    use core_events::{KeyCode, KeyQueue};
    use core_state::Document;
    use core_text::Position;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl Write for LockedWriter<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(BufferWriter {
                inner: buffer.clone(),
            })
            .finish();
        with_default(subscriber, f);
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    fn doc() -> Document {
        let mut doc = Document::new("t.txt", "secretword secretive\nse").unwrap();
        doc.set_cursor(Position::new(1, 2));
        doc
    }

    #[test]
    fn logs_name_events_but_never_candidate_text() {
        let mut doc = doc();
        let logs = capture_logs(|| {
            let mut engine = CompletionEngine::new(CompletionConfig::default(), Backends::default());
            let mut input = KeyQueue::new();
            let mut cx = EditContext::new(&mut doc, &NoDocuments, &mut input);
            engine.feed(&mut cx, KeyEvent::ctrl('n')).unwrap();
            engine.feed(&mut cx, KeyEvent::ctrl('y')).unwrap();
        });
        assert_eq!(doc.line(1).as_deref(), Some("secretword"));
        assert!(logs.contains("complete.session"));
        assert!(logs.contains("session_started"));
        assert!(logs.contains("session_done"));
        assert!(!logs.contains("secretword"));
        assert!(!logs.contains("secretive"));
    }

    #[test]
    fn plain_keys_pass_through_while_idle() {
        let mut doc = doc();
        let mut engine = CompletionEngine::new(CompletionConfig::default(), Backends::default());
        let mut input = KeyQueue::new();
        let mut cx = EditContext::new(&mut doc, &NoDocuments, &mut input);
        assert_eq!(engine.feed(&mut cx, KeyEvent::char('a')).unwrap(), KeyOutcome::PassThrough);
        assert_eq!(
            engine.feed(&mut cx, KeyEvent::plain(KeyCode::Enter)).unwrap(),
            KeyOutcome::PassThrough
        );
        assert!(!engine.is_active());
        // an unknown key after <C-x> leaves the sub-mode
        assert_eq!(engine.feed(&mut cx, KeyEvent::ctrl('x')).unwrap(), KeyOutcome::Consumed);
        assert_eq!(engine.feed(&mut cx, KeyEvent::ctrl('z')).unwrap(), KeyOutcome::PassThrough);
        assert!(!engine.ctrl_x_pending());
    }

    #[test]
    fn begin_while_active_moves_the_highlight() {
        let mut doc = doc();
        let mut engine = CompletionEngine::new(CompletionConfig::default(), Backends::default());
        let mut input = KeyQueue::new();
        let mut cx = EditContext::new(&mut doc, &NoDocuments, &mut input);
        engine.begin(&mut cx, KeyEvent::ctrl('n')).unwrap();
        assert_eq!(cx.buffer.get_line(1).as_deref(), Some("se"));
        engine.begin(&mut cx, KeyEvent::ctrl('n')).unwrap();
        assert_eq!(cx.buffer.get_line(1).as_deref(), Some("secretword"));
        assert_eq!(
            engine.begin(&mut cx, KeyEvent::char('q')).unwrap(),
            KeyOutcome::PassThrough
        );
    }

    #[test]
    fn enter_selects_after_narrowing() {
        let mut doc = doc();
        let mut engine = CompletionEngine::new(CompletionConfig::default(), Backends::default());
        let mut input = KeyQueue::new();
        let mut cx = EditContext::new(&mut doc, &NoDocuments, &mut input);
        engine.begin_mode(&mut cx, CompletionMode::Keyword, Direction::Forward).unwrap();
        engine.set_leader(&mut cx, "secret").unwrap();
        // nothing highlighted yet
        assert!(!engine.session().unwrap().enter_selects());
        engine.feed(&mut cx, KeyEvent::plain(KeyCode::Down)).unwrap();
        engine.feed(&mut cx, KeyEvent::plain(KeyCode::Down)).unwrap();
        assert_eq!(cx.buffer.get_line(1).as_deref(), Some("secret"));
        assert!(engine.session().unwrap().enter_selects());
        assert_eq!(engine.feed(&mut cx, KeyEvent::plain(KeyCode::Enter)).unwrap(), KeyOutcome::Consumed);
        assert_eq!(cx.buffer.get_line(1).as_deref(), Some("secretive"));
        assert!(!engine.is_active());
    }

    #[test]
    fn done_event_serializes_lowercase() {
        let done = CompleteDone {
            mode: CompletionMode::Keyword.name(),
            reason: DoneReason::Cancel,
            item: None,
        };
        assert_eq!(
            serde_json::to_string(&done).unwrap(),
            r#"{"mode":"keyword","reason":"cancel","item":null}"#
        );
    }
}
