//! Insert-mode key replay with the completion engine attached.
//!
//! Every key is queued up front, so the engine sees the rest of the input as
//! typed ahead: cycling keys are applied while a source is still being
//! scanned and any other key interrupts the scan.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use core_complete::{
    Backends, CompleteDone, CompletionEngine, EditContext, KeyOutcome, MenuRow, MenuWidget, StatusClass,
    StatusLine,
};
use core_config::CompletionConfig;
use core_events::{KeyCode, KeyEvent, KeyQueue, PendingInput};
use core_state::{Document, DocumentSet};
use core_text::{Position, grapheme};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub rows: Vec<String>,
    pub selected: Option<usize>,
}

/// What a user would see below the text.
#[derive(Debug, Default)]
pub struct Screen {
    pub status: Vec<(String, StatusClass)>,
    pub menu: Option<MenuState>,
}

pub type SharedScreen = Rc<RefCell<Screen>>;

struct ScreenStatus(SharedScreen);

impl StatusLine for ScreenStatus {
    fn publish(&mut self, msg: &str, class: StatusClass) {
        self.0.borrow_mut().status.push((msg.to_string(), class));
    }
}

struct ScreenMenu(SharedScreen);

impl MenuWidget for ScreenMenu {
    fn display(&mut self, rows: &[MenuRow], selected: Option<usize>) {
        self.0.borrow_mut().menu = Some(MenuState {
            rows: rows.iter().map(|r| r.text.clone()).collect(),
            selected,
        });
    }

    fn undisplay(&mut self) {
        self.0.borrow_mut().menu = None;
    }
}

/// Result of one replay.
#[derive(Debug)]
pub struct Outcome {
    pub line: String,
    pub cursor: Position,
    /// Esc reached the editor, leaving insert mode.
    pub left_insert: bool,
    pub done: Vec<CompleteDone>,
    pub errors: Vec<String>,
}

pub struct Replay {
    engine: CompletionEngine,
    docs: DocumentSet,
    pending: KeyQueue,
    screen: SharedScreen,
}

impl Replay {
    /// `docs` must have a current document; its cursor is where typing starts.
    pub fn new(config: CompletionConfig, backends: Backends, docs: DocumentSet) -> Self {
        let screen = SharedScreen::default();
        let backends = backends
            .with_status(ScreenStatus(screen.clone()))
            .with_menu(ScreenMenu(screen.clone()));
        Self {
            engine: CompletionEngine::new(config, backends),
            docs,
            pending: KeyQueue::new(),
            screen,
        }
    }

    pub fn type_ahead(&mut self, keys: impl IntoIterator<Item = KeyEvent>) {
        for key in keys {
            self.pending.push(key);
        }
    }

    pub fn screen(&self) -> SharedScreen {
        self.screen.clone()
    }

    pub fn engine(&self) -> &CompletionEngine {
        &self.engine
    }

    /// Dispatch queued keys until they run out or Esc leaves insert mode.
    pub fn run(&mut self) -> Result<Outcome> {
        let mut done = Vec::new();
        let mut errors = Vec::new();
        let mut left_insert = false;
        let (current, others) = self.docs.split_current().context("no current document")?;

        while let Some(key) = self.pending.take() {
            let fed = {
                let mut cx = EditContext::new(&mut *current, &others, &mut self.pending);
                self.engine.feed(&mut cx, key)
            };
            let outcome = match fed {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(target: "runtime", kind = ?e.kind(), "completion_failed");
                    errors.push(e.to_string());
                    KeyOutcome::Consumed
                }
            };
            done.extend(self.engine.take_done());
            if outcome == KeyOutcome::PassThrough && !insert_key(current, key)? {
                left_insert = true;
                break;
            }
            let mut cx = EditContext::new(&mut *current, &others, &mut self.pending);
            if let Err(e) = self.engine.tick(&mut cx) {
                errors.push(e.to_string());
            }
        }

        // An interrupted scan with nothing left to type runs to the end.
        if !left_insert {
            let mut cx = EditContext::new(&mut *current, &others, &mut self.pending);
            if let Err(e) = self.engine.tick(&mut cx) {
                errors.push(e.to_string());
            }
        }
        done.extend(self.engine.take_done());

        let cursor = current.cursor();
        debug!(target: "runtime", left_insert, sessions = done.len(), errors = errors.len(), "replay_finished");
        Ok(Outcome {
            line: current.line(cursor.line).unwrap_or_default(),
            cursor,
            left_insert,
            done,
            errors,
        })
    }
}

/// Plain insert-mode editing for keys the engine passes through. Returns
/// false when the key leaves insert mode.
pub fn insert_key(doc: &mut Document, key: KeyEvent) -> Result<bool> {
    let pos = doc.cursor();
    match key.code {
        KeyCode::Esc => return Ok(false),
        KeyCode::Enter => {
            doc.splice(pos.line, pos.byte..pos.byte, "\n")?;
            doc.set_cursor(Position::new(pos.line + 1, 0));
        }
        KeyCode::Backspace => {
            let line = doc.line(pos.line).unwrap_or_default();
            if pos.byte > 0 {
                let prev = grapheme::prev_boundary(&line, pos.byte);
                doc.splice(pos.line, prev..pos.byte, "")?;
                doc.set_cursor(Position::new(pos.line, prev));
            }
        }
        KeyCode::Tab => insert_char(doc, '\t')?,
        _ => match key.printable() {
            Some(c) => insert_char(doc, c)?,
            None => trace!(target: "runtime", %key, "key_ignored"),
        },
    }
    Ok(true)
}

fn insert_char(doc: &mut Document, c: char) -> Result<()> {
    let pos = doc.cursor();
    doc.splice(pos.line, pos.byte..pos.byte, c.encode_utf8(&mut [0; 4]))?;
    doc.set_cursor(Position::new(pos.line, pos.byte + c.len_utf8()));
    Ok(())
}
