//! What a key means while a completion session is live.

use core_events::{KeyCode, KeyEvent, KeyModifiers};
use core_text::class::{is_fname_char, is_ident_char, is_keyword_char};

use crate::mode::{CompletionMode, Direction};

/// A key that moves the highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleKey {
    pub direction: Direction,
    pub count: usize,
    /// Write the newly highlighted candidate into the buffer. Menu
    /// navigation keys only move the highlight.
    pub insert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Cycle(CycleKey),
    /// `<C-y>`: take the highlighted candidate and end.
    Accept,
    /// `<C-e>`: restore the leader (or the original text) and end.
    Dismiss,
    /// `<CR>`: selects when a menu item is highlighted but not inserted.
    Enter,
    Backspace,
    /// `<C-l>`: extend the leader by one character of the highlighted match.
    AddFromMatch,
    /// `<C-x>`: start picking a different mode.
    CtrlX,
    /// A character that belongs to the completed text.
    Insert(char),
    /// Anything else ends the session and is handled by the caller.
    Other,
}

/// Classify `key` as a cycling key, if it is one.
///
/// Plain `<C-n>`/`<C-p>` always cycle. The current mode's own key (`<C-l>` in
/// whole-line mode, `<C-k>` in dictionary mode, ...) cycles too: backward for
/// `<C-l>`, forward otherwise. Arrows move one row and page keys move
/// `page` rows without inserting.
pub fn cycle_key(key: KeyEvent, mode: CompletionMode, page: usize) -> Option<CycleKey> {
    let cycle = |direction, count, insert| {
        Some(CycleKey {
            direction,
            count,
            insert,
        })
    };
    match key.code {
        KeyCode::Up if key.mods.is_empty() => return cycle(Direction::Backward, 1, false),
        KeyCode::Down if key.mods.is_empty() => return cycle(Direction::Forward, 1, false),
        KeyCode::Up if key.mods == KeyModifiers::SHIFT => return cycle(Direction::Backward, 1, true),
        KeyCode::Down if key.mods == KeyModifiers::SHIFT => return cycle(Direction::Forward, 1, true),
        KeyCode::PageUp => return cycle(Direction::Backward, page, false),
        KeyCode::PageDown => return cycle(Direction::Forward, page, false),
        _ => {}
    }
    if key.is_ctrl('n') {
        return cycle(Direction::Forward, 1, true);
    }
    if key.is_ctrl('p') {
        return cycle(Direction::Backward, 1, true);
    }
    let repeat = mode.repeat_key()?;
    if key.is_ctrl(repeat) || (repeat == 'i' && key.code == KeyCode::Tab && key.mods.is_empty()) {
        let dir = if repeat == 'l' {
            Direction::Backward
        } else {
            Direction::Forward
        };
        return cycle(dir, 1, true);
    }
    None
}

/// Full role of `key` during a session.
pub fn classify(key: KeyEvent, mode: CompletionMode, menu_visible: bool, page: usize) -> KeyRole {
    if let Some(c) = cycle_key(key, mode, page) {
        return KeyRole::Cycle(c);
    }
    if key.is_ctrl('y') {
        return KeyRole::Accept;
    }
    if key.is_ctrl('e') {
        return KeyRole::Dismiss;
    }
    if key.is_ctrl('x') {
        return KeyRole::CtrlX;
    }
    if key.is_ctrl('l') && menu_visible {
        return KeyRole::AddFromMatch;
    }
    match key.code {
        KeyCode::Enter if key.mods.is_empty() => return KeyRole::Enter,
        KeyCode::Backspace => return KeyRole::Backspace,
        _ => {}
    }
    match key.printable() {
        Some(c) if accepts_char(mode, c) => KeyRole::Insert(c),
        _ => KeyRole::Other,
    }
}

/// May `c` be typed into the completed text without ending the session?
pub fn accepts_char(mode: CompletionMode, c: char) -> bool {
    match mode {
        CompletionMode::PathDefines => is_ident_char(c),
        CompletionMode::Files => is_fname_char(c) && c != '/',
        CompletionMode::CommandLine | CompletionMode::Omni => !c.is_control() && !c.is_whitespace(),
        CompletionMode::WholeLine => !c.is_control(),
        _ => is_keyword_char(c),
    }
}
