//! Core key event types and the non-blocking input contract.
//!
//! Keys arrive normalized as `KeyEvent { code, mods }`. Long-running work in
//! insert mode (completion scans) must stay responsive, so instead of reading
//! input directly it is handed a `PendingInput`: a queue it may peek without
//! blocking and selectively consume from. Anything left in the queue belongs
//! to the regular key dispatch loop.

use std::collections::VecDeque;
use std::fmt;

use anyhow::{Result, bail};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const CTRL = 0b0000_0001;
        const ALT  = 0b0000_0010;
        const SHIFT= 0b0000_0100;
    }
}

impl KeyEvent {
    pub const fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::empty())
    }

    pub const fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    /// `<C-x>` style chord. Letters are stored lowercase.
    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c.to_ascii_lowercase()), KeyModifiers::CTRL)
    }

    /// True for `<C-c>` (case-insensitive on the letter).
    pub fn is_ctrl(&self, c: char) -> bool {
        self.mods.contains(KeyModifiers::CTRL)
            && matches!(self.code, KeyCode::Char(k) if k.eq_ignore_ascii_case(&c))
    }

    /// The character this key would insert, if any.
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if !self.mods.intersects(KeyModifiers::CTRL | KeyModifiers::ALT) => {
                Some(c)
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.code {
            KeyCode::Char(c) if self.mods.is_empty() || self.mods == KeyModifiers::SHIFT => {
                return if c == '<' { f.write_str("<lt>") } else { write!(f, "{c}") };
            }
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "CR".to_string(),
            KeyCode::Esc => "Esc".to_string(),
            KeyCode::Backspace => "BS".to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::Left => "Left".to_string(),
            KeyCode::Right => "Right".to_string(),
            KeyCode::PageUp => "PageUp".to_string(),
            KeyCode::PageDown => "PageDown".to_string(),
        };
        f.write_str("<")?;
        if self.mods.contains(KeyModifiers::CTRL) {
            f.write_str("C-")?;
        }
        if self.mods.contains(KeyModifiers::ALT) {
            f.write_str("M-")?;
        }
        if self.mods.contains(KeyModifiers::SHIFT) {
            f.write_str("S-")?;
        }
        write!(f, "{name}>")
    }
}

/// Parse Vim-style key notation (`foo<C-n><C-n><C-y>`) into key events.
pub fn parse_keys(notation: &str) -> Result<Vec<KeyEvent>> {
    let mut out = Vec::new();
    let mut rest = notation;
    while let Some(c) = rest.chars().next() {
        if c == '<'
            && let Some(end) = rest.find('>')
            && end > 1
        {
            out.push(parse_bracketed(&rest[1..end])?);
            rest = &rest[end + 1..];
            continue;
        }
        out.push(KeyEvent::char(c));
        rest = &rest[c.len_utf8()..];
    }
    trace!(target: "input.keys", count = out.len(), "parse_keys");
    Ok(out)
}

fn parse_bracketed(token: &str) -> Result<KeyEvent> {
    let mut mods = KeyModifiers::empty();
    let mut name = token;
    loop {
        let (prefix, tail) = match name.split_once('-') {
            Some((p, t)) if !t.is_empty() && p.len() == 1 => (p, t),
            _ => break,
        };
        match prefix.to_ascii_uppercase().as_str() {
            "C" => mods |= KeyModifiers::CTRL,
            "M" | "A" => mods |= KeyModifiers::ALT,
            "S" => mods |= KeyModifiers::SHIFT,
            _ => bail!("unknown modifier `{prefix}` in <{token}>"),
        }
        name = tail;
    }
    let code = match name.to_ascii_lowercase().as_str() {
        "cr" | "enter" | "return" => KeyCode::Enter,
        "esc" => KeyCode::Esc,
        "bs" | "backspace" => KeyCode::Backspace,
        "tab" => KeyCode::Tab,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "space" => KeyCode::Char(' '),
        "lt" => KeyCode::Char('<'),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if mods.contains(KeyModifiers::CTRL) => {
                    KeyCode::Char(c.to_ascii_lowercase())
                }
                (Some(c), None) => KeyCode::Char(c),
                _ => bail!("unknown key name <{token}>"),
            }
        }
    };
    Ok(KeyEvent::new(code, mods))
}

/// Non-blocking view of keys typed but not yet dispatched.
pub trait PendingInput {
    /// Look at the next pending key without consuming it. Never blocks.
    fn peek(&mut self) -> Option<KeyEvent>;
    /// Consume the next pending key.
    fn take(&mut self) -> Option<KeyEvent>;
}

/// Input source with nothing pending, for callers that never type ahead.
pub struct NoPendingInput;

impl PendingInput for NoPendingInput {
    fn peek(&mut self) -> Option<KeyEvent> {
        None
    }
    fn take(&mut self) -> Option<KeyEvent> {
        None
    }
}

/// FIFO of typed-ahead keys.
#[derive(Debug, Default, Clone)]
pub struct KeyQueue {
    keys: VecDeque<KeyEvent>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: KeyEvent) {
        self.keys.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<KeyEvent> for KeyQueue {
    fn from_iter<I: IntoIterator<Item = KeyEvent>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl PendingInput for KeyQueue {
    fn peek(&mut self) -> Option<KeyEvent> {
        self.keys.front().copied()
    }
    fn take(&mut self) -> Option<KeyEvent> {
        self.keys.pop_front()
    }
}
