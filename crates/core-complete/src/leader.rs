//! Leader engine: narrowing the candidates by what the user types while the
//! session is live.
//!
//! The leader is the text the user has typed since the anchor, kept apart
//! from the original text. Typing, deleting or pulling a character from the
//! highlighted match each rewrite the leader, write it to the buffer and
//! rebuild the menu. A leader change normally just filters the candidates
//! found so far; the search is restarted when the completion function asked
//! to be called again on every change, when an interrupted scan left
//! nothing to show, or when a backspace goes behind the searched text.

use core_text::grapheme;
use tracing::{debug, trace};

use crate::collab::EditContext;
use crate::error::CompletionError;
use crate::mode::CompletionMode;
use crate::session::{CompletionSession, Env};

impl CompletionSession {
    /// Replace the leader with `text` and write it at the anchor.
    pub(crate) fn set_leader(
        &mut self,
        env: &mut Env<'_>,
        cx: &mut EditContext<'_>,
        text: &str,
    ) -> Result<(), CompletionError> {
        if self.leader.as_deref() == Some(text) && self.inserted == text {
            trace!(target: "complete.leader", "leader_unchanged");
            return Ok(());
        }
        self.write_text(&mut *cx.buffer, text)?;
        self.leader = Some(text.to_string());
        if self.needs_restart(env) {
            self.restart(env, cx)?;
        }
        self.new_leader(env);
        Ok(())
    }

    /// Type `c` at the cursor and make the result the leader.
    pub(crate) fn append_char(
        &mut self,
        env: &mut Env<'_>,
        cx: &mut EditContext<'_>,
        c: char,
    ) -> Result<(), CompletionError> {
        let mut text = self.inserted.clone();
        text.push(c);
        self.write_text(&mut *cx.buffer, &text)?;
        self.leader = Some(text);
        if self.needs_restart(env) {
            self.restart(env, cx)?;
        }
        self.new_leader(env);
        Ok(())
    }

    /// Delete the character before the cursor from the leader. Returns
    /// false, leaving the buffer alone, when that would reach the anchor;
    /// omni completion may delete up to the anchor itself.
    pub(crate) fn backspace(&mut self, env: &mut Env<'_>, cx: &mut EditContext<'_>) -> Result<bool, CompletionError> {
        let anchor = self.query.anchor;
        let cursor = cx.buffer.cursor();
        if cursor.line != anchor.line || cursor.byte <= anchor.byte {
            return Ok(false);
        }
        let line = cx.buffer.get_line(cursor.line).unwrap_or_default();
        let prev = grapheme::prev_boundary(&line, cursor.byte);
        if prev < anchor.byte || (prev == anchor.byte && self.query.mode != CompletionMode::Omni) {
            return Ok(false);
        }
        // deleted into the text the search was built from
        let restart = self.inserted.len() <= self.query.search_text.len() || self.needs_restart(env);
        let text = line[anchor.byte..prev].to_string();
        self.write_text(&mut *cx.buffer, &text)?;
        self.leader = Some(text);
        if restart {
            self.restart(env, cx)?;
        }
        self.new_leader(env);
        Ok(true)
    }

    /// Extend the leader by the next character of the highlighted match, or
    /// of the first matching candidate while the original is highlighted.
    pub(crate) fn add_from_match(&mut self, env: &mut Env<'_>, cx: &mut EditContext<'_>) -> Result<(), CompletionError> {
        let len = self.inserted.len();
        let Some(shown) = self.store.get(self.shown) else {
            return Ok(());
        };
        let mut source = shown.text.as_str();
        if source.len() <= len {
            if !shown.is_origin() {
                return Ok(());
            }
            let leader = self.leader.as_deref();
            let first = self
                .store
                .iter()
                .map(|(_, c)| c)
                .find(|c| !c.is_origin() && leader.is_none_or(|l| c.matches_leader(l)));
            match first {
                Some(c) if c.text.len() > len => source = c.text.as_str(),
                _ => return Ok(()),
            }
        }
        let Some(c) = source.get(len..).and_then(|rest| rest.chars().next()) else {
            return Ok(());
        };
        trace!(target: "complete.leader", "add_from_match");
        self.append_char(env, cx, c)
    }

    /// Rebuild the menu for a changed leader.
    fn new_leader(&mut self, env: &mut Env<'_>) {
        self.used_match = false;
        self.presentation = None;
        self.show(env);
        self.enter_selects = self.menu_visible && self.selected_row().is_some();
        debug!(
            target: "complete.leader",
            leader_len = self.leader.as_deref().map_or(0, str::len),
            rows = self.rows().len(),
            "leader_changed"
        );
    }

    /// Candidates the current leader lets through.
    pub(crate) fn filtered_count(&self, env: &Env<'_>) -> usize {
        let leader = self.leader.as_deref().unwrap_or("");
        let fuzzy = env.config.completeopt.fuzzy && !leader.is_empty();
        self.candidates()
            .filter(|c| {
                leader.is_empty()
                    || c.matches_leader(leader)
                    || (fuzzy && env.scorer.score(leader, &c.text) > 0)
            })
            .count()
    }

    fn needs_restart(&self, env: &Env<'_>) -> bool {
        self.refresh_always || (self.interrupted && self.filtered_count(env) == 0)
    }
}
