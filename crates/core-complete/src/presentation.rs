//! The popup menu's view of the candidate store.
//!
//! A `Presentation` is a filtered (and in fuzzy mode, ranked) snapshot of the
//! store: one row per candidate that passes the leader, plus the index of the
//! highlighted row. It keeps a back-reference from every row to its
//! candidate so menu navigation can map a row to the record to insert.
//! The snapshot is rebuilt when the leader changes or new candidates arrive
//! and is only re-pointed when the highlight moves.

use core_config::CompleteOpt;
use tracing::trace;

use crate::candidate::{CandidateId, CandidateStore};
use crate::collab::MenuRow;
use crate::fuzzy::FuzzyScorer;
use crate::mode::Direction;

#[derive(Debug, Clone, Default)]
pub struct Presentation {
    rows: Vec<MenuRow>,
    ids: Vec<CandidateId>,
    selected: Option<usize>,
}

/// Does the user want a menu at all?
pub fn menu_wanted(opt: &CompleteOpt) -> bool {
    opt.menu || opt.menuone
}

/// Two candidates, or one with `menuone`.
pub fn enough_matches(store: &CandidateStore, opt: &CompleteOpt) -> bool {
    let need = if opt.menuone { 1 } else { 2 };
    store.iter().filter(|(_, c)| !c.is_origin()).take(need).count() >= need
}

impl Presentation {
    /// Filter and order the store for display. In fuzzy mode with a
    /// non-empty leader every candidate is scored first, rows are sorted by
    /// descending score (ties keep list order) and the best row becomes the
    /// highlight unless `noselect` is set. Otherwise a highlight that was
    /// filtered out moves to the nearest displayed candidate after it, or
    /// before it when none follows.
    pub fn build(
        store: &mut CandidateStore,
        leader: Option<&str>,
        opt: &CompleteOpt,
        scorer: &dyn FuzzyScorer,
        shown: &mut CandidateId,
    ) -> Self {
        let leader = leader.unwrap_or("");
        let fuzzy = opt.fuzzy && !leader.is_empty();
        let order: Vec<CandidateId> = store.iter().map(|(id, _)| id).collect();
        let mut entries: Vec<(usize, CandidateId, i32)> = Vec::new();
        for (pos, &id) in order.iter().enumerate() {
            let Some(cand) = store.get_mut(id) else {
                continue;
            };
            if cand.is_origin() {
                continue;
            }
            if fuzzy {
                cand.score = scorer.score(leader, &cand.text);
            }
            if leader.is_empty() || cand.matches_leader(leader) || (fuzzy && cand.score > 0) {
                entries.push((pos, id, cand.score));
            }
        }

        let mut selected = None;
        if fuzzy {
            entries.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
            if !opt.noselect
                && let Some(&(_, best, _)) = entries.first()
            {
                *shown = best;
            }
            selected = entries.iter().position(|e| e.1 == *shown);
        } else if *shown != CandidateId::ORIGIN {
            selected = entries.iter().position(|e| e.1 == *shown);
            if selected.is_none()
                && let Some(shown_pos) = order.iter().position(|id| id == shown)
            {
                let after = entries.iter().position(|e| e.0 > shown_pos);
                let before = entries.iter().rposition(|e| e.0 < shown_pos);
                selected = after.or(before);
                if let Some(i) = selected {
                    *shown = entries[i].1;
                }
            }
        }

        let rows = entries
            .iter()
            .filter_map(|&(_, id, _)| {
                let c = store.get(id)?;
                Some(MenuRow {
                    text: c.extras.abbr.clone().unwrap_or_else(|| c.text.clone()),
                    kind: c.extras.kind.clone(),
                    extra: c
                        .extras
                        .menu
                        .clone()
                        .or_else(|| c.source.as_deref().map(str::to_string)),
                    info: c.extras.info.clone(),
                    text_highlight: c.extras.abbr_highlight.clone(),
                    kind_highlight: c.extras.kind_highlight.clone(),
                })
            })
            .collect::<Vec<_>>();
        let ids = entries.into_iter().map(|e| e.1).collect();
        trace!(target: "complete.session", rows = rows.len(), ?selected, fuzzy, "presentation_built");
        Self {
            rows,
            ids,
            selected,
        }
    }

    pub fn rows(&self) -> &[MenuRow] {
        &self.rows
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn candidate_at(&self, row: usize) -> Option<CandidateId> {
        self.ids.get(row).copied()
    }

    /// Re-point the highlight at `id` (none when it is not displayed).
    pub fn select(&mut self, id: CandidateId) {
        self.selected = self.ids.iter().position(|&i| i == id);
    }

    /// Next candidate in display order, for fuzzy mode where the menu order
    /// differs from the list order. Stepping past either end lands on the
    /// origin; stepping from the origin enters at the near end.
    pub fn fuzzy_step(&self, dir: Direction) -> Option<CandidateId> {
        let n = self.ids.len();
        if n == 0 {
            return None;
        }
        let target = match (dir, self.selected) {
            (Direction::Forward, Some(i)) if i + 1 >= n => return Some(CandidateId::ORIGIN),
            (Direction::Backward, Some(0)) => return Some(CandidateId::ORIGIN),
            (Direction::Forward, Some(i)) => i + 1,
            (Direction::Backward, Some(i)) => i - 1,
            (Direction::Forward, None) => 0,
            (Direction::Backward, None) => n - 1,
        };
        self.ids.get(target).copied()
    }
}
