//! Step budget between input checks.
//!
//! The dispatcher never blocks on input. Instead, every `frequency` steps
//! the governor peeks at the keys typed ahead: a cycling key is consumed and
//! turned into highlight movement while the scan continues; any other key
//! interrupts the scan and is left queued for the regular key dispatch.

use core_events::{KeyEvent, PendingInput};
use tracing::trace;

use crate::keys::{CycleKey, cycle_key};
use crate::mode::CompletionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Budget not spent yet; the input was not looked at.
    Waiting,
    /// Looked, nothing pending.
    Idle,
    Cycle(CycleKey),
    Interrupt(KeyEvent),
}

#[derive(Debug, Clone)]
pub struct Governor {
    frequency: u32,
    count: u32,
}

impl Governor {
    pub fn new(frequency: u32) -> Self {
        Self {
            frequency: frequency.max(1),
            count: 0,
        }
    }

    /// Count one step; look at the input when the budget is spent.
    pub fn poll(&mut self, input: &mut dyn PendingInput, mode: CompletionMode, page: usize) -> Poll {
        self.count += 1;
        if self.count < self.frequency {
            return Poll::Waiting;
        }
        self.force(input, mode, page)
    }

    /// Look at the input now, regardless of the budget.
    pub fn force(&mut self, input: &mut dyn PendingInput, mode: CompletionMode, page: usize) -> Poll {
        self.count = 0;
        let Some(key) = input.peek() else {
            return Poll::Idle;
        };
        if !key.is_ctrl('x')
            && !key.is_ctrl('r')
            && let Some(cycle) = cycle_key(key, mode, page)
        {
            input.take();
            trace!(target: "complete.governor", %key, "cycle_key_consumed");
            return Poll::Cycle(cycle);
        }
        trace!(target: "complete.governor", %key, "interrupted");
        Poll::Interrupt(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Direction;
    use core_events::{KeyCode, KeyQueue};

    #[test]
    fn polls_only_every_frequency_steps() {
        let mut gov = Governor::new(3);
        let mut input: KeyQueue = [KeyEvent::ctrl('n')].into_iter().collect();
        assert_eq!(gov.poll(&mut input, CompletionMode::Keyword, 8), Poll::Waiting);
        assert_eq!(gov.poll(&mut input, CompletionMode::Keyword, 8), Poll::Waiting);
        let Poll::Cycle(c) = gov.poll(&mut input, CompletionMode::Keyword, 8) else {
            panic!("expected a cycle");
        };
        assert_eq!(c.direction, Direction::Forward);
        assert!(input.is_empty());
        assert_eq!(gov.force(&mut input, CompletionMode::Keyword, 8), Poll::Idle);
    }

    #[test]
    fn other_keys_interrupt_without_being_consumed() {
        let mut gov = Governor::new(1);
        let mut input: KeyQueue = [KeyEvent::plain(KeyCode::Esc)].into_iter().collect();
        assert_eq!(
            gov.poll(&mut input, CompletionMode::Keyword, 8),
            Poll::Interrupt(KeyEvent::plain(KeyCode::Esc))
        );
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn zero_frequency_still_polls() {
        let mut gov = Governor::new(0);
        let mut input: KeyQueue = [KeyEvent::ctrl('x')].into_iter().collect();
        assert!(matches!(
            gov.poll(&mut input, CompletionMode::Keyword, 8),
            Poll::Interrupt(_)
        ));
        assert_eq!(input.len(), 1);
    }
}
