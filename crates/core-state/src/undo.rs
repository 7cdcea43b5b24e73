use core_text::{Buffer, Position};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Maximum number of snapshots retained in undo history.
pub const UNDO_HISTORY_MAX: usize = 200;

/// A full-state snapshot for undo/redo (coarse clone of the rope; ropey shares
/// unchanged chunks so this is cheap for single-line edits).
#[derive(Clone)]
pub struct EditSnapshot {
    pub buffer: Buffer,
    pub position: Position,
    /// Content hash of the buffer at snapshot capture.
    pub hash: u64,
}

/// Checkpointing undo history. Every `checkpoint` closes the previous undo
/// unit; edits made afterwards undo together back to the checkpoint.
pub struct UndoEngine {
    undo_stack: Vec<EditSnapshot>,
    redo_stack: Vec<EditSnapshot>,
    /// Count of checkpoints skipped due to identical successive state.
    snapshots_skipped: AtomicU64,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoEngine {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            snapshots_skipped: AtomicU64::new(0),
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn snapshots_skipped(&self) -> u64 {
        self.snapshots_skipped.load(Ordering::Relaxed)
    }

    pub fn checkpoint(&mut self, cursor: Position, buffer: &Buffer) {
        let current_hash = buffer_hash(buffer);
        if let Some(last) = self.undo_stack.last()
            && last.hash == current_hash
        {
            self.snapshots_skipped.fetch_add(1, Ordering::Relaxed);
            trace!(target: "state.undo", undo_depth = self.undo_stack.len(), hash = current_hash, "checkpoint_dedupe_skip");
            return;
        }
        self.undo_stack.push(EditSnapshot {
            buffer: buffer.clone(),
            position: cursor,
            hash: current_hash,
        });
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), lines = buffer.line_count(), hash = current_hash, "checkpoint");
        if self.undo_stack.len() > UNDO_HISTORY_MAX {
            let _ = self.undo_stack.remove(0);
            trace!(target: "state.undo", "undo_stack_trimmed");
        }
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, cursor: &mut Position, buffer: &mut Buffer) -> bool {
        let Some(last) = self.undo_stack.pop() else {
            return false;
        };
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "undo_pop");
        self.redo_stack.push(EditSnapshot {
            buffer: buffer.clone(),
            position: *cursor,
            hash: buffer_hash(buffer),
        });
        *buffer = last.buffer;
        *cursor = last.position;
        true
    }

    pub fn redo(&mut self, cursor: &mut Position, buffer: &mut Buffer) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        trace!(target: "state.undo", redo_depth = self.redo_stack.len(), undo_depth = self.undo_stack.len(), "redo_pop");
        self.undo_stack.push(EditSnapshot {
            buffer: buffer.clone(),
            position: *cursor,
            hash: buffer_hash(buffer),
        });
        *buffer = next.buffer;
        *cursor = next.position;
        true
    }
}

fn buffer_hash(buf: &Buffer) -> u64 {
    let mut h = DefaultHasher::new();
    for i in 0..buf.line_count() {
        if let Some(l) = buf.line(i) {
            h.write(l.as_bytes());
        }
    }
    h.finish()
}
