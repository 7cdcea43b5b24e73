//! Candidate records and the ordered store that holds them.
//!
//! The store is a doubly linked list kept in an arena: nodes live in a `Vec`
//! slot and refer to their neighbours by index, freed slots are recycled
//! through a free list. Slot 0 always holds the origin (the text typed before
//! the session started). New candidates are linked right after (forward) or
//! right before (backward) the most recently added one, so the list reads in
//! the order a scan discovered them, radiating out from the origin. Once the
//! dispatcher is done the list is closed into a ring.
//!
//! Duplicates are detected through a text index instead of a list walk.

use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tracing::trace;

use crate::error::StoreError;
use crate::mode::Direction;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CandidateFlags: u8 {
        /// The origin record.
        const ORIGIN = 0b0000_0001;
        /// May coexist with another candidate of the same text.
        const DUP_OK = 0b0000_0010;
        /// Matches the leader case-insensitively.
        const ICASE  = 0b0000_0100;
        /// Always passes the leader filter.
        const EQUAL  = 0b0000_1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(pub(crate) usize);

impl CandidateId {
    pub const ORIGIN: CandidateId = CandidateId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Optional display fields attached to a candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras {
    pub abbr: Option<String>,
    pub menu: Option<String>,
    pub kind: Option<String>,
    pub info: Option<String>,
    pub abbr_highlight: Option<String>,
    pub kind_highlight: Option<String>,
    pub user_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub extras: Extras,
    /// Where the candidate came from (file or document name).
    pub source: Option<Rc<str>>,
    pub flags: CandidateFlags,
    /// Fuzzy score, 0 when unscored or not matching.
    pub score: i32,
    /// 1-based sequence number, assigned lazily before display.
    pub number: Option<u32>,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            extras: Extras::default(),
            source: None,
            flags: CandidateFlags::empty(),
            score: 0,
            number: None,
        }
    }

    pub fn with_flags(mut self, flags: CandidateFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.extras.kind = Some(kind.into());
        self
    }

    pub fn with_menu(mut self, menu: impl Into<String>) -> Self {
        self.extras.menu = Some(menu.into());
        self
    }

    pub fn is_origin(&self) -> bool {
        self.flags.contains(CandidateFlags::ORIGIN)
    }

    /// Does this candidate survive filtering by `leader`?
    pub fn matches_leader(&self, leader: &str) -> bool {
        if self.flags.contains(CandidateFlags::EQUAL) {
            return true;
        }
        if self.flags.contains(CandidateFlags::ICASE) {
            return starts_with_ignore_case(&self.text, leader);
        }
        self.text.starts_with(leader)
    }
}

pub(crate) fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let mut t = text.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|p| t.next() == Some(p))
}

#[derive(Debug, Clone)]
struct Node {
    cand: Candidate,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
pub struct CandidateStore {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    first: Option<usize>,
    current: Option<usize>,
    texts: AHashMap<String, u32>,
    cyclic: bool,
    len: usize,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the store to a single origin record holding `origin_text`.
    pub fn init(&mut self, origin_text: &str) -> CandidateId {
        self.clear();
        let mut origin = Candidate::new(origin_text).with_flags(CandidateFlags::ORIGIN);
        origin.number = Some(0);
        self.nodes.push(Some(Node {
            cand: origin,
            prev: None,
            next: None,
        }));
        self.first = Some(0);
        self.current = Some(0);
        self.len = 1;
        CandidateId::ORIGIN
    }

    /// Drop every record, the origin included.
    pub fn clear(&mut self) {
        trace!(target: "complete.store", freed = self.len, "clear");
        self.nodes.clear();
        self.free.clear();
        self.texts.clear();
        self.first = None;
        self.current = None;
        self.cyclic = false;
        self.len = 0;
    }

    /// Link `cand` next to the most recently added record.
    ///
    /// `source` is shared with the current record when equal so a scan of
    /// one file keeps a single allocation for its name.
    pub fn add(
        &mut self,
        mut cand: Candidate,
        source: Option<&str>,
        dir: Direction,
    ) -> Result<CandidateId, StoreError> {
        if cand.text.is_empty() && !cand.flags.contains(CandidateFlags::EQUAL) {
            return Err(StoreError::Empty);
        }
        let dup_ok = cand.flags.contains(CandidateFlags::DUP_OK);
        if !dup_ok && self.texts.contains_key(&cand.text) {
            return Err(StoreError::Duplicate);
        }
        cand.flags.remove(CandidateFlags::ORIGIN);
        cand.number = None;
        cand.source = match (source, self.current.and_then(|c| self.node(c)?.cand.source.clone())) {
            (Some(s), Some(shared)) if &*shared == s => Some(shared),
            (Some(s), _) => Some(Rc::from(s)),
            (None, _) => None,
        };
        *self.texts.entry(cand.text.clone()).or_insert(0) += 1;
        let node = Node {
            cand,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        let (prev, next) = match self.current {
            None => (None, None),
            Some(cur) => match dir {
                Direction::Forward => (Some(cur), self.node(cur).and_then(|n| n.next)),
                Direction::Backward => (self.node(cur).and_then(|n| n.prev), Some(cur)),
            },
        };
        self.link(idx, prev, next);
        self.current = Some(idx);
        self.len += 1;
        Ok(CandidateId(idx))
    }

    fn link(&mut self, idx: usize, prev: Option<usize>, next: Option<usize>) {
        if let Some(n) = self.node_mut(idx) {
            n.prev = prev;
            n.next = next;
        }
        if let Some(nx) = next
            && let Some(n) = self.node_mut(nx)
        {
            n.prev = Some(idx);
        }
        match prev.and_then(|p| self.node_mut(p)) {
            Some(p) => p.next = Some(idx),
            None => self.first = Some(idx),
        }
    }

    /// Unlink a non-origin record. Returns false for the origin or a stale id.
    pub fn remove(&mut self, id: CandidateId) -> bool {
        if id == CandidateId::ORIGIN {
            return false;
        }
        let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return false;
        };
        let (prev, next) = (node.prev, node.next);
        if let Some(p) = prev
            && let Some(n) = self.node_mut(p)
        {
            n.next = next;
        }
        if let Some(nx) = next
            && let Some(n) = self.node_mut(nx)
        {
            n.prev = prev;
        }
        if self.first == Some(id.0) {
            self.first = next.filter(|&n| n != id.0);
        }
        if self.current == Some(id.0) {
            self.current = prev.or(next);
        }
        if let Some(count) = self.texts.get_mut(&node.cand.text) {
            *count -= 1;
            if *count == 0 {
                self.texts.remove(&node.cand.text);
            }
        }
        self.free.push(id.0);
        self.len -= 1;
        true
    }

    /// Close the list into a ring. Returns the number of non-origin records.
    pub fn make_cyclic(&mut self) -> usize {
        if !self.cyclic
            && let Some(first) = self.first
        {
            let mut last = first;
            while let Some(next) = self.node(last).and_then(|n| n.next) {
                last = next;
            }
            if let Some(n) = self.node_mut(last) {
                n.next = Some(first);
            }
            if let Some(n) = self.node_mut(first) {
                n.prev = Some(last);
            }
            self.cyclic = true;
        }
        let count = self.len.saturating_sub(1);
        trace!(target: "complete.store", count, "make_cyclic");
        count
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    /// Number every record reachable from the origin walking `dir`, keeping
    /// numbers already handed out.
    pub fn update_sequence_numbers(&mut self, dir: Direction) {
        let mut n = 0u32;
        let mut at = self.step(CandidateId::ORIGIN, dir);
        while let Some(id) = at
            && id != CandidateId::ORIGIN
        {
            n += 1;
            if let Some(node) = self.node_mut(id.0)
                && node.cand.number.is_none()
            {
                node.cand.number = Some(n);
            }
            at = self.step(id, dir);
        }
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.node(id.0).map(|n| &n.cand)
    }

    pub fn get_mut(&mut self, id: CandidateId) -> Option<&mut Candidate> {
        self.node_mut(id.0).map(|n| &mut n.cand)
    }

    pub fn next(&self, id: CandidateId) -> Option<CandidateId> {
        self.node(id.0)?.next.map(CandidateId)
    }

    pub fn prev(&self, id: CandidateId) -> Option<CandidateId> {
        self.node(id.0)?.prev.map(CandidateId)
    }

    pub fn step(&self, id: CandidateId, dir: Direction) -> Option<CandidateId> {
        match dir {
            Direction::Forward => self.next(id),
            Direction::Backward => self.prev(id),
        }
    }

    pub fn first(&self) -> Option<CandidateId> {
        self.first.map(CandidateId)
    }

    pub fn is_first(&self, id: CandidateId) -> bool {
        self.first == Some(id.0)
    }

    /// Most recently added record.
    pub fn current(&self) -> Option<CandidateId> {
        self.current.map(CandidateId)
    }

    /// Records including the origin.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Walk from the list head to the end (or once around the ring).
    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, &Candidate)> + '_ {
        let first = self.first;
        let mut at = first;
        std::iter::from_fn(move || {
            let idx = at?;
            let node = self.node(idx)?;
            at = node.next.filter(|&n| Some(n) != first);
            Some((CandidateId(idx), &node.cand))
        })
    }

    fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)?.as_ref()
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.nodes.get_mut(idx)?.as_mut()
    }
}

/// Shrink `leader` to the common prefix it shares with `cand`.
///
/// The first candidate seen becomes the leader whole. Comparison folds case
/// when the candidate is flagged `ICASE`. Returns true when the leader changed.
pub fn reduce_longest(leader: &mut Option<String>, cand: &Candidate) -> bool {
    let Some(current) = leader.as_mut() else {
        *leader = Some(cand.text.clone());
        return true;
    };
    let icase = cand.flags.contains(CandidateFlags::ICASE);
    let mut keep = 0;
    let mut other = cand.text.chars();
    for (idx, c1) in current.char_indices() {
        let same = match other.next() {
            Some(c2) if icase => c1.to_lowercase().eq(c2.to_lowercase()),
            Some(c2) => c1 == c2,
            None => false,
        };
        if !same {
            break;
        }
        keep = idx + c1.len_utf8();
    }
    if keep < current.len() {
        current.truncate(keep);
        return true;
    }
    false
}
