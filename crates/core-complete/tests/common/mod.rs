#![allow(dead_code)] // Shared across the integration tests; each binary uses a subset of helpers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use core_complete::{
    Backends, CompletionEngine, CompletionError, CompletionMode, Direction, EditContext, FileSource, FuzzyScorer,
    KeyOutcome, LineIter, LineRange, MenuRow, MenuWidget, ScriptHost, SpellEngine, StatusClass, StatusLine,
    TagEntry, TagIndex, TextBuffer,
};
use core_config::CompletionConfig;
use core_events::{KeyEvent, KeyQueue, parse_keys};
use core_state::{Document, DocumentId, DocumentSet};
use core_text::Position;
use serde_json::Value;

pub type StatusLog = Rc<RefCell<Vec<(String, StatusClass)>>>;

pub struct RecordingStatus(pub StatusLog);

impl StatusLine for RecordingStatus {
    fn publish(&mut self, msg: &str, class: StatusClass) {
        self.0.borrow_mut().push((msg.to_string(), class));
    }
}

#[derive(Debug, Default)]
pub struct MenuLog {
    /// Row texts and selection of every display call.
    pub displays: Vec<(Vec<String>, Option<usize>)>,
    pub visible: bool,
}

pub struct RecordingMenu(pub Rc<RefCell<MenuLog>>);

impl MenuWidget for RecordingMenu {
    fn display(&mut self, rows: &[MenuRow], selected: Option<usize>) {
        let mut log = self.0.borrow_mut();
        log.displays
            .push((rows.iter().map(|r| r.text.clone()).collect(), selected));
        log.visible = true;
    }

    fn undisplay(&mut self) {
        self.0.borrow_mut().visible = false;
    }
}

/// Word lists kept in memory; unknown paths fail like a missing file.
#[derive(Default)]
pub struct MemFiles(pub HashMap<PathBuf, Vec<String>>);

impl MemFiles {
    pub fn with(mut self, path: &str, lines: Vec<String>) -> Self {
        self.0.insert(PathBuf::from(path), lines);
        self
    }
}

impl FileSource for MemFiles {
    fn open_read_lines(&self, path: &Path) -> Result<LineIter> {
        let Some(lines) = self.0.get(path) else {
            return Err(anyhow::Error::new(io::Error::new(io::ErrorKind::NotFound, "no such file"))
                .context(format!("opening {}", path.display())));
        };
        Ok(Box::new(lines.clone().into_iter().map(Ok)))
    }
}

/// Tag index over a fixed list, remembering the patterns it was asked for.
#[derive(Default)]
pub struct FakeTags {
    pub entries: Vec<TagEntry>,
    pub patterns: Rc<RefCell<Vec<String>>>,
}

impl FakeTags {
    pub fn tag(mut self, name: &str, file: &str, kind: &str) -> Self {
        self.entries.push(TagEntry {
            name: name.to_string(),
            file: Some(file.to_string()),
            kind: Some(kind.to_string()),
            info: None,
        });
        self
    }
}

impl TagIndex for FakeTags {
    fn find_tags(&self, pattern: &str, max: usize) -> Result<Vec<TagEntry>> {
        self.patterns.borrow_mut().push(pattern.to_string());
        let re = regex::Regex::new(pattern)?;
        Ok(self
            .entries
            .iter()
            .filter(|t| re.is_match(&t.name))
            .take(max)
            .cloned()
            .collect())
    }
}

/// Spelling engine with canned suggestions per word.
#[derive(Default)]
pub struct FakeSpell(pub HashMap<String, Vec<String>>);

impl FakeSpell {
    pub fn with(mut self, word: &str, suggestions: &[&str]) -> Self {
        self.0
            .insert(word.to_string(), suggestions.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl SpellEngine for FakeSpell {
    fn suggest(&self, word: &str, max: usize) -> Vec<String> {
        self.0
            .get(word)
            .map(|s| s.iter().take(max).cloned().collect())
            .unwrap_or_default()
    }
}

/// Script host answering the find-start call with `start` and the
/// candidate call with `words`.
pub struct FakeScript {
    pub start: Value,
    pub words: Value,
    pub calls: Rc<RefCell<Vec<(String, Vec<Value>)>>>,
}

impl FakeScript {
    pub fn new(start: Value, words: Value) -> Self {
        Self {
            start,
            words,
            calls: Rc::default(),
        }
    }
}

impl ScriptHost for FakeScript {
    fn call(&mut self, func: &str, args: &[Value]) -> Result<Value> {
        self.calls.borrow_mut().push((func.to_string(), args.to_vec()));
        if args.first().and_then(Value::as_i64) == Some(1) {
            Ok(self.start.clone())
        } else {
            Ok(self.words.clone())
        }
    }
}

/// Document wrapper counting the edits made through it.
pub struct CountingBuffer {
    pub doc: Document,
    pub splices: usize,
}

impl TextBuffer for CountingBuffer {
    fn name(&self) -> &str {
        self.doc.name()
    }
    fn line_count(&self) -> usize {
        self.doc.line_count()
    }
    fn get_line(&self, idx: usize) -> Option<String> {
        self.doc.line(idx)
    }
    fn replace_line(&mut self, idx: usize, text: &str) -> Result<()> {
        self.splices += 1;
        self.doc.replace_line(idx, text)
    }
    fn splice(&mut self, range: LineRange, text: &str) -> Result<()> {
        self.splices += 1;
        self.doc.splice(range.line, range.start..range.end, text)
    }
    fn begin_undo_checkpoint(&mut self) {
        self.doc.checkpoint();
    }
    fn cursor(&self) -> Position {
        self.doc.cursor()
    }
    fn set_cursor(&mut self, pos: Position) {
        self.doc.set_cursor(pos);
    }
}

pub fn config() -> CompletionConfig {
    CompletionConfig::default()
}

/// An engine wired to one current document, recording status and menu.
pub struct Harness {
    pub engine: CompletionEngine,
    pub docs: DocumentSet,
    pub input: KeyQueue,
    pub status: StatusLog,
    pub menu: Rc<RefCell<MenuLog>>,
}

impl Harness {
    pub fn new(text: &str, cursor: Position, config: CompletionConfig) -> Self {
        Self::with_backends(text, cursor, config, Backends::default())
    }

    pub fn with_backends(text: &str, cursor: Position, config: CompletionConfig, backends: Backends) -> Self {
        let status = StatusLog::default();
        let menu = Rc::new(RefCell::new(MenuLog::default()));
        let backends = backends
            .with_status(RecordingStatus(status.clone()))
            .with_menu(RecordingMenu(menu.clone()));
        let mut doc = Document::new("current.txt", text).unwrap();
        doc.set_cursor(cursor);
        let mut docs = DocumentSet::new();
        let id = docs.add(doc);
        docs.set_current(id);
        Self {
            engine: CompletionEngine::new(config, backends),
            docs,
            input: KeyQueue::new(),
            status,
            menu,
        }
    }

    pub fn with_scorer(mut self, scorer: impl FuzzyScorer + 'static) -> Self {
        let placeholder = CompletionEngine::new(CompletionConfig::default(), Backends::default());
        self.engine = std::mem::replace(&mut self.engine, placeholder).with_scorer(scorer);
        self
    }

    pub fn add_document(&mut self, doc: Document) -> DocumentId {
        self.docs.add(doc)
    }

    pub fn with_cx<R>(&mut self, f: impl FnOnce(&mut CompletionEngine, &mut EditContext<'_>) -> R) -> R {
        let (current, others) = self.docs.split_current().unwrap();
        let mut cx = EditContext::new(current, &others, &mut self.input);
        f(&mut self.engine, &mut cx)
    }

    pub fn begin_mode(&mut self, mode: CompletionMode, dir: Direction) -> Result<bool, CompletionError> {
        self.with_cx(|e, cx| e.begin_mode(cx, mode, dir))
    }

    pub fn feed(&mut self, key: KeyEvent) -> KeyOutcome {
        self.with_cx(|e, cx| e.feed(cx, key)).unwrap()
    }

    /// Feed every key of a Vim-style notation string, typing the ones the
    /// engine passes through into the document.
    pub fn keys(&mut self, notation: &str) {
        for key in parse_keys(notation).unwrap() {
            if self.feed(key) == KeyOutcome::PassThrough
                && let Some(c) = key.printable()
            {
                self.type_char(c);
            }
        }
    }

    /// Plain insert-mode typing, outside the engine.
    pub fn type_char(&mut self, c: char) {
        let doc = self.docs.current_mut().unwrap();
        let pos = doc.cursor();
        doc.splice(pos.line, pos.byte..pos.byte, c.encode_utf8(&mut [0; 4])).unwrap();
        doc.set_cursor(Position::new(pos.line, pos.byte + c.len_utf8()));
    }

    pub fn advance(&mut self, dir: Direction, count: usize, commit: bool) {
        self.with_cx(|e, cx| e.advance(cx, dir, count, commit)).unwrap()
    }

    pub fn set_leader(&mut self, text: &str) {
        self.with_cx(|e, cx| e.set_leader(cx, text)).unwrap()
    }

    pub fn cancel(&mut self) {
        self.with_cx(|e, cx| e.cancel(cx)).unwrap()
    }

    pub fn line(&self) -> String {
        let doc = self.docs.current().unwrap();
        doc.line(doc.cursor().line).unwrap_or_default()
    }

    pub fn cursor(&self) -> Position {
        self.docs.current().unwrap().cursor()
    }

    pub fn candidates(&self) -> Vec<String> {
        self.engine
            .session()
            .map(|s| s.candidates().map(|c| c.text.clone()).collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<String> {
        self.engine
            .session()
            .map(|s| s.rows().iter().map(|r| r.text.clone()).collect())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<(String, StatusClass)> {
        self.status.borrow().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.status.borrow().last().map(|(m, _)| m.clone())
    }

    pub fn saw_status(&self, msg: &str) -> bool {
        self.status.borrow().iter().any(|(m, _)| m == msg)
    }

    pub fn saw_class(&self, class: StatusClass) -> bool {
        self.status.borrow().iter().any(|(_, c)| *c == class)
    }
}
