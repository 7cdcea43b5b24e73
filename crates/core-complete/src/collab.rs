//! Collaborator seams. The engine owns none of the editor: it reads and
//! edits the current document, looks at other documents, opens files, asks
//! external indexes and scripts, draws a menu and writes a status line, all
//! through the traits below. Every collaborator except the buffer is
//! optional; a missing one makes its source yield nothing.

use std::path::PathBuf;

use anyhow::Result;
use core_events::PendingInput;
use core_state::DocumentId;
use core_text::Position;
use serde_json::Value;
use tracing::debug;

use crate::error::ErrorKind;

/// Byte range inside one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// The document being edited.
pub trait TextBuffer {
    fn name(&self) -> &str;
    fn line_count(&self) -> usize;
    /// Line text without its newline.
    fn get_line(&self, idx: usize) -> Option<String>;
    fn replace_line(&mut self, idx: usize, text: &str) -> Result<()>;
    fn splice(&mut self, range: LineRange, text: &str) -> Result<()>;
    /// Close the current undo unit so the completion edits undo as one.
    fn begin_undo_checkpoint(&mut self);
    fn cursor(&self) -> Position;
    fn set_cursor(&mut self, pos: Position);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub name: String,
    pub path: Option<PathBuf>,
    pub listed: bool,
    pub loaded: bool,
    pub visible: bool,
}

/// Read access to documents other than the current one, in scan order.
pub trait OpenDocuments {
    fn documents(&self) -> Vec<DocumentInfo>;
    fn line_count(&self, id: DocumentId) -> usize;
    fn line(&self, id: DocumentId, idx: usize) -> Option<String>;
}

pub struct NoDocuments;

impl OpenDocuments for NoDocuments {
    fn documents(&self) -> Vec<DocumentInfo> {
        Vec::new()
    }
    fn line_count(&self, _id: DocumentId) -> usize {
        0
    }
    fn line(&self, _id: DocumentId, _idx: usize) -> Option<String> {
        None
    }
}

pub type LineIter = Box<dyn Iterator<Item = Result<String>>>;

/// Opens word lists and unloaded documents line by line.
pub trait FileSource {
    fn open_read_lines(&self, path: &std::path::Path) -> Result<LineIter>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: String,
    pub file: Option<String>,
    pub kind: Option<String>,
    pub info: Option<String>,
}

pub trait TagIndex {
    /// Tags whose name matches the regex `pattern`, at most `max` of them.
    fn find_tags(&self, pattern: &str, max: usize) -> Result<Vec<TagEntry>>;
}

pub trait PathExpander {
    /// Paths matching the glob `pattern`.
    fn glob(&self, pattern: &str, want_dirs: bool, want_files: bool) -> Result<Vec<String>>;
}

pub trait SpellEngine {
    fn suggest(&self, word: &str, max: usize) -> Vec<String>;
}

/// Identifiers found through include files (or only macro/define names).
pub trait IncludeScanner {
    fn find(&self, prefix: &str, defines_only: bool, ignore_case: bool) -> Result<Vec<String>>;
}

pub struct CommandExpansion {
    /// Byte column where the expanded argument starts.
    pub start: usize,
    pub matches: Vec<String>,
}

pub trait CommandGrammar {
    fn expand(&self, line: &str) -> Result<CommandExpansion>;
}

/// Calls user-defined completion functions.
pub trait ScriptHost {
    fn call(&mut self, func: &str, args: &[Value]) -> Result<Value>;
}

/// One display row of the completion menu.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuRow {
    pub text: String,
    pub kind: Option<String>,
    pub extra: Option<String>,
    pub info: Option<String>,
    pub text_highlight: Option<String>,
    pub kind_highlight: Option<String>,
}

pub trait MenuWidget {
    fn display(&mut self, rows: &[MenuRow], selected: Option<usize>);
    fn undisplay(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The mode line.
    Mode,
    /// Scanning progress.
    Progress,
    /// "match 2 of 5" and similar.
    Info,
    /// "Back at original".
    Warning,
    NotFound,
    Error(ErrorKind),
}

pub trait StatusLine {
    fn publish(&mut self, msg: &str, class: StatusClass);
}

/// Status sink that only logs.
pub struct LogStatus;

impl StatusLine for LogStatus {
    fn publish(&mut self, msg: &str, class: StatusClass) {
        debug!(target: "complete.session", ?class, msg, "status");
    }
}

pub struct NoMenu;

impl MenuWidget for NoMenu {
    fn display(&mut self, _rows: &[MenuRow], _selected: Option<usize>) {}
    fn undisplay(&mut self) {}
}

/// Long-lived collaborators handed to the engine once.
pub struct Backends {
    pub files: Option<Box<dyn FileSource>>,
    pub tags: Option<Box<dyn TagIndex>>,
    pub paths: Option<Box<dyn PathExpander>>,
    pub spell: Option<Box<dyn SpellEngine>>,
    pub includes: Option<Box<dyn IncludeScanner>>,
    pub cmdline: Option<Box<dyn CommandGrammar>>,
    pub script: Option<Box<dyn ScriptHost>>,
    pub menu: Box<dyn MenuWidget>,
    pub status: Box<dyn StatusLine>,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            files: None,
            tags: None,
            paths: None,
            spell: None,
            includes: None,
            cmdline: None,
            script: None,
            menu: Box::new(NoMenu),
            status: Box::new(LogStatus),
        }
    }
}

impl Backends {
    pub fn with_files(mut self, files: impl FileSource + 'static) -> Self {
        self.files = Some(Box::new(files));
        self
    }
    pub fn with_tags(mut self, tags: impl TagIndex + 'static) -> Self {
        self.tags = Some(Box::new(tags));
        self
    }
    pub fn with_paths(mut self, paths: impl PathExpander + 'static) -> Self {
        self.paths = Some(Box::new(paths));
        self
    }
    pub fn with_spell(mut self, spell: impl SpellEngine + 'static) -> Self {
        self.spell = Some(Box::new(spell));
        self
    }
    pub fn with_includes(mut self, includes: impl IncludeScanner + 'static) -> Self {
        self.includes = Some(Box::new(includes));
        self
    }
    pub fn with_cmdline(mut self, cmdline: impl CommandGrammar + 'static) -> Self {
        self.cmdline = Some(Box::new(cmdline));
        self
    }
    pub fn with_script(mut self, script: impl ScriptHost + 'static) -> Self {
        self.script = Some(Box::new(script));
        self
    }
    pub fn with_menu(mut self, menu: impl MenuWidget + 'static) -> Self {
        self.menu = Box::new(menu);
        self
    }
    pub fn with_status(mut self, status: impl StatusLine + 'static) -> Self {
        self.status = Box::new(status);
        self
    }
}

/// Per-call view of the editor: the current document, the others and the
/// keys typed ahead.
pub struct EditContext<'a> {
    pub buffer: &'a mut dyn TextBuffer,
    pub documents: &'a dyn OpenDocuments,
    pub input: &'a mut dyn PendingInput,
}

impl<'a> EditContext<'a> {
    pub fn new(
        buffer: &'a mut dyn TextBuffer,
        documents: &'a dyn OpenDocuments,
        input: &'a mut dyn PendingInput,
    ) -> Self {
        Self {
            buffer,
            documents,
            input,
        }
    }
}
