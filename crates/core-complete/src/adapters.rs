//! Default collaborators: documents from `core-state` and the local
//! filesystem.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use core_state::{Document, DocumentId, DocumentSet, OtherDocuments};
use core_text::Position;
use globset::GlobBuilder;
use tracing::trace;

use crate::collab::{DocumentInfo, FileSource, LineIter, LineRange, OpenDocuments, PathExpander, TextBuffer};

impl TextBuffer for Document {
    fn name(&self) -> &str {
        Document::name(self)
    }

    fn line_count(&self) -> usize {
        Document::line_count(self)
    }

    fn get_line(&self, idx: usize) -> Option<String> {
        self.line(idx)
    }

    fn replace_line(&mut self, idx: usize, text: &str) -> Result<()> {
        Document::replace_line(self, idx, text)
    }

    fn splice(&mut self, range: LineRange, text: &str) -> Result<()> {
        Document::splice(self, range.line, range.start..range.end, text)
    }

    fn begin_undo_checkpoint(&mut self) {
        self.checkpoint();
    }

    fn cursor(&self) -> Position {
        Document::cursor(self)
    }

    fn set_cursor(&mut self, pos: Position) {
        Document::set_cursor(self, pos);
    }
}

fn info(doc: &Document) -> DocumentInfo {
    DocumentInfo {
        id: doc.id(),
        name: doc.name().to_string(),
        path: doc.path.clone(),
        listed: doc.listed,
        loaded: doc.loaded,
        visible: doc.visible,
    }
}

impl OpenDocuments for OtherDocuments<'_> {
    fn documents(&self) -> Vec<DocumentInfo> {
        self.iter().map(info).collect()
    }

    fn line_count(&self, id: DocumentId) -> usize {
        self.get(id).map_or(0, Document::line_count)
    }

    fn line(&self, id: DocumentId, idx: usize) -> Option<String> {
        self.get(id)?.line(idx)
    }
}

/// All documents but the current one, for callers that keep the edited
/// buffer outside the set.
impl OpenDocuments for DocumentSet {
    fn documents(&self) -> Vec<DocumentInfo> {
        self.others().map(info).collect()
    }

    fn line_count(&self, id: DocumentId) -> usize {
        self.get(id).map_or(0, Document::line_count)
    }

    fn line(&self, id: DocumentId, idx: usize) -> Option<String> {
        self.get(id)?.line(idx)
    }
}

/// Reads word lists and unloaded documents from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileSource;

impl FileSource for FsFileSource {
    fn open_read_lines(&self, path: &Path) -> Result<LineIter> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let shown = path.display().to_string();
        let lines = BufReader::new(file)
            .lines()
            .map(move |line| line.with_context(|| format!("reading {shown}")));
        Ok(Box::new(lines))
    }
}

/// Expands `dir/prefix*` patterns by listing `dir`.
#[derive(Debug, Default, Clone)]
pub struct FsPathExpander {
    /// Relative patterns are resolved against this directory.
    pub base: Option<PathBuf>,
    pub ignore_case: bool,
}

impl FsPathExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn ignore_case(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }
}

impl PathExpander for FsPathExpander {
    fn glob(&self, pattern: &str, want_dirs: bool, want_files: bool) -> Result<Vec<String>> {
        let (dir_part, name_glob) = match pattern.rfind('/') {
            Some(i) => (&pattern[..=i], &pattern[i + 1..]),
            None => ("", pattern),
        };
        let matcher = GlobBuilder::new(name_glob)
            .case_insensitive(self.ignore_case)
            .literal_separator(true)
            .build()
            .with_context(|| format!("bad file pattern {pattern:?}"))?
            .compile_matcher();
        let listed = if dir_part.is_empty() { "." } else { dir_part };
        let dir = match &self.base {
            Some(base) if !Path::new(listed).is_absolute() => base.join(listed),
            _ => PathBuf::from(listed),
        };
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // hidden entries only when asked for explicitly
            if name.starts_with('.') && !name_glob.starts_with('.') {
                continue;
            }
            if !matcher.is_match(&name) {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if (is_dir && !want_dirs) || (!is_dir && !want_files) {
                continue;
            }
            let mut path = format!("{dir_part}{name}");
            if is_dir {
                path.push('/');
            }
            found.push(path);
        }
        found.sort();
        trace!(target: "complete.scan", dir = %dir.display(), found = found.len(), "path_glob");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_source_reads_lines_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        fs::write(&path, "alpha\nbeta\n").unwrap();
        let lines: Vec<String> = FsFileSource
            .open_read_lines(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["alpha".to_string(), "beta".to_string()]);

        let err = FsFileSource
            .open_read_lines(&dir.path().join("missing.txt"))
            .err()
            .unwrap();
        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn path_expander_lists_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "").unwrap();
        fs::write(dir.path().join("src/mod.rs"), "").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        fs::create_dir(dir.path().join("src/macros")).unwrap();
        fs::write(dir.path().join("src/.mtime"), "").unwrap();

        let paths = FsPathExpander::new().with_base(dir.path());
        assert_eq!(
            paths.glob("src/m*", true, true).unwrap(),
            vec!["src/macros/", "src/main.rs", "src/mod.rs"]
        );
        assert_eq!(paths.glob("src/m*", false, true).unwrap(), vec!["src/main.rs", "src/mod.rs"]);
        assert_eq!(paths.glob("sr*", true, true).unwrap(), vec!["src/"]);
        assert!(paths.glob("src/M*", true, true).unwrap().is_empty());
        assert_eq!(
            paths.clone().ignore_case(true).glob("src/M*", false, true).unwrap(),
            vec!["src/main.rs", "src/mod.rs"]
        );
    }

    #[test]
    fn document_is_a_text_buffer() {
        let mut doc = Document::new("scratch", "let foo = 1;\n").unwrap();
        TextBuffer::splice(
            &mut doc,
            LineRange {
                line: 0,
                start: 4,
                end: 7,
            },
            "foobar",
        )
        .unwrap();
        assert_eq!(doc.get_line(0).as_deref(), Some("let foobar = 1;"));
        TextBuffer::set_cursor(&mut doc, Position::new(0, 10));
        assert_eq!(TextBuffer::cursor(&doc), Position::new(0, 10));
    }

    #[test]
    fn other_documents_skip_the_current_one() {
        let mut set = DocumentSet::new();
        let a = set.add(Document::new("a.rs", "alpha\n").unwrap());
        let b = set.add(Document::new("b.rs", "beta\n").unwrap());
        set.set_current(a);
        let (_, others) = set.split_current().unwrap();
        let docs = others.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, b);
        assert_eq!(OpenDocuments::line(&others, b, 0).as_deref(), Some("beta"));
        assert_eq!(OpenDocuments::documents(&set)[0].name, "b.rs");
    }
}
