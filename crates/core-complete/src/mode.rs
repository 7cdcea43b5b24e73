//! Completion modes and the candidate sources they draw from.

use std::fmt;
use std::path::PathBuf;

use core_events::{KeyCode, KeyEvent};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionMode {
    /// `<C-n>` / `<C-p>`: keywords from every source in the `complete` list.
    Keyword,
    /// `<C-x><C-n>`: keywords from the current document only.
    KeywordLocal,
    WholeLine,
    Files,
    Tags,
    PathPatterns,
    PathDefines,
    Dictionary,
    Thesaurus,
    CommandLine,
    Function,
    Omni,
    Spell,
}

impl CompletionMode {
    pub fn name(self) -> &'static str {
        match self {
            CompletionMode::Keyword => "keyword",
            CompletionMode::KeywordLocal => "keyword_local",
            CompletionMode::WholeLine => "whole_line",
            CompletionMode::Files => "files",
            CompletionMode::Tags => "tags",
            CompletionMode::PathPatterns => "path_patterns",
            CompletionMode::PathDefines => "path_defines",
            CompletionMode::Dictionary => "dictionary",
            CompletionMode::Thesaurus => "thesaurus",
            CompletionMode::CommandLine => "cmdline",
            CompletionMode::Function => "function",
            CompletionMode::Omni => "omni",
            CompletionMode::Spell => "spell",
        }
    }

    /// Mode line shown while the session runs.
    pub fn message(self) -> &'static str {
        match self {
            CompletionMode::Keyword => " Keyword completion (^N^P)",
            CompletionMode::KeywordLocal => " Keyword Local completion (^N^P)",
            CompletionMode::WholeLine => " Whole line completion (^L^N^P)",
            CompletionMode::Files => " File name completion (^F^N^P)",
            CompletionMode::Tags => " Tag completion (^]^N^P)",
            CompletionMode::PathPatterns => " Path pattern completion (^N^P)",
            CompletionMode::PathDefines => " Definition completion (^D^N^P)",
            CompletionMode::Dictionary => " Dictionary completion (^K^N^P)",
            CompletionMode::Thesaurus => " Thesaurus completion (^T^N^P)",
            CompletionMode::CommandLine => " Command-line completion (^V^N^P)",
            CompletionMode::Function => " User defined completion (^U^N^P)",
            CompletionMode::Omni => " Omni completion (^O^N^P)",
            CompletionMode::Spell => " Spelling suggestion (^S^N^P)",
        }
    }

    /// Anchor search walks identifier characters instead of keyword ones.
    pub fn ident_only(self) -> bool {
        matches!(self, CompletionMode::PathDefines)
    }

    /// Modes whose sources come from the `complete` token list.
    pub fn uses_token_list(self) -> bool {
        matches!(self, CompletionMode::Keyword | CompletionMode::WholeLine)
    }

    /// Modes that ask the scripting host for candidates.
    pub fn uses_callback(self) -> bool {
        matches!(self, CompletionMode::Function | CompletionMode::Omni)
    }

    /// Key that repeats this mode's search while the session is live.
    pub fn repeat_key(self) -> Option<char> {
        match self {
            CompletionMode::WholeLine => Some('l'),
            CompletionMode::Files => Some('f'),
            CompletionMode::Tags => Some(']'),
            CompletionMode::PathPatterns => Some('i'),
            CompletionMode::PathDefines => Some('d'),
            CompletionMode::Dictionary => Some('k'),
            CompletionMode::Thesaurus => Some('t'),
            CompletionMode::CommandLine => Some('v'),
            CompletionMode::Function => Some('u'),
            CompletionMode::Omni => Some('o'),
            CompletionMode::Spell => Some('s'),
            CompletionMode::Keyword | CompletionMode::KeywordLocal => None,
        }
    }

    /// The mode (and initial direction) selected by the key typed after `<C-x>`.
    pub fn from_ctrl_x_key(key: KeyEvent) -> Option<(CompletionMode, Direction)> {
        if key.code == KeyCode::Tab {
            return Some((CompletionMode::PathPatterns, Direction::Forward));
        }
        if key.printable() == Some('s') {
            return Some((CompletionMode::Spell, Direction::Forward));
        }
        let KeyCode::Char(c) = key.code else {
            return None;
        };
        if !key.is_ctrl(c) {
            return None;
        }
        let found = match c {
            'n' => (CompletionMode::KeywordLocal, Direction::Forward),
            'p' => (CompletionMode::KeywordLocal, Direction::Backward),
            'l' => (CompletionMode::WholeLine, Direction::Backward),
            'f' => (CompletionMode::Files, Direction::Forward),
            ']' => (CompletionMode::Tags, Direction::Forward),
            'i' => (CompletionMode::PathPatterns, Direction::Forward),
            'd' => (CompletionMode::PathDefines, Direction::Forward),
            'k' => (CompletionMode::Dictionary, Direction::Forward),
            't' => (CompletionMode::Thesaurus, Direction::Forward),
            'v' | 'q' => (CompletionMode::CommandLine, Direction::Forward),
            'u' => (CompletionMode::Function, Direction::Forward),
            'o' => (CompletionMode::Omni, Direction::Forward),
            's' => (CompletionMode::Spell, Direction::Forward),
            _ => return None,
        };
        Some(found)
    }
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which non-current documents a scan visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtherScope {
    /// Documents shown in some window (`w`).
    Visible,
    /// Loaded documents in the list (`b`).
    Loaded,
    /// Listed documents not loaded (`u`).
    Unloaded,
    /// Documents not in the list (`U`).
    Unlisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    CurrentDocument,
    OtherDocuments(OtherScope),
    /// Word list; `None` means the configured `dictionary` files.
    Dictionary { file: Option<PathBuf> },
    /// Synonym lines; `None` means the configured `thesaurus` files.
    Thesaurus { file: Option<PathBuf> },
    IncludePatterns,
    IncludeDefines,
    Tags,
    Filenames,
    DocumentNames,
    CommandLine,
    UserFunction,
    ThesaurusFunction,
    Spell,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::CurrentDocument => "current",
            SourceKind::OtherDocuments(_) => "documents",
            SourceKind::Dictionary { .. } => "dictionary",
            SourceKind::Thesaurus { .. } => "thesaurus",
            SourceKind::IncludePatterns => "includes",
            SourceKind::IncludeDefines => "defines",
            SourceKind::Tags => "tags",
            SourceKind::Filenames => "files",
            SourceKind::DocumentNames => "document_names",
            SourceKind::CommandLine => "cmdline",
            SourceKind::UserFunction => "function",
            SourceKind::ThesaurusFunction => "thesaurus_function",
            SourceKind::Spell => "spell",
        }
    }
}

/// Parse the comma separated `complete` option into sources.
///
/// `k` and `s` take an optional file name glued to the letter
/// (`kspell.txt`). Unknown tokens are skipped with a warning.
pub fn parse_complete_option(option: &str) -> Vec<SourceKind> {
    let mut out = Vec::new();
    for token in option.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (head, rest) = token.split_at(token.chars().next().map_or(0, char::len_utf8));
        let has_file = !rest.is_empty();
        let file = has_file.then(|| PathBuf::from(rest));
        let kind = match head {
            "." => SourceKind::CurrentDocument,
            "w" => SourceKind::OtherDocuments(OtherScope::Visible),
            "b" => SourceKind::OtherDocuments(OtherScope::Loaded),
            "u" => SourceKind::OtherDocuments(OtherScope::Unloaded),
            "U" => SourceKind::OtherDocuments(OtherScope::Unlisted),
            "k" => SourceKind::Dictionary { file },
            "s" => SourceKind::Thesaurus { file },
            "i" => SourceKind::IncludePatterns,
            "d" => SourceKind::IncludeDefines,
            "t" | "]" => SourceKind::Tags,
            "f" => SourceKind::DocumentNames,
            _ => {
                warn!(target: "complete.session", token, "complete_option_unknown_token");
                continue;
            }
        };
        if has_file && !matches!(kind, SourceKind::Dictionary { .. } | SourceKind::Thesaurus { .. }) {
            warn!(target: "complete.session", token, "complete_option_unknown_token");
            continue;
        }
        out.push(kind);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_token_list() {
        let kinds = parse_complete_option(".,w,b,u,t,i");
        assert_eq!(
            kinds,
            vec![
                SourceKind::CurrentDocument,
                SourceKind::OtherDocuments(OtherScope::Visible),
                SourceKind::OtherDocuments(OtherScope::Loaded),
                SourceKind::OtherDocuments(OtherScope::Unloaded),
                SourceKind::Tags,
                SourceKind::IncludePatterns,
            ]
        );
    }

    #[test]
    fn file_suffix_only_for_k_and_s() {
        let kinds = parse_complete_option("k/usr/share/dict/words, s, wx, U, sthes.txt");
        assert_eq!(
            kinds,
            vec![
                SourceKind::Dictionary {
                    file: Some(PathBuf::from("/usr/share/dict/words"))
                },
                SourceKind::Thesaurus { file: None },
                SourceKind::OtherDocuments(OtherScope::Unlisted),
                SourceKind::Thesaurus {
                    file: Some(PathBuf::from("thes.txt"))
                },
            ]
        );
    }

    #[test]
    fn ctrl_x_submode_keys() {
        assert_eq!(
            CompletionMode::from_ctrl_x_key(KeyEvent::ctrl('l')),
            Some((CompletionMode::WholeLine, Direction::Backward))
        );
        assert_eq!(
            CompletionMode::from_ctrl_x_key(KeyEvent::ctrl('K')),
            Some((CompletionMode::Dictionary, Direction::Forward))
        );
        assert_eq!(
            CompletionMode::from_ctrl_x_key(KeyEvent::char('s')),
            Some((CompletionMode::Spell, Direction::Forward))
        );
        assert_eq!(CompletionMode::from_ctrl_x_key(KeyEvent::char('k')), None);
        assert_eq!(CompletionMode::from_ctrl_x_key(KeyEvent::ctrl('z')), None);
    }
}
