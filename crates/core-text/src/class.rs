//! Character classes used to find word boundaries.
//!
//! Three overlapping predicates mirror the editor's character tables:
//! keyword characters (word motions and keyword completion), identifier
//! characters (include/define lookups) and file-name characters (path
//! completion). `CharClass` groups characters the way word motions do: a run
//! of same-class characters is one word.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Blank,
    Punct,
    Word,
}

pub fn is_keyword_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Identifier characters are restricted to ASCII plus letters above Latin-1.
pub fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric() || (c as u32 >= 0xC0 && c.is_alphabetic())
}

pub fn is_fname_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '+' | ',' | '#' | '$' | '%' | '~' | '=')
}

pub fn class_of(c: char) -> CharClass {
    if c == ' ' || c == '\t' || c == '\u{a0}' {
        CharClass::Blank
    } else if is_keyword_char(c) {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

/// Walk left from `byte` while characters satisfy `pred`; returns the start of the run.
pub fn run_start_before(line: &str, byte: usize, pred: impl Fn(char) -> bool) -> usize {
    let byte = byte.min(line.len());
    let mut start = byte;
    for (idx, c) in line[..byte].char_indices().rev() {
        if !pred(c) {
            break;
        }
        start = idx;
    }
    start
}

/// Start of the word that ends at `byte`: the run of characters sharing the
/// class of the character just before `byte`. Returns `byte` when that
/// character is blank or `byte` is at the line start.
pub fn word_start_before(line: &str, byte: usize) -> usize {
    let byte = byte.min(line.len());
    let Some(prev) = line[..byte].chars().next_back() else {
        return byte;
    };
    let class = class_of(prev);
    if class == CharClass::Blank {
        return byte;
    }
    run_start_before(line, byte, |c| class_of(c) == class)
}

/// End of the word starting at `byte` (exclusive): the run of characters
/// sharing the class of the character at `byte`.
pub fn word_end(line: &str, byte: usize) -> usize {
    let byte = byte.min(line.len());
    let mut chars = line[byte..].char_indices();
    let Some((_, first)) = chars.next() else {
        return byte;
    };
    let class = class_of(first);
    for (off, c) in chars {
        if class_of(c) != class {
            return byte + off;
        }
    }
    line.len()
}

/// True when `byte` starts a keyword: the character at `byte` is a keyword
/// character and the one before it is not.
pub fn is_word_start(line: &str, byte: usize) -> bool {
    let starts_keyword = line[byte..].chars().next().is_some_and(is_keyword_char);
    let after_keyword = line[..byte].chars().next_back().is_some_and(is_keyword_char);
    starts_keyword && !after_keyword
}

/// Byte offset of the first non-blank character.
pub fn first_non_blank(line: &str) -> usize {
    line.char_indices()
        .find(|(_, c)| class_of(*c) != CharClass::Blank)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

/// Split a line into its keyword runs, returning `(byte_offset, word)` pairs.
pub fn keywords(line: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < line.len() {
            let c = line[pos..].chars().next()?;
            if is_keyword_char(c) {
                let end = word_end(line, pos);
                let start = pos;
                pos = end;
                return Some((start, &line[start..end]));
            }
            pos += c.len_utf8();
        }
        None
    })
}
