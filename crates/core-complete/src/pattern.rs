//! Search patterns built from the text before the cursor, and extraction of
//! candidate text from a matching line.

use core_text::class::{first_non_blank, is_keyword_char, is_word_start, keywords, word_end};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Whole keywords starting with the prefix at a word start.
    Keyword,
    /// Whole lines (minus indent) starting with the prefix.
    Line,
}

#[derive(Debug, Clone)]
pub struct SearchPattern {
    shape: Shape,
    /// `None` for an empty keyword prefix: every keyword qualifies.
    regex: Option<Regex>,
    /// Shortest acceptable keyword, in characters.
    min_chars: usize,
    text: String,
}

impl SearchPattern {
    /// Keywords beginning with `prefix`. An empty or one-character prefix
    /// needs at least two keyword characters in the match.
    pub fn keyword(prefix: &str, ignore_case: bool) -> Result<Self, regex::Error> {
        let regex = if prefix.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&regex::escape(prefix))
                    .case_insensitive(ignore_case)
                    .build()?,
            )
        };
        Ok(Self {
            shape: Shape::Keyword,
            regex,
            min_chars: prefix.chars().count().max(2),
            text: prefix.to_string(),
        })
    }

    /// Lines whose first non-blank text begins with `prefix`.
    pub fn whole_line(prefix: &str, ignore_case: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&format!(r"^[ \t]*{}", regex::escape(prefix)))
            .case_insensitive(ignore_case)
            .build()?;
        Ok(Self {
            shape: Shape::Line,
            regex: Some(regex),
            min_chars: 1,
            text: prefix.to_string(),
        })
    }

    /// The text the pattern was built from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every match in `line` as `(byte offset, candidate text)`, left to right.
    pub fn matches<'a>(&'a self, line: &'a str) -> Vec<(usize, &'a str)> {
        match (self.shape, &self.regex) {
            (Shape::Line, Some(re)) => {
                if !re.is_match(line) {
                    return Vec::new();
                }
                let start = first_non_blank(line);
                let text = &line[start..];
                if text.is_empty() { Vec::new() } else { vec![(start, text)] }
            }
            (Shape::Line, None) => Vec::new(),
            (Shape::Keyword, None) => keywords(line)
                .filter(|(_, w)| w.chars().count() >= self.min_chars)
                .collect(),
            (Shape::Keyword, Some(re)) => {
                let mut out = Vec::new();
                let mut from = 0;
                while from < line.len() {
                    let Some(m) = re.find_at(line, from) else {
                        break;
                    };
                    let start = m.start();
                    if is_word_start(line, start) {
                        let end = word_end(line, start).max(m.end());
                        let word = &line[start..end];
                        if word.chars().all(is_keyword_char) && word.chars().count() >= self.min_chars {
                            out.push((start, word));
                        }
                        from = end.max(start + 1);
                    } else {
                        from = start + line[start..].chars().next().map_or(1, char::len_utf8);
                    }
                    while !line.is_char_boundary(from) {
                        from += 1;
                    }
                }
                out
            }
        }
    }
}
