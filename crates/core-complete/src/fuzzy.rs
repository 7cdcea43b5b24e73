//! Fuzzy scoring for the presentation's fuzzy mode.
//!
//! The scorer is a seam: tests plug in fixed scores, the engine defaults to
//! `FrizbeeScorer`, a Smith-Waterman matcher that rewards consecutive runs
//! and word boundaries. Every pattern character must be matched in order.

use frizbee::Config;

/// Scores `text` against `pattern`. Zero means "no match"; larger is better.
pub trait FuzzyScorer {
    fn score(&self, pattern: &str, text: &str) -> i32;
}

pub struct FrizbeeScorer {
    config: Config,
}

impl Default for FrizbeeScorer {
    fn default() -> Self {
        Self {
            config: Config {
                max_typos: Some(0),
                ..Config::default()
            },
        }
    }
}

impl FuzzyScorer for FrizbeeScorer {
    fn score(&self, pattern: &str, text: &str) -> i32 {
        if pattern.is_empty() {
            return 1;
        }
        frizbee::match_list(pattern, &[text], &self.config)
            .first()
            .map_or(0, |m| i32::from(m.score).max(1))
    }
}
