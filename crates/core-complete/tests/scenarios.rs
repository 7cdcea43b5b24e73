//! End-to-end completion sessions over a real document.

mod common;

use common::{Harness, MemFiles, config};
use core_complete::{
    Backends, CompletionMode, Direction, DoneReason, ErrorKind, FuzzyScorer, KeyOutcome, StatusClass,
};
use core_config::CompleteOpt;
use core_events::{KeyCode, KeyEvent};
use core_text::Position;
use pretty_assertions::assert_eq;

const FOO_DOC: &str = "foo\nfoobar\nfoobaz\n";

fn foo_doc() -> Harness {
    Harness::new(FOO_DOC, Position::new(3, 0), config())
}

#[test]
fn keyword_candidates_in_scan_order() {
    let mut h = foo_doc();
    assert!(h.begin_mode(CompletionMode::Keyword, Direction::Forward).unwrap());
    assert_eq!(h.candidates(), vec!["foo", "foobar", "foobaz"]);
    assert!(h.menu.borrow().visible);
    assert_eq!(h.rows().len(), 3);
    // the highlight stays on the original text until the user moves it
    assert_eq!(h.line(), "");

    h.advance(Direction::Forward, 1, true);
    assert_eq!(h.line(), "foo");
    h.advance(Direction::Forward, 1, true);
    assert_eq!(h.line(), "foobar");
    assert_eq!(h.cursor(), Position::new(3, 6));
    assert_eq!(h.last_status().as_deref(), Some("match 2 of 3"));
}

#[test]
fn leader_narrows_the_menu() {
    let mut h = foo_doc();
    h.begin_mode(CompletionMode::Keyword, Direction::Forward).unwrap();
    h.set_leader("fooba");
    assert_eq!(h.line(), "fooba");
    assert_eq!(h.rows(), vec!["foobar", "foobaz"]);
    let shown = h.menu.borrow().displays.last().cloned().unwrap();
    assert_eq!(shown.0, vec!["foobar", "foobaz"]);
}

#[test]
fn longest_inserts_the_common_prefix_once() {
    let mut cfg = config();
    cfg.completeopt.longest = true;
    let mut h = Harness::new(FOO_DOC, Position::new(3, 0), cfg);
    h.begin_mode(CompletionMode::Keyword, Direction::Forward).unwrap();
    assert_eq!(h.line(), "foo");
    h.set_leader("fooba");
    assert_eq!(h.line(), "fooba");
    assert_eq!(h.rows(), vec!["foobar", "foobaz"]);
}

#[test]
fn missing_dictionary_reports_no_source() {
    let mut cfg = config();
    cfg.dictionary = vec!["/no/such/words".into()];
    let backends = Backends::default().with_files(MemFiles::default());
    let mut h = Harness::with_backends("wo", Position::new(0, 2), cfg, backends);
    assert!(h.begin_mode(CompletionMode::Dictionary, Direction::Forward).unwrap());
    assert!(h.candidates().is_empty());
    assert!(h.saw_class(StatusClass::Error(ErrorKind::NoCandidateSource)));
    assert!(h.saw_status("Pattern not found"));
    assert_eq!(h.line(), "wo");
}

#[test]
fn empty_dictionary_option_reports_no_source() {
    let backends = Backends::default().with_files(MemFiles::default());
    let mut h = Harness::with_backends("wo", Position::new(0, 2), config(), backends);
    h.begin_mode(CompletionMode::Dictionary, Direction::Forward).unwrap();
    assert!(h.saw_class(StatusClass::Error(ErrorKind::NoCandidateSource)));
}

#[test]
fn cancel_mid_scan_restores_the_text() {
    let words: Vec<String> = (0..100_000).map(|i| format!("word{i}")).collect();
    let mut cfg = config();
    cfg.dictionary = vec!["/words".into()];
    let backends = Backends::default().with_files(MemFiles::default().with("/words", words));
    let mut h = Harness::with_backends("say wo\nwonder\n", Position::new(0, 6), cfg, backends);

    h.input.push(KeyEvent::plain(KeyCode::Esc));
    h.begin_mode(CompletionMode::Dictionary, Direction::Forward).unwrap();
    {
        let s = h.engine.session().unwrap();
        assert!(s.was_interrupted());
        assert!(!s.is_scan_complete());
        assert!(s.candidates().count() < 100_000);
    }
    h.advance(Direction::Forward, 1, true);
    assert_ne!(h.line(), "say wo");

    h.cancel();
    assert_eq!(h.line(), "say wo");
    assert_eq!(h.cursor(), Position::new(0, 6));
    assert!(!h.engine.is_active());
    assert_eq!(h.engine.last_done().unwrap().reason, DoneReason::Cancel);

    // the key that interrupted is still queued for the caller
    assert_eq!(h.input.len(), 1);
    h.input = Default::default();
    h.begin_mode(CompletionMode::KeywordLocal, Direction::Forward).unwrap();
    let s = h.engine.session().unwrap();
    assert_eq!(s.original(), "wo");
    assert_eq!(h.candidates(), vec!["wonder"]);
    assert!(s.is_scan_complete());
}

struct FixedScores;

impl FuzzyScorer for FixedScores {
    fn score(&self, _pattern: &str, text: &str) -> i32 {
        match text {
            "foobar" => 5,
            "fooBAZ" => 3,
            _ => 0,
        }
    }
}

#[test]
fn fuzzy_ranks_rows_by_score() {
    let mut cfg = config();
    cfg.completeopt.fuzzy = true;
    let mut h = Harness::new("fooBAZ foobar\n\n", Position::new(1, 0), cfg).with_scorer(FixedScores);
    h.begin_mode(CompletionMode::Keyword, Direction::Forward).unwrap();
    h.set_leader("fb");
    assert_eq!(h.rows(), vec!["foobar", "fooBAZ"]);
    assert_eq!(h.engine.session().unwrap().selected_row(), Some(0));

    let item = h.with_cx(|e, cx| e.accept(cx)).unwrap().unwrap();
    assert_eq!(item.word, "foobar");
    assert_eq!(h.line(), "foobar");
    assert!(!h.engine.is_active());
}

#[test]
fn ctrl_n_selects_the_first_match() {
    let mut h = foo_doc();
    h.keys("<C-n>");
    assert_eq!(h.line(), "foo");
    h.keys("<C-n><C-n>");
    assert_eq!(h.line(), "foobaz");
    h.keys("<C-n>");
    assert_eq!(h.line(), "");
    assert!(h.saw_status("Back at original"));
    h.keys("<C-p>");
    assert_eq!(h.line(), "foobaz");
    h.keys("<C-y>");
    assert!(!h.engine.is_active());
    let done = h.engine.take_done().unwrap();
    assert_eq!(done.reason, DoneReason::Accept);
    assert_eq!(done.item.unwrap().word, "foobaz");
}

#[test]
fn typing_narrows_and_ctrl_e_keeps_the_leader() {
    let mut h = foo_doc();
    h.keys("<C-n>");
    h.keys("b");
    assert_eq!(h.line(), "foob");
    assert!(h.engine.is_active());
    assert_eq!(h.rows(), vec!["foobar", "foobaz"]);
    // the menu highlight moved to the first row left, so the next key goes past it
    assert_eq!(h.engine.session().unwrap().selected_row(), Some(0));
    h.keys("<C-n>");
    assert_eq!(h.line(), "foobaz");
    h.keys("<C-e>");
    assert_eq!(h.line(), "foob");
    assert_eq!(h.engine.last_done().unwrap().reason, DoneReason::Cancel);
}

#[test]
fn backspace_widens_again() {
    let mut h = foo_doc();
    h.keys("<C-n>");
    h.keys("ba");
    assert_eq!(h.rows(), vec!["foobar", "foobaz"]);
    h.keys("<BS><BS>");
    assert_eq!(h.line(), "foo");
    assert_eq!(h.rows(), vec!["foo", "foobar", "foobaz"]);
}

#[test]
fn other_keys_end_the_session_and_pass_through() {
    let mut h = foo_doc();
    h.keys("<C-n><C-n>");
    h.keys(" x");
    assert_eq!(h.line(), "foobar x");
    assert!(!h.engine.is_active());
    assert_eq!(h.engine.last_done().unwrap().item.as_ref().unwrap().word, "foobar");
}

#[test]
fn ctrl_x_picks_a_sub_mode() {
    let mut cfg = config();
    cfg.completeopt = CompleteOpt::menu_only();
    let mut h = Harness::new("alpha\nbeta\n\n", Position::new(2, 0), cfg);
    h.keys("<C-x>");
    assert!(h.engine.ctrl_x_pending());
    assert!(h.saw_class(StatusClass::Mode));
    h.keys("<C-l>");
    assert_eq!(h.engine.session().unwrap().mode(), CompletionMode::WholeLine);
    // whole-line mode walks backward first
    assert_eq!(h.line(), "beta");
    h.keys("<C-l>");
    assert_eq!(h.line(), "alpha");
}

#[test]
fn other_documents_are_scanned_after_the_current_one() {
    let mut h = Harness::new("fo\n", Position::new(0, 2), config());
    let mut other = core_state::Document::new("other.txt", "food fork\n").unwrap();
    other.visible = true;
    h.add_document(other);
    h.begin_mode(CompletionMode::Keyword, Direction::Forward).unwrap();
    assert_eq!(h.candidates(), vec!["food", "fork"]);
    h.advance(Direction::Forward, 1, true);
    assert!(h.saw_status("match in file other.txt"));
}

fn thesaurus_harness(text: &str, cursor: Position) -> Harness {
    let mut cfg = config();
    cfg.thesaurus = vec!["/thesaurus".into()];
    cfg.ignorecase = true;
    cfg.infercase = true;
    let lines = vec!["sad blue down".to_string(), "happy joyful glad".to_string()];
    let backends = Backends::default().with_files(MemFiles::default().with("/thesaurus", lines));
    Harness::with_backends(text, cursor, cfg, backends)
}

#[test]
fn thesaurus_offers_every_word_on_the_matching_line() {
    let mut h = thesaurus_harness("so ha", Position::new(0, 5));
    h.begin_mode(CompletionMode::Thesaurus, Direction::Forward).unwrap();
    assert_eq!(h.candidates(), vec!["happy", "joyful", "glad"]);

    // the typed capital carries over; the synonyms keep their letters
    let mut h = thesaurus_harness("so Ha", Position::new(0, 5));
    h.begin_mode(CompletionMode::Thesaurus, Direction::Forward).unwrap();
    assert_eq!(h.candidates(), vec!["Happy", "Joyful", "Glad"]);
}

#[test]
fn cursor_inside_a_character_starts_at_its_boundary() {
    let mut h = Harness::new("über zz
", Position::new(0, 1), config());
    assert_eq!(h.cursor(), Position::new(0, 0));
    h.keys("<C-n>");
    let s = h.engine.session().unwrap();
    assert_eq!(s.anchor(), Position::new(0, 0));
    assert_eq!(s.original(), "");
    assert_eq!(h.candidates(), vec!["zz"]);
}

#[test]
fn interrupted_scan_with_nothing_found_restarts_on_a_new_leader() {
    let mut words: Vec<String> = (0..100_000).map(|i| format!("zz{i}")).collect();
    words.push("wonderful".to_string());
    let mut cfg = config();
    cfg.dictionary = vec!["/words".into()];
    let backends = Backends::default().with_files(MemFiles::default().with("/words", words));
    let mut h = Harness::with_backends("say wo", Position::new(0, 6), cfg, backends);

    h.input.push(KeyEvent::plain(KeyCode::Esc));
    h.begin_mode(CompletionMode::Dictionary, Direction::Forward).unwrap();
    {
        let s = h.engine.session().unwrap();
        assert!(s.was_interrupted());
        assert!(h.candidates().is_empty());
    }

    h.input = Default::default();
    h.set_leader("won");
    assert_eq!(h.line(), "say won");
    let s = h.engine.session().unwrap();
    assert!(s.is_scan_complete());
    assert_eq!(h.candidates(), vec!["wonderful"]);
    assert_eq!(h.rows(), vec!["wonderful"]);
}

#[test]
fn backspace_at_the_anchor_passes_through() {
    let mut h = Harness::new("foo
f", Position::new(1, 1), config());
    h.begin_mode(CompletionMode::Keyword, Direction::Forward).unwrap();
    assert_eq!(h.candidates(), vec!["foo"]);
    // the only typed character is the searched text itself
    assert_eq!(h.feed(KeyEvent::plain(KeyCode::Backspace)), KeyOutcome::PassThrough);
    assert!(!h.engine.is_active());
    assert_eq!(h.line(), "f");
    assert_eq!(h.engine.last_done().unwrap().reason, DoneReason::Accept);
}
