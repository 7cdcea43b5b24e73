//! Sources answered in one batch by a collaborator: tags, file names,
//! document names, include scans, command-line expansion, spelling and
//! user functions.

use serde_json::Value;
use tracing::{debug, warn};

use super::{CursorStep, ScanContext, parse_callback_result};
use crate::candidate::{Candidate, CandidateFlags, starts_with_ignore_case};
use crate::collab::StatusClass;
use crate::error::CompletionError;
use crate::mode::SourceKind;

const SPELL_SUGGEST_MAX: usize = 25;

pub(crate) fn run(kind: &SourceKind, scx: &mut ScanContext<'_>) -> CursorStep {
    let text = scx.query.search_text.clone();
    let batch: anyhow::Result<Vec<Candidate>> = match kind {
        SourceKind::Tags => tags(&text, scx),
        SourceKind::Filenames => filenames(&text, scx),
        SourceKind::DocumentNames => Ok(document_names(&text, scx)),
        SourceKind::IncludePatterns => includes(&text, false, scx),
        SourceKind::IncludeDefines => includes(&text, true, scx),
        SourceKind::CommandLine => cmdline(scx),
        SourceKind::Spell => Ok(spell(&text, scx)),
        SourceKind::UserFunction | SourceKind::ThesaurusFunction => {
            return user_function(kind, &text, scx);
        }
        SourceKind::CurrentDocument
        | SourceKind::OtherDocuments(_)
        | SourceKind::Dictionary { .. }
        | SourceKind::Thesaurus { .. } => Ok(Vec::new()),
    };
    match batch {
        Ok(batch) => {
            let added = scx.offer_batch(batch, None);
            debug!(target: "complete.scan", source = kind.label(), added, "batch_added");
        }
        Err(e) => {
            warn!(target: "complete.scan", source = kind.label(), error = %e, "source_failed");
            let err = CompletionError::SourceUnavailable {
                what: kind.label().to_string(),
                reason: e.to_string(),
            };
            scx.backends
                .status
                .publish(&err.to_string(), StatusClass::Error(err.kind()));
        }
    }
    CursorStep::Done
}

fn tags(text: &str, scx: &mut ScanContext<'_>) -> anyhow::Result<Vec<Candidate>> {
    let Some(index) = scx.backends.tags.as_ref() else {
        scx.report_no_source("no tag index");
        return Ok(Vec::new());
    };
    let case = if scx.query.ignore_case { "(?i)" } else { "" };
    let pattern = if text.is_empty() {
        r"^\w\w".to_string()
    } else {
        format!("{case}^{}", regex::escape(text))
    };
    let found = index.find_tags(&pattern, scx.config.tag_limit)?;
    Ok(found
        .into_iter()
        .map(|t| {
            let mut c = Candidate::new(t.name);
            c.extras.kind = t.kind;
            c.extras.menu = t.file;
            c.extras.info = t.info;
            c
        })
        .collect())
}

fn filenames(text: &str, scx: &mut ScanContext<'_>) -> anyhow::Result<Vec<Candidate>> {
    let Some(paths) = scx.backends.paths.as_ref() else {
        scx.report_no_source("no path expander");
        return Ok(Vec::new());
    };
    let found = paths.glob(&format!("{text}*"), true, true)?;
    let flags = if scx.config.fileignorecase {
        CandidateFlags::ICASE
    } else {
        CandidateFlags::empty()
    };
    Ok(found
        .into_iter()
        .map(|p| Candidate::new(p).with_flags(flags))
        .collect())
}

fn document_names(text: &str, scx: &ScanContext<'_>) -> Vec<Candidate> {
    scx.documents
        .documents()
        .into_iter()
        .filter(|d| {
            if scx.query.ignore_case {
                starts_with_ignore_case(&d.name, text)
            } else {
                d.name.starts_with(text)
            }
        })
        .map(|d| Candidate::new(d.name))
        .collect()
}

fn includes(text: &str, defines_only: bool, scx: &mut ScanContext<'_>) -> anyhow::Result<Vec<Candidate>> {
    let Some(scanner) = scx.backends.includes.as_ref() else {
        scx.report_no_source("no include scanner");
        return Ok(Vec::new());
    };
    let found = scanner.find(text, defines_only, scx.query.ignore_case)?;
    Ok(found.into_iter().map(Candidate::new).collect())
}

fn cmdline(scx: &mut ScanContext<'_>) -> anyhow::Result<Vec<Candidate>> {
    let Some(grammar) = scx.backends.cmdline.as_ref() else {
        scx.report_no_source("no command grammar");
        return Ok(Vec::new());
    };
    let cursor = scx.buffer.cursor();
    let line = scx.buffer.get_line(cursor.line).unwrap_or_default();
    let upto = line.get(..cursor.byte).unwrap_or(line.as_str());
    let expansion = grammar.expand(upto)?;
    Ok(expansion.matches.into_iter().map(Candidate::new).collect())
}

fn spell(text: &str, scx: &mut ScanContext<'_>) -> Vec<Candidate> {
    let Some(engine) = scx.backends.spell.as_ref() else {
        scx.report_no_source("no spell engine");
        return Vec::new();
    };
    engine
        .suggest(text, SPELL_SUGGEST_MAX)
        .into_iter()
        .map(Candidate::new)
        .collect()
}

/// Second call of a user completion function: `func(0, base)`.
fn user_function(kind: &SourceKind, base: &str, scx: &mut ScanContext<'_>) -> CursorStep {
    let func = match kind {
        SourceKind::ThesaurusFunction => scx.config.thesaurusfunc.clone(),
        _ => scx.query.function.clone(),
    };
    let Some(func) = func else {
        scx.report_no_source("no completion function set");
        return CursorStep::Done;
    };
    let before = scx.buffer.cursor();
    let Some(host) = scx.backends.script.as_mut() else {
        scx.report_no_source("no script host");
        return CursorStep::Done;
    };
    let value = match host.call(&func, &[Value::from(0), Value::from(base)]) {
        Ok(v) => v,
        Err(e) => return CursorStep::Abort(CompletionError::UserCallbackFailed(format!("{func}: {e}"))),
    };
    if scx.buffer.cursor() != before {
        return CursorStep::Abort(CompletionError::conflict("completion function moved the cursor"));
    }
    let result = match parse_callback_result(value) {
        Ok(r) => r,
        Err(e) => return CursorStep::Abort(e),
    };
    scx.refresh_always |= result.refresh_always;
    let added = scx.offer_batch(result.items, None);
    debug!(target: "complete.scan", function = %func, added, refresh_always = result.refresh_always, "callback_items_added");
    CursorStep::Done
}
