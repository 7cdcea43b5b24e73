//! Interpreting values returned by user completion functions.

use core_text::grapheme;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::candidate::{Candidate, CandidateFlags, Extras};
use crate::error::CompletionError;

/// Answer to the first ("find start") call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FindStart {
    Column(usize),
    /// `-2`: cancel quietly, stay ready for another `<C-x>` key.
    /// `-3`: cancel and leave the sub-mode.
    Cancel { leave_mode: bool },
}

/// Interpret the find-start answer for a cursor at byte `cursor` of `line`.
/// Negative columns (other than the sentinels) and columns past the cursor
/// both mean "at the cursor".
pub(crate) fn parse_find_start(value: &Value, line: &str, cursor: usize) -> Result<FindStart, CompletionError> {
    let Some(col) = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)) else {
        return Err(CompletionError::UserCallbackFailed(format!(
            "find-start returned {}, expected a number",
            type_name(value)
        )));
    };
    match col {
        -2 => return Ok(FindStart::Cancel { leave_mode: false }),
        -3 => return Ok(FindStart::Cancel { leave_mode: true }),
        _ => {}
    }
    let col = usize::try_from(col).unwrap_or(cursor).min(cursor);
    Ok(FindStart::Column(grapheme::floor_char(line, col)))
}

#[derive(Debug, Default)]
pub(crate) struct CallbackResult {
    pub items: Vec<Candidate>,
    pub refresh_always: bool,
}

#[derive(Debug, Deserialize, Default)]
struct RawEntry {
    #[serde(default)]
    word: Option<Value>,
    #[serde(default)]
    abbr: Option<String>,
    #[serde(default)]
    menu: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    user_data: Option<Value>,
    #[serde(default, deserialize_with = "truthy")]
    icase: bool,
    #[serde(default, deserialize_with = "truthy")]
    dup: bool,
    #[serde(default, deserialize_with = "truthy")]
    empty: bool,
    #[serde(default, deserialize_with = "truthy")]
    equal: bool,
    #[serde(default)]
    abbr_hlgroup: Option<String>,
    #[serde(default)]
    kind_hlgroup: Option<String>,
}

/// Flags may be written as numbers, booleans or strings.
fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        _ => false,
    })
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a dict",
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret the second call's answer: a list of words or dicts, or a dict
/// with `words` and an optional `refresh`.
pub(crate) fn parse_callback_result(value: Value) -> Result<CallbackResult, CompletionError> {
    let (list, refresh_always) = match value {
        Value::Array(list) => (list, false),
        Value::Object(mut map) => {
            let refresh = map.get("refresh").and_then(Value::as_str) == Some("always");
            let words = match map.remove("words") {
                Some(Value::Array(list)) => list,
                Some(other) => {
                    return Err(CompletionError::UserCallbackFailed(format!(
                        "`words` is {}, expected a list",
                        type_name(&other)
                    )));
                }
                None => Vec::new(),
            };
            (words, refresh)
        }
        Value::Null => (Vec::new(), false),
        other => {
            return Err(CompletionError::UserCallbackFailed(format!(
                "completion function returned {}, expected a list or dict",
                type_name(&other)
            )));
        }
    };
    let mut items = Vec::with_capacity(list.len());
    for item in list {
        if let Some(word) = scalar_text(&item) {
            if !word.is_empty() {
                items.push(Candidate::new(word));
            }
            continue;
        }
        if !item.is_object() {
            continue;
        }
        let raw: RawEntry = serde_json::from_value(item)
            .map_err(|e| CompletionError::UserCallbackFailed(format!("bad completion item: {e}")))?;
        let word = raw.word.as_ref().and_then(scalar_text).unwrap_or_default();
        if word.is_empty() && !raw.empty {
            continue;
        }
        let mut flags = CandidateFlags::empty();
        if raw.icase {
            flags |= CandidateFlags::ICASE;
        }
        if raw.dup {
            flags |= CandidateFlags::DUP_OK;
        }
        if raw.equal || (raw.empty && word.is_empty()) {
            flags |= CandidateFlags::EQUAL;
        }
        items.push(Candidate::new(word).with_flags(flags).with_extras(Extras {
            abbr: raw.abbr,
            menu: raw.menu,
            kind: raw.kind,
            info: raw.info,
            abbr_highlight: raw.abbr_hlgroup,
            kind_highlight: raw.kind_hlgroup,
            user_data: raw.user_data,
        }));
    }
    Ok(CallbackResult {
        items,
        refresh_always,
    })
}
