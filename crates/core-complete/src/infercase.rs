//! Case inference: carry the case the user typed over to a candidate found
//! case-insensitively.

/// Adjust `candidate` to the case pattern of `typed`.
///
/// Each typed letter sets the case of the candidate character at the same
/// position; the candidate keeps its own characters.
/// For the rest of the candidate: if the user typed any lowercase letter
/// where the candidate has an uppercase one, the tail is lowercased; if the
/// user typed only capitals following a letter where the candidate has
/// lowercase, the tail is uppercased.
pub fn infer_case(typed: &str, candidate: &str) -> String {
    let orig: Vec<char> = typed.chars().collect();
    let mut out: Vec<char> = candidate.chars().collect();
    let min_len = out.len().min(orig.len());
    let tail = orig.len().min(out.len());

    let mut has_lower = false;
    for i in 0..min_len {
        if orig[i].is_lowercase() {
            has_lower = true;
            if out[i].is_uppercase() {
                lower_tail(&mut out[tail..]);
                break;
            }
        }
    }

    if !has_lower {
        let mut was_letter = false;
        for i in 0..min_len {
            if was_letter && orig[i].is_uppercase() && out[i].is_lowercase() {
                upper_tail(&mut out[tail..]);
                break;
            }
            was_letter = orig[i].is_lowercase() || orig[i].is_uppercase();
        }
    }

    for (c, typed) in out.iter_mut().zip(&orig) {
        if typed.is_lowercase() {
            *c = lower(*c);
        } else if typed.is_uppercase() {
            *c = upper(*c);
        }
    }
    out.into_iter().collect()
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn upper(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn lower_tail(chars: &mut [char]) {
    for c in chars {
        *c = lower(*c);
    }
}

fn upper_tail(chars: &mut [char]) {
    for c in chars {
        *c = upper(*c);
    }
}
