//! Deterministic repair of truncated tag markup.
//!
//! Models cut off mid-token leave two kinds of damage the parsers would
//! otherwise reject wholesale:
//!
//! 1. A closing tag missing its tail (`...</tool_call`), when generation
//!    stopped a character or two early.
//! 2. A tag opened but never closed (`<tool_call><function=x>...` then EOF).
//!
//! Both have exactly one valid completion, so repairing them loses nothing
//! and masks no genuine structural error. Repairs are returned so the
//! caller can log them.

/// Closing tags this repair understands, innermost first. Appending order
/// matters: an unclosed `<parameter=...>` must close before its
/// `<function=...>`, which must close before `<tool_call>`.
const CLOSERS: [&str; 4] = ["</parameter>", "</function>", "</tool_call>", "</plan>"];

/// Repair truncated closing delimiters. Returns the repaired text and a
/// description of each repair applied (empty when nothing was changed).
pub fn repair_truncated_tags(text: &str) -> (String, Vec<String>) {
    let mut repaired = text.to_string();
    let mut repairs = Vec::new();

    // Case 1: text ends in a partial closing tag — complete it.
    if let Some((closer, partial_len)) = trailing_partial_closer(&repaired) {
        let completion = &closer[partial_len..];
        repairs.push(format!("completed truncated '{closer}'"));
        repaired.push_str(completion);
    }

    // Case 2: opened-but-never-closed tags — append closers innermost-out.
    for closer in CLOSERS {
        let opens = count_opens(&repaired, closer);
        let closes = repaired.matches(closer).count();
        for _ in closes..opens {
            repairs.push(format!("appended missing '{closer}'"));
            repaired.push_str(closer);
        }
    }

    (repaired, repairs)
}

/// If the text ends with a proper prefix (length ≥ 2) of a known closing
/// tag, return that tag and the prefix length.
fn trailing_partial_closer(text: &str) -> Option<(&'static str, usize)> {
    for closer in CLOSERS {
        for len in (2..closer.len()).rev() {
            if text.ends_with(&closer[..len]) {
                return Some((closer, len));
            }
        }
    }
    None
}

/// Count opening occurrences for the tag behind a closing tag.
/// `<function=` and `<parameter=` open with an attribute, `<tool_call>`
/// and `<plan>` do not.
fn count_opens(text: &str, closer: &str) -> usize {
    match closer {
        "</parameter>" => text.matches("<parameter=").count(),
        "</function>" => text.matches("<function=").count(),
        "</tool_call>" => text.matches("<tool_call>").count(),
        "</plan>" => text.matches("<plan>").count(),
        _ => 0,
    }
}
