//! Answer normalization.
//!
//! `normalize` applies a fixed, ordered pipeline to raw engine output:
//! unwrap a single enclosing code fence and JSON answer envelope, strip
//! known prose prefixes, trim. The pipeline is idempotent: running it on
//! its own output changes nothing.

use serde_json::Value;

use solvent_core::NormalizeError;

const ANSWER_PREFIXES: &[&str] = &["the answer is", "final answer:", "answer:"];
const ENVELOPE_KEYS: &[&str] = &["answer", "final_answer", "result"];

/// Question-independent normalization.
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let text = raw.trim();
    let text = unwrap_code_fence(text);
    let text = unwrap_json_envelope(text.trim());
    let text = strip_answer_prefix(text.trim());
    let text = text.trim();

    if text.is_empty() {
        Err(NormalizeError::EmptyAnswer)
    } else {
        Ok(text.to_string())
    }
}

/// Normalization plus cleanups that depend on what the question asked
/// for: comma-list tightening and unit stripping on short numerics.
pub fn normalize_for_question(raw: &str, question: &str) -> Result<String, NormalizeError> {
    let mut text = normalize(raw)?;
    text = strip_units_from_short_numeric(&text);

    let question_lower = question.to_lowercase();
    if question_lower.contains("comma") && question_lower.contains("list") {
        text = text.replace(", ", ",");
    }

    if text.is_empty() {
        Err(NormalizeError::EmptyAnswer)
    } else {
        Ok(text)
    }
}

/// Removes one enclosing triple-backtick fence, tolerating a language
/// tag on the opening line. Inner fences are left alone.
fn unwrap_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };

    // Drop the language tag line, if any.
    match body.split_once('\n') {
        Some((first_line, remainder)) if !first_line.trim().contains(' ') => {
            if first_line.trim().is_empty() || first_line.trim().chars().all(char::is_alphanumeric)
            {
                remainder
            } else {
                body
            }
        }
        _ => body,
    }
}

/// If the whole payload is one JSON object carrying a single known
/// answer field with a string value, take that field.
fn unwrap_json_envelope(text: &str) -> &str {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) else {
        return text;
    };

    for key in ENVELOPE_KEYS {
        if let Some(Value::String(inner)) = object.get(*key) {
            // The borrow ends with the parsed Value, so find the answer
            // slice inside the original text instead of cloning through.
            if let Some(start) = text.find(inner.as_str()) {
                return &text[start..start + inner.len()];
            }
        }
    }

    text
}

// Runs to a fixed point so stacked prefixes ("the answer is answer: 5")
// cannot defeat idempotence.
fn strip_answer_prefix(text: &str) -> &str {
    let mut current = text;
    loop {
        let lower = current.to_lowercase();
        let Some(prefix) = ANSWER_PREFIXES.iter().find(|prefix| lower.starts_with(**prefix))
        else {
            return current;
        };
        current = current[prefix.len()..].trim_start_matches([':', ' ']);
    }
}

/// Strips currency symbols and percent signs from short numeric answers
/// so "$1,234.50" and "42%" compare as bare numbers.
fn strip_units_from_short_numeric(text: &str) -> String {
    if text.len() > 20 {
        return text.to_string();
    }

    let stripped = text
        .trim_start_matches(['$', '€', '£'])
        .trim_end_matches('%')
        .trim()
        .replace(',', "");

    if !stripped.is_empty() && stripped.parse::<f64>().is_ok() {
        stripped
    } else {
        text.to_string()
    }
}
