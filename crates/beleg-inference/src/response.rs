//! Tolerant parsing of model output into JSON objects.
//!
//! Models asked for "JSON only" still wrap answers in markdown fences, leave
//! trailing commas, forget to quote keys, or stop mid-object. Parsing is a
//! two-stage contract:
//!
//! 1. **Strict**: clean the text ([`clean_json_response`]) and parse it as one
//!    JSON object.
//! 2. **Degraded**: locate each caller-declared key individually
//!    ([`parse_by_keys`]) and keep whichever values can be read on their own.
//!
//! Neither stage invents values. A key that cannot be located is absent
//! from the result.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

lazy_static! {
    static ref FENCE_OPEN: Regex = Regex::new(r"```(?:json|JSON)?\s*").unwrap();
    static ref FENCE_CLOSE: Regex = Regex::new(r"(?m)```\s*$").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
    static ref OUTER_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    static ref UNQUOTED_KEY: Regex = Regex::new(r"([{,]\s*)([A-Za-z_]\w*)\s*:").unwrap();
    static ref NUMBER_PREFIX: Regex = Regex::new(r"^-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?").unwrap();
}

/// Extract and repair a JSON object from raw model output.
///
/// Strips code fences, removes trailing commas before `}`/`]`, keeps the
/// outermost `{...}` span and, only if that still fails to parse, quotes
/// bare object keys. Returns `None` when no parseable object remains.
pub fn clean_json_response(raw: &str) -> Option<String> {
    let text = FENCE_OPEN.replace_all(raw, "");
    let text = FENCE_CLOSE.replace_all(&text, "");
    let text = TRAILING_COMMA.replace_all(text.trim(), "$1");

    let candidate = match OUTER_OBJECT.find(&text) {
        Some(m) => m.as_str().to_string(),
        None => {
            debug!("No JSON object found in model response");
            return None;
        }
    };

    if serde_json::from_str::<Value>(&candidate).is_ok() {
        return Some(candidate);
    }

    // Quoting keys on already-valid JSON could corrupt URLs inside strings,
    // so this only runs on text that failed to parse.
    let fixed = UNQUOTED_KEY.replace_all(&candidate, "$1\"$2\":").into_owned();
    match serde_json::from_str::<Value>(&fixed) {
        Ok(_) => Some(fixed),
        Err(e) => {
            debug!("Could not repair JSON object: {}", e);
            None
        }
    }
}

/// Strict stage: a non-empty JSON object or nothing.
pub fn parse_strict(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = clean_json_response(raw)?;
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// Degraded stage: look up each of `expected_keys` on its own.
///
/// Handles `"key": "string"`, numbers, `null`, `true`/`false`, and nested
/// arrays or objects (bracket-balanced, string-aware). Keys that cannot be
/// found, or whose value cannot be read, are left out.
pub fn parse_by_keys(raw: &str, expected_keys: &[&str]) -> Map<String, Value> {
    let mut result = Map::new();

    for key in expected_keys {
        let pattern = format!(r#""{}"\s*:\s*"#, regex::escape(key));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };

        for m in re.find_iter(raw) {
            if let Some(value) = read_value(&raw[m.end()..]) {
                result.insert((*key).to_string(), value);
                break;
            }
        }
    }

    result
}

/// Run both stages. `None` means the output held nothing usable.
pub fn parse_response(raw: &str, expected_keys: &[&str]) -> Option<Map<String, Value>> {
    if raw.trim().is_empty() {
        return None;
    }

    if let Some(map) = parse_strict(raw) {
        return Some(map);
    }

    let partial = parse_by_keys(raw, expected_keys);
    if partial.is_empty() {
        warn!("Model response could not be parsed, not even per key");
        None
    } else {
        debug!(
            "Strict parse failed, recovered {}/{} keys individually",
            partial.len(),
            expected_keys.len()
        );
        Some(partial)
    }
}

/// Read one JSON value from the start of `rest`.
fn read_value(rest: &str) -> Option<Value> {
    let first = rest.chars().next()?;

    match first {
        '"' => {
            let end = string_end(rest)?;
            let literal = &rest[..=end];
            serde_json::from_str::<Value>(literal)
                .ok()
                .or_else(|| Some(Value::String(literal.trim_matches('"').to_string())))
        }
        '[' | '{' => {
            let end = balanced_end(rest)?;
            let slice = &rest[..=end];
            serde_json::from_str::<Value>(slice).ok().or_else(|| {
                let repaired = TRAILING_COMMA.replace_all(slice, "$1");
                serde_json::from_str::<Value>(&repaired).ok()
            })
        }
        'n' if rest.starts_with("null") => Some(Value::Null),
        't' if rest.starts_with("true") => Some(Value::Bool(true)),
        'f' if rest.starts_with("false") => Some(Value::Bool(false)),
        _ => {
            let m = NUMBER_PREFIX.find(rest)?;
            serde_json::from_str::<Value>(m.as_str()).ok()
        }
    }
}

/// Byte index of the quote closing the string literal that opens `s`.
fn string_end(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Byte index of the bracket closing the array/object that opens `s`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_fenced_with_trailing_comma() {
        let raw = "```json\n{\n  \"total_amount\": 949.0,\n  \"vat_percentage\": 19,\n}\n```";

        let map = parse_response(raw, &["total_amount", "vat_percentage"]).unwrap();

        assert_eq!(Value::Object(map), json!({"total_amount": 949.0, "vat_percentage": 19}));
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Sure! Here is the data:\n{\"receipt_number\": \"R-17\"}\nHope this helps.";
        let map = parse_strict(raw).unwrap();
        assert_eq!(map["receipt_number"], "R-17");
    }

    #[test]
    fn test_unquoted_keys_repaired() {
        let cleaned = clean_json_response("{name: \"ACME GmbH\", city: \"Berlin\"}").unwrap();
        let value: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(value, json!({"name": "ACME GmbH", "city": "Berlin"}));
    }

    #[test]
    fn test_valid_json_with_url_untouched() {
        let raw = r#"{"name": "Shop", "web": "https://shop.example:8080/a"}"#;
        assert_eq!(clean_json_response(raw).unwrap(), raw);
    }

    #[test]
    fn test_no_object_yields_none() {
        assert_eq!(clean_json_response("no json here"), None);
        assert_eq!(parse_response("", &["a"]), None);
        assert_eq!(parse_response("   ", &["a"]), None);
    }

    #[test]
    fn test_empty_object_is_not_data() {
        assert_eq!(parse_strict("{}"), None);
    }

    #[test]
    fn test_degraded_parse_recovers_keys_from_truncated_output() {
        let raw = r#"{"receipt_number": "RE-2024-001", "receipt_date": "2024-03-01", "category": "softw"#;

        let map = parse_response(raw, &["receipt_number", "receipt_date", "category"]).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["receipt_number"], "RE-2024-001");
        assert_eq!(map["receipt_date"], "2024-03-01");
        assert!(!map.contains_key("category"));
    }

    #[test]
    fn test_degraded_parse_scalars() {
        let raw = r#"garbage "total_amount": 119.5, "vat_amount": null, "flag": true, "vat_percentage": -3 trailing"#;

        let map = parse_by_keys(raw, &["total_amount", "vat_amount", "flag", "vat_percentage", "missing"]);

        assert_eq!(map["total_amount"], json!(119.5));
        assert_eq!(map["vat_amount"], Value::Null);
        assert_eq!(map["flag"], json!(true));
        assert_eq!(map["vat_percentage"], json!(-3));
        assert!(!map.contains_key("missing"));
    }

    #[test]
    fn test_degraded_parse_nested_items_array() {
        let raw = r#"{"items": [{"description": "Kabel [2m]", "total_price": 9.99}, {"description": "Maus", "total_price": 19.0},] "oops"#;

        let map = parse_by_keys(raw, &["items"]);

        assert_eq!(
            map["items"],
            json!([
                {"description": "Kabel [2m]", "total_price": 9.99},
                {"description": "Maus", "total_price": 19.0}
            ])
        );
    }

    #[test]
    fn test_degraded_parse_escaped_string() {
        let raw = r#"{"name": "Müller \"Bau\" GmbH", "city": "#;
        let map = parse_by_keys(raw, &["name", "city"]);
        assert_eq!(map["name"], "Müller \"Bau\" GmbH");
        assert!(!map.contains_key("city"));
    }
}
