//! Masking of sensitive fields in response bodies before they are shown.

use serde_json::Value;

/// Replacement for masked values.
pub const REDACTED: &str = "******";

/// Appended when the rendered body exceeds the cap.
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

const DEFAULT_LIMIT: usize = 10_000;

/// Key names (compared case-insensitively, whole key) whose values are masked.
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "key"];

/// Renders `body` as pretty JSON with sensitive values masked, capped at
/// 10000 characters.
pub fn redact(body: &Value) -> String {
	redact_with_limit(body, DEFAULT_LIMIT)
}

/// [`redact`] with an explicit character cap.
pub fn redact_with_limit(body: &Value, limit: usize) -> String {
	let mut copy = body.clone();
	mask(&mut copy);

	let rendered = serde_json::to_string_pretty(&copy).unwrap_or_else(|_| copy.to_string());
	match rendered.char_indices().nth(limit) {
		Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &rendered[..cut]),
		None => rendered,
	}
}

fn is_sensitive(key: &str) -> bool {
	let key = key.to_lowercase();
	SENSITIVE_KEYS.contains(&key.as_str())
}

fn mask(value: &mut Value) {
	match value {
		Value::Object(map) => {
			for (key, child) in map.iter_mut() {
				if is_sensitive(key) {
					*child = Value::String(REDACTED.to_string());
				} else {
					mask(child);
				}
			}
		}
		Value::Array(items) => items.iter_mut().for_each(mask),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn masks_nested_sensitive_fields() {
		let body = json!({"user": {"password": "x", "token": "y"}, "ok": true});
		let rendered = redact(&body);

		let parsed: Value = serde_json::from_str(&rendered).unwrap();
		assert_eq!(parsed, json!({"user": {"password": "******", "token": "******"}, "ok": true}));
		// the input is untouched
		assert_eq!(body["user"]["password"], "x");
	}

	#[test]
	fn matching_is_case_insensitive_and_whole_key() {
		let body = json!({"Password": 1, "TOKEN": {"nested": true}, "apiKey": "kept", "keys": ["kept"]});
		let parsed: Value = serde_json::from_str(&redact(&body)).unwrap();

		assert_eq!(parsed["Password"], REDACTED);
		assert_eq!(parsed["TOKEN"], REDACTED);
		assert_eq!(parsed["apiKey"], "kept");
		assert_eq!(parsed["keys"], json!(["kept"]));
	}

	#[test]
	fn recurses_through_arrays() {
		let body = json!({"rows": [{"secret": "s1", "id": 1}, {"secret": "s2", "id": 2}]});
		let parsed: Value = serde_json::from_str(&redact(&body)).unwrap();
		assert_eq!(parsed["rows"][0]["secret"], REDACTED);
		assert_eq!(parsed["rows"][1]["id"], 2);
	}

	#[test]
	fn output_is_pretty_printed() {
		assert_eq!(redact(&json!({"ok": true})), "{\n  \"ok\": true\n}");
	}

	#[test]
	fn long_bodies_are_truncated_with_marker() {
		let body = json!({"data": "x".repeat(100)});
		let rendered = redact_with_limit(&body, 20);

		assert!(rendered.ends_with(TRUNCATION_MARKER));
		assert_eq!(rendered.chars().count(), 20 + TRUNCATION_MARKER.chars().count());
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		let body = json!({"msg": "超时".repeat(20)});
		let rendered = redact_with_limit(&body, 12);
		assert!(rendered.ends_with(TRUNCATION_MARKER));
	}
}
