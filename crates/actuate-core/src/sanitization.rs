//! Masking of credentials before they reach logs or echoed results

use serde_json::{Map, Value as JsonValue};

/// Field names masked regardless of case
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "access_token",
    "refresh_token",
    "authorization",
    "secret",
    "client_secret",
    "api_key",
    "private_key",
    "credential",
    "credentials",
];

/// Substrings marking a field as sensitive
const SENSITIVE_PATTERNS: &[&str] = &["_key", "_token", "_secret", "_password"];

const REDACTED: &str = "***REDACTED***";

/// Check if a field name indicates sensitive data
pub fn is_sensitive_field(field_name: &str) -> bool {
    let lower = field_name.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|&f| lower == f)
        || SENSITIVE_PATTERNS.iter().any(|&p| lower.contains(p))
}

/// Copy of `value` with every scalar under a sensitive key replaced.
pub fn sanitize_json_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let sanitized: Map<String, JsonValue> = map
                .iter()
                .map(|(key, val)| {
                    let replaced = match val {
                        JsonValue::Object(_) | JsonValue::Array(_) => sanitize_json_value(val),
                        JsonValue::Null => JsonValue::Null,
                        _ if is_sensitive_field(key) => JsonValue::String(REDACTED.to_string()),
                        _ => val.clone(),
                    };
                    (key.clone(), replaced)
                })
                .collect();
            JsonValue::Object(sanitized)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize_json_value).collect()),
        other => other.clone(),
    }
}

/// Mask a whole credentials blob: keep its keys, hide every scalar.
pub fn redact_all(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter().map(|(k, v)| (k.clone(), redact_all(v))).collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact_all).collect()),
        JsonValue::Null => JsonValue::Null,
        _ => JsonValue::String(REDACTED.to_string()),
    }
}
