//! Turn one upstream record of unknown shape into a [`LinkResult`].

use serde_json::{Map, Value};

use crate::domain::{LinkResult, LinkStatus};

pub const UNKNOWN_LINK: &str = "(unknown link)";

pub const LINK_FIELDS: &[&str] = &["link", "url", "input", "username", "value"];
pub const STATUS_FIELDS: &[&str] = &["status", "result", "state", "valid", "is_valid"];
pub const REASON_FIELDS: &[&str] = &["reason", "error", "message", "detail", "details"];

const VALID_WORDS: &[&str] = &["valid", "ok", "alive", "active", "true"];
const INVALID_WORDS: &[&str] = &["invalid", "bad", "dead", "false"];

/// A record that can be probed by field name.
pub trait FieldSource {
    /// Stringified value of `name`, or `None` when absent, null or blank.
    fn field_text(&self, name: &str) -> Option<String>;
}

impl FieldSource for Map<String, Value> {
    fn field_text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(value_text)
    }
}

impl FieldSource for std::collections::HashMap<String, String> {
    fn field_text(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
    }
}

/// First candidate field carrying a non-empty value.
pub fn first_field<R: FieldSource + ?Sized>(record: &R, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|name| record.field_text(name))
}

/// Coerce a JSON value to display text. Null and blank strings count as absent.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}

/// Map upstream status vocabulary onto the closed [`LinkStatus`] set.
pub fn parse_status(raw: Option<&str>) -> LinkStatus {
    let Some(raw) = raw else {
        return LinkStatus::Unknown;
    };
    let lower = raw.trim().to_lowercase();
    if VALID_WORDS.contains(&lower.as_str()) {
        return LinkStatus::Valid;
    }
    if INVALID_WORDS.contains(&lower.as_str()) {
        return LinkStatus::Invalid;
    }
    LinkStatus::Unknown
}

/// Normalize a probed record. Never fails; missing fields degrade to defaults.
pub fn normalize_record<R: FieldSource + ?Sized>(record: &R) -> LinkResult {
    let link = first_field(record, LINK_FIELDS).unwrap_or_else(|| UNKNOWN_LINK.to_string());
    let status = parse_status(first_field(record, STATUS_FIELDS).as_deref());
    let reason = first_field(record, REASON_FIELDS);
    LinkResult {
        link,
        status,
        reason,
    }
}

/// Normalize one raw upstream row.
///
/// A bare string row is read as the link itself; any other non-object row
/// yields the fully unknown placeholder.
pub fn normalize(raw: &Value) -> LinkResult {
    match raw {
        Value::Object(map) => normalize_record(map),
        Value::String(s) if !s.trim().is_empty() => LinkResult {
            link: s.clone(),
            status: LinkStatus::Unknown,
            reason: None,
        },
        _ => LinkResult {
            link: UNKNOWN_LINK.to_string(),
            status: LinkStatus::Unknown,
            reason: None,
        },
    }
}
