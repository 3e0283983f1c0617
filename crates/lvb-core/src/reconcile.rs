//! Recover per-link rows from a bulk payload of unknown shape.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    domain::{LinkResult, LinkStatus},
    normalize::normalize,
};

pub const MISSING_REASON: &str = "Missing in bulk response";

const ROW_KEYS: &[&str] = &["results", "data", "items"];

/// Known bulk payload shapes, in dispatch priority order.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamShape {
    /// A list of raw rows (top-level array or a `results`/`data`/`items` field).
    Rows(Vec<Value>),
    /// Separate `valid` / `invalid` / `unknown` lists.
    Buckets {
        valid: Vec<Value>,
        invalid: Vec<Value>,
        unknown: Vec<Value>,
    },
    /// An object keyed by requested link. Entries are already filtered to
    /// requested keys and usable value types.
    Keyed(Vec<(String, Value)>),
    Unrecognized,
}

impl UpstreamShape {
    /// Classify `payload`. The first rule with a non-empty extraction wins.
    pub fn classify(payload: &Value, requested: &[String]) -> Self {
        if let Some(rows) = top_level_rows(payload) {
            return UpstreamShape::Rows(rows);
        }
        let Value::Object(obj) = payload else {
            return UpstreamShape::Unrecognized;
        };
        if let Some(rows) = nested_rows(obj) {
            return UpstreamShape::Rows(rows);
        }
        if let Some(shape) = buckets(obj) {
            return shape;
        }
        if let Some(entries) = keyed_entries(obj, requested) {
            return UpstreamShape::Keyed(entries);
        }
        UpstreamShape::Unrecognized
    }

    /// Raw rows ready for normalization, or `None` when unrecognized.
    pub fn into_rows(self) -> Option<Vec<Value>> {
        match self {
            UpstreamShape::Rows(rows) => Some(rows),
            UpstreamShape::Buckets {
                valid,
                invalid,
                unknown,
            } => {
                let mut rows = Vec::with_capacity(valid.len() + invalid.len() + unknown.len());
                rows.extend(valid.into_iter().map(|v| tag_status(v, LinkStatus::Valid)));
                rows.extend(invalid.into_iter().map(|v| tag_status(v, LinkStatus::Invalid)));
                rows.extend(unknown.into_iter().map(|v| tag_status(v, LinkStatus::Unknown)));
                Some(rows)
            }
            UpstreamShape::Keyed(entries) => Some(
                entries
                    .into_iter()
                    .map(|(link, v)| keyed_row(link, v))
                    .collect(),
            ),
            UpstreamShape::Unrecognized => None,
        }
    }
}

fn top_level_rows(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(xs) if !xs.is_empty() => Some(xs.clone()),
        _ => None,
    }
}

fn nested_rows(obj: &Map<String, Value>) -> Option<Vec<Value>> {
    ROW_KEYS.iter().find_map(|k| match obj.get(*k) {
        Some(Value::Array(xs)) if !xs.is_empty() => Some(xs.clone()),
        _ => None,
    })
}

fn buckets(obj: &Map<String, Value>) -> Option<UpstreamShape> {
    let list = |k: &str| match obj.get(k) {
        Some(Value::Array(xs)) => xs.clone(),
        _ => Vec::new(),
    };
    let (valid, invalid, unknown) = (list("valid"), list("invalid"), list("unknown"));
    if valid.is_empty() && invalid.is_empty() && unknown.is_empty() {
        return None;
    }
    Some(UpstreamShape::Buckets {
        valid,
        invalid,
        unknown,
    })
}

/// Entries come out in request order, not in `Map` key order.
fn keyed_entries(obj: &Map<String, Value>, requested: &[String]) -> Option<Vec<(String, Value)>> {
    let entries = requested
        .iter()
        .filter_map(|link| obj.get(link).map(|v| (link, v)))
        .filter(|(_, v)| v.is_string() || v.is_object())
        .map(|(link, v)| (link.clone(), v.clone()))
        .collect::<Vec<_>>();
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

fn tag_status(v: Value, status: LinkStatus) -> Value {
    let tag = Value::String(status.as_str().to_string());
    match v {
        Value::Object(mut map) => {
            map.insert("status".to_string(), tag);
            Value::Object(map)
        }
        Value::String(link) => serde_json::json!({ "link": link, "status": tag }),
        other => serde_json::json!({ "value": other, "status": tag }),
    }
}

fn keyed_row(link: String, v: Value) -> Value {
    match v {
        Value::Object(mut map) => {
            map.insert("link".to_string(), Value::String(link));
            Value::Object(map)
        }
        status => serde_json::json!({ "link": link, "status": status }),
    }
}

/// Reconcile a bulk payload against the requested links.
///
/// Returns `None` when the payload shape is unrecognized; the caller must then
/// fall back to one call per link. Otherwise the output holds exactly one
/// entry per requested link.
pub fn reconcile(payload: &Value, requested: &[String]) -> Option<Vec<LinkResult>> {
    let rows = UpstreamShape::classify(payload, requested).into_rows()?;
    let normalized: Vec<LinkResult> = rows.iter().map(normalize).collect();

    if normalized.len() == requested.len() {
        return Some(normalized);
    }

    let mut by_link: HashMap<&str, &LinkResult> = HashMap::new();
    for r in &normalized {
        by_link.entry(r.link.as_str()).or_insert(r);
    }

    Some(
        requested
            .iter()
            .map(|link| match by_link.get(link.as_str()) {
                Some(r) => (*r).clone(),
                None => LinkResult::unknown(link.clone(), MISSING_REASON),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn links(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn top_level_array_is_rows() {
        let req = links(&["a", "b"]);
        let payload = json!([
            {"link": "a", "status": "ok"},
            {"link": "b", "status": "dead", "reason": "404"}
        ]);
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].status, LinkStatus::Valid);
        assert_eq!(out[1].status, LinkStatus::Invalid);
        assert_eq!(out[1].reason.as_deref(), Some("404"));
    }

    #[test]
    fn nested_row_keys_follow_priority() {
        let req = links(&["a"]);
        let payload = json!({
            "items": [{"link": "a", "status": "dead"}],
            "data": [{"link": "a", "status": "ok"}]
        });
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(out[0].status, LinkStatus::Valid);

        // Empty lists fall through to the next key.
        let payload = json!({"results": [], "items": [{"link": "a", "status": "bad"}]});
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(out[0].status, LinkStatus::Invalid);
    }

    #[test]
    fn buckets_are_tagged_and_concatenated() {
        let req = links(&["a", "b", "c"]);
        let payload = json!({
            "unknown": ["c"],
            "invalid": [{"url": "b", "status": "ok", "error": "gone"}],
            "valid": ["a"]
        });
        let shape = UpstreamShape::classify(&payload, &req);
        assert!(matches!(shape, UpstreamShape::Buckets { .. }));

        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(
            out.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![LinkStatus::Valid, LinkStatus::Invalid, LinkStatus::Unknown]
        );
        assert_eq!(out[1].link, "b");
        assert_eq!(out[1].reason.as_deref(), Some("gone"));
    }

    #[test]
    fn empty_buckets_are_not_adopted() {
        let req = links(&["a"]);
        let payload = json!({"valid": [], "invalid": [], "a": "ok"});
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(out[0].status, LinkStatus::Valid);
    }

    #[test]
    fn keyed_object_uses_requested_keys() {
        let req = links(&["https://a", "https://b"]);
        let payload = json!({
            "https://a": "alive",
            "https://b": {"status": "dead", "link": "other", "reason": "banned"},
            "meta": "ignored"
        });
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(out.len(), 2);
        let b = out.iter().find(|r| r.link == "https://b").unwrap();
        assert_eq!(b.status, LinkStatus::Invalid);
        assert_eq!(b.reason.as_deref(), Some("banned"));
    }

    #[test]
    fn keyed_object_follows_request_order() {
        let req = links(&["t.me/zeta", "t.me/alpha", "t.me/mid"]);
        let payload = json!({
            "t.me/alpha": "dead",
            "t.me/mid": {"status": "ok"},
            "t.me/zeta": "ok"
        });
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(
            out.iter().map(|r| r.link.as_str()).collect::<Vec<_>>(),
            vec!["t.me/zeta", "t.me/alpha", "t.me/mid"]
        );
        assert_eq!(
            out.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![LinkStatus::Valid, LinkStatus::Invalid, LinkStatus::Valid]
        );
    }

    #[test]
    fn unrecognized_shapes_signal_fallback() {
        let req = links(&["a"]);
        assert!(reconcile(&json!([]), &req).is_none());
        assert!(reconcile(&json!({"meta": 1}), &req).is_none());
        assert!(reconcile(&json!("ok"), &req).is_none());
        assert!(reconcile(&json!({"a": 5}), &req).is_none());
    }

    #[test]
    fn partial_response_is_rekeyed_in_request_order() {
        let req = links(&["a", "b", "c"]);
        let payload = json!([{"link": "c", "status": "ok"}, {"link": "a", "status": "bad"}]);
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(
            out.iter().map(|r| r.link.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(out[0].status, LinkStatus::Invalid);
        assert_eq!(out[1].status, LinkStatus::Unknown);
        assert_eq!(out[1].reason.as_deref(), Some(MISSING_REASON));
        assert_eq!(out[2].status, LinkStatus::Valid);
    }

    #[test]
    fn output_length_matches_request_when_rows_recovered() {
        let req = links(&["a", "b"]);
        let payload = json!({"results": [
            {"link": "a", "status": "ok"},
            {"link": "a", "status": "bad"},
            {"link": "x", "status": "ok"}
        ]});
        let out = reconcile(&payload, &req).unwrap();
        assert_eq!(out.len(), req.len());
        // First occurrence wins when re-keying.
        assert_eq!(out[0].status, LinkStatus::Valid);
        assert_eq!(out[1].reason.as_deref(), Some(MISSING_REASON));
    }

    #[test]
    fn link_forms_are_not_normalized_before_matching() {
        let req = links(&["https://a", "https://b"]);
        let payload = json!([{"link": "https://a/", "status": "ok"}]);
        let out = reconcile(&payload, &req).unwrap();
        assert!(out.iter().all(|r| r.status == LinkStatus::Unknown));
    }
}
