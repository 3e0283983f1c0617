//! Link extraction from free text and request preparation.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:https?://|t\.me/)[^\s,]+").expect("valid regex"))
}

/// Every `http(s)://…` or `t.me/…` substring, in order of appearance.
pub fn extract_links(text: &str) -> Vec<String> {
    link_re()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Order-preserving, case-sensitive dedup. First occurrence wins.
pub fn dedup<I, S>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for link in links {
        let link = link.into();
        if seen.insert(link.clone()) {
            out.push(link);
        }
    }
    out
}

/// Extract + dedup, capped at `max`. Returns the kept links and how many were dropped.
pub fn prepare_request(text: &str, max: usize) -> (Vec<String>, usize) {
    let mut links = dedup(extract_links(text));
    let dropped = links.len().saturating_sub(max);
    links.truncate(max);
    (links, dropped)
}
