use std::collections::BTreeMap;

/// Key/value tags; keys are unique
pub type Tags = BTreeMap<String, String>;

/// Keys that carry bookkeeping rather than map meaning
const UNINTERESTING_KEYS: &[&str] = &["attribution", "created_by", "source", "odbl"];

pub fn is_interesting_tag(key: &str) -> bool {
    !UNINTERESTING_KEYS.contains(&key) && !key.starts_with("tiger:")
}

pub fn has_interesting_tags(tags: &Tags) -> bool {
    tags.keys().any(|k| is_interesting_tag(k))
}

/// Build tags from literal pairs
pub fn tags<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Tags
where
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
