use crate::rng::stable_token;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

const LOCATIONS: [&str; 5] = [
    "Conference Room B",
    "the 4th floor kitchen",
    "Main Lobby",
    "Training Room 2",
    "the east parking lot",
];

/// Deterministic stand-in for an entity value the completion capability did not supply.
///
/// The value depends only on the run seed, the thread id, the entity name and the thread's
/// opening date, so reruns produce the same placeholders.
pub fn synthetic_entity(
    name: &str,
    global_seed: u64,
    thread_id: &str,
    opened_at: DateTime<Utc>,
) -> String {
    let key = format!("{}:{}", thread_id, name);
    let token = stable_token(global_seed, &key);
    let lower = name.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|w| !w.is_empty())
        .collect();
    let has = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));
    let bucket = u32::from_str_radix(&token[..2], 16).unwrap_or(0);

    if has(&["date", "deadline", "day"]) {
        let offset = 2 + i64::from(bucket % 12);
        (opened_at + Duration::days(offset))
            .format("%B %-d, %Y")
            .to_string()
    } else if has(&["amount", "cost", "price", "total"]) {
        let dollars = 150 + (bucket * 37) % 9_850;
        format!("${}.00", dollars)
    } else if has(&["version"]) {
        format!("{}.{}.{}", 1 + bucket % 4, bucket % 10, bucket % 7)
    } else if has(&["location", "room", "venue"]) {
        LOCATIONS[bucket as usize % LOCATIONS.len()].to_string()
    } else if has(&["ticket"]) {
        format!("INC-{}", token)
    } else if has(&["invoice"]) {
        format!("INV-{}", token)
    } else if has(&["contract"]) {
        format!("CTR-{}", token)
    } else if has(&["id", "number", "ref"]) {
        format!("REF-{}", token)
    } else {
        format!("{} {}", humanize(name), token)
    }
}

/// Fill every required entity missing from `supplied`.
pub fn complete_entities(
    required: &[String],
    supplied: &BTreeMap<String, String>,
    global_seed: u64,
    thread_id: &str,
    opened_at: DateTime<Utc>,
) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = supplied
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(k, v)| (k.clone(), v.trim().to_string()))
        .collect();
    for name in required {
        if !out.contains_key(name) {
            out.insert(
                name.clone(),
                synthetic_entity(name, global_seed, thread_id, opened_at),
            );
        }
    }
    out
}

fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
