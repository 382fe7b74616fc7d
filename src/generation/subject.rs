//! Subject derivation for replies and forwards.

use crate::planning::SlotIntent;

const REPLY_PREFIXES: [&str; 1] = ["re:"];
const FORWARD_PREFIXES: [&str; 2] = ["fwd:", "fw:"];

fn has_prefix(subject: &str, prefixes: &[&str]) -> bool {
    let lower = subject.trim_start().to_ascii_lowercase();
    prefixes.iter().any(|p| lower.starts_with(p))
}

/// `Re: <parent>` unless the parent already starts with a reply prefix.
pub fn reply_subject(parent: &str) -> String {
    let parent = parent.trim();
    if has_prefix(parent, &REPLY_PREFIXES) {
        parent.to_string()
    } else {
        format!("Re: {}", parent)
    }
}

/// `Fwd: <parent>` unless the parent already starts with `Fwd:` or `Fw:`.
pub fn forward_subject(parent: &str) -> String {
    let parent = parent.trim();
    if has_prefix(parent, &FORWARD_PREFIXES) {
        parent.to_string()
    } else {
        format!("Fwd: {}", parent)
    }
}

/// Subject of a non-root slot, derived from its parent.
pub fn derive_subject(intent: SlotIntent, parent_subject: &str) -> String {
    match intent {
        SlotIntent::New => parent_subject.trim().to_string(),
        SlotIntent::Reply => reply_subject(parent_subject),
        SlotIntent::Forward => forward_subject(parent_subject),
    }
}

/// Subject with every leading reply/forward prefix removed.
pub fn base_subject(subject: &str) -> &str {
    let mut rest = subject.trim();
    loop {
        let lower = rest.to_ascii_lowercase();
        let prefix = REPLY_PREFIXES
            .iter()
            .chain(FORWARD_PREFIXES.iter())
            .find(|p| lower.starts_with(*p));
        match prefix {
            Some(p) => rest = rest[p.len()..].trim_start(),
            None => return rest,
        }
    }
}
