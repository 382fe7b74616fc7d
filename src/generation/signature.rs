//! Signature correction.
//!
//! Drafts sometimes sign as the wrong person. This is a best-effort string fix, not a
//! guarantee: it recognises exact signature blocks and short sign-off lines only.

use crate::model::Participant;

const SIGN_OFFS: [&str; 12] = [
    "best",
    "best regards",
    "regards",
    "kind regards",
    "warm regards",
    "thanks",
    "thank you",
    "many thanks",
    "cheers",
    "sincerely",
    "talk soon",
    "all the best",
];

/// How far from the end of the body a sign-off is looked for.
const SIGN_OFF_WINDOW: usize = 6;

fn is_sign_off(line: &str) -> bool {
    let normalized = line
        .trim()
        .trim_end_matches([',', '.', '!'])
        .to_ascii_lowercase();
    SIGN_OFFS.contains(&normalized.as_str())
}

fn names_match(line: &str, participant: &Participant) -> bool {
    let line = line.trim();
    !line.is_empty()
        && (line.eq_ignore_ascii_case(participant.name.trim())
            || line.eq_ignore_ascii_case(participant.first_name()))
}

/// Return `body` signed by `sender`.
///
/// 1. Another participant's exact signature block is replaced with the sender's.
/// 2. A sign-off followed by another participant's name has that name line (and the rest
///    of the block) replaced with the sender's signature.
/// 3. If no signature for the sender is found, the sender's signature is appended.
pub fn correct_signature(body: &str, sender: &Participant, others: &[Participant]) -> String {
    let body = body.trim_end();
    let sender_signature = sender.signature_block();

    for other in others.iter().filter(|o| o.email != sender.email) {
        let signature = other.signature_block();
        if signature.contains('\n') && body.contains(&signature) {
            return body.replace(&signature, &sender_signature);
        }
    }

    let lines: Vec<&str> = body.lines().collect();
    let window_start = lines.len().saturating_sub(SIGN_OFF_WINDOW);
    if let Some(sign_off) = (window_start..lines.len()).rev().find(|i| is_sign_off(lines[*i])) {
        let name_line = lines[sign_off + 1..].iter().find(|l| !l.trim().is_empty());
        match name_line {
            Some(name) if names_match(name, sender) => return body.to_string(),
            Some(name)
                if others
                    .iter()
                    .filter(|o| o.email != sender.email)
                    .any(|o| names_match(name, o)) =>
            {
                let mut kept: Vec<&str> = lines[..=sign_off].to_vec();
                kept.push(&sender_signature);
                return kept.join("\n");
            }
            None => {
                return format!("{}\n{}", body, sender_signature);
            }
            Some(_) => {}
        }
    }

    let tail = lines[window_start..].join("\n");
    if tail.contains(&sender_signature) || lines[window_start..].iter().any(|l| names_match(l, sender)) {
        return body.to_string();
    }
    format!("{}\n\n{}", body, sender_signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, email: &str, role: &str) -> Participant {
        let mut p = Participant::new(name, email);
        p.role = role.to_string();
        p.organization = "Acme".to_string();
        p
    }

    fn cast() -> (Participant, Vec<Participant>) {
        let dana = person("Dana Ortiz", "dana@acme.test", "Controller");
        let lee = person("Lee Park", "lee@acme.test", "Analyst");
        (dana.clone(), vec![dana, lee])
    }

    #[test]
    fn replaces_other_participants_signature_block() {
        let (dana, all) = cast();
        let body = "Numbers attached.\n\nLee Park\nAnalyst\nAcme";
        assert_eq!(
            correct_signature(body, &dana, &all),
            "Numbers attached.\n\nDana Ortiz\nController\nAcme"
        );
    }

    #[test]
    fn replaces_name_after_sign_off() {
        let (dana, all) = cast();
        let body = "See you Friday.\n\nThanks,\nLee";
        assert_eq!(
            correct_signature(body, &dana, &all),
            "See you Friday.\n\nThanks,\nDana Ortiz\nController\nAcme"
        );
    }

    #[test]
    fn keeps_correct_sign_off() {
        let (dana, all) = cast();
        let body = "See you Friday.\n\nBest,\nDana";
        assert_eq!(correct_signature(body, &dana, &all), body);
    }

    #[test]
    fn completes_dangling_sign_off() {
        let (dana, all) = cast();
        assert_eq!(
            correct_signature("Will do.\n\nRegards,", &dana, &all),
            "Will do.\n\nRegards,\nDana Ortiz\nController\nAcme"
        );
    }

    #[test]
    fn appends_when_unsigned() {
        let (dana, all) = cast();
        assert_eq!(
            correct_signature("Will do.", &dana, &all),
            "Will do.\n\nDana Ortiz\nController\nAcme"
        );
    }
}
