//! Sender and recipient resolution per slot.

use crate::model::{EmailMessage, Mailbox, Participant};
use crate::planning::SlotIntent;
use crate::rng::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;

const NEW_CC_PROBABILITY: f64 = 0.25;
const REPLY_ALL_PROBABILITY: f64 = 0.35;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParticipants {
    pub from: Participant,
    pub to: Vec<Participant>,
    pub cc: Vec<Participant>,
}

impl ResolvedParticipants {
    pub fn recipients(&self) -> impl Iterator<Item = &Participant> {
        self.to.iter().chain(self.cc.iter())
    }
}

fn lookup(participants: &[Participant], mailbox: &Mailbox) -> Participant {
    participants
        .iter()
        .find(|p| p.email.eq_ignore_ascii_case(&mailbox.email))
        .cloned()
        .unwrap_or_else(|| Participant::new(mailbox.name.clone(), mailbox.email.clone()))
}

fn same(a: &Participant, b: &Participant) -> bool {
    a.email.eq_ignore_ascii_case(&b.email)
}

/// Resolve who sends and receives a slot. Reply and forward slots take their committed
/// parent; callers check the parent exists first.
pub fn resolve_participants(
    intent: SlotIntent,
    parent: Option<&EmailMessage>,
    participants: &[Participant],
    rng: &mut ThreadRng,
) -> Option<ResolvedParticipants> {
    match (intent, parent) {
        (SlotIntent::New, _) => resolve_new(participants, rng),
        (SlotIntent::Reply, Some(parent)) => resolve_reply(parent, participants, rng),
        (SlotIntent::Forward, Some(parent)) => resolve_forward(parent, participants, rng),
        _ => None,
    }
}

fn resolve_new(participants: &[Participant], rng: &mut ThreadRng) -> Option<ResolvedParticipants> {
    let from = participants.choose(rng)?.clone();
    let mut others: Vec<Participant> = participants
        .iter()
        .filter(|p| !same(p, &from))
        .cloned()
        .collect();
    if others.is_empty() {
        return Some(ResolvedParticipants {
            to: vec![from.clone()],
            from,
            cc: Vec::new(),
        });
    }
    others.shuffle(rng);
    let to_count = rng.gen_range(1..=others.len().min(3));
    let remaining = others.split_off(to_count);
    let cc = if !remaining.is_empty() && rng.gen_bool(NEW_CC_PROBABILITY) {
        vec![remaining[0].clone()]
    } else {
        Vec::new()
    };
    Some(ResolvedParticipants {
        from,
        to: others,
        cc,
    })
}

fn resolve_reply(
    parent: &EmailMessage,
    participants: &[Participant],
    rng: &mut ThreadRng,
) -> Option<ResolvedParticipants> {
    let parent_sender = lookup(participants, parent.from.as_ref()?);
    let candidates: Vec<Participant> = parent
        .recipients()
        .map(|m| lookup(participants, m))
        .filter(|p| !same(p, &parent_sender))
        .collect();
    let from = match candidates.choose(rng) {
        Some(from) => from.clone(),
        // Parent was addressed only to its sender; someone else picks it up
        None => participants
            .iter()
            .find(|p| !same(p, &parent_sender))
            .cloned()
            .unwrap_or_else(|| parent_sender.clone()),
    };

    let to = vec![parent_sender.clone()];
    let cc = if rng.gen_bool(REPLY_ALL_PROBABILITY) {
        let mut cc: Vec<Participant> = Vec::new();
        for addressee in parent.recipients().map(|m| lookup(participants, m)) {
            if !same(&addressee, &from)
                && !same(&addressee, &parent_sender)
                && !cc.iter().any(|c| same(c, &addressee))
            {
                cc.push(addressee);
            }
        }
        cc
    } else {
        Vec::new()
    };
    Some(ResolvedParticipants { from, to, cc })
}

fn resolve_forward(
    parent: &EmailMessage,
    participants: &[Participant],
    rng: &mut ThreadRng,
) -> Option<ResolvedParticipants> {
    let recipients: Vec<Participant> = parent
        .recipients()
        .map(|m| lookup(participants, m))
        .collect();
    let from = match recipients.choose(rng) {
        Some(from) => from.clone(),
        None => lookup(participants, parent.from.as_ref()?),
    };

    let outsiders: Vec<&Participant> = participants
        .iter()
        .filter(|p| {
            !parent
                .addressees()
                .any(|m| m.email.eq_ignore_ascii_case(&p.email))
        })
        .collect();
    let target = match outsiders.choose(rng) {
        Some(target) => (*target).clone(),
        None => {
            let others: Vec<&Participant> =
                participants.iter().filter(|p| !same(p, &from)).collect();
            (*others.choose(rng)?).clone()
        }
    };
    Some(ResolvedParticipants {
        from,
        to: vec![target],
        cc: Vec::new(),
    })
}
