//! Prompt construction for subject, draft and repair requests.

use crate::generation::participants::ResolvedParticipants;
use crate::generation::validation::ValidationIssue;
use crate::model::{EmailMessage, Participant, Relevance};
use crate::planning::{SlotIntent, ThreadEmailSlotPlan};
use crate::topics::TopicArchetype;
use std::collections::BTreeMap;

/// Longest parent excerpt included in a draft prompt.
const PARENT_EXCERPT_CHARS: usize = 1_200;

pub const SYSTEM_PROMPT: &str = "You write realistic corporate email for a fictional company. \
Write in plain text as the named sender, never as an assistant. Do not use template \
placeholders such as [Your Name]. Always answer with a single JSON object and nothing else.";

/// Narrative context of the storyline and beat that own a thread.
#[derive(Debug, Clone, Default)]
pub struct StoryContext {
    pub storyline_title: String,
    pub storyline_summary: String,
    pub beat_name: String,
    pub beat_plot: String,
}

/// Topic fixed for a non-responsive thread.
#[derive(Debug, Clone)]
pub struct TopicBrief {
    pub archetype_id: String,
    pub description: String,
    pub entities: BTreeMap<String, String>,
}

pub struct DraftPrompt<'a> {
    pub story: &'a StoryContext,
    pub relevance: Relevance,
    pub hot: bool,
    pub subject: &'a str,
    pub topic: Option<&'a TopicBrief>,
    pub slot: &'a ThreadEmailSlotPlan,
    pub slot_count: usize,
    pub participants: &'a ResolvedParticipants,
    pub parent: Option<&'a EmailMessage>,
    pub facts: &'a str,
    pub attachments: Option<String>,
}

fn person_line(p: &Participant) -> String {
    let mut line = format!("{} <{}>", p.name, p.email);
    let detail: Vec<&str> = [p.role.as_str(), p.department.as_str(), p.organization.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !detail.is_empty() {
        line.push_str(&format!(" ({})", detail.join(", ")));
    }
    line
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// One-line description of what the slot does, e.g. "Lee Park replies to Dana Ortiz".
pub fn describe_intent(intent: SlotIntent, participants: &ResolvedParticipants) -> String {
    let to: Vec<&str> = participants.to.iter().map(|p| p.name.as_str()).collect();
    let to = to.join(", ");
    match intent {
        SlotIntent::New => format!("{} starts a new email thread with {}", participants.from.name, to),
        SlotIntent::Reply => format!("{} replies to {}", participants.from.name, to),
        SlotIntent::Forward => format!(
            "{} forwards the earlier email to {}, who was not on it",
            participants.from.name, to
        ),
    }
}

pub fn subject_prompt(story: &StoryContext, hot: bool, opener: &ResolvedParticipants) -> String {
    let mut prompt = format!(
        "Storyline: {}\n{}\n\nBeat: {}\n{}\n\nThe thread is opened by {} and sent to {}.\n",
        story.storyline_title,
        story.storyline_summary,
        story.beat_name,
        story.beat_plot,
        person_line(&opener.from),
        opener
            .to
            .iter()
            .map(person_line)
            .collect::<Vec<_>>()
            .join("; ")
    );
    if hot {
        prompt.push_str("This thread contains sensitive, highly relevant discussion.\n");
    }
    prompt.push_str(
        "\nWrite a realistic email subject line for the thread. \
Respond as JSON: {\"subject\": \"...\"}",
    );
    prompt
}

pub fn topic_subject_prompt(archetype: &TopicArchetype, opener: &ResolvedParticipants) -> String {
    let mut entity_names: Vec<&str> = archetype
        .required_entities
        .iter()
        .map(String::as_str)
        .collect();
    entity_names.extend(archetype.optional_entities.iter().map(String::as_str));
    format!(
        "Everyday workplace email, unrelated to any larger story.\nTopic: {} ({}, {})\n{}\n\n\
Sender: {}\nRecipients: {}\n\nWrite a realistic subject line and plausible values for these \
details: {}.\nRespond as JSON: {{\"subject\": \"...\", \"entities\": {{\"name\": \"value\"}}}}",
        archetype.id,
        archetype.category,
        archetype.intent,
        archetype.description,
        person_line(&opener.from),
        opener
            .to
            .iter()
            .map(person_line)
            .collect::<Vec<_>>()
            .join("; "),
        entity_names.join(", ")
    )
}

pub fn draft_prompt(ctx: &DraftPrompt<'_>) -> String {
    let mut prompt = String::new();
    match (ctx.relevance, ctx.topic) {
        (Relevance::NonResponsive, Some(topic)) => {
            prompt.push_str(&format!(
                "Everyday workplace email, unrelated to any larger story.\nTopic: {}\n",
                topic.description
            ));
            if !topic.entities.is_empty() {
                prompt.push_str("Use these details where natural:\n");
                for (name, value) in &topic.entities {
                    prompt.push_str(&format!("- {}: {}\n", name, value));
                }
            }
        }
        _ => {
            prompt.push_str(&format!(
                "Storyline: {}\n{}\nBeat: {}\n{}\n",
                ctx.story.storyline_title,
                ctx.story.storyline_summary,
                ctx.story.beat_name,
                ctx.story.beat_plot
            ));
            if ctx.hot {
                prompt.push_str("This thread is central to the story; let the key facts surface.\n");
            }
        }
    }

    prompt.push_str(&format!(
        "\nSubject: {}\nEmail {} of {} ({} of the thread). {}.\nSent: {}\n",
        ctx.subject,
        ctx.slot.index + 1,
        ctx.slot_count,
        ctx.slot.phase.label(),
        describe_intent(ctx.slot.intent, ctx.participants),
        ctx.slot.sent_at.format("%A %B %-d, %Y %H:%M UTC")
    ));
    prompt.push_str(&format!("From: {}\n", person_line(&ctx.participants.from)));
    for p in &ctx.participants.to {
        prompt.push_str(&format!("To: {}\n", person_line(p)));
    }
    for p in &ctx.participants.cc {
        prompt.push_str(&format!("Cc: {}\n", person_line(p)));
    }

    prompt.push_str(&format!("\nThread so far:\n{}\n", ctx.facts));
    if let Some(parent) = ctx.parent {
        let author = parent
            .from
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or("someone");
        prompt.push_str(&format!(
            "\nEmail being {} (from {}):\n{}\n",
            if ctx.slot.intent == SlotIntent::Forward {
                "forwarded"
            } else {
                "answered"
            },
            author,
            excerpt(&parent.body_plain, PARENT_EXCERPT_CHARS)
        ));
    }
    if let Some(attachments) = &ctx.attachments {
        prompt.push_str(&format!(
            "\nThis email includes {}. The body must mention it explicitly.\n",
            attachments
        ));
    }

    prompt.push_str(
        "\nWrite only the new message body (no quoted text, no headers), signed by the sender.\n\
Respond as JSON: {\"body\": \"...\", \"facts\": {\"events\": [], \"decisions\": [], \
\"conflicts\": [], \"open_questions\": []}, \"attachments\": [{\"type\": \"...\", \
\"title\": \"...\", \"description\": \"...\"}]}",
    );
    prompt
}

pub fn repair_prompt(ctx: &DraftPrompt<'_>, previous_body: Option<&str>, issues: &[String]) -> String {
    let mut prompt = draft_prompt(ctx);
    prompt.push_str("\n\nYour previous attempt was rejected.");
    if let Some(previous) = previous_body.filter(|b| !b.trim().is_empty()) {
        prompt.push_str(&format!(
            "\nPrevious draft:\n{}",
            excerpt(previous, PARENT_EXCERPT_CHARS)
        ));
    }
    prompt.push_str("\nProblems to fix:\n");
    for issue in issues {
        prompt.push_str(&format!("- {}\n", issue));
    }
    prompt
}

/// Issue list for a repair prompt.
pub fn issue_lines(issues: &[ValidationIssue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttachmentSkeleton;
    use crate::planning::NarrativePhase;
    use chrono::TimeZone;
    use chrono::Utc;

    fn cast() -> ResolvedParticipants {
        let mut dana = Participant::new("Dana Ortiz", "dana@acme.test");
        dana.role = "Controller".into();
        ResolvedParticipants {
            from: dana,
            to: vec![Participant::new("Lee Park", "lee@acme.test")],
            cc: vec![],
        }
    }

    fn slot() -> ThreadEmailSlotPlan {
        ThreadEmailSlotPlan {
            index: 0,
            parent_index: None,
            root_index: 0,
            branch_id: 0,
            intent: SlotIntent::New,
            sent_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 30, 0).unwrap(),
            phase: NarrativePhase::Beginning,
            attachments: AttachmentSkeleton::default(),
        }
    }

    #[test]
    fn draft_prompt_mentions_roles_and_attachment() {
        let story = StoryContext {
            storyline_title: "Audit".into(),
            ..Default::default()
        };
        let participants = cast();
        let slot = slot();
        let ctx = DraftPrompt {
            story: &story,
            relevance: Relevance::Responsive,
            hot: false,
            subject: "Q2 close",
            topic: None,
            slot: &slot,
            slot_count: 3,
            participants: &participants,
            parent: None,
            facts: "No earlier emails in this thread.",
            attachments: Some("an attached spreadsheet".into()),
        };
        let prompt = draft_prompt(&ctx);
        assert!(prompt.contains("From: Dana Ortiz <dana@acme.test> (Controller)"));
        assert!(prompt.contains("Email 1 of 3 (beginning of the thread)"));
        assert!(prompt.contains("includes an attached spreadsheet"));

        let repair = repair_prompt(&ctx, Some("Hi"), &["The email body is empty.".to_string()]);
        assert!(repair.contains("Previous draft:\nHi"));
        assert!(repair.ends_with("- The email body is empty.\n"));
    }

    #[test]
    fn intent_descriptions() {
        let participants = cast();
        assert_eq!(
            describe_intent(SlotIntent::Reply, &participants),
            "Dana Ortiz replies to Lee Park"
        );
    }

    #[test]
    fn long_parent_is_truncated() {
        let long = "x".repeat(PARENT_EXCERPT_CHARS + 10);
        assert!(excerpt(&long, PARENT_EXCERPT_CHARS).ends_with("..."));
    }
}
