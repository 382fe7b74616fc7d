//! Thread generation: plans a thread and drives its slots in order.

use crate::attachments::{AttachmentBuilder, AttachmentContext};
use crate::carryover::{AttachmentCarryoverState, AttachmentLedger};
use crate::config::GenerationSettings;
use crate::error::EngineError;
use crate::facts::ThreadFactTable;
use crate::generation::participants::{resolve_participants, ResolvedParticipants};
use crate::generation::prompts::{
    subject_prompt, topic_subject_prompt, DraftPrompt, StoryContext, TopicBrief, SYSTEM_PROMPT,
};
use crate::generation::render::{append_forwarded, append_quoted, render_html};
use crate::generation::responses::{EmailDraftResponse, SubjectResponse, TopicSubjectResponse};
use crate::generation::signature::correct_signature;
use crate::generation::slot::{draft_until_valid, DraftOutcome, SlotState};
use crate::generation::subject::derive_subject;
use crate::generation::validation::check_parent;
use crate::model::{AttachmentRequirement, EmailMessage, EmailThread, Relevance};
use crate::planning::{
    AttachmentTotals, PlanRequest, SlotIntent, ThreadEmailSlotPlan, ThreadPlan,
    ThreadStructurePlanner,
};
use crate::provider::CompletionClient;
use crate::rng::{self, Stream, ThreadRng};
use crate::topics::{complete_entities, TopicAudience, TopicSelector};
use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SUBJECT_OPERATION: &str = "thread_subject";
pub const TOPIC_SUBJECT_OPERATION: &str = "topic_subject";

const FAILURE_BODY: &str = "(This message could not be generated.)";

/// Date window of the beat that owns a thread.
#[derive(Debug, Clone, Copy)]
pub struct ThreadWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Result of generating one thread.
#[derive(Debug, Clone)]
pub struct ThreadOutcome {
    pub thread_id: String,
    pub planned: AttachmentTotals,
    pub ledger: AttachmentLedger,
    pub committed: usize,
    pub failed: usize,
    pub topic: Option<String>,
    /// Thread-level problems that did not stop generation (attachment rendering)
    pub errors: Vec<EngineError>,
}

/// Plan `thread` from the planner stream derived from `global_seed`.
pub fn plan_thread(
    planner: &ThreadStructurePlanner,
    global_seed: u64,
    thread: &EmailThread,
    window: ThreadWindow,
) -> Result<ThreadPlan, EngineError> {
    planner.plan(&PlanRequest {
        thread_id: &thread.id,
        email_count: thread.email_count(),
        window_start: window.start,
        window_end: window.end,
        relevance: thread.relevance,
        hot: thread.hot,
        allow_forward: thread.participants.len() >= 3,
        seed: rng::derive_seed(global_seed, &thread.id, Stream::Planner),
    })
}

/// Shared, read-only collaborators for generating threads.
pub struct ThreadGenerator {
    client: Arc<dyn CompletionClient>,
    settings: GenerationSettings,
    planner: ThreadStructurePlanner,
    topics: Arc<TopicSelector>,
    attachments: AttachmentBuilder,
}

/// Mutable per-thread state while slots are generated.
struct ThreadRun {
    participants_rng: ThreadRng,
    topic_rng: ThreadRng,
    carryover: AttachmentCarryoverState,
    facts: ThreadFactTable,
    topic: Option<TopicBrief>,
    errors: Vec<EngineError>,
}

impl ThreadGenerator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        settings: GenerationSettings,
        topics: Arc<TopicSelector>,
        attachments: AttachmentBuilder,
    ) -> Self {
        let planner =
            ThreadStructurePlanner::new(settings.planner.clone(), settings.attachments.clone());
        Self {
            client,
            settings,
            planner,
            topics,
            attachments,
        }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Slot plan for a thread. Depends only on the seed and the thread's own shape.
    pub fn plan(&self, thread: &EmailThread, window: ThreadWindow) -> Result<ThreadPlan, EngineError> {
        plan_thread(&self.planner, self.settings.seed, thread, window)
    }

    /// Generate every slot of `thread` in order, populating its placeholders in place.
    ///
    /// Slot failures are recorded on the message and never stop the thread; only
    /// cancellation and contract violations return an error.
    pub async fn generate(
        &self,
        thread: &mut EmailThread,
        story: &StoryContext,
        window: ThreadWindow,
        cancel: &CancellationToken,
    ) -> Result<ThreadOutcome, EngineError> {
        let plan = self.plan(thread, window)?;
        if plan.len() != thread.email_count() {
            return Err(EngineError::ContractViolation(format!(
                "Thread '{}' plan has {} slots for {} messages",
                thread.id,
                plan.len(),
                thread.email_count()
            )));
        }

        let seed = self.settings.seed;
        let mut run = ThreadRun {
            participants_rng: rng::thread_rng(seed, &thread.id, Stream::Participants),
            topic_rng: rng::thread_rng(seed, &thread.id, Stream::Topic),
            carryover: AttachmentCarryoverState::new(
                thread.id.clone(),
                plan.totals,
                self.settings.attachments.carryover_probability,
                rng::thread_rng(seed, &thread.id, Stream::Carryover),
            ),
            facts: ThreadFactTable::new(self.settings.facts.max_entries),
            topic: None,
            errors: Vec::new(),
        };

        debug!(
            thread_id = %thread.id,
            slots = plan.len(),
            relevance = ?thread.relevance,
            "Generating thread"
        );

        for slot in &plan.slots {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.generate_slot(thread, slot, plan.len(), story, &mut run, cancel)
                .await?;
        }

        let outcome = ThreadOutcome {
            thread_id: thread.id.clone(),
            planned: plan.totals,
            ledger: run.carryover.ledger(),
            committed: thread.committed_count(),
            failed: thread.failed_count(),
            topic: thread.topic.clone(),
            errors: run.errors,
        };
        if !outcome.ledger.is_fully_resolved() {
            warn!(
                thread_id = %thread.id,
                ledger = ?outcome.ledger,
                "Attachment ledger does not balance"
            );
        }
        info!(
            thread_id = %thread.id,
            emails = outcome.committed,
            failed = outcome.failed,
            "Thread generated"
        );
        Ok(outcome)
    }

    async fn generate_slot(
        &self,
        thread: &mut EmailThread,
        slot: &ThreadEmailSlotPlan,
        slot_count: usize,
        story: &StoryContext,
        run: &mut ThreadRun,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        // Resolved first so each slot draws exactly one carryover coin flip
        let requirement = run.carryover.resolve_requirement(&slot.attachments);

        if let Err(issue) = check_parent(slot, thread) {
            warn!(thread_id = %thread.id, slot = slot.index, "{}", issue);
            run.carryover.record_failure(&requirement);
            let subject = thread.subject.clone().unwrap_or_default();
            self.commit_failure(thread, slot, None, subject, issue.to_string());
            return Ok(());
        }

        let parent = slot
            .parent_index
            .and_then(|index| thread.messages.get(index))
            .cloned();
        let Some(resolved) = resolve_participants(
            slot.intent,
            parent.as_ref(),
            &thread.participants,
            &mut run.participants_rng,
        ) else {
            run.carryover.record_failure(&requirement);
            let subject = thread.subject.clone().unwrap_or_default();
            self.commit_failure(
                thread,
                slot,
                None,
                subject,
                "No participants could be resolved for this slot".to_string(),
            );
            return Ok(());
        };

        let subject = match (&parent, slot.intent) {
            (Some(parent), SlotIntent::Reply | SlotIntent::Forward) => {
                derive_subject(slot.intent, &parent.subject)
            }
            _ => match thread.subject.clone() {
                Some(subject) => subject,
                None => {
                    let subject = self
                        .resolve_thread_subject(thread, slot, &resolved, story, run, cancel)
                        .await?;
                    thread.subject = Some(subject.clone());
                    subject
                }
            },
        };

        let facts_context = run.facts.to_prompt_context();
        let prompt = DraftPrompt {
            story,
            relevance: thread.relevance,
            hot: thread.hot,
            subject: &subject,
            topic: run.topic.as_ref(),
            slot,
            slot_count,
            participants: &resolved,
            parent: parent.as_ref(),
            facts: &facts_context,
            attachments: requirement.describe(),
        };

        let outcome = draft_until_valid(
            self.client.as_ref(),
            &prompt,
            &requirement,
            self.settings.max_repair_attempts,
            cancel,
        )
        .await?;

        match outcome {
            DraftOutcome::Valid { draft, attempts } => {
                self.commit_success(thread, slot, &resolved, parent.as_ref(), subject, &requirement, draft, run)
                    .await;
                debug!(
                    thread_id = %thread.id,
                    slot = slot.index,
                    attempts,
                    state = ?SlotState::Committed,
                    "Slot committed"
                );
            }
            DraftOutcome::Exhausted { reason, attempts } => {
                warn!(
                    thread_id = %thread.id,
                    slot = slot.index,
                    attempts,
                    reason = %reason,
                    state = ?SlotState::FailureCommitted,
                    "Slot generation failed"
                );
                run.carryover.record_failure(&requirement);
                self.commit_failure(thread, slot, Some(&resolved), subject, reason);
            }
        }
        Ok(())
    }

    async fn resolve_thread_subject(
        &self,
        thread: &mut EmailThread,
        slot: &ThreadEmailSlotPlan,
        opener: &ResolvedParticipants,
        story: &StoryContext,
        run: &mut ThreadRun,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        if thread.relevance == Relevance::Responsive {
            thread.topic = Some(story.beat_name.clone());
            let prompt = subject_prompt(story, thread.hot, opener);
            let response = self
                .request(&prompt, SUBJECT_OPERATION, cancel)
                .await?
                .and_then(|v| SubjectResponse::from_value(&v));
            return Ok(match response {
                Some(response) => response.subject,
                None if !story.beat_name.trim().is_empty() => story.beat_name.trim().to_string(),
                None => "Follow-up".to_string(),
            });
        }

        let audience = TopicAudience {
            sender: &opener.from,
            recipients: opener.to.iter().collect(),
            month: slot.sent_at.month(),
        };
        let selection = self.topics.select(&audience, &mut run.topic_rng);
        let archetype = selection.archetype;
        thread.topic = Some(archetype.id.clone());

        let prompt = topic_subject_prompt(&archetype, opener);
        let response = self
            .request(&prompt, TOPIC_SUBJECT_OPERATION, cancel)
            .await?
            .and_then(|v| TopicSubjectResponse::from_value(&v));
        let (subject, supplied) = match response {
            Some(response) => (response.subject, response.entities),
            None => (None, Default::default()),
        };
        let entities = complete_entities(
            &archetype.required_entities,
            &supplied,
            self.settings.seed,
            &thread.id,
            slot.sent_at,
        );
        let subject = subject.unwrap_or_else(|| fallback_topic_subject(&archetype.id, &entities));
        run.topic = Some(TopicBrief {
            archetype_id: archetype.id,
            description: archetype.description,
            entities,
        });
        Ok(subject)
    }

    /// One completion request; failures other than cancellation read as no response.
    async fn request(
        &self,
        prompt: &str,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<serde_json::Value>, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match self.client.complete(SYSTEM_PROMPT, prompt, operation, cancel).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                debug!(operation, error = %e, "Completion request failed; using fallback");
                Ok(None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_success(
        &self,
        thread: &mut EmailThread,
        slot: &ThreadEmailSlotPlan,
        resolved: &ResolvedParticipants,
        parent: Option<&EmailMessage>,
        subject: String,
        requirement: &AttachmentRequirement,
        draft: EmailDraftResponse,
        run: &mut ThreadRun,
    ) {
        let own_body = correct_signature(&draft.body, &resolved.from, &thread.participants);
        let body_plain = match (parent, slot.intent) {
            (Some(parent), SlotIntent::Reply) => append_quoted(&own_body, parent),
            (Some(parent), SlotIntent::Forward) => append_forwarded(&own_body, parent),
            _ => own_body.clone(),
        };
        let body_html = render_html(&body_plain);

        run.facts.record_participants(
            std::iter::once(resolved.from.email.as_str())
                .chain(resolved.recipients().map(|p| p.email.as_str())),
        );
        run.facts.apply(&draft.facts, &derived_event(slot, resolved));
        run.carryover.record_success(requirement);

        let message_id = EmailThread::message_id(&thread.id, slot.index);
        let (attachments, render_errors) = self
            .attachments
            .build(
                &AttachmentContext {
                    thread_id: &thread.id,
                    message_id: &message_id,
                    subject: &subject,
                    author: &resolved.from.name,
                    body: &own_body,
                },
                requirement,
                Some(&draft),
            )
            .await;
        run.errors.extend(render_errors);

        let message = EmailMessage {
            id: message_id,
            thread_id: thread.id.clone(),
            parent_id: slot.parent_id(&thread.id),
            root_id: slot.root_id(&thread.id),
            branch_id: slot.branch_id,
            sequence_index: slot.index,
            from: Some(resolved.from.mailbox()),
            to: resolved.to.iter().map(|p| p.mailbox()).collect(),
            cc: resolved.cc.iter().map(|p| p.mailbox()).collect(),
            subject,
            body_plain,
            body_html,
            sent_at: Some(slot.sent_at),
            attachments,
            generation_failed: false,
            failure_reason: None,
            committed: true,
        };
        thread.messages[slot.index] = message;
    }

    fn commit_failure(
        &self,
        thread: &mut EmailThread,
        slot: &ThreadEmailSlotPlan,
        resolved: Option<&ResolvedParticipants>,
        subject: String,
        reason: String,
    ) {
        let message = EmailMessage {
            id: EmailThread::message_id(&thread.id, slot.index),
            thread_id: thread.id.clone(),
            parent_id: slot.parent_id(&thread.id),
            root_id: slot.root_id(&thread.id),
            branch_id: slot.branch_id,
            sequence_index: slot.index,
            from: resolved.map(|r| r.from.mailbox()),
            to: resolved
                .map(|r| r.to.iter().map(|p| p.mailbox()).collect())
                .unwrap_or_default(),
            cc: resolved
                .map(|r| r.cc.iter().map(|p| p.mailbox()).collect())
                .unwrap_or_default(),
            subject,
            body_plain: FAILURE_BODY.to_string(),
            body_html: render_html(FAILURE_BODY),
            sent_at: Some(slot.sent_at),
            attachments: Vec::new(),
            generation_failed: true,
            failure_reason: Some(reason),
            committed: true,
        };
        thread.messages[slot.index] = message;
    }
}

fn derived_event(slot: &ThreadEmailSlotPlan, resolved: &ResolvedParticipants) -> String {
    let to: Vec<&str> = resolved.to.iter().map(|p| p.name.as_str()).collect();
    let verb = match slot.intent {
        SlotIntent::New => "wrote to",
        SlotIntent::Reply => "replied to",
        SlotIntent::Forward => "forwarded the discussion to",
    };
    format!(
        "{} {} {} on {}",
        resolved.from.name,
        verb,
        to.join(", "),
        slot.sent_at.format("%b %-d")
    )
}

fn fallback_topic_subject(
    archetype_id: &str,
    entities: &std::collections::BTreeMap<String, String>,
) -> String {
    let words: Vec<String> = archetype_id
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .enumerate()
        .map(|(i, w)| {
            if i == 0 {
                let mut chars = w.chars();
                chars
                    .next()
                    .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
                    .unwrap_or_default()
            } else {
                w.to_string()
            }
        })
        .collect();
    let mut subject = words.join(" ");
    if let Some(value) = entities.values().next() {
        subject.push_str(&format!(" ({})", value));
    }
    subject
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_topic_subject_reads_like_a_subject() {
        let entities = std::collections::BTreeMap::from([(
            "ticket_id".to_string(),
            "INC-1A2B3C".to_string(),
        )]);
        assert_eq!(
            fallback_topic_subject("it-password-reset", &entities),
            "It password reset (INC-1A2B3C)"
        );
        assert_eq!(
            fallback_topic_subject("team_lunch", &Default::default()),
            "Team lunch"
        );
    }
}
