//! Integration tests for slot generation within a single thread

use super::test_utils::*;
use async_trait::async_trait;
use mailweave::attachments::{AttachmentRenderer, AttachmentRenderers, AttachmentSpec};
use mailweave::config::GenerationSettings;
use mailweave::error::EngineError;
use mailweave::generation::validation::check_parent;
use mailweave::generation::ValidationIssue;
use mailweave::model::{AttachmentKind, AttachmentSkeleton, Relevance};
use mailweave::planning::{NarrativePhase, SlotIntent, ThreadEmailSlotPlan};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn every_slot_commits_with_dense_indices_and_a_forest() {
    let client = Arc::new(ScriptedClient::always_valid());
    let generator = generator(client.clone(), settings(42));
    let mut thread = thread("budget-1", Relevance::Responsive, 6);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.committed, 6);
    assert_eq!(outcome.failed, 0);
    assert!(outcome.ledger.is_fully_resolved());
    assert_eq!(thread.email_count(), 6);
    assert_eq!(thread.subject.as_deref(), Some("Q3 budget variance"));
    assert_eq!(thread.topic.as_deref(), Some("Discovery"));

    for (index, message) in thread.messages.iter().enumerate() {
        assert_eq!(message.sequence_index, index);
        assert!(message.committed);
        assert!(!message.generation_failed);
        assert!(message.from.is_some());
        assert!(!message.to.is_empty());
        assert!(!message.body_html.is_empty());
        assert_eq!(message.root_id, "budget-1-000");
        match &message.parent_id {
            None => assert_eq!(index, 0),
            Some(parent) => {
                let parent_index = thread
                    .messages
                    .iter()
                    .position(|m| &m.id == parent)
                    .unwrap();
                assert!(parent_index < index);
                let prefix = if message.subject.starts_with("Fwd:") { "Fwd:" } else { "Re:" };
                assert!(message.subject.starts_with(prefix));
            }
        }
    }
    assert_eq!(client.count("thread_subject"), 1);
    assert_eq!(client.count("draft_email"), 6);
    assert_eq!(client.count("repair_email"), 0);
}

#[tokio::test]
async fn replies_quote_their_parent_and_carry_the_sender_signature() {
    let client = Arc::new(ScriptedClient::always_valid());
    let generator = generator(client, settings(3));
    let mut thread = thread("budget-2", Relevance::Responsive, 3);

    generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    let reply = thread
        .messages
        .iter()
        .find(|m| m.parent_id.is_some())
        .unwrap();
    let sender = reply.from.as_ref().unwrap();
    assert!(reply.body_plain.contains(&sender.name));
    assert!(reply.body_plain.contains(" wrote:") || reply.body_plain.contains("Forwarded message"));
}

#[tokio::test]
async fn exhausted_repairs_mark_each_slot_failed_and_keep_the_slot_count() {
    let client = Arc::new(ScriptedClient::never_valid());
    let generator = generator(client.clone(), settings(42));
    let mut thread = thread("budget-3", Relevance::Responsive, 5);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failed, 5);
    assert_eq!(thread.email_count(), 5);
    for message in &thread.messages {
        assert!(message.generation_failed);
        assert!(message.committed);
        assert!(!message.failure_reason.as_deref().unwrap_or_default().is_empty());
    }
    // Default budget: one draft plus two repairs per slot
    assert_eq!(client.count("draft_email"), 5);
    assert_eq!(client.count("repair_email"), 10);
}

#[tokio::test]
async fn repair_prompt_carries_the_rejected_draft_and_its_problems() {
    let client = Arc::new(ScriptedClient::new(|operation, _| match operation {
        "draft_email" => Some(json!({ "body": "Hello,\n\nSee you then.\n\n[Your Name]" })),
        other => Some(default_response(other, VALID_BODY)),
    }));
    let generator = generator(client.clone(), settings(9));
    let mut thread = thread("budget-4", Relevance::Responsive, 2);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failed, 0);
    let repairs: Vec<_> = client
        .calls()
        .into_iter()
        .filter(|c| c.operation == "repair_email")
        .collect();
    assert_eq!(repairs.len(), 2);
    assert!(repairs[0].prompt.contains("[Your Name]"));
    assert!(repairs[0].prompt.contains("placeholder"));
    assert!(thread.messages.iter().all(|m| !m.body_plain.contains("[Your Name]")));
}

#[tokio::test]
async fn cancellation_before_the_first_slot_propagates() {
    let client = Arc::new(ScriptedClient::always_valid());
    let generator = generator(client.clone(), settings(1));
    let mut thread = thread("budget-5", Relevance::Responsive, 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = generator
        .generate(&mut thread, &story(), window(), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(client.calls().is_empty());
    assert_eq!(thread.committed_count(), 0);
}

#[tokio::test]
async fn structure_does_not_depend_on_completion_output() {
    let valid = Arc::new(ScriptedClient::always_valid());
    let failing = Arc::new(ScriptedClient::never_valid());
    let mut a = thread("budget-6", Relevance::Responsive, 7);
    let mut b = thread("budget-6", Relevance::Responsive, 7);

    generator(valid, settings(77))
        .generate(&mut a, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();
    generator(failing, settings(77))
        .generate(&mut b, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(addressing(&a), addressing(&b));
    let sent_a: Vec<_> = a.messages.iter().map(|m| m.sent_at).collect();
    let sent_b: Vec<_> = b.messages.iter().map(|m| m.sent_at).collect();
    assert_eq!(sent_a, sent_b);
}

#[tokio::test]
async fn non_responsive_thread_picks_a_catalog_topic_and_falls_back_on_subject() {
    let client = Arc::new(ScriptedClient::new(|operation, _| match operation {
        "topic_subject" => None,
        other => Some(default_response(other, VALID_BODY)),
    }));
    let generator = generator(client.clone(), settings(5));
    let mut first = thread("noise-1", Relevance::NonResponsive, 3);

    generator
        .generate(&mut first, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    let topic = first.topic.clone().unwrap();
    assert!(mailweave::topics::TopicCatalog::builtin()
        .unwrap()
        .get(&topic)
        .is_some());
    assert!(!first.subject.clone().unwrap_or_default().trim().is_empty());
    assert_eq!(client.count("thread_subject"), 0);
    assert_eq!(client.count("topic_subject"), 1);
    let draft = client
        .calls()
        .into_iter()
        .find(|c| c.operation == "draft_email")
        .unwrap();
    assert!(draft.prompt.contains("Everyday workplace email"));
    assert!(!draft.prompt.contains("Budget overrun"));

    // Same seed and thread id select the same archetype
    let mut second = thread("noise-1", Relevance::NonResponsive, 3);
    generator
        .generate(&mut second, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.topic, first.topic);
    assert_eq!(second.subject, first.subject);
}

struct BrokenRenderer;

#[async_trait]
impl AttachmentRenderer for BrokenRenderer {
    async fn render(&self, _spec: &AttachmentSpec) -> Result<Vec<u8>, EngineError> {
        Err(EngineError::ProviderError("renderer offline".to_string()))
    }
}

#[tokio::test]
async fn attachment_render_failures_are_thread_errors_not_slot_failures() {
    let client = Arc::new(ScriptedClient::always_valid());
    let mut settings: GenerationSettings = settings(8);
    settings.attachments.document_percent = 100.0;
    settings.attachments.image_percent = 0.0;
    settings.attachments.voicemail_percent = 0.0;
    let renderers = AttachmentRenderers {
        document: Some(Arc::new(BrokenRenderer)),
        ..Default::default()
    };
    let generator = generator_with(client, settings, renderers);
    let mut thread = thread("docs-1", Relevance::Responsive, 3);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.errors.len(), 3);
    assert!(outcome
        .errors
        .iter()
        .all(|e| matches!(e, EngineError::AttachmentRender { .. })));
    for message in &thread.messages {
        assert_eq!(message.attachments.len(), 1);
        assert!(matches!(message.attachments[0].kind, AttachmentKind::Document(_)));
        assert!(message.attachments[0].content.is_none());
    }
}

#[test]
fn reply_without_a_parent_fails_parent_check() {
    let thread = thread("orphan", Relevance::Responsive, 3);
    let slot = ThreadEmailSlotPlan {
        index: 1,
        parent_index: None,
        root_index: 0,
        branch_id: 0,
        intent: SlotIntent::Reply,
        sent_at: window().start,
        phase: NarrativePhase::Middle,
        attachments: AttachmentSkeleton::default(),
    };

    let issue = check_parent(&slot, &thread).unwrap_err();
    assert_eq!(
        issue,
        ValidationIssue::MissingParent {
            intent: SlotIntent::Reply,
            index: 1
        }
    );
    // Never silently treated as a new thread, however often it is checked
    assert_eq!(check_parent(&slot, &thread).unwrap_err(), issue);
}
