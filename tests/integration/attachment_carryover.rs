//! Integration tests for attachment obligations that survive slot failures

use super::test_utils::*;
use mailweave::config::GenerationSettings;
use mailweave::model::{AttachmentKind, Relevance};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DRAFT_REQUIRES_ATTACHMENT: &str = "The body must mention it explicitly";

/// Five emails, exactly one document, one repair allowed, pending work always merged.
fn one_document_settings(seed: u64) -> GenerationSettings {
    let mut settings = settings(seed);
    settings.max_repair_attempts = 1;
    settings.attachments.document_percent = 20.0;
    settings.attachments.image_percent = 0.0;
    settings.attachments.voicemail_percent = 0.0;
    settings.attachments.carryover_probability = 1.0;
    settings
}

/// First seed whose plan puts the document before the final slot, with its index.
fn seed_with_early_document() -> (u64, usize) {
    (1..500)
        .find_map(|seed| {
            let generator = generator(
                Arc::new(ScriptedClient::always_valid()),
                one_document_settings(seed),
            );
            let plan = generator
                .plan(&thread("carry-1", Relevance::Responsive, 5), window())
                .unwrap();
            assert_eq!(plan.totals.documents, 1);
            plan.slots
                .iter()
                .position(|s| s.attachments.document.is_some())
                .filter(|index| *index < 4)
                .map(|index| (seed, index))
        })
        .expect("some seed places the document before the final slot")
}

#[tokio::test]
async fn failed_document_reappears_and_is_force_attached_on_the_final_slot() {
    let (seed, document_slot) = seed_with_early_document();
    let client = Arc::new(ScriptedClient::with_body(PLAIN_BODY));
    let generator = generator(client.clone(), one_document_settings(seed));
    let mut thread = thread("carry-1", Relevance::Responsive, 5);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    // The planned slot failed validation twice: one draft, one repair
    let planned = &thread.messages[document_slot];
    assert!(planned.generation_failed);
    assert!(planned
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("No valid draft after 2 attempts"));

    // The obligation reappeared as a requirement on every later non-final slot
    let drafts_with_requirement = client
        .calls()
        .into_iter()
        .filter(|c| c.operation == "draft_email" && c.prompt.contains(DRAFT_REQUIRES_ATTACHMENT))
        .count();
    assert_eq!(drafts_with_requirement, 4 - document_slot);
    for message in &thread.messages[document_slot..4] {
        assert!(message.generation_failed);
    }

    // The final slot committed with the document forced onto it
    let last = &thread.messages[4];
    assert!(!last.generation_failed);
    assert_eq!(last.attachments.len(), 1);
    let forced = &last.attachments[0];
    assert!(matches!(forced.kind, AttachmentKind::Document(_)));
    assert!(forced.forced);
    assert!(forced.from_carryover);

    assert_eq!(outcome.ledger.planned.documents, 1);
    assert_eq!(outcome.ledger.delivered.documents, 1);
    assert_eq!(outcome.ledger.undelivered.documents, 0);
    assert!(outcome.ledger.is_fully_resolved());
    assert_eq!(thread.email_count(), 5);
}

#[tokio::test]
async fn obligation_left_when_the_final_slot_fails_is_logged_as_undelivered() {
    let (seed, _) = seed_with_early_document();
    let client = Arc::new(ScriptedClient::never_valid());
    let generator = generator(client, one_document_settings(seed));
    let mut thread = thread("carry-1", Relevance::Responsive, 5);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failed, 5);
    assert_eq!(outcome.ledger.delivered.documents, 0);
    assert_eq!(outcome.ledger.undelivered.documents, 1);
    assert!(outcome.ledger.is_fully_resolved());
    assert!(thread.messages.iter().all(|m| m.attachments.is_empty()));
}

#[tokio::test]
async fn successful_thread_delivers_every_planned_attachment() {
    let client = Arc::new(ScriptedClient::always_valid());
    let mut settings = settings(21);
    settings.attachments.document_percent = 40.0;
    settings.attachments.image_percent = 30.0;
    settings.attachments.voicemail_percent = 20.0;
    let generator = generator(client, settings);
    let mut thread = thread("carry-2", Relevance::Responsive, 10);

    let outcome = generator
        .generate(&mut thread, &story(), window(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.planned.documents, 4);
    assert_eq!(outcome.planned.images, 3);
    assert_eq!(outcome.planned.voicemails, 2);
    assert_eq!(outcome.ledger.delivered, outcome.planned);
    let attached: usize = thread.messages.iter().map(|m| m.attachments.len()).sum();
    assert_eq!(attached, 9);
}
