//! Shared test utilities for integration tests
//!
//! A scripted completion client, a small cast of participants and builders for threads,
//! storylines and generators.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mailweave::attachments::{AttachmentBuilder, AttachmentRenderers, DocumentChainRegistry};
use mailweave::config::GenerationSettings;
use mailweave::error::EngineError;
use mailweave::generation::{StoryContext, ThreadGenerator, ThreadWindow};
use mailweave::model::{EmailThread, Participant, Relevance, StoryBeat, Storyline};
use mailweave::provider::CompletionClient;
use mailweave::topics::{TopicCatalog, TopicSelector};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Mentions every attachment family, so it passes any attachment requirement.
pub const VALID_BODY: &str = "Hi all,\n\nI attached the report and a screenshot of the figures. \
I also left a voicemail with the details.\n\nThanks";

/// Valid only for slots without attachment requirements.
pub const PLAIN_BODY: &str = "Thanks, that works for me. Let's keep going.";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub prompt: String,
}

type Responder = dyn Fn(&str, &str) -> Option<Value> + Send + Sync;

/// Completion client answering from a closure over `(operation, user prompt)`.
pub struct ScriptedClient {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new(responder: impl Fn(&str, &str) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Subjects plus the given body for every draft and repair.
    pub fn with_body(body: &'static str) -> Self {
        Self::new(move |operation, _| Some(default_response(operation, body)))
    }

    pub fn always_valid() -> Self {
        Self::with_body(VALID_BODY)
    }

    /// Subjects succeed; every draft and repair comes back empty.
    pub fn never_valid() -> Self {
        Self::new(|operation, _| match operation {
            "draft_email" | "repair_email" => None,
            other => Some(default_response(other, VALID_BODY)),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }
}

pub fn default_response(operation: &str, body: &str) -> Value {
    match operation {
        "thread_subject" => json!({ "subject": "Q3 budget variance" }),
        "topic_subject" => json!({ "subject": "Quick reminder", "entities": {} }),
        _ => json!({ "body": body }),
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.calls.lock().unwrap().push(RecordedCall {
            operation: operation.to_string(),
            prompt: user_prompt.to_string(),
        });
        Ok((self.responder)(operation, user_prompt))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn person(name: &str, email: &str, role: &str, department: &str, internal: bool) -> Participant {
    let mut p = Participant::new(name, email);
    p.role = role.to_string();
    p.department = department.to_string();
    p.organization = if internal { "Northwind" } else { "Fabrikam" }.to_string();
    p.industry = "manufacturing".to_string();
    p.internal = internal;
    p
}

pub fn cast() -> Vec<Participant> {
    vec![
        person("Dana Reyes", "dana@northwind.test", "Finance Manager", "Finance", true),
        person("Sam Okafor", "sam@northwind.test", "Systems Administrator", "IT", true),
        person("Priya Nair", "priya@northwind.test", "HR Generalist", "Human Resources", true),
        person("Lee Park", "lee@fabrikam.test", "Account Manager", "Sales", false),
    ]
}

pub fn window() -> ThreadWindow {
    ThreadWindow {
        start: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 3, 15, 17, 0, 0).unwrap(),
    }
}

pub fn thread(id: &str, relevance: Relevance, email_count: usize) -> EmailThread {
    EmailThread::new(id, relevance, false, cast(), email_count)
}

pub fn story() -> StoryContext {
    StoryContext {
        storyline_title: "Budget overrun".to_string(),
        storyline_summary: "Finance discovers the plant retrofit is over budget.".to_string(),
        beat_name: "Discovery".to_string(),
        beat_plot: "Dana notices the variance and asks for the numbers.".to_string(),
    }
}

pub fn settings(seed: u64) -> GenerationSettings {
    GenerationSettings {
        seed,
        ..Default::default()
    }
}

pub fn generator_with(
    client: Arc<dyn CompletionClient>,
    settings: GenerationSettings,
    renderers: AttachmentRenderers,
) -> ThreadGenerator {
    let catalog = Arc::new(TopicCatalog::builtin().unwrap());
    let topics = Arc::new(TopicSelector::new(catalog, settings.topics.clone()));
    let attachments = AttachmentBuilder::new(renderers, Arc::new(DocumentChainRegistry::new()));
    ThreadGenerator::new(client, settings, topics, attachments)
}

pub fn generator(client: Arc<dyn CompletionClient>, settings: GenerationSettings) -> ThreadGenerator {
    generator_with(client, settings, AttachmentRenderers::default())
}

/// One storyline with one beat per entry; each beat's target is the sum of its threads.
pub fn storyline(id: &str, beats: &[(&str, &[(&str, usize)])]) -> Storyline {
    let window = window();
    Storyline {
        id: id.to_string(),
        title: "Budget overrun".to_string(),
        summary: "Finance discovers the plant retrofit is over budget.".to_string(),
        beats: beats
            .iter()
            .map(|(beat_id, threads)| StoryBeat {
                id: beat_id.to_string(),
                name: format!("Beat {}", beat_id),
                plot: String::new(),
                start: window.start,
                end: window.end,
                email_count: threads.iter().map(|(_, n)| n).sum(),
                threads: threads
                    .iter()
                    .map(|(thread_id, n)| thread(thread_id, Relevance::Responsive, *n))
                    .collect(),
            })
            .collect(),
    }
}

/// Sender, recipients and cc of every message, for structural comparisons.
pub fn addressing(thread: &EmailThread) -> Vec<(Option<String>, Vec<String>, Vec<String>, Option<String>)> {
    thread
        .messages
        .iter()
        .map(|m| {
            (
                m.from.as_ref().map(|f| f.email.clone()),
                m.to.iter().map(|t| t.email.clone()).collect(),
                m.cc.iter().map(|c| c.email.clone()).collect(),
                m.parent_id.clone(),
            )
        })
        .collect()
}
