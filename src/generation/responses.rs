//! Typed views of completion payloads, one per prompt kind.
//!
//! Payloads are loosely shaped JSON. Each view accepts the common field-name variants and
//! falls back to explicit defaults; a payload that cannot yield the essential field is
//! treated as no response at all.

use crate::facts::FactUpdate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubjectResponse {
    #[serde(alias = "title", alias = "subject_line")]
    pub subject: String,
}

impl SubjectResponse {
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Value::String(subject) = value {
            return clean_line(subject).map(|subject| Self { subject });
        }
        let parsed: Self = serde_json::from_value(value.clone()).ok()?;
        clean_line(&parsed.subject).map(|subject| Self { subject })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicSubjectResponse {
    pub subject: Option<String>,
    pub entities: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawTopicSubject {
    #[serde(default, alias = "title")]
    subject: Option<String>,
    #[serde(default, alias = "entity_values", alias = "values")]
    entities: BTreeMap<String, Value>,
}

impl TopicSubjectResponse {
    /// Entity values arrive as strings, numbers or booleans; anything else is dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw: RawTopicSubject = serde_json::from_value(value.clone()).ok()?;
        let entities = raw
            .entities
            .into_iter()
            .filter_map(|(name, value)| scalar_to_string(&value).map(|v| (name, v)))
            .collect();
        Some(Self {
            subject: raw.subject.as_deref().and_then(clean_line),
            entities,
        })
    }
}

/// Title and description the draft proposes for one of its attachments.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AttachmentDescription {
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default, alias = "name", alias = "filename")]
    pub title: String,
    #[serde(default, alias = "summary")]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmailDraftResponse {
    #[serde(alias = "body_plain", alias = "text", alias = "content")]
    pub body: String,
    #[serde(default)]
    pub facts: FactUpdate,
    #[serde(default)]
    pub attachments: Vec<AttachmentDescription>,
}

impl EmailDraftResponse {
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Value::String(body) = value {
            return Some(Self {
                body: body.clone(),
                facts: FactUpdate::default(),
                attachments: Vec::new(),
            });
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Proposed attachment whose kind mentions `keyword`, if any.
    pub fn attachment_matching(&self, keyword: &str) -> Option<&AttachmentDescription> {
        self.attachments
            .iter()
            .find(|a| a.kind.to_ascii_lowercase().contains(keyword))
    }
}

fn clean_line(text: &str) -> Option<String> {
    let line = text.lines().next().unwrap_or_default();
    let line = line.trim().trim_matches('"').trim();
    let line = line
        .strip_prefix("Subject:")
        .or_else(|| line.strip_prefix("subject:"))
        .unwrap_or(line)
        .trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
