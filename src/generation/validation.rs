//! Lexical draft validation.
//!
//! These checks are approximations: they look for vocabulary, not meaning. A body that
//! says "I have not attached the spreadsheet" passes the document check.

use crate::model::{AttachmentRequirement, DocumentType, EmailThread};
use crate::planning::{SlotIntent, ThreadEmailSlotPlan};
use std::fmt;

// Whole words or phrases; matched on word boundaries, so inflections are listed explicitly
const DOCUMENT_WORDS: [&str; 11] = [
    "attached",
    "attaching",
    "attachment",
    "attachments",
    "report",
    "document",
    "documents",
    "memo",
    "enclosed",
    "pdf",
    "attached file",
];
const IMAGE_WORDS: [&str; 9] = [
    "screenshot",
    "screenshots",
    "photo",
    "photos",
    "image",
    "images",
    "picture",
    "pictures",
    "attached",
];
const VOICEMAIL_WORDS: [&str; 5] = [
    "voicemail",
    "voicemails",
    "voice message",
    "voice mail",
    "left a message",
];

const PLACEHOLDER_WORDS: [&str; 10] = [
    "your",
    "name",
    "recipient",
    "insert",
    "date",
    "company",
    "title",
    "sender",
    "signature",
    "position",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyBody,
    MissingParent { intent: SlotIntent, index: usize },
    MissingAttachmentReference { kind: &'static str },
    UnfilledPlaceholder(String),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyBody => write!(f, "The email body is empty."),
            ValidationIssue::MissingParent { intent, index } => write!(
                f,
                "Slot {} is a {} but has no committed parent email.",
                index,
                intent.as_str()
            ),
            ValidationIssue::MissingAttachmentReference { kind } => write!(
                f,
                "The body must explicitly mention the {} that accompanies this email.",
                kind
            ),
            ValidationIssue::UnfilledPlaceholder(text) => write!(
                f,
                "The body contains the unfilled template placeholder '{}'.",
                text
            ),
        }
    }
}

/// Reply and forward slots need a parent that has already been committed.
pub fn check_parent(slot: &ThreadEmailSlotPlan, thread: &EmailThread) -> Result<(), ValidationIssue> {
    if slot.intent == SlotIntent::New {
        return Ok(());
    }
    let committed = slot
        .parent_index
        .filter(|parent| *parent < slot.index)
        .and_then(|parent| thread.messages.get(parent))
        .map(|parent| parent.committed)
        .unwrap_or(false);
    if committed {
        Ok(())
    } else {
        Err(ValidationIssue::MissingParent {
            intent: slot.intent,
            index: slot.index,
        })
    }
}

fn document_words(doc: Option<DocumentType>) -> Vec<&'static str> {
    let mut words = DOCUMENT_WORDS.to_vec();
    match doc {
        Some(DocumentType::Spreadsheet) => {
            words.extend(["spreadsheet", "sheet", "workbook", "excel"])
        }
        Some(DocumentType::Presentation) => {
            words.extend(["deck", "slides", "presentation", "slide"])
        }
        Some(DocumentType::Pdf) => words.extend(["scan", "scanned copy", "signed copy"]),
        Some(DocumentType::Document) | None => words.extend(["proposal", "notes", "write-up"]),
    }
    words
}

fn mentions_any(body: &str, words: &[&str]) -> bool {
    words.iter().any(|w| mentions_word(body, w))
}

/// `word` occurs with no letter or digit directly before or after it.
fn mentions_word(body: &str, word: &str) -> bool {
    body.match_indices(word).any(|(start, _)| {
        let before = body[..start].chars().next_back();
        let after = body[start + word.len()..].chars().next();
        !before.map(char::is_alphanumeric).unwrap_or(false)
            && !after.map(char::is_alphanumeric).unwrap_or(false)
    })
}

/// Bracketed template text such as `[Your Name]` or `{{date}}`.
pub fn find_placeholders(body: &str) -> Vec<String> {
    let mut found = Vec::new();
    for (open, close) in [("[", "]"), ("{{", "}}")] {
        let mut rest = body;
        while let Some(start) = rest.find(open) {
            let after = &rest[start + open.len()..];
            let Some(end) = after.find(close) else {
                break;
            };
            let inner = after[..end].trim();
            let lower = inner.to_ascii_lowercase();
            let looks_like_template = !inner.is_empty()
                && inner.len() <= 40
                && inner
                    .chars()
                    .all(|c| c.is_alphabetic() || c == ' ' || c == '_' || c == '\'')
                && lower
                    .split(|c: char| c == ' ' || c == '_')
                    .any(|word| PLACEHOLDER_WORDS.contains(&word));
            if looks_like_template {
                found.push(format!("{}{}{}", open, inner, close));
            }
            rest = &after[end + close.len()..];
        }
    }
    found
}

/// Validate a draft body against the slot's requirement. Force-attached final-slot
/// obligations are not checked against the body.
pub fn validate_draft(body: &str, requirement: &AttachmentRequirement) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if body.trim().is_empty() {
        issues.push(ValidationIssue::EmptyBody);
        return issues;
    }
    let lower = body.to_ascii_lowercase();

    if requirement.requires_document
        && !mentions_any(&lower, &document_words(requirement.document_type))
    {
        issues.push(ValidationIssue::MissingAttachmentReference {
            kind: requirement
                .document_type
                .map(DocumentType::label)
                .unwrap_or("document"),
        });
    }
    if requirement.requires_image && !mentions_any(&lower, &IMAGE_WORDS) {
        issues.push(ValidationIssue::MissingAttachmentReference { kind: "image" });
    }
    if requirement.requires_voicemail && !mentions_any(&lower, &VOICEMAIL_WORDS) {
        issues.push(ValidationIssue::MissingAttachmentReference { kind: "voicemail" });
    }
    for placeholder in find_placeholders(body) {
        issues.push(ValidationIssue::UnfilledPlaceholder(placeholder));
    }
    issues
}
