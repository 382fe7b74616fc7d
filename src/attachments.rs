//! Attachment descriptors, renderer seams and the cross-thread document chain registry.

use crate::error::EngineError;
use crate::generation::responses::EmailDraftResponse;
use crate::generation::subject::base_subject;
use crate::model::{AttachmentKind, AttachmentRequirement, DocumentType, PlannedAttachment};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// What a renderer is asked to produce.
#[derive(Debug, Clone)]
pub struct AttachmentSpec {
    pub thread_id: String,
    pub message_id: String,
    pub kind: AttachmentKind,
    pub title: String,
    pub description: String,
    pub author: String,
    /// Body of the message the attachment travels with
    pub context: String,
}

/// Produces attachment bytes. Failures are reported, never retried.
#[async_trait]
pub trait AttachmentRenderer: Send + Sync {
    async fn render(&self, spec: &AttachmentSpec) -> Result<Vec<u8>, EngineError>;
}

/// Optional renderers per attachment family. Kinds without a renderer keep descriptor-only
/// attachments.
#[derive(Clone, Default)]
pub struct AttachmentRenderers {
    pub document: Option<Arc<dyn AttachmentRenderer>>,
    pub image: Option<Arc<dyn AttachmentRenderer>>,
    pub speech: Option<Arc<dyn AttachmentRenderer>>,
}

impl AttachmentRenderers {
    fn for_kind(&self, kind: AttachmentKind) -> Option<&Arc<dyn AttachmentRenderer>> {
        match kind {
            AttachmentKind::Document(_) => self.document.as_ref(),
            AttachmentKind::Image => self.image.as_ref(),
            AttachmentKind::Voicemail => self.speech.as_ref(),
        }
    }
}

/// Version counters for documents that recur across threads, keyed by normalized title.
#[derive(Debug, Default)]
pub struct DocumentChainRegistry {
    versions: Mutex<HashMap<String, u32>>,
}

impl DocumentChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next version of `title`'s chain. The counter is bumped under the lock,
    /// so two threads never receive the same version.
    pub fn reserve(&self, title: &str) -> u32 {
        let key = chain_key(title);
        let mut versions = self.versions.lock();
        let version = versions.entry(key).or_insert(0);
        *version += 1;
        *version
    }

    pub fn current(&self, title: &str) -> Option<u32> {
        self.versions.lock().get(&chain_key(title)).copied()
    }
}

fn chain_key(title: &str) -> String {
    title
        .split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn slug(text: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('_');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.chars().take(60).collect()
    }
}

/// Message-level inputs for building attachment descriptors.
pub struct AttachmentContext<'a> {
    pub thread_id: &'a str,
    pub message_id: &'a str,
    pub subject: &'a str,
    pub author: &'a str,
    pub body: &'a str,
}

/// Builds descriptors for a committed slot and runs configured renderers.
pub struct AttachmentBuilder {
    renderers: AttachmentRenderers,
    registry: Arc<DocumentChainRegistry>,
}

impl AttachmentBuilder {
    pub fn new(renderers: AttachmentRenderers, registry: Arc<DocumentChainRegistry>) -> Self {
        Self {
            renderers,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<DocumentChainRegistry> {
        &self.registry
    }

    /// Descriptors for everything `requirement` asks for, forced obligations included.
    /// Render failures leave the descriptor without content and are returned separately.
    pub async fn build(
        &self,
        ctx: &AttachmentContext<'_>,
        requirement: &AttachmentRequirement,
        draft: Option<&EmailDraftResponse>,
    ) -> (Vec<PlannedAttachment>, Vec<EngineError>) {
        let topic = base_subject(ctx.subject);
        let mut planned = Vec::new();

        if let Some(doc) = requirement.document_type.filter(|_| requirement.requires_document) {
            planned.push(self.document(topic, doc, draft, requirement.document_from_pending, false));
        }
        for doc in &requirement.forced_documents {
            planned.push(self.document(topic, *doc, None, true, true));
        }

        let image_count = u32::from(requirement.requires_image) + requirement.forced_images;
        for n in 0..image_count {
            let forced = n > 0 || !requirement.requires_image;
            let proposed = draft
                .filter(|_| !forced)
                .and_then(|d| d.attachment_matching("image").or_else(|| d.attachment_matching("photo")));
            planned.push(PlannedAttachment {
                kind: AttachmentKind::Image,
                title: proposed
                    .map(|a| a.title.clone())
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("{} screenshot", topic)),
                description: proposed.map(|a| a.description.clone()).unwrap_or_default(),
                inline: !forced && requirement.inline_image,
                from_carryover: forced || requirement.image_from_pending,
                forced,
                file_name: format!("{}_image_{}.png", ctx.message_id, n + 1),
                version: None,
                content: None,
            });
        }

        let voicemail_count =
            u32::from(requirement.requires_voicemail) + requirement.forced_voicemails;
        for n in 0..voicemail_count {
            let forced = n > 0 || !requirement.requires_voicemail;
            planned.push(PlannedAttachment {
                kind: AttachmentKind::Voicemail,
                title: format!("Voicemail from {}", ctx.author),
                description: format!("Voice message about {}", topic),
                inline: false,
                from_carryover: forced || requirement.voicemail_from_pending,
                forced,
                file_name: format!("{}_voicemail_{}.mp3", ctx.message_id, n + 1),
                version: None,
                content: None,
            });
        }

        let mut errors = Vec::new();
        for attachment in &mut planned {
            let Some(renderer) = self.renderers.for_kind(attachment.kind) else {
                continue;
            };
            let spec = AttachmentSpec {
                thread_id: ctx.thread_id.to_string(),
                message_id: ctx.message_id.to_string(),
                kind: attachment.kind,
                title: attachment.title.clone(),
                description: attachment.description.clone(),
                author: ctx.author.to_string(),
                context: ctx.body.to_string(),
            };
            match renderer.render(&spec).await {
                Ok(bytes) => attachment.content = Some(bytes),
                Err(e) => {
                    warn!(
                        thread_id = ctx.thread_id,
                        message_id = ctx.message_id,
                        kind = attachment.kind.label(),
                        error = %e,
                        "Attachment rendering failed"
                    );
                    errors.push(EngineError::AttachmentRender {
                        kind: attachment.kind.label().to_string(),
                        message: format!("{} ({}): {}", attachment.file_name, ctx.message_id, e),
                    });
                }
            }
        }
        (planned, errors)
    }

    fn document(
        &self,
        topic: &str,
        doc: DocumentType,
        draft: Option<&EmailDraftResponse>,
        from_carryover: bool,
        forced: bool,
    ) -> PlannedAttachment {
        let proposed = draft.and_then(|d| {
            d.attachment_matching(doc.label())
                .or_else(|| d.attachment_matching(doc.extension()))
                .or_else(|| d.attachment_matching("document"))
        });
        let title = proposed
            .map(|a| a.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("{} {}", topic, doc.label()));
        let version = self.registry.reserve(&title);
        PlannedAttachment {
            kind: AttachmentKind::Document(doc),
            file_name: format!("{}_v{}.{}", slug(&title), version, doc.extension()),
            description: proposed.map(|a| a.description.clone()).unwrap_or_default(),
            title,
            inline: false,
            from_carryover,
            forced,
            version: Some(version),
            content: None,
        }
    }
}
