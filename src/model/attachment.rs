use serde::{Deserialize, Serialize};

/// Concrete office document kinds a planned document attachment can take.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Document,
    Spreadsheet,
    Presentation,
    Pdf,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Document,
        DocumentType::Spreadsheet,
        DocumentType::Presentation,
        DocumentType::Pdf,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            DocumentType::Document => "docx",
            DocumentType::Spreadsheet => "xlsx",
            DocumentType::Presentation => "pptx",
            DocumentType::Pdf => "pdf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentType::Document => "document",
            DocumentType::Spreadsheet => "spreadsheet",
            DocumentType::Presentation => "slide deck",
            DocumentType::Pdf => "PDF",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", tag = "kind", content = "document_type")]
pub enum AttachmentKind {
    Document(DocumentType),
    Image,
    Voicemail,
}

impl AttachmentKind {
    pub fn label(&self) -> &'static str {
        match self {
            AttachmentKind::Document(doc) => doc.label(),
            AttachmentKind::Image => "image",
            AttachmentKind::Voicemail => "voicemail",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AttachmentKind::Document(doc) => doc.extension(),
            AttachmentKind::Image => "png",
            AttachmentKind::Voicemail => "mp3",
        }
    }
}

/// Attachment descriptor carried on a committed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedAttachment {
    pub kind: AttachmentKind,
    pub title: String,
    pub description: String,
    pub inline: bool,
    /// Satisfies an obligation carried over from an earlier failed slot
    pub from_carryover: bool,
    /// Force-attached on the final slot without body validation
    pub forced: bool,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

/// Requirement skeleton fixed at planning time for a single slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentSkeleton {
    pub document: Option<DocumentType>,
    pub image: bool,
    pub inline_image: bool,
    pub voicemail: bool,
    pub is_final_slot: bool,
}

impl AttachmentSkeleton {
    pub fn is_empty(&self) -> bool {
        self.document.is_none() && !self.image && !self.voicemail
    }
}

/// Attachment requirement resolved for a slot right before it is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentRequirement {
    pub requires_document: bool,
    pub document_type: Option<DocumentType>,
    pub document_from_pending: bool,
    pub requires_image: bool,
    pub image_from_pending: bool,
    pub inline_image: bool,
    pub requires_voicemail: bool,
    pub voicemail_from_pending: bool,
    pub is_final_slot: bool,
    /// Outstanding obligations force-attached on the final slot
    pub forced_documents: Vec<DocumentType>,
    pub forced_images: u32,
    pub forced_voicemails: u32,
}

impl AttachmentRequirement {
    pub fn is_empty(&self) -> bool {
        !self.requires_document
            && !self.requires_image
            && !self.requires_voicemail
            && !self.has_forced()
    }

    pub fn has_forced(&self) -> bool {
        !self.forced_documents.is_empty() || self.forced_images > 0 || self.forced_voicemails > 0
    }

    /// Short phrase for prompts, e.g. "a spreadsheet and an inline screenshot".
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(doc) = self.document_type.filter(|_| self.requires_document) {
            parts.push(format!("an attached {}", doc.label()));
        }
        if self.requires_image {
            if self.inline_image {
                parts.push("an inline screenshot or photo".to_string());
            } else {
                parts.push("an attached image".to_string());
            }
        }
        if self.requires_voicemail {
            parts.push("a voicemail recording".to_string());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" and "))
        }
    }
}
