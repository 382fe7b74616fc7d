//! Data model: participants, storylines, threads, messages and attachment descriptors.

pub mod attachment;
pub mod participant;
pub mod story;
pub mod thread;

pub use attachment::{
    AttachmentKind, AttachmentRequirement, AttachmentSkeleton, DocumentType, PlannedAttachment,
};
pub use participant::{Mailbox, Participant};
pub use story::{StoryBeat, Storyline};
pub use thread::{EmailMessage, EmailThread, Relevance};
