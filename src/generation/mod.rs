//! Slot generation: participants, subjects, prompts, the draft/validate/repair loop and
//! the commit path that turns a valid draft into a message.

pub mod participants;
pub mod prompts;
pub mod render;
pub mod responses;
pub mod signature;
pub mod slot;
pub mod subject;
pub mod thread;
pub mod validation;

pub use participants::{resolve_participants, ResolvedParticipants};
pub use prompts::{StoryContext, TopicBrief};
pub use slot::{draft_until_valid, DraftOutcome, SlotState};
pub use thread::{plan_thread, ThreadGenerator, ThreadOutcome, ThreadWindow};
pub use validation::{validate_draft, ValidationIssue};
