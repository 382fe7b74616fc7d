use crate::error::EngineError;
use crate::model::{AttachmentSkeleton, EmailThread};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SlotIntent {
    New,
    Reply,
    Forward,
}

impl SlotIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotIntent::New => "new",
            SlotIntent::Reply => "reply",
            SlotIntent::Forward => "forward",
        }
    }
}

/// Narrative position of a slot; only used as prompt context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NarrativePhase {
    Beginning,
    Middle,
    LateStage,
}

impl NarrativePhase {
    pub fn for_position(index: usize, count: usize) -> Self {
        if count <= 1 {
            return NarrativePhase::Beginning;
        }
        let fraction = index as f64 / (count - 1) as f64;
        if fraction < 0.34 {
            NarrativePhase::Beginning
        } else if fraction < 0.67 {
            NarrativePhase::Middle
        } else {
            NarrativePhase::LateStage
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NarrativePhase::Beginning => "beginning",
            NarrativePhase::Middle => "middle",
            NarrativePhase::LateStage => "late-stage",
        }
    }
}

/// Structural plan for one email slot. Immutable once planned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadEmailSlotPlan {
    pub index: usize,
    pub parent_index: Option<usize>,
    pub root_index: usize,
    pub branch_id: u32,
    pub intent: SlotIntent,
    pub sent_at: DateTime<Utc>,
    pub phase: NarrativePhase,
    pub attachments: AttachmentSkeleton,
}

impl ThreadEmailSlotPlan {
    pub fn parent_id(&self, thread_id: &str) -> Option<String> {
        self.parent_index
            .map(|index| EmailThread::message_id(thread_id, index))
    }

    pub fn root_id(&self, thread_id: &str) -> String {
        EmailThread::message_id(thread_id, self.root_index)
    }
}

/// Attachment totals computed once from configured percentages.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentTotals {
    pub documents: usize,
    pub images: usize,
    pub voicemails: usize,
}

impl AttachmentTotals {
    pub fn total(&self) -> usize {
        self.documents + self.images + self.voicemails
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPlan {
    pub thread_id: String,
    pub slots: Vec<ThreadEmailSlotPlan>,
    pub totals: AttachmentTotals,
}

impl ThreadPlan {
    /// Structural self-check: dense indices, parents form a forest rooted at slot 0,
    /// attachment skeletons add up to the planned totals.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.slots.is_empty() {
            return Err(EngineError::ContractViolation(format!(
                "Thread plan '{}' has no slots",
                self.thread_id
            )));
        }
        for (position, slot) in self.slots.iter().enumerate() {
            if slot.index != position {
                return Err(EngineError::ContractViolation(format!(
                    "Thread plan '{}' slot at position {} has index {}",
                    self.thread_id, position, slot.index
                )));
            }
            match (slot.intent, slot.parent_index) {
                (SlotIntent::New, None) if position == 0 => {}
                (SlotIntent::New, _) => {
                    return Err(EngineError::ContractViolation(format!(
                        "Thread plan '{}' slot {} is New but not the root",
                        self.thread_id, position
                    )));
                }
                (_, Some(parent)) if parent < position => {}
                (intent, parent) => {
                    return Err(EngineError::ContractViolation(format!(
                        "Thread plan '{}' slot {} ({}) has invalid parent {:?}",
                        self.thread_id,
                        position,
                        intent.as_str(),
                        parent
                    )));
                }
            }
            if position > 0 && slot.sent_at < self.slots[position - 1].sent_at {
                return Err(EngineError::ContractViolation(format!(
                    "Thread plan '{}' slot {} is dated before its predecessor",
                    self.thread_id, position
                )));
            }
            if slot.attachments.is_final_slot != (position == self.slots.len() - 1) {
                return Err(EngineError::ContractViolation(format!(
                    "Thread plan '{}' final-slot flag misplaced at slot {}",
                    self.thread_id, position
                )));
            }
        }

        let counted = AttachmentTotals {
            documents: self
                .slots
                .iter()
                .filter(|s| s.attachments.document.is_some())
                .count(),
            images: self.slots.iter().filter(|s| s.attachments.image).count(),
            voicemails: self.slots.iter().filter(|s| s.attachments.voicemail).count(),
        };
        if counted != self.totals {
            return Err(EngineError::ContractViolation(format!(
                "Thread plan '{}' attachment skeleton {:?} does not match totals {:?}",
                self.thread_id, counted, self.totals
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
