//! Thread structure planning: slot plans, branch shape, dates and attachment skeletons.

pub mod plan;
pub mod planner;

pub use plan::{
    AttachmentTotals, NarrativePhase, SlotIntent, ThreadEmailSlotPlan, ThreadPlan,
};
pub use planner::{attachment_total, PlanRequest, ThreadStructurePlanner};
