//! Thread Structure Planner
//!
//! Turns a thread's email count and date window into an ordered, branching slot plan.
//! All choices come from the thread's planner stream, so the same seed and input always
//! produce the same plan.

use crate::config::{AttachmentSettings, PlannerSettings};
use crate::error::EngineError;
use crate::model::{AttachmentSkeleton, DocumentType, Relevance};
use crate::planning::plan::{
    AttachmentTotals, NarrativePhase, SlotIntent, ThreadEmailSlotPlan, ThreadPlan,
};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Input for planning one thread.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub thread_id: &'a str,
    pub email_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub relevance: Relevance,
    pub hot: bool,
    /// Forwarding needs someone outside the parent's addressees; callers pass
    /// `participants >= 3`.
    pub allow_forward: bool,
    pub seed: u64,
}

const DOCUMENT_TYPE_WEIGHTS: [(DocumentType, f64); 4] = [
    (DocumentType::Document, 0.35),
    (DocumentType::Spreadsheet, 0.3),
    (DocumentType::Presentation, 0.2),
    (DocumentType::Pdf, 0.15),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchMove {
    ReplyLatest,
    SideReply,
    Forward,
}

/// `min(count, round(count * percent / 100))`
pub fn attachment_total(email_count: usize, percent: f64) -> usize {
    let raw = (email_count as f64 * percent.max(0.0) / 100.0).round();
    (raw as usize).min(email_count)
}

pub struct ThreadStructurePlanner {
    planner: PlannerSettings,
    attachments: AttachmentSettings,
}

impl ThreadStructurePlanner {
    pub fn new(planner: PlannerSettings, attachments: AttachmentSettings) -> Self {
        Self {
            planner,
            attachments,
        }
    }

    pub fn plan(&self, request: &PlanRequest<'_>) -> Result<ThreadPlan, EngineError> {
        if request.email_count == 0 {
            return Err(EngineError::ContractViolation(format!(
                "Thread '{}' has a target of zero emails",
                request.thread_id
            )));
        }
        if request.window_end < request.window_start {
            return Err(EngineError::ContractViolation(format!(
                "Thread '{}' window ends before it starts",
                request.thread_id
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(request.seed);
        let count = request.email_count;

        let shape = self.plan_shape(request, &mut rng);
        let dates = self.plan_dates(request, &mut rng);
        let (skeletons, totals) = self.plan_attachments(count, &mut rng);

        let slots: Vec<ThreadEmailSlotPlan> = shape
            .into_iter()
            .zip(dates)
            .zip(skeletons)
            .enumerate()
            .map(
                |(index, (((intent, parent_index, branch_id), sent_at), attachments))| {
                    ThreadEmailSlotPlan {
                        index,
                        parent_index,
                        root_index: 0,
                        branch_id,
                        intent,
                        sent_at,
                        phase: NarrativePhase::for_position(index, count),
                        attachments,
                    }
                },
            )
            .collect();

        let plan = ThreadPlan {
            thread_id: request.thread_id.to_string(),
            slots,
            totals,
        };
        plan.validate()?;

        debug!(
            thread_id = request.thread_id,
            slots = plan.len(),
            documents = totals.documents,
            images = totals.images,
            voicemails = totals.voicemails,
            "Planned thread structure"
        );
        Ok(plan)
    }

    fn move_weights(&self, request: &PlanRequest<'_>) -> [f64; 3] {
        let mut reply_latest = self.planner.reply_latest_weight;
        let side_reply = self.planner.side_reply_weight;
        let mut forward = self.planner.forward_weight;
        if request.hot {
            // Hot threads stay in a tight back-and-forth
            reply_latest *= 1.5;
        }
        if request.relevance == Relevance::NonResponsive {
            forward *= 0.5;
        }
        [reply_latest, side_reply, forward]
    }

    /// Intent, parent and branch per slot.
    fn plan_shape(
        &self,
        request: &PlanRequest<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<(SlotIntent, Option<usize>, u32)> {
        let [reply_latest, side_reply, forward] = self.move_weights(request);
        let mut shape = Vec::with_capacity(request.email_count);
        shape.push((SlotIntent::New, None, 0u32));
        let mut next_branch = 1u32;

        for index in 1..request.email_count {
            let mut options = vec![(BranchMove::ReplyLatest, reply_latest)];
            if index >= 2 {
                options.push((BranchMove::SideReply, side_reply));
            }
            if request.allow_forward {
                options.push((BranchMove::Forward, forward));
            }

            let chosen = WeightedIndex::new(options.iter().map(|(_, w)| *w))
                .map(|dist| options[dist.sample(rng)].0)
                .unwrap_or(BranchMove::ReplyLatest);

            let latest = index - 1;
            let slot = match chosen {
                BranchMove::ReplyLatest => (SlotIntent::Reply, Some(latest), shape[latest].2),
                BranchMove::SideReply => {
                    let parent = rng.gen_range(0..latest);
                    let branch = next_branch;
                    next_branch += 1;
                    (SlotIntent::Reply, Some(parent), branch)
                }
                BranchMove::Forward => {
                    let parent = rng.gen_range(0..index);
                    let branch = next_branch;
                    next_branch += 1;
                    (SlotIntent::Forward, Some(parent), branch)
                }
            };
            shape.push(slot);
        }
        shape
    }

    /// Interpolated, jittered, strictly increasing send times.
    fn plan_dates(&self, request: &PlanRequest<'_>, rng: &mut ChaCha8Rng) -> Vec<DateTime<Utc>> {
        let count = request.email_count as i64;
        let window_secs = (request.window_end - request.window_start).num_seconds();
        let step = window_secs as f64 / count as f64;
        // The minimum gap shrinks to the per-slot share so the last slot stays in the window
        let gap = Duration::seconds(
            (self.planner.min_gap_minutes.max(0) * 60)
                .min(window_secs / count)
                .max(0),
        );

        let mut dates: Vec<DateTime<Utc>> = Vec::with_capacity(request.email_count);
        for index in 0..count {
            let jitter = if step > 0.0 {
                rng.gen_range(-0.35..=0.35) * step
            } else {
                0.0
            };
            let offset = (step * (index as f64 + 0.5) + jitter).max(0.0) as i64;
            let mut sent = request.window_start + Duration::seconds(offset);
            if let Some(previous) = dates.last() {
                let earliest = *previous + gap;
                if sent < earliest {
                    sent = earliest;
                }
            }
            dates.push(sent.min(request.window_end));
        }
        dates
    }

    /// Distribute attachment totals so each requirement lands on exactly one slot.
    fn plan_attachments(
        &self,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<AttachmentSkeleton>, AttachmentTotals) {
        let totals = AttachmentTotals {
            documents: attachment_total(count, self.attachments.document_percent),
            images: attachment_total(count, self.attachments.image_percent),
            voicemails: attachment_total(count, self.attachments.voicemail_percent),
        };

        let mut skeletons = vec![AttachmentSkeleton::default(); count];
        if let Some(last) = skeletons.last_mut() {
            last.is_final_slot = true;
        }

        for index in rand::seq::index::sample(rng, count, totals.documents) {
            let doc_type = DOCUMENT_TYPE_WEIGHTS
                .choose_weighted(rng, |(_, weight)| *weight)
                .map(|(doc, _)| *doc)
                .unwrap_or(DocumentType::Document);
            skeletons[index].document = Some(doc_type);
        }
        let inline_share = self.attachments.inline_image_share.clamp(0.0, 1.0);
        for index in rand::seq::index::sample(rng, count, totals.images) {
            skeletons[index].image = true;
            skeletons[index].inline_image = rng.gen_bool(inline_share);
        }
        for index in rand::seq::index::sample(rng, count, totals.voicemails) {
            skeletons[index].voicemail = true;
        }

        (skeletons, totals)
    }
}
