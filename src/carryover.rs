//! Attachment Carryover Tracker
//!
//! Keeps a thread's attachment obligations honest across slot failures. A slot that fails
//! pushes its fresh obligations onto a pending queue; later slots may pick them up, and the
//! final slot force-attaches whatever is left. Every planned attachment ends up either
//! delivered or logged as undelivered.

use crate::model::{AttachmentRequirement, AttachmentSkeleton, DocumentType};
use crate::planning::AttachmentTotals;
use crate::rng::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Planned versus resolved attachment counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentLedger {
    pub planned: AttachmentTotals,
    pub delivered: AttachmentTotals,
    pub undelivered: AttachmentTotals,
}

impl AttachmentLedger {
    pub fn resolved(&self) -> AttachmentTotals {
        AttachmentTotals {
            documents: self.delivered.documents + self.undelivered.documents,
            images: self.delivered.images + self.undelivered.images,
            voicemails: self.delivered.voicemails + self.undelivered.voicemails,
        }
    }

    /// Every planned attachment was delivered or explicitly given up on.
    pub fn is_fully_resolved(&self) -> bool {
        self.resolved() == self.planned
    }

    pub fn absorb(&mut self, other: &AttachmentLedger) {
        for (mine, theirs) in [
            (&mut self.planned, &other.planned),
            (&mut self.delivered, &other.delivered),
            (&mut self.undelivered, &other.undelivered),
        ] {
            mine.documents += theirs.documents;
            mine.images += theirs.images;
            mine.voicemails += theirs.voicemails;
        }
    }
}

pub struct AttachmentCarryoverState {
    thread_id: String,
    pending_documents: VecDeque<DocumentType>,
    pending_images: u32,
    pending_voicemails: u32,
    carryover_probability: f64,
    rng: ThreadRng,
    ledger: AttachmentLedger,
}

impl AttachmentCarryoverState {
    pub fn new(
        thread_id: impl Into<String>,
        planned: AttachmentTotals,
        carryover_probability: f64,
        rng: ThreadRng,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            pending_documents: VecDeque::new(),
            pending_images: 0,
            pending_voicemails: 0,
            carryover_probability: carryover_probability.clamp(0.0, 1.0),
            rng,
            ledger: AttachmentLedger {
                planned,
                ..Default::default()
            },
        }
    }

    pub fn ledger(&self) -> AttachmentLedger {
        self.ledger
    }

    pub fn pending_documents(&self) -> impl Iterator<Item = &DocumentType> {
        self.pending_documents.iter()
    }

    pub fn pending_images(&self) -> u32 {
        self.pending_images
    }

    pub fn pending_voicemails(&self) -> u32 {
        self.pending_voicemails
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_documents.is_empty() || self.pending_images > 0 || self.pending_voicemails > 0
    }

    /// Merge a slot's planned skeleton with pending obligations.
    ///
    /// Exactly one coin flip is drawn per call so the carryover stream stays aligned with
    /// slot indices whatever happened to earlier slots.
    pub fn resolve_requirement(&mut self, skeleton: &AttachmentSkeleton) -> AttachmentRequirement {
        let merge_pending = self.rng.gen_bool(self.carryover_probability);

        let mut requirement = AttachmentRequirement {
            requires_document: skeleton.document.is_some(),
            document_type: skeleton.document,
            requires_image: skeleton.image,
            inline_image: skeleton.image && skeleton.inline_image,
            requires_voicemail: skeleton.voicemail,
            is_final_slot: skeleton.is_final_slot,
            ..Default::default()
        };

        if skeleton.is_final_slot {
            requirement.forced_documents = self.pending_documents.iter().copied().collect();
            requirement.forced_images = self.pending_images;
            requirement.forced_voicemails = self.pending_voicemails;
            return requirement;
        }

        if !merge_pending {
            return requirement;
        }
        if !requirement.requires_document {
            if let Some(doc) = self.pending_documents.front() {
                requirement.requires_document = true;
                requirement.document_type = Some(*doc);
                requirement.document_from_pending = true;
            }
        }
        if !requirement.requires_image && self.pending_images > 0 {
            requirement.requires_image = true;
            requirement.image_from_pending = true;
        }
        if !requirement.requires_voicemail && self.pending_voicemails > 0 {
            requirement.requires_voicemail = true;
            requirement.voicemail_from_pending = true;
        }
        requirement
    }

    /// The slot committed; everything it required is delivered.
    pub fn record_success(&mut self, requirement: &AttachmentRequirement) {
        if requirement.requires_document {
            if requirement.document_from_pending {
                self.pending_documents.pop_front();
            }
            self.ledger.delivered.documents += 1;
        }
        if requirement.requires_image {
            if requirement.image_from_pending {
                self.pending_images = self.pending_images.saturating_sub(1);
            }
            self.ledger.delivered.images += 1;
        }
        if requirement.requires_voicemail {
            if requirement.voicemail_from_pending {
                self.pending_voicemails = self.pending_voicemails.saturating_sub(1);
            }
            self.ledger.delivered.voicemails += 1;
        }

        if requirement.has_forced() {
            let forced_documents = requirement.forced_documents.len();
            for _ in 0..forced_documents {
                self.pending_documents.pop_front();
            }
            self.pending_images = self.pending_images.saturating_sub(requirement.forced_images);
            self.pending_voicemails = self
                .pending_voicemails
                .saturating_sub(requirement.forced_voicemails);
            self.ledger.delivered.documents += forced_documents;
            self.ledger.delivered.images += requirement.forced_images as usize;
            self.ledger.delivered.voicemails += requirement.forced_voicemails as usize;
            debug!(
                thread_id = %self.thread_id,
                documents = forced_documents,
                images = requirement.forced_images,
                voicemails = requirement.forced_voicemails,
                "Force-attached outstanding attachments on final slot"
            );
        }
    }

    /// The slot failed. Fresh obligations are queued for a later slot; obligations taken
    /// from the queue stay queued. On the final slot nothing is left to retry, so all
    /// outstanding obligations are logged as undelivered.
    pub fn record_failure(&mut self, requirement: &AttachmentRequirement) {
        if requirement.requires_document && !requirement.document_from_pending {
            if let Some(doc) = requirement.document_type {
                self.pending_documents.push_back(doc);
            }
        }
        if requirement.requires_image && !requirement.image_from_pending {
            self.pending_images = self.pending_images.saturating_add(1);
        }
        if requirement.requires_voicemail && !requirement.voicemail_from_pending {
            self.pending_voicemails = self.pending_voicemails.saturating_add(1);
        }

        if requirement.is_final_slot {
            self.drain_undelivered();
        } else if self.has_pending() {
            debug!(
                thread_id = %self.thread_id,
                documents = self.pending_documents.len(),
                images = self.pending_images,
                voicemails = self.pending_voicemails,
                "Attachment obligations carried over"
            );
        }
    }

    fn drain_undelivered(&mut self) {
        if !self.has_pending() {
            return;
        }
        let documents: Vec<&'static str> =
            self.pending_documents.iter().map(|d| d.label()).collect();
        warn!(
            thread_id = %self.thread_id,
            documents = ?documents,
            images = self.pending_images,
            voicemails = self.pending_voicemails,
            "Final slot failed; attachments left undelivered"
        );
        self.ledger.undelivered.documents += self.pending_documents.len();
        self.ledger.undelivered.images += self.pending_images as usize;
        self.ledger.undelivered.voicemails += self.pending_voicemails as usize;
        self.pending_documents.clear();
        self.pending_images = 0;
        self.pending_voicemails = 0;
    }
}
