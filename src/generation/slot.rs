//! Draft, validate, repair: the bounded loop that produces one slot's body.

use crate::error::EngineError;
use crate::generation::prompts::{draft_prompt, issue_lines, repair_prompt, DraftPrompt, SYSTEM_PROMPT};
use crate::generation::responses::EmailDraftResponse;
use crate::generation::validation::validate_draft;
use crate::model::AttachmentRequirement;
use crate::provider::CompletionClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Lifecycle of one slot. `Committed` and `FailureCommitted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Drafting { attempt: u32 },
    Validating { attempt: u32 },
    Repairing { attempt: u32 },
    Committed,
    FailureCommitted,
}

impl SlotState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SlotState::Committed | SlotState::FailureCommitted)
    }
}

#[derive(Debug, Clone)]
pub enum DraftOutcome {
    Valid {
        draft: EmailDraftResponse,
        attempts: u32,
    },
    Exhausted {
        reason: String,
        attempts: u32,
    },
}

pub const DRAFT_OPERATION: &str = "draft_email";
pub const REPAIR_OPERATION: &str = "repair_email";

/// Run the draft/repair loop for one slot.
///
/// Makes at most `1 + max_repair_attempts` requests. Provider errors and empty or
/// unparseable responses count as invalid drafts; only cancellation escapes as an error.
pub async fn draft_until_valid(
    client: &dyn CompletionClient,
    ctx: &DraftPrompt<'_>,
    requirement: &AttachmentRequirement,
    max_repair_attempts: u32,
    cancel: &CancellationToken,
) -> Result<DraftOutcome, EngineError> {
    let max_attempts = max_repair_attempts.saturating_add(1);
    let slot_index = ctx.slot.index;
    let mut state = SlotState::Pending;
    let mut previous_body: Option<String> = None;
    let mut issues: Vec<String> = Vec::new();
    let mut pending_draft: Option<EmailDraftResponse> = None;

    loop {
        trace!(slot = slot_index, state = ?state, "Slot transition");
        state = match state {
            SlotState::Pending => SlotState::Drafting { attempt: 1 },
            SlotState::Drafting { attempt } => {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let (prompt, operation) = if attempt == 1 {
                    (draft_prompt(ctx), DRAFT_OPERATION)
                } else {
                    (
                        repair_prompt(ctx, previous_body.as_deref(), &issues),
                        REPAIR_OPERATION,
                    )
                };
                match client.complete(SYSTEM_PROMPT, &prompt, operation, cancel).await {
                    Ok(Some(value)) => match EmailDraftResponse::from_value(&value) {
                        Some(draft) => {
                            pending_draft = Some(draft);
                            SlotState::Validating { attempt }
                        }
                        None => {
                            issues = vec!["The response did not contain an email body.".to_string()];
                            SlotState::Repairing { attempt }
                        }
                    },
                    Ok(None) => {
                        issues = vec!["No usable response was returned.".to_string()];
                        SlotState::Repairing { attempt }
                    }
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        debug!(slot = slot_index, attempt, error = %e, "Draft request failed");
                        issues = vec![format!("The request failed: {}", e)];
                        SlotState::Repairing { attempt }
                    }
                }
            }
            SlotState::Validating { attempt } => {
                let Some(draft) = pending_draft.take() else {
                    issues = vec!["No usable response was returned.".to_string()];
                    state = SlotState::Repairing { attempt };
                    continue;
                };
                let found = validate_draft(&draft.body, requirement);
                if found.is_empty() {
                    trace!(slot = slot_index, attempt, "Draft accepted");
                    return Ok(DraftOutcome::Valid {
                        draft,
                        attempts: attempt,
                    });
                }
                issues = issue_lines(&found);
                debug!(slot = slot_index, attempt, issues = ?issues, "Draft rejected");
                previous_body = Some(draft.body);
                SlotState::Repairing { attempt }
            }
            SlotState::Repairing { attempt } => {
                if attempt >= max_attempts {
                    return Ok(DraftOutcome::Exhausted {
                        reason: format!(
                            "No valid draft after {} attempt{}: {}",
                            attempt,
                            if attempt == 1 { "" } else { "s" },
                            issues.join(" ")
                        ),
                        attempts: attempt,
                    });
                }
                SlotState::Drafting {
                    attempt: attempt + 1,
                }
            }
            SlotState::Committed | SlotState::FailureCommitted => {
                return Err(EngineError::ContractViolation(format!(
                    "Slot {} drafted again after commit",
                    slot_index
                )));
            }
        };
    }
}
