//! Properties of attachment carryover

use chrono::{Duration, TimeZone, Utc};
use mailweave::carryover::AttachmentCarryoverState;
use mailweave::config::{AttachmentSettings, PlannerSettings};
use mailweave::model::Relevance;
use mailweave::planning::{PlanRequest, ThreadStructurePlanner};
use mailweave::rng::ThreadRng;
use proptest::prelude::*;
use rand::SeedableRng;

/// Whatever mix of slot successes and failures, every planned attachment ends up either
/// delivered or logged as undelivered, and nothing is delivered twice
#[test]
fn test_ledger_resolves_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                proptest::collection::vec(any::<bool>(), 1..30),
                any::<u64>(),
                0.0f64..=1.0,
            ),
            |(outcomes, seed, carryover_probability)| {
                let attachments = AttachmentSettings {
                    document_percent: 40.0,
                    image_percent: 30.0,
                    voicemail_percent: 20.0,
                    carryover_probability,
                    ..Default::default()
                };
                let planner = ThreadStructurePlanner::new(PlannerSettings::default(), attachments);
                let start = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
                let plan = planner
                    .plan(&PlanRequest {
                        thread_id: "prop-carry",
                        email_count: outcomes.len(),
                        window_start: start,
                        window_end: start + Duration::days(7),
                        relevance: Relevance::Responsive,
                        hot: false,
                        allow_forward: true,
                        seed,
                    })
                    .unwrap();

                let mut state = AttachmentCarryoverState::new(
                    "prop-carry",
                    plan.totals,
                    carryover_probability,
                    ThreadRng::seed_from_u64(seed),
                );
                for (slot, succeeded) in plan.slots.iter().zip(outcomes.iter()) {
                    let requirement = state.resolve_requirement(&slot.attachments);
                    if *succeeded {
                        state.record_success(&requirement);
                    } else {
                        state.record_failure(&requirement);
                    }
                }

                let ledger = state.ledger();
                prop_assert!(!state.has_pending());
                prop_assert!(ledger.is_fully_resolved());
                prop_assert!(ledger.delivered.documents <= plan.totals.documents);
                prop_assert!(ledger.delivered.images <= plan.totals.images);
                prop_assert!(ledger.delivered.voicemails <= plan.totals.voicemails);
                if outcomes.iter().all(|ok| *ok) {
                    prop_assert_eq!(ledger.delivered, plan.totals);
                }
                Ok(())
            },
        )
        .unwrap();
}
