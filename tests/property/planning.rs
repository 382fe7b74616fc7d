//! Properties of thread plans

use chrono::{Duration, TimeZone, Utc};
use mailweave::config::{AttachmentSettings, PlannerSettings};
use mailweave::model::Relevance;
use mailweave::planning::{attachment_total, PlanRequest, SlotIntent, ThreadStructurePlanner};
use mailweave::rng::{derive_seed, Stream};
use proptest::prelude::*;

fn planner(document: f64, image: f64, voicemail: f64) -> ThreadStructurePlanner {
    let attachments = AttachmentSettings {
        document_percent: document,
        image_percent: image,
        voicemail_percent: voicemail,
        ..Default::default()
    };
    ThreadStructurePlanner::new(PlannerSettings::default(), attachments)
}

fn request(email_count: usize, days: i64, allow_forward: bool, seed: u64) -> PlanRequest<'static> {
    let start = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
    PlanRequest {
        thread_id: "prop-thread",
        email_count,
        window_start: start,
        window_end: start + Duration::days(days),
        relevance: Relevance::Responsive,
        hot: false,
        allow_forward,
        seed,
    }
}

/// Every plan is a dense forest rooted at slot 0 whose skeleton matches its totals
#[test]
fn test_plan_structure_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                1usize..40,
                0i64..30,
                any::<bool>(),
                any::<u64>(),
                (0.0f64..=100.0, 0.0f64..=100.0, 0.0f64..=100.0),
            ),
            |(count, days, allow_forward, seed, (document, image, voicemail))| {
                let req = request(count, days, allow_forward, seed);
                let plan = planner(document, image, voicemail).plan(&req).unwrap();

                prop_assert!(plan.validate().is_ok());
                prop_assert_eq!(plan.len(), count);
                prop_assert_eq!(plan.slots[0].intent, SlotIntent::New);
                prop_assert!(plan.slots[0].parent_index.is_none());
                for (index, slot) in plan.slots.iter().enumerate() {
                    prop_assert_eq!(slot.index, index);
                    prop_assert_eq!(slot.attachments.is_final_slot, index == count - 1);
                    prop_assert!(slot.sent_at >= req.window_start);
                    prop_assert!(slot.sent_at <= req.window_end);
                    if index > 0 {
                        prop_assert!(slot.parent_index.unwrap() < index);
                        prop_assert!(slot.sent_at >= plan.slots[index - 1].sent_at);
                    }
                    if !allow_forward {
                        prop_assert!(slot.intent != SlotIntent::Forward);
                    }
                }
                prop_assert_eq!(plan.totals.documents, attachment_total(count, document));
                prop_assert_eq!(plan.totals.images, attachment_total(count, image));
                prop_assert_eq!(plan.totals.voicemails, attachment_total(count, voicemail));
                Ok(())
            },
        )
        .unwrap();
}

/// Same seed and input always give the same plan
#[test]
fn test_plan_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(1usize..25, any::<u64>()), |(count, seed)| {
            let planner = planner(20.0, 10.0, 5.0);
            let a = planner.plan(&request(count, 10, true, seed)).unwrap();
            let b = planner.plan(&request(count, 10, true, seed)).unwrap();
            prop_assert_eq!(a.totals, b.totals);
            for (x, y) in a.slots.iter().zip(b.slots.iter()) {
                prop_assert_eq!(x.parent_index, y.parent_index);
                prop_assert_eq!(x.intent, y.intent);
                prop_assert_eq!(x.sent_at, y.sent_at);
                prop_assert_eq!(&x.attachments, &y.attachments);
            }
            Ok(())
        })
        .unwrap();
}

/// Streams are stable per (seed, thread, purpose) and independent across purposes
#[test]
fn test_derived_seed_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any::<u64>(), "[a-z0-9-]{1,16}"), |(seed, thread_id)| {
            let planner = derive_seed(seed, &thread_id, Stream::Planner);
            prop_assert_eq!(planner, derive_seed(seed, &thread_id, Stream::Planner));
            prop_assert_ne!(planner, derive_seed(seed, &thread_id, Stream::Carryover));
            prop_assert_ne!(planner, derive_seed(seed, &thread_id, Stream::Participants));
            Ok(())
        })
        .unwrap();
}
