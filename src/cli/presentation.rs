//! CLI presentation: plan, run report and topic catalog formatting (text and json).

use crate::error::EngineError;
use crate::model::AttachmentSkeleton;
use crate::orchestrator::RunReport;
use crate::planning::ThreadPlan;
use crate::topics::TopicCatalog;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
fn section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value).map_err(EngineError::from)
}

fn describe_skeleton(skeleton: &AttachmentSkeleton) -> String {
    let mut parts = Vec::new();
    if let Some(doc) = skeleton.document {
        parts.push(doc.label().to_string());
    }
    if skeleton.image {
        parts.push(if skeleton.inline_image {
            "image (inline)".to_string()
        } else {
            "image".to_string()
        });
    }
    if skeleton.voicemail {
        parts.push("voicemail".to_string());
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn format_plans_text(plans: &[ThreadPlan]) -> String {
    if plans.is_empty() {
        return "No threads to plan.".to_string();
    }
    let mut out = String::new();
    for plan in plans {
        out.push_str(&format!(
            "{}\n  documents: {}  images: {}  voicemails: {}\n\n",
            section_heading(&format!("Thread {}", plan.thread_id)),
            plan.totals.documents,
            plan.totals.images,
            plan.totals.voicemails
        ));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec![
            "#", "Parent", "Branch", "Intent", "Phase", "Sent", "Attachments",
        ]);
        for slot in &plan.slots {
            let mut attachments = describe_skeleton(&slot.attachments);
            if slot.attachments.is_final_slot {
                attachments.push_str(" [final]");
            }
            table.add_row(vec![
                slot.index.to_string(),
                slot.parent_index
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                slot.branch_id.to_string(),
                slot.intent.as_str().to_string(),
                slot.phase.label().to_string(),
                slot.sent_at.format("%Y-%m-%d %H:%M").to_string(),
                attachments,
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }
    out.trim_end().to_string()
}

pub fn format_plans_json(plans: &[ThreadPlan]) -> Result<String, EngineError> {
    to_json(&serde_json::json!({ "threads": plans, "total": plans.len() }))
}

pub fn format_run_report_text(report: &RunReport) -> String {
    let mut out = format!("{}\n\n", section_heading("Generation Summary"));
    out.push_str(&format!(
        "  Emails: {} generated, {} failed, {} planned\n",
        report.emails_generated, report.emails_failed, report.emails_planned
    ));
    let attachments = &report.attachments;
    out.push_str(&format!(
        "  Attachments: {} planned, {} delivered, {} undelivered\n\n",
        attachments.planned.total(),
        attachments.delivered.total(),
        attachments.undelivered.total()
    ));

    if !report.threads.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec![
            "Thread", "Beat", "Emails", "Failed", "Attachments", "Topic", "Saved",
        ]);
        for thread in &report.threads {
            table.add_row(vec![
                thread.thread_id.clone(),
                thread.beat_id.clone(),
                thread.emails.to_string(),
                thread.failed.to_string(),
                format!(
                    "{}/{}",
                    thread.attachments.delivered.total(),
                    thread.attachments.planned.total()
                ),
                thread.topic.clone().unwrap_or_else(|| "-".to_string()),
                if thread.saved { "yes" } else { "no" }.to_string(),
            ]);
        }
        out.push_str(&format!("{}\n", table));
    }

    if !report.errors.is_empty() {
        out.push_str(&format!(
            "\n{}\n",
            section_heading(&format!("Errors ({})", report.errors.len()))
        ));
        for error in &report.errors {
            match &error.thread_id {
                Some(thread_id) => out.push_str(&format!("  - [{}] {}\n", thread_id, error.message)),
                None => out.push_str(&format!("  - {}\n", error.message)),
            }
        }
    }
    out.trim_end().to_string()
}

pub fn format_run_report_json(report: &RunReport) -> Result<String, EngineError> {
    to_json(report)
}

pub fn format_topics_text(catalog: &TopicCatalog) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Category", "Intent", "Weight", "Tags"]);
    for archetype in &catalog.archetypes {
        table.add_row(vec![
            archetype.id.clone(),
            archetype.category.clone(),
            archetype.intent.clone(),
            format!("{:.2}", archetype.base_weight),
            archetype.tags.join(", "),
        ]);
    }
    format!(
        "{}\n\n{}\n\nTotal: {} archetype(s)",
        section_heading("Topic Archetypes"),
        table,
        catalog.archetypes.len()
    )
}
