//! Configuration System
//!
//! Layered configuration for the generation engine: built-in defaults, the user's global
//! config file, workspace config files and environment overrides. Every section carries
//! serde defaults so a missing file or table is never an error.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::provider::{ProviderConfig, ProviderType};

mod loader;
mod merge;
mod sources;

pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailweaveConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine-wide generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Global run seed; per-thread generators derive from it
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Threads generated concurrently (1 = serial)
    #[serde(default = "default_max_parallel_threads")]
    pub max_parallel_threads: usize,

    /// Repair requests allowed after the first draft of a slot
    #[serde(default = "default_max_repair_attempts")]
    pub max_repair_attempts: u32,

    #[serde(default)]
    pub attachments: AttachmentSettings,

    #[serde(default)]
    pub planner: PlannerSettings,

    #[serde(default)]
    pub facts: FactTableSettings,

    #[serde(default)]
    pub topics: TopicSettings,
}

fn default_seed() -> u64 {
    20_240_601
}

fn default_max_parallel_threads() -> usize {
    1
}

fn default_max_repair_attempts() -> u32 {
    2
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_parallel_threads: default_max_parallel_threads(),
            max_repair_attempts: default_max_repair_attempts(),
            attachments: AttachmentSettings::default(),
            planner: PlannerSettings::default(),
            facts: FactTableSettings::default(),
            topics: TopicSettings::default(),
        }
    }
}

/// Attachment totals are percentages of a thread's email count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSettings {
    #[serde(default = "default_document_percent")]
    pub document_percent: f64,
    #[serde(default = "default_image_percent")]
    pub image_percent: f64,
    #[serde(default = "default_voicemail_percent")]
    pub voicemail_percent: f64,
    /// Share of planned images rendered inline rather than attached (0.0-1.0)
    #[serde(default = "default_inline_image_share")]
    pub inline_image_share: f64,
    /// Chance a pending obligation is merged into the next non-final slot (0.0-1.0)
    #[serde(default = "default_carryover_probability")]
    pub carryover_probability: f64,
}

fn default_document_percent() -> f64 {
    20.0
}

fn default_image_percent() -> f64 {
    10.0
}

fn default_voicemail_percent() -> f64 {
    5.0
}

fn default_inline_image_share() -> f64 {
    0.3
}

fn default_carryover_probability() -> f64 {
    0.75
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            document_percent: default_document_percent(),
            image_percent: default_image_percent(),
            voicemail_percent: default_voicemail_percent(),
            inline_image_share: default_inline_image_share(),
            carryover_probability: default_carryover_probability(),
        }
    }
}

/// Branch-shape weights and timing for the structure planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerSettings {
    #[serde(default = "default_reply_latest_weight")]
    pub reply_latest_weight: f64,
    #[serde(default = "default_side_reply_weight")]
    pub side_reply_weight: f64,
    #[serde(default = "default_forward_weight")]
    pub forward_weight: f64,
    /// Minimum minutes between consecutive slots
    #[serde(default = "default_min_gap_minutes")]
    pub min_gap_minutes: i64,
}

fn default_reply_latest_weight() -> f64 {
    0.65
}

fn default_side_reply_weight() -> f64 {
    0.2
}

fn default_forward_weight() -> f64 {
    0.15
}

fn default_min_gap_minutes() -> i64 {
    4
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            reply_latest_weight: default_reply_latest_weight(),
            side_reply_weight: default_side_reply_weight(),
            forward_weight: default_forward_weight(),
            min_gap_minutes: default_min_gap_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactTableSettings {
    /// Entries kept per list (events, decisions, conflicts, open questions)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    8
}

impl Default for FactTableSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// Tuning for topic archetype selection on non-responsive threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSettings {
    /// Optional catalog file replacing the built-in catalog
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// Raw tag weight at which presence is 0.5
    #[serde(default = "default_presence_threshold")]
    pub presence_threshold: f64,
    /// Logistic steepness around the threshold
    #[serde(default = "default_presence_steepness")]
    pub presence_steepness: f64,
    /// Minimum sender/recipient gate score
    #[serde(default = "default_gate_floor")]
    pub gate_floor: f64,
    /// Exponent applied to gate scores
    #[serde(default = "default_gate_exponent")]
    pub gate_exponent: f64,
    #[serde(default = "default_temperature_mean")]
    pub temperature_mean: f64,
    #[serde(default = "default_temperature_sigma")]
    pub temperature_sigma: f64,
}

fn default_presence_threshold() -> f64 {
    0.5
}

fn default_presence_steepness() -> f64 {
    6.0
}

fn default_gate_floor() -> f64 {
    0.15
}

fn default_gate_exponent() -> f64 {
    0.5
}

fn default_temperature_mean() -> f64 {
    1.05
}

fn default_temperature_sigma() -> f64 {
    0.25
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            catalog_path: None,
            presence_threshold: default_presence_threshold(),
            presence_steepness: default_presence_steepness(),
            gate_floor: default_gate_floor(),
            gate_exponent: default_gate_exponent(),
            temperature_mean: default_temperature_mean(),
            temperature_sigma: default_temperature_sigma(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Provider(String),
    Generation(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn check_percent(errors: &mut Vec<ValidationError>, name: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        errors.push(ValidationError::Generation(format!(
            "{} must be between 0 and 100, got {}",
            name, value
        )));
    }
}

fn check_unit(errors: &mut Vec<ValidationError>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::Generation(format!(
            "{} must be between 0 and 1, got {}",
            name, value
        )));
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.max_parallel_threads == 0 {
            errors.push(ValidationError::Generation(
                "max_parallel_threads must be at least 1".to_string(),
            ));
        }
        check_percent(&mut errors, "document_percent", self.attachments.document_percent);
        check_percent(&mut errors, "image_percent", self.attachments.image_percent);
        check_percent(&mut errors, "voicemail_percent", self.attachments.voicemail_percent);
        check_unit(&mut errors, "inline_image_share", self.attachments.inline_image_share);
        check_unit(
            &mut errors,
            "carryover_probability",
            self.attachments.carryover_probability,
        );

        let planner = &self.planner;
        let weights = [
            planner.reply_latest_weight,
            planner.side_reply_weight,
            planner.forward_weight,
        ];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            errors.push(ValidationError::Generation(
                "planner weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if planner.min_gap_minutes < 0 {
            errors.push(ValidationError::Generation(
                "min_gap_minutes cannot be negative".to_string(),
            ));
        }
        if self.facts.max_entries == 0 {
            errors.push(ValidationError::Generation(
                "facts.max_entries must be at least 1".to_string(),
            ));
        }
        let topics = &self.topics;
        if topics.temperature_mean <= 0.0 || topics.temperature_sigma < 0.0 {
            errors.push(ValidationError::Generation(
                "topic temperature mean must be positive and sigma non-negative".to_string(),
            ));
        }
        if topics.presence_steepness <= 0.0 {
            errors.push(ValidationError::Generation(
                "presence_steepness must be positive".to_string(),
            ));
        }
        check_unit(&mut errors, "gate_floor", topics.gate_floor);
        errors
    }
}

impl MailweaveConfig {
    /// Validate the entire configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        errors.extend(self.generation.validate());
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format: {}",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
