use crate::config::TopicSettings;
use crate::model::Participant;
use crate::topics::catalog::TagProfileTables;
use std::collections::HashMap;

/// Squashed tag presence for one participant, each value in (0, 1).
#[derive(Debug, Clone)]
pub struct TagProfile {
    raw: HashMap<String, f64>,
    threshold: f64,
    steepness: f64,
}

impl TagProfile {
    /// Department and role keywords match when contained in the participant's field
    /// (case-insensitive). Overlapping matches keep the strongest weight per tag; the
    /// department and role contributions add up before the industry multiplier applies.
    pub fn build(participant: &Participant, tables: &TagProfileTables, settings: &TopicSettings) -> Self {
        let department = participant.department.to_ascii_lowercase();
        let role = participant.role.to_ascii_lowercase();

        let department_weights = strongest_matches(&tables.departments, &department);
        let role_weights = strongest_matches(&tables.roles, &role);

        let industry = tables
            .industry_multipliers
            .get(&participant.industry.trim().to_ascii_lowercase())
            .copied()
            .unwrap_or(1.0);

        let mut raw = department_weights;
        for (tag, weight) in role_weights {
            *raw.entry(tag).or_insert(0.0) += weight;
        }
        for weight in raw.values_mut() {
            *weight *= industry;
        }

        Self {
            raw,
            threshold: settings.presence_threshold,
            steepness: settings.presence_steepness,
        }
    }

    pub fn presence(&self, tag: &str) -> f64 {
        let raw = self.raw.get(tag).copied().unwrap_or(0.0);
        logistic(raw, self.threshold, self.steepness)
    }

    /// `1 - Π(1 - presence)` over `tags`; an empty tag set does not gate.
    pub fn gate(&self, tags: &[String]) -> f64 {
        if tags.is_empty() {
            return 1.0;
        }
        1.0 - tags
            .iter()
            .map(|tag| 1.0 - self.presence(tag))
            .product::<f64>()
    }

    /// Mean presence over `tags`.
    pub fn mean_presence(&self, tags: &[String]) -> f64 {
        if tags.is_empty() {
            return 0.0;
        }
        tags.iter().map(|tag| self.presence(tag)).sum::<f64>() / tags.len() as f64
    }

    /// Share of `tags` this participant plausibly carries (presence at least one half).
    pub fn coverage(&self, tags: &[String]) -> f64 {
        if tags.is_empty() {
            return 1.0;
        }
        let covered = tags.iter().filter(|tag| self.presence(tag) >= 0.5).count();
        covered as f64 / tags.len() as f64
    }
}

fn strongest_matches(
    table: &HashMap<String, HashMap<String, f64>>,
    field: &str,
) -> HashMap<String, f64> {
    let mut out: HashMap<String, f64> = HashMap::new();
    if field.trim().is_empty() {
        return out;
    }
    for (keyword, weights) in table {
        if !field.contains(keyword.as_str()) {
            continue;
        }
        for (tag, weight) in weights {
            let entry = out.entry(tag.clone()).or_insert(0.0);
            if *weight > *entry {
                *entry = *weight;
            }
        }
    }
    out
}

fn logistic(value: f64, threshold: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-steepness * (value - threshold)).exp())
}
