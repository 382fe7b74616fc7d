//! Topic Archetype Selector
//!
//! Gates and scores every catalog archetype against the thread's opening audience, then
//! samples one with a per-thread temperature. Used only for non-responsive threads.

use crate::config::TopicSettings;
use crate::model::Participant;
use crate::rng::ThreadRng;
use crate::topics::catalog::{RelationshipKind, TopicArchetype, TopicCatalog};
use crate::topics::profile::TagProfile;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, trace};

const MIN_TEMPERATURE: f64 = 0.35;
const MAX_TEMPERATURE: f64 = 3.0;

/// The opening audience of a thread.
pub struct TopicAudience<'a> {
    pub sender: &'a Participant,
    pub recipients: Vec<&'a Participant>,
    /// Month (1-12) the thread opens in
    pub month: u32,
}

impl TopicAudience<'_> {
    pub fn relationship(&self) -> RelationshipKind {
        if self.sender.internal && self.recipients.iter().all(|r| r.internal) {
            RelationshipKind::InternalInternal
        } else {
            RelationshipKind::InternalExternal
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicSelection {
    pub archetype: TopicArchetype,
    pub score: f64,
    pub temperature: f64,
    /// True when nothing survived gating and the first archetype was used
    pub fallback: bool,
}

/// Score breakdown for one archetype; `None` from [`TopicSelector::score`] means gated out.
#[derive(Debug, Clone, Copy)]
pub struct ArchetypeScore {
    pub sender_gate: f64,
    pub recipient_gate: f64,
    pub score: f64,
}

pub struct TopicSelector {
    catalog: Arc<TopicCatalog>,
    settings: TopicSettings,
}

impl TopicSelector {
    pub fn new(catalog: Arc<TopicCatalog>, settings: TopicSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn catalog(&self) -> &TopicCatalog {
        &self.catalog
    }

    pub fn select(&self, audience: &TopicAudience<'_>, rng: &mut ThreadRng) -> TopicSelection {
        // Drawn first so the temperature does not depend on how many archetypes survive
        let temperature = self.sample_temperature(rng);

        let sender_profile =
            TagProfile::build(audience.sender, &self.catalog.profiles, &self.settings);
        let recipient_profiles: Vec<(TagProfile, &Participant)> = audience
            .recipients
            .iter()
            .map(|r| (TagProfile::build(r, &self.catalog.profiles, &self.settings), *r))
            .collect();

        let scored: Vec<(usize, f64)> = self
            .catalog
            .archetypes
            .iter()
            .enumerate()
            .filter_map(|(index, archetype)| {
                self.score(archetype, audience, &sender_profile, &recipient_profiles)
                    .map(|s| (index, s.score))
            })
            .filter(|(_, score)| *score > 0.0 && score.is_finite())
            .collect();

        let weights: Vec<f64> = scored
            .iter()
            .map(|(_, score)| score.powf(1.0 / temperature))
            .collect();

        match WeightedIndex::new(&weights) {
            Ok(dist) => {
                let (index, score) = scored[dist.sample(rng)];
                let archetype = self.catalog.archetypes[index].clone();
                debug!(
                    archetype = %archetype.id,
                    candidates = scored.len(),
                    temperature,
                    "Selected topic archetype"
                );
                TopicSelection {
                    archetype,
                    score,
                    temperature,
                    fallback: false,
                }
            }
            Err(_) => {
                let archetype = self.catalog.first().clone();
                debug!(
                    archetype = %archetype.id,
                    "No topic archetype survived gating; using first"
                );
                TopicSelection {
                    archetype,
                    score: 0.0,
                    temperature,
                    fallback: true,
                }
            }
        }
    }

    pub fn score(
        &self,
        archetype: &TopicArchetype,
        audience: &TopicAudience<'_>,
        sender_profile: &TagProfile,
        recipient_profiles: &[(TagProfile, &Participant)],
    ) -> Option<ArchetypeScore> {
        let constraints = &archetype.constraints;

        let relationship = constraints.relationship.for_kind(audience.relationship());
        if relationship <= 0.0 {
            trace!(archetype = %archetype.id, "Gated out by relationship");
            return None;
        }

        let sender_gate = sender_profile.gate(&constraints.sender_any_of);
        if sender_gate < self.settings.gate_floor {
            trace!(archetype = %archetype.id, sender_gate, "Gated out by sender");
            return None;
        }

        let recipient_gates: Vec<f64> = recipient_profiles
            .iter()
            .map(|(profile, _)| profile.gate(&constraints.recipient_any_of))
            .collect();
        let recipient_gate = blend(&recipient_gates);
        if recipient_gate < self.settings.gate_floor {
            trace!(archetype = %archetype.id, recipient_gate, "Gated out by recipients");
            return None;
        }

        let seasonal = archetype.seasonal_multiplier(audience.month);
        let sender_industry = constraints.industry_factor(&audience.sender.industry);
        let recipient_industry = top_two_mean(
            recipient_profiles
                .iter()
                .map(|(_, r)| constraints.industry_factor(&r.industry))
                .collect(),
        );

        let gamma = self.settings.gate_exponent;
        let sender_affinity = sender_profile.mean_presence(&archetype.tags);
        let best_recipient_affinity = recipient_profiles
            .iter()
            .map(|(profile, _)| profile.mean_presence(&archetype.tags))
            .fold(0.0_f64, f64::max);
        let affinity = 0.5 + 0.5 * ((sender_affinity + best_recipient_affinity) / 2.0);
        let coverage = if recipient_profiles.is_empty() {
            1.0
        } else {
            let total: f64 = recipient_profiles
                .iter()
                .map(|(profile, _)| profile.coverage(&archetype.tags))
                .sum();
            0.5 + 0.5 * (total / recipient_profiles.len() as f64)
        };

        let score = archetype.base_weight
            * relationship
            * seasonal
            * sender_industry
            * recipient_industry
            * sender_gate.powf(gamma)
            * recipient_gate.powf(gamma)
            * affinity
            * coverage;

        Some(ArchetypeScore {
            sender_gate,
            recipient_gate,
            score,
        })
    }

    /// Log-normal temperature with the configured mean, clamped to a sane range.
    fn sample_temperature(&self, rng: &mut ThreadRng) -> f64 {
        let sigma = self.settings.temperature_sigma.max(0.0);
        let mean = self.settings.temperature_mean.max(f64::EPSILON);
        let mu = mean.ln() - sigma * sigma / 2.0;
        // Box-Muller
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        (mu + sigma * z).exp().clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    }
}

/// `0.7 * max + 0.3 * mean`; no recipients means no recipient constraint.
fn blend(gates: &[f64]) -> f64 {
    if gates.is_empty() {
        return 1.0;
    }
    let max = gates.iter().copied().fold(0.0_f64, f64::max);
    let mean = gates.iter().sum::<f64>() / gates.len() as f64;
    0.7 * max + 0.3 * mean
}

fn top_two_mean(mut factors: Vec<f64>) -> f64 {
    if factors.is_empty() {
        return 1.0;
    }
    factors.sort_by(|a, b| b.total_cmp(a));
    let top = &factors[..factors.len().min(2)];
    top.iter().sum::<f64>() / top.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn person(name: &str, department: &str, internal: bool) -> Participant {
        let mut p = Participant::new(name, format!("{}@x.test", name.to_lowercase()));
        p.department = department.to_string();
        p.internal = internal;
        p
    }

    fn selector() -> TopicSelector {
        TopicSelector::new(
            Arc::new(TopicCatalog::builtin().unwrap()),
            TopicSettings::default(),
        )
    }

    #[test]
    fn blend_and_top_two() {
        assert_eq!(blend(&[]), 1.0);
        assert!((blend(&[1.0, 0.0]) - 0.85).abs() < 1e-9);
        assert_eq!(top_two_mean(vec![1.0, 3.0, 2.0]), 2.5);
        assert_eq!(top_two_mean(vec![]), 1.0);
    }

    #[test]
    fn same_seed_same_archetype() {
        let selector = selector();
        let sender = person("Ana", "Finance", true);
        let recipient = person("Ben", "Procurement", true);
        let audience = TopicAudience {
            sender: &sender,
            recipients: vec![&recipient],
            month: 3,
        };
        let a = selector.select(&audience, &mut ThreadRng::seed_from_u64(5));
        let b = selector.select(&audience, &mut ThreadRng::seed_from_u64(5));
        assert_eq!(a.archetype.id, b.archetype.id);
        assert_eq!(a.temperature, b.temperature);
        assert!(a.temperature >= MIN_TEMPERATURE && a.temperature <= MAX_TEMPERATURE);
    }

    #[test]
    fn external_audience_gates_internal_only_archetypes() {
        let selector = selector();
        let sender = person("Ana", "Human Resources", true);
        let outsider = person("Zed", "Sales", false);
        let audience = TopicAudience {
            sender: &sender,
            recipients: vec![&outsider],
            month: 10,
        };
        let sender_profile = TagProfile::build(
            &sender,
            &selector.catalog().profiles,
            &TopicSettings::default(),
        );
        let recipients = vec![(
            TagProfile::build(
                &outsider,
                &selector.catalog().profiles,
                &TopicSettings::default(),
            ),
            &outsider,
        )];
        let hr = selector.catalog().get("hr-benefits-enrollment").unwrap();
        assert!(selector
            .score(hr, &audience, &sender_profile, &recipients)
            .is_none());
    }

    #[test]
    fn falls_back_to_first_when_everything_is_gated() {
        let json = r#"{"archetypes":[
            {"id":"only-internal","category":"c","intent":"i",
             "constraints":{"relationship":{"internal_internal":1.0,"internal_external":0.0}}},
            {"id":"legal-only","category":"c","intent":"i",
             "constraints":{"sender_any_of":["legal"]}}
        ]}"#;
        let selector = TopicSelector::new(
            Arc::new(TopicCatalog::from_json(json).unwrap()),
            TopicSettings::default(),
        );
        let sender = person("Ana", "Sales", false);
        let recipient = person("Ben", "Sales", true);
        let selection = selector.select(
            &TopicAudience {
                sender: &sender,
                recipients: vec![&recipient],
                month: 1,
            },
            &mut ThreadRng::seed_from_u64(1),
        );
        assert!(selection.fallback);
        assert_eq!(selection.archetype.id, "only-internal");
    }
}
