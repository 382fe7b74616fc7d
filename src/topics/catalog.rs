//! Topic archetype catalog: archetype definitions plus the tag tables used to profile
//! participants. Loaded once per run and shared read-only.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../assets/topic_archetypes.json");

/// Audience shape of a thread, derived from the internal flags of its first addressees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    InternalInternal,
    InternalExternal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipWeights {
    #[serde(default = "default_weight")]
    pub internal_internal: f64,
    #[serde(default = "default_weight")]
    pub internal_external: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for RelationshipWeights {
    fn default() -> Self {
        Self {
            internal_internal: default_weight(),
            internal_external: default_weight(),
        }
    }
}

impl RelationshipWeights {
    pub fn for_kind(&self, kind: RelationshipKind) -> f64 {
        match kind {
            RelationshipKind::InternalInternal => self.internal_internal,
            RelationshipKind::InternalExternal => self.internal_external,
        }
    }
}

/// Gating and weighting rules for an archetype. Empty tag sets never gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TopicConstraints {
    #[serde(default)]
    pub sender_any_of: Vec<String>,
    #[serde(default)]
    pub recipient_any_of: Vec<String>,
    #[serde(default)]
    pub cc_any_of: Vec<String>,
    #[serde(default)]
    pub relationship: RelationshipWeights,
    /// Lowercase industry name to multiplier; unlisted industries count as 1.0
    #[serde(default)]
    pub industry_weights: HashMap<String, f64>,
}

impl TopicConstraints {
    pub fn industry_factor(&self, industry: &str) -> f64 {
        self.industry_weights
            .get(&industry.trim().to_ascii_lowercase())
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicArchetype {
    pub id: String,
    pub category: String,
    pub intent: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub required_entities: Vec<String>,
    #[serde(default)]
    pub optional_entities: Vec<String>,
    #[serde(default = "default_weight")]
    pub base_weight: f64,
    /// Guidance given to the completion capability when writing the subject and body
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub constraints: TopicConstraints,
    /// Month number (1-12) to multiplier
    #[serde(default)]
    pub seasonal: Option<BTreeMap<u32, f64>>,
}

impl TopicArchetype {
    pub fn seasonal_multiplier(&self, month: u32) -> f64 {
        self.seasonal
            .as_ref()
            .and_then(|months| months.get(&month).copied())
            .unwrap_or(1.0)
    }
}

/// Default tag weights keyed by lowercase department or role keyword.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagProfileTables {
    #[serde(default)]
    pub departments: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub roles: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub industry_multipliers: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCatalog {
    pub archetypes: Vec<TopicArchetype>,
    #[serde(default)]
    pub profiles: TagProfileTables,
}

impl TopicCatalog {
    pub fn builtin() -> Result<Self, EngineError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let catalog: TopicCatalog = serde_json::from_str(json)
            .map_err(|e| EngineError::CatalogError(format!("Invalid topic catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::CatalogError(format!("Failed to read topic catalog {:?}: {}", path, e))
        })?;
        Self::from_json(&json)
    }

    /// Built-in catalog unless a path is configured.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, EngineError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.archetypes.is_empty() {
            return Err(EngineError::CatalogError(
                "Topic catalog has no archetypes".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for archetype in &self.archetypes {
            if !seen.insert(archetype.id.as_str()) {
                return Err(EngineError::CatalogError(format!(
                    "Duplicate topic archetype id '{}'",
                    archetype.id
                )));
            }
            if !archetype.base_weight.is_finite() || archetype.base_weight < 0.0 {
                return Err(EngineError::CatalogError(format!(
                    "Topic archetype '{}' has invalid base weight {}",
                    archetype.id, archetype.base_weight
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TopicArchetype> {
        self.archetypes.iter().find(|a| a.id == id)
    }

    pub fn first(&self) -> &TopicArchetype {
        &self.archetypes[0]
    }
}
