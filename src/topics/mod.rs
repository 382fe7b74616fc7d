//! Topic archetypes for non-responsive threads: catalog, participant tag profiles,
//! weighted selection and synthetic entity values.

pub mod catalog;
pub mod entities;
pub mod profile;
pub mod selector;

pub use catalog::{RelationshipKind, TopicArchetype, TopicCatalog, TopicConstraints};
pub use entities::{complete_entities, synthetic_entity};
pub use profile::TagProfile;
pub use selector::{TopicAudience, TopicSelection, TopicSelector};
