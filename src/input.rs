//! Generation input: characters and storylines produced upstream, as JSON.

use crate::error::EngineError;
use crate::model::{EmailThread, Participant, Relevance, StoryBeat, Storyline};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationInput {
    pub characters: Vec<Participant>,
    pub storylines: Vec<StorylineInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorylineInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub beats: Vec<BeatInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeatInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plot: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub email_count: usize,
    pub threads: Vec<ThreadInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadInput {
    pub id: String,
    #[serde(default = "default_relevance")]
    pub relevance: Relevance,
    #[serde(default)]
    pub hot: bool,
    pub email_count: usize,
    /// Participant email addresses, matched case-insensitively against `characters`
    pub participants: Vec<String>,
}

fn default_relevance() -> Relevance {
    Relevance::Responsive
}

impl GenerationInput {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Resolve participant references and size every thread's placeholder list.
    pub fn into_storylines(self) -> Result<Vec<Storyline>, EngineError> {
        let characters: HashMap<String, Participant> = self
            .characters
            .into_iter()
            .map(|p| (p.email.to_ascii_lowercase(), p))
            .collect();

        self.storylines
            .into_iter()
            .map(|storyline| {
                let beats = storyline
                    .beats
                    .into_iter()
                    .map(|beat| build_beat(beat, &characters))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Storyline {
                    id: storyline.id,
                    title: storyline.title,
                    summary: storyline.summary,
                    beats,
                })
            })
            .collect()
    }
}

fn build_beat(
    beat: BeatInput,
    characters: &HashMap<String, Participant>,
) -> Result<StoryBeat, EngineError> {
    let threads = beat
        .threads
        .into_iter()
        .map(|thread| {
            let participants = thread
                .participants
                .iter()
                .map(|email| {
                    characters
                        .get(&email.to_ascii_lowercase())
                        .cloned()
                        .ok_or_else(|| {
                            EngineError::ContractViolation(format!(
                                "Thread '{}' references unknown participant '{}'",
                                thread.id, email
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EmailThread::new(
                thread.id,
                thread.relevance,
                thread.hot,
                participants,
                thread.email_count,
            ))
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    Ok(StoryBeat {
        id: beat.id,
        name: beat.name,
        plot: beat.plot,
        start: beat.start,
        end: beat.end,
        email_count: beat.email_count,
        threads,
    })
}
