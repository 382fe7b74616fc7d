use crate::error::EngineError;
use crate::model::thread::EmailThread;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storyline {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub beats: Vec<StoryBeat>,
}

/// A narrative beat: a date window and a target number of emails split across threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryBeat {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plot: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub email_count: usize,
    pub threads: Vec<EmailThread>,
}

impl StoryBeat {
    /// Checks the beat's structural contract. Violations are fatal for the run.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.threads.is_empty() {
            return Err(EngineError::ContractViolation(format!(
                "Beat '{}' has no threads",
                self.id
            )));
        }
        let thread_total: usize = self.threads.iter().map(EmailThread::email_count).sum();
        if thread_total != self.email_count {
            return Err(EngineError::ContractViolation(format!(
                "Beat '{}' email count mismatch: target {}, threads sum to {}",
                self.id, self.email_count, thread_total
            )));
        }
        if self.end < self.start {
            return Err(EngineError::ContractViolation(format!(
                "Beat '{}' window ends before it starts",
                self.id
            )));
        }
        for thread in &self.threads {
            if thread.email_count() == 0 {
                return Err(EngineError::ContractViolation(format!(
                    "Thread '{}' in beat '{}' has a target of zero emails",
                    thread.id, self.id
                )));
            }
            if thread.participants.is_empty() {
                return Err(EngineError::ContractViolation(format!(
                    "Thread '{}' in beat '{}' has no participants",
                    thread.id, self.id
                )));
            }
        }
        Ok(())
    }
}

impl Storyline {
    pub fn validate(&self) -> Result<(), EngineError> {
        for beat in &self.beats {
            beat.validate()?;
        }
        Ok(())
    }

    pub fn total_emails(&self) -> usize {
        self.beats.iter().map(|b| b.email_count).sum()
    }
}
