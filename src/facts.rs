//! Thread fact table: rolling continuity memory built from committed emails.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Facts a draft response may report about itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactUpdate {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
}

impl FactUpdate {
    pub fn is_empty(&self) -> bool {
        self.events.iter().all(|s| s.trim().is_empty())
            && self.decisions.iter().all(|s| s.trim().is_empty())
            && self.conflicts.iter().all(|s| s.trim().is_empty())
            && self.open_questions.iter().all(|s| s.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ThreadFactTable {
    max_entries: usize,
    participants: BTreeSet<String>,
    events: VecDeque<String>,
    decisions: VecDeque<String>,
    conflicts: VecDeque<String>,
    open_questions: VecDeque<String>,
}

impl ThreadFactTable {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            participants: BTreeSet::new(),
            events: VecDeque::new(),
            decisions: VecDeque::new(),
            conflicts: VecDeque::new(),
            open_questions: VecDeque::new(),
        }
    }

    pub fn record_participants<'a>(&mut self, emails: impl IntoIterator<Item = &'a str>) {
        for email in emails {
            self.participants.insert(email.to_ascii_lowercase());
        }
    }

    /// Fold a committed email into the table. When the response carried no facts the
    /// derived event line stands in for them.
    pub fn apply(&mut self, update: &FactUpdate, derived_event: &str) {
        if update.is_empty() {
            push_bounded(&mut self.events, derived_event, self.max_entries);
            return;
        }
        for event in &update.events {
            push_bounded(&mut self.events, event, self.max_entries);
        }
        for decision in &update.decisions {
            push_bounded(&mut self.decisions, decision, self.max_entries);
        }
        for conflict in &update.conflicts {
            push_bounded(&mut self.conflicts, conflict, self.max_entries);
        }
        for question in &update.open_questions {
            push_bounded(&mut self.open_questions, question, self.max_entries);
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = &String> {
        self.participants.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = &String> {
        self.events.iter()
    }

    pub fn decisions(&self) -> impl Iterator<Item = &String> {
        self.decisions.iter()
    }

    pub fn open_questions(&self) -> impl Iterator<Item = &String> {
        self.open_questions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.decisions.is_empty()
            && self.conflicts.is_empty()
            && self.open_questions.is_empty()
    }

    /// Compact text block for prompts.
    pub fn to_prompt_context(&self) -> String {
        if self.is_empty() {
            return "No earlier emails in this thread.".to_string();
        }
        let mut out = String::new();
        if !self.participants.is_empty() {
            let people: Vec<&str> = self.participants.iter().map(String::as_str).collect();
            out.push_str(&format!("Participants so far: {}\n", people.join(", ")));
        }
        for (heading, entries) in [
            ("Events", &self.events),
            ("Decisions", &self.decisions),
            ("Conflicts", &self.conflicts),
            ("Open questions", &self.open_questions),
        ] {
            if entries.is_empty() {
                continue;
            }
            out.push_str(heading);
            out.push_str(":\n");
            for entry in entries {
                out.push_str("- ");
                out.push_str(entry);
                out.push('\n');
            }
        }
        out.trim_end().to_string()
    }
}

fn push_bounded(list: &mut VecDeque<String>, value: &str, max: usize) {
    let value = value.trim();
    if value.is_empty() || list.iter().any(|existing| existing == value) {
        return;
    }
    list.push_back(value.to_string());
    while list.len() > max {
        list.pop_front();
    }
}
