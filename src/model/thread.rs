use crate::model::attachment::PlannedAttachment;
use crate::model::participant::{Mailbox, Participant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Responsive,
    NonResponsive,
}

/// One email thread owned by a story beat.
///
/// The message list is sized once when the thread is created and populated in place;
/// the engine never adds or removes entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailThread {
    pub id: String,
    pub relevance: Relevance,
    pub hot: bool,
    pub topic: Option<String>,
    pub subject: Option<String>,
    pub participants: Vec<Participant>,
    pub messages: Vec<EmailMessage>,
}

impl EmailThread {
    pub fn new(
        id: impl Into<String>,
        relevance: Relevance,
        hot: bool,
        participants: Vec<Participant>,
        email_count: usize,
    ) -> Self {
        let id = id.into();
        let messages = (0..email_count)
            .map(|index| EmailMessage::placeholder(&id, index))
            .collect();
        Self {
            id,
            relevance,
            hot,
            topic: None,
            subject: None,
            participants,
            messages,
        }
    }

    pub fn email_count(&self) -> usize {
        self.messages.len()
    }

    pub fn message_id(thread_id: &str, index: usize) -> String {
        format!("{}-{:03}", thread_id, index)
    }

    pub fn participant(&self, email: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
    }

    pub fn committed_count(&self) -> usize {
        self.messages.iter().filter(|m| m.committed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.messages.iter().filter(|m| m.generation_failed).count()
    }
}

/// A single message slot within a thread. Starts as a placeholder and is
/// replaced wholesale when its slot commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub thread_id: String,
    pub parent_id: Option<String>,
    pub root_id: String,
    pub branch_id: u32,
    pub sequence_index: usize,
    pub from: Option<Mailbox>,
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub subject: String,
    pub body_plain: String,
    pub body_html: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub attachments: Vec<PlannedAttachment>,
    pub generation_failed: bool,
    pub failure_reason: Option<String>,
    pub committed: bool,
}

impl EmailMessage {
    pub fn placeholder(thread_id: &str, index: usize) -> Self {
        Self {
            id: EmailThread::message_id(thread_id, index),
            thread_id: thread_id.to_string(),
            parent_id: None,
            root_id: EmailThread::message_id(thread_id, 0),
            branch_id: 0,
            sequence_index: index,
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            subject: String::new(),
            body_plain: String::new(),
            body_html: String::new(),
            sent_at: None,
            attachments: Vec::new(),
            generation_failed: false,
            failure_reason: None,
            committed: false,
        }
    }

    /// Every address on the message: sender, then to, then cc.
    pub fn addressees(&self) -> impl Iterator<Item = &Mailbox> {
        self.from.iter().chain(self.to.iter()).chain(self.cc.iter())
    }

    /// Recipients only (to then cc).
    pub fn recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to.iter().chain(self.cc.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_thread_has_fixed_placeholder_count() {
        let thread = EmailThread::new("t1", Relevance::Responsive, false, Vec::new(), 4);
        assert_eq!(thread.email_count(), 4);
        let indices: Vec<usize> = thread.messages.iter().map(|m| m.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(thread.messages.iter().all(|m| m.root_id == "t1-000"));
        assert_eq!(thread.committed_count(), 0);
    }
}
