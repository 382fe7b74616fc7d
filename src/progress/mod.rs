//! Progress reporting for generation runs.
//!
//! Snapshots are self-contained so sinks can tolerate out-of-order delivery when threads
//! finish concurrently: a consumer only ever needs the largest `completed` it has seen.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub ts: String,
    pub completed: usize,
    pub total: usize,
    pub label: String,
}

impl ProgressSnapshot {
    pub fn with_now(completed: usize, total: usize, label: impl Into<String>) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            completed,
            total,
            label: label.into(),
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, snapshot: ProgressSnapshot);
}

/// Logs each snapshot at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn report(&self, snapshot: ProgressSnapshot) {
        info!(
            completed = snapshot.completed,
            total = snapshot.total,
            label = %snapshot.label,
            "Progress"
        );
    }
}

/// Forwards snapshots over an in-process channel.
#[derive(Clone)]
pub struct ChannelProgressSink {
    sender: Sender<ProgressSnapshot>,
}

impl ChannelProgressSink {
    pub fn new_pair() -> (Self, Receiver<ProgressSnapshot>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn report(&self, snapshot: ProgressSnapshot) {
        // A dropped receiver only means nobody is watching any more
        let _ = self.sender.send(snapshot);
    }
}
