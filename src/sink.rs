//! Message sinks: persistence of finished threads.

use crate::error::EngineError;
use crate::model::EmailThread;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Persist one finished thread under `output`, one file per message. Saving the same
    /// thread again is a no-op. Returns the number of files written.
    async fn save_thread(&self, thread: &EmailThread, output: &Path) -> Result<usize, EngineError>;
}

/// Writes `<output>/<thread>/<index>_<message id>.json` plus rendered attachment bytes under
/// `<output>/<thread>/attachments/`.
#[derive(Debug, Default)]
pub struct JsonFileSink {
    saved: Mutex<HashSet<String>>,
}

impl JsonFileSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_dir(output: &Path, thread_id: &str) -> PathBuf {
        output.join(sanitize(thread_id))
    }

    pub fn is_saved(&self, thread_id: &str) -> bool {
        self.saved.lock().contains(thread_id)
    }
}

/// File-system-safe form of an identifier; distinct ids may collide.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn io_error(path: &Path, err: std::io::Error) -> EngineError {
    EngineError::SinkError(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl MessageSink for JsonFileSink {
    async fn save_thread(&self, thread: &EmailThread, output: &Path) -> Result<usize, EngineError> {
        if self.is_saved(&thread.id) {
            debug!(thread_id = %thread.id, "Thread already saved; skipping");
            return Ok(0);
        }

        let dir = Self::thread_dir(output, &thread.id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let mut written = 0usize;
        for message in &thread.messages {
            let path = dir.join(format!(
                "{:03}_{}.json",
                message.sequence_index,
                sanitize(&message.id)
            ));
            let json = serde_json::to_vec_pretty(message)
                .map_err(|e| EngineError::SinkError(format!("{}: {}", message.id, e)))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| io_error(&path, e))?;
            written += 1;

            for attachment in &message.attachments {
                let Some(content) = attachment.content.as_ref() else {
                    continue;
                };
                let attachments_dir = dir.join("attachments");
                tokio::fs::create_dir_all(&attachments_dir)
                    .await
                    .map_err(|e| io_error(&attachments_dir, e))?;
                let path = attachments_dir.join(sanitize(&attachment.file_name));
                tokio::fs::write(&path, content)
                    .await
                    .map_err(|e| io_error(&path, e))?;
                written += 1;
            }
        }

        self.saved.lock().insert(thread.id.clone());
        debug!(thread_id = %thread.id, files = written, dir = %dir.display(), "Thread saved");
        Ok(written)
    }
}
