//! Message History
//!
//! Persistence hook for finished messages. The session driver calls the sink
//! once per message, when the message becomes `Complete`. A failing sink
//! never affects the live session.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::messages::Message;

/// Errors from a history backend
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The backend could not be written
    #[error("History write failed for {path}: {source}")]
    Io {
        /// Destination that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The message could not be serialised
    #[error("History encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives each message once it is complete
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Persist one completed message
    async fn save(&self, message: &Message) -> Result<(), HistoryError>;
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHistory;

#[async_trait]
impl HistorySink for NoopHistory {
    async fn save(&self, _message: &Message) -> Result<(), HistoryError> {
        Ok(())
    }
}

/// Appends completed messages to a file, one JSON object per line
#[derive(Clone, Debug)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    /// Write to `path`, creating it on first save
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl HistorySink for JsonlHistory {
    async fn save(&self, message: &Message) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        tracing::trace!(message_id = %message.id, path = %self.path.display(), "Message saved");
        Ok(())
    }
}
