//! File-based stores: append-only JSON-lines files.
//!
//! - chat history: `<dir>/<chat_id>.jsonl`, one `StoredMessage` per line
//! - transcripts: `<dir>/<session_id>.jsonl`, one `Message` per line
//!
//! Files are human-inspectable and need no database. Writes append a single
//! line; reads parse the whole file.

use async_trait::async_trait;
use recollect_core::error::StorageError;
use recollect_core::message::Message;
use recollect_core::session::SessionId;
use recollect_core::store::{MessageStore, StoredMessage, TranscriptStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Keep ids from escaping the store directory.
fn file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.jsonl", safe.trim_start_matches('.'))
}

async fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let mut line = serde_json::to_string(record).map_err(|e| StorageError::Corrupted {
        path: path.display().to_string(),
        reason: format!("failed to serialize record: {e}"),
    })?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io_error(path, e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| io_error(path, e))?;
    file.flush().await.map_err(|e| io_error(path, e))
}

/// Read every line of a JSONL file. `None` if the file does not exist.
async fn read_lines(path: &Path) -> Result<Option<String>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

fn parse_lenient<T: DeserializeOwned>(path: &Path, content: &str) -> Vec<T> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupted record");
                None
            }
        })
        .collect()
}

// ── Chat history ──────────────────────────────────────────────────────────

/// Per-chat message history on disk.
pub struct FileMessageStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMessageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn chat_path(&self, chat_id: &str) -> PathBuf {
        self.dir.join(file_name(chat_id))
    }

    pub async fn append(&self, chat_id: &str, message: &StoredMessage) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        append_line(&self.chat_path(chat_id), message).await
    }

    /// Every stored turn for `chat_id`, oldest first.
    pub async fn all_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, StorageError> {
        let path = self.chat_path(chat_id);
        Ok(read_lines(&path)
            .await?
            .map(|content| parse_lenient(&path, &content))
            .unwrap_or_default())
    }

    /// Ids of every chat with a history file.
    pub async fn chat_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir, e)),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn get_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let mut messages = self.all_messages(chat_id).await?;
        let skip = messages.len().saturating_sub(limit);
        messages.drain(..skip);
        debug!(chat_id, count = messages.len(), "Loaded recent messages");
        Ok(messages)
    }
}

// ── Transcripts ───────────────────────────────────────────────────────────

/// Append-only session transcripts on disk.
pub struct FileTranscriptStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn transcript_path(&self, session_id: &SessionId) -> PathBuf {
        self.dir.join(file_name(session_id.as_str()))
    }
}

#[async_trait]
impl TranscriptStore for FileTranscriptStore {
    async fn append_to_transcript(
        &self,
        session_id: &SessionId,
        message: &Message,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        append_line(&self.transcript_path(session_id), message).await
    }

    /// A transcript line that fails to parse is an error: silently dropping a
    /// tool call would leave its result orphaned.
    async fn read_transcript(&self, session_id: &SessionId) -> Result<Vec<Message>, StorageError> {
        let path = self.transcript_path(session_id);
        let content = read_lines(&path)
            .await?
            .ok_or_else(|| StorageError::SessionNotFound(session_id.to_string()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<Message>(line).map_err(|e| StorageError::Corrupted {
                    path: path.display().to_string(),
                    reason: format!("line {}: {e}", n + 1),
                })
            })
            .collect()
    }
}
