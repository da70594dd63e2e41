use std::fs;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use crate::config;

/// One sent message as kept on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub contact: String,
    pub timestamp: DateTime<Utc>,
}

/// Newest-first log of sent messages, capped at a fixed length.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryStore { path: path.into() }
    }

    pub fn load(&self) -> Vec<HistoryEntry> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Discarding unreadable history {}: {}", self.path.display(), e);
            Vec::new()
        })
    }

    pub fn push(&self, text: &str, contact: &str) -> std::io::Result<HistoryEntry> {
        let entry = HistoryEntry {
            text: text.to_string(),
            contact: contact.to_string(),
            timestamp: Utc::now(),
        };
        let mut entries = self.load();
        entries.insert(0, entry.clone());
        entries.truncate(config::HISTORY_MAX_ENTRIES);
        fs::write(&self.path, serde_json::to_string(&entries)?)?;
        Ok(entry)
    }
}
