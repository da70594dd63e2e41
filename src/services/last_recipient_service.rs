use std::fs;
use std::path::PathBuf;
use log::warn;
use crate::config;
use crate::models::last_recipient::LastRecipient;

/// One JSON file per messenger: `last-recipient-<messenger>.json`.
#[derive(Debug, Clone)]
pub struct LastRecipientStore {
    dir: PathBuf,
}

impl LastRecipientStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        LastRecipientStore { dir: dir.into() }
    }

    fn file_for(&self, messenger: &str) -> PathBuf {
        self.dir
            .join(format!("last-recipient-{}.json", messenger.to_lowercase()))
    }

    pub fn load(&self, messenger: &str) -> Option<LastRecipient> {
        let contents = fs::read_to_string(self.file_for(messenger)).ok()?;
        match serde_json::from_str(&contents) {
            Ok(recipient) => Some(recipient),
            Err(e) => {
                warn!("Ignoring unreadable last recipient for {}: {}", messenger, e);
                None
            }
        }
    }

    pub fn save(&self, messenger: &str, recipient: &LastRecipient) -> std::io::Result<()> {
        let json = serde_json::to_string(recipient)?;
        fs::write(self.file_for(messenger), json)
    }
}

impl Default for LastRecipientStore {
    fn default() -> Self {
        Self::new(config::data_dir())
    }
}
