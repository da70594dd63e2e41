//! Messenger adapters and the registry that builds them.
//!
//! Every adapter implements [`Messenger`]. Folder-style backends (mail) also
//! expose a [`FolderMessenger`] through [`Messenger::folders`].

pub mod gmail;
pub mod imap_backend;
pub mod mail_text;
pub mod slack;
pub mod telegram;

use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;
use crate::config;
use crate::models::conversation::{Contact, Folder, FolderMessage, Message};
use crate::models::settings::{CredentialKey, Service};
use crate::services::settings_service::CredentialStore;

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("Unknown messenger: \"{0}\"")]
    UnknownMessenger(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{service} API error: {message}")]
    Api { service: &'static str, message: String },
}

#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &str;

    /// One-time handshake. Invalid credentials must surface here.
    async fn init(&self) -> Result<(), MessengerError>;

    async fn get_contacts(&self) -> Result<Vec<Contact>, MessengerError>;

    async fn get_messages(&self, entity_id: &str, limit: usize) -> Result<Vec<Message>, MessengerError>;

    async fn send_message(&self, text: &str, recipient: &str) -> Result<(), MessengerError>;

    fn folders(&self) -> Option<&dyn FolderMessenger> {
        None
    }

    fn has_folders(&self) -> bool {
        self.folders().is_some()
    }
}

/// Mailbox-style capabilities.
#[async_trait]
pub trait FolderMessenger: Send + Sync {
    async fn get_folders(&self) -> Result<Vec<Folder>, MessengerError>;

    async fn get_folder_messages(&self, folder_id: &str, limit: usize) -> Result<Vec<FolderMessage>, MessengerError>;

    async fn get_folder_message(&self, folder_id: &str, message_id: &str) -> Result<FolderMessage, MessengerError>;

    async fn reply_to_message(&self, message_id: &str, text: &str) -> Result<(), MessengerError>;
}

pub trait MessengerFactory: Send + Sync {
    /// Lowercase names of messengers whose credentials are present.
    fn available(&self) -> Vec<String>;

    /// Builds a fresh, uninitialised adapter.
    fn create(&self, name: &str) -> Result<Arc<dyn Messenger>, MessengerError>;
}

/// "telegram" -> "Telegram"
pub fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct MessengerRegistry {
    credentials: CredentialStore,
    telegram_session: PathBuf,
}

impl MessengerRegistry {
    pub fn new(credentials: CredentialStore, telegram_session: impl Into<PathBuf>) -> Self {
        MessengerRegistry {
            credentials,
            telegram_session: telegram_session.into(),
        }
    }

    fn required(&self, key: CredentialKey) -> Result<String, MessengerError> {
        self.credentials.credential(key).ok_or_else(|| {
            MessengerError::NotConfigured(format!(
                "Missing {} credential: {}",
                key.service(),
                key.field()
            ))
        })
    }
}

impl Default for MessengerRegistry {
    fn default() -> Self {
        Self::new(
            CredentialStore::default(),
            config::data_dir().join(config::TELEGRAM_SESSION_FILE),
        )
    }
}

impl MessengerFactory for MessengerRegistry {
    fn available(&self) -> Vec<String> {
        [Service::Telegram, Service::Slack, Service::Gmail]
            .iter()
            .filter(|service| self.credentials.is_configured(**service))
            .map(|service| service.as_str().to_string())
            .collect()
    }

    fn create(&self, name: &str) -> Result<Arc<dyn Messenger>, MessengerError> {
        match name {
            "telegram" => {
                let api_id = self.required(CredentialKey::TelegramApiId)?;
                let api_id: i32 = api_id.parse().map_err(|_| {
                    MessengerError::NotConfigured("Telegram apiId must be numeric".to_string())
                })?;
                let api_hash = self.required(CredentialKey::TelegramApiHash)?;
                Ok(Arc::new(telegram::TelegramMessenger::new(
                    api_id,
                    api_hash,
                    self.telegram_session.clone(),
                )?))
            }
            "slack" => {
                let token = self.required(CredentialKey::SlackUserToken)?;
                Ok(Arc::new(slack::SlackMessenger::new(token)?))
            }
            "gmail" => {
                let address = self.required(CredentialKey::GmailAddress)?;
                let app_password = self.required(CredentialKey::GmailAppPassword)?;
                let backend = imap_backend::GmailTransport::new(address.clone(), app_password)?;
                Ok(Arc::new(gmail::GmailMessenger::new(address, backend)))
            }
            other => Err(MessengerError::UnknownMessenger(other.to_string())),
        }
    }
}
