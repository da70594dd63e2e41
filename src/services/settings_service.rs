use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use log::{info, warn};
use serde_json::Value;
use crate::config;
use crate::models::settings::{
    CredentialKey, GmailSettings, OpenAiSettings, Service, ServiceStatus, Settings, SettingsStatus,
    SlackSettings, TelegramSettings,
};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed credential bag with environment fallback.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    env_fallback: bool,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore {
            path: path.into(),
            env_fallback: true,
        }
    }

    /// Ignores process environment; the file is the only source.
    pub fn without_env_fallback(mut self) -> Self {
        self.env_fallback = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Settings: failed to parse {:?}: {}", self.path, e);
                    Settings::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                warn!("Settings: failed to read {:?}: {}", self.path, e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(settings)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Settings file first, then the mapped environment variable.
    pub fn credential(&self, key: CredentialKey) -> Option<String> {
        if let Some(value) = self.load().get(key) {
            return Some(value.to_string());
        }
        if !self.env_fallback {
            return None;
        }
        std::env::var(key.env_var()).ok().filter(|v| !v.is_empty())
    }

    pub fn is_configured(&self, service: Service) -> bool {
        service.keys().iter().all(|key| self.credential(*key).is_some())
    }

    /// Booleans only. Secrets never leave the store.
    pub fn status(&self) -> SettingsStatus {
        Service::ALL
            .iter()
            .map(|service| {
                let fields = service
                    .keys()
                    .iter()
                    .map(|key| (key.field().to_string(), self.credential(*key).is_some()))
                    .collect::<std::collections::BTreeMap<_, _>>();
                let configured = fields.values().all(|present| *present);
                (
                    service.as_str().to_string(),
                    ServiceStatus {
                        configured,
                        fields,
                        authenticated: None,
                    },
                )
            })
            .collect()
    }

    /// Replaces one service section from a request body. A body missing any
    /// required field removes the section instead.
    pub fn update(&self, service: &str, body: &Value) -> Result<(), SettingsError> {
        let service: Service = service
            .parse()
            .map_err(|_| SettingsError::UnknownService(service.to_string()))?;

        let mut settings = self.load();
        let field = |key: CredentialKey| field_string(body, key.field());
        let complete = service.keys().iter().all(|key| field(*key).is_some());

        if !complete {
            settings.clear(service);
        } else {
            match service {
                Service::OpenAi => {
                    settings.openai = Some(OpenAiSettings {
                        api_key: field(CredentialKey::OpenAiApiKey),
                    })
                }
                Service::Telegram => {
                    settings.telegram = Some(TelegramSettings {
                        api_id: field(CredentialKey::TelegramApiId),
                        api_hash: field(CredentialKey::TelegramApiHash),
                    })
                }
                Service::Slack => {
                    settings.slack = Some(SlackSettings {
                        user_token: field(CredentialKey::SlackUserToken),
                    })
                }
                Service::Gmail => {
                    settings.gmail = Some(GmailSettings {
                        address: field(CredentialKey::GmailAddress),
                        app_password: field(CredentialKey::GmailAppPassword),
                    })
                }
            }
        }

        self.save(&settings)?;
        info!("Settings updated for {}", service);
        Ok(())
    }

    pub fn remove(&self, service: &str) -> Result<(), SettingsError> {
        let service: Service = service
            .parse()
            .map_err(|_| SettingsError::UnknownService(service.to_string()))?;
        let mut settings = self.load();
        settings.clear(service);
        self.save(&settings)?;
        info!("Settings removed for {}", service);
        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(config::data_dir().join(config::SETTINGS_FILE))
    }
}

// Numbers are accepted too; Telegram api ids are often typed as integers.
fn field_string(body: &Value, name: &str) -> Option<String> {
    match body.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
