use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Credentials persisted in `settings.json`. Never sent back to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmail: Option<GmailSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramSettings {
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub api_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackSettings {
    #[serde(default)]
    pub user_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailSettings {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub app_password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Service {
    OpenAi,
    Telegram,
    Slack,
    Gmail,
}

impl Service {
    pub const ALL: [Service; 4] = [Service::OpenAi, Service::Telegram, Service::Slack, Service::Gmail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::OpenAi => "openai",
            Service::Telegram => "telegram",
            Service::Slack => "slack",
            Service::Gmail => "gmail",
        }
    }

    pub fn keys(&self) -> &'static [CredentialKey] {
        match self {
            Service::OpenAi => &[CredentialKey::OpenAiApiKey],
            Service::Telegram => &[CredentialKey::TelegramApiId, CredentialKey::TelegramApiHash],
            Service::Slack => &[CredentialKey::SlackUserToken],
            Service::Gmail => &[CredentialKey::GmailAddress, CredentialKey::GmailAppPassword],
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .iter()
            .copied()
            .find(|svc| svc.as_str() == s)
            .ok_or_else(|| format!("Unknown service: {}", s))
    }
}

/// One credential field, addressable as `service.field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKey {
    OpenAiApiKey,
    TelegramApiId,
    TelegramApiHash,
    SlackUserToken,
    GmailAddress,
    GmailAppPassword,
}

impl CredentialKey {
    pub fn service(&self) -> Service {
        match self {
            CredentialKey::OpenAiApiKey => Service::OpenAi,
            CredentialKey::TelegramApiId | CredentialKey::TelegramApiHash => Service::Telegram,
            CredentialKey::SlackUserToken => Service::Slack,
            CredentialKey::GmailAddress | CredentialKey::GmailAppPassword => Service::Gmail,
        }
    }

    /// Field name as it appears in JSON bodies and status reports.
    pub fn field(&self) -> &'static str {
        match self {
            CredentialKey::OpenAiApiKey => "apiKey",
            CredentialKey::TelegramApiId => "apiId",
            CredentialKey::TelegramApiHash => "apiHash",
            CredentialKey::SlackUserToken => "userToken",
            CredentialKey::GmailAddress => "address",
            CredentialKey::GmailAppPassword => "appPassword",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            CredentialKey::OpenAiApiKey => "OPENAI_API_KEY",
            CredentialKey::TelegramApiId => "TELEGRAM_API_ID",
            CredentialKey::TelegramApiHash => "TELEGRAM_API_HASH",
            CredentialKey::SlackUserToken => "SLACK_USER_TOKEN",
            CredentialKey::GmailAddress => "GMAIL_ADDRESS",
            CredentialKey::GmailAppPassword => "GMAIL_APP_PASSWORD",
        }
    }
}

impl Settings {
    pub fn get(&self, key: CredentialKey) -> Option<&str> {
        let value = match key {
            CredentialKey::OpenAiApiKey => self.openai.as_ref().and_then(|s| s.api_key.as_deref()),
            CredentialKey::TelegramApiId => self.telegram.as_ref().and_then(|s| s.api_id.as_deref()),
            CredentialKey::TelegramApiHash => self.telegram.as_ref().and_then(|s| s.api_hash.as_deref()),
            CredentialKey::SlackUserToken => self.slack.as_ref().and_then(|s| s.user_token.as_deref()),
            CredentialKey::GmailAddress => self.gmail.as_ref().and_then(|s| s.address.as_deref()),
            CredentialKey::GmailAppPassword => self.gmail.as_ref().and_then(|s| s.app_password.as_deref()),
        };
        value.filter(|v| !v.is_empty())
    }

    pub fn clear(&mut self, service: Service) {
        match service {
            Service::OpenAi => self.openai = None,
            Service::Telegram => self.telegram = None,
            Service::Slack => self.slack = None,
            Service::Gmail => self.gmail = None,
        }
    }
}

/// What `/api/settings/status` reports for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub configured: bool,
    pub fields: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
}

pub type SettingsStatus = BTreeMap<String, ServiceStatus>;
