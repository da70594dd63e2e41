use std::fmt;
use serde::{Deserialize, Serialize};

/// A chat-style conversation partner (user, group or channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_user: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_channel: bool,
}

impl Contact {
    /// Identifier the backend accepts as a send target. Usernames win over ids.
    pub fn entity_id(&self) -> &str {
        match self.username.as_deref() {
            Some(u) if !u.is_empty() => u,
            _ => &self.id,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_group {
            "group"
        } else if self.is_channel {
            "channel"
        } else {
            "user"
        }
    }
}

/// Message ids are numeric for Telegram and timestamp strings for Slack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{}", n),
            MessageId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub out: bool,
    pub date: i64,
    pub sender_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub unread_count: u32,
}

/// A mail-style message inside a folder. `id` is the Message-ID header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMessage {
    pub id: String,
    pub subject: String,
    pub snippet: String,
    pub body: String,
    pub from: String,
    pub from_address: String,
    pub date: i64,
    pub is_read: bool,
}
