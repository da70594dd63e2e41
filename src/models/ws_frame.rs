use serde::{Deserialize, Serialize};

/// Control frames sent by a front-end over `/ws`. Audio travels as binary frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    SelectMessenger {
        name: String,
    },
    Stop,
    #[serde(rename_all = "camelCase")]
    Send {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_username: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Reply {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
}

impl ClientFrame {
    /// Parses a text frame. The bare string `stop` is accepted as well.
    pub fn parse(raw: &str) -> Option<ClientFrame> {
        if raw.trim() == "stop" {
            return Some(ClientFrame::Stop);
        }
        serde_json::from_str(raw).ok()
    }
}

/// Frames the server pushes back to a front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    Status { text: String },
    MessengerSelected {
        name: String,
        #[serde(rename = "hasFolders")]
        has_folders: bool,
    },
    Preview { text: String },
    Sent { text: String },
    Error { text: String },
}

impl ServerFrame {
    pub fn status(text: impl Into<String>) -> Self {
        ServerFrame::Status { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ServerFrame::Error { text: text.into() }
    }
}
