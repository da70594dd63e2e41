use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use crate::messengers::{Messenger, MessengerError};
use crate::models::conversation::{Contact, Message, MessageId};

const SLACK_API_URL: &str = "https://slack.com/api";
const CONVERSATION_TYPES: &str = "public_channel,private_channel,mpim,im";
const CONVERSATION_PAGE_LIMIT: &str = "100";

#[derive(Debug, Deserialize)]
struct AuthTest {
    user_id: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlackChannel {
    id: String,
    name: Option<String>,
    is_member: Option<bool>,
    is_channel: bool,
    is_group: bool,
    is_mpim: bool,
    is_im: bool,
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationsList {
    #[serde(default)]
    channels: Vec<SlackChannel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlackMessage {
    ts: String,
    text: String,
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlackUser {
    name: Option<String>,
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersInfo {
    user: SlackUser,
}

/// Slack user-token adapter over the Web API.
pub struct SlackMessenger {
    token: String,
    base_url: String,
    client: reqwest::Client,
    self_id: RwLock<Option<String>>,
    user_names: Mutex<HashMap<String, String>>,
    // Channel names seen in the contact list, mapped to their ids.
    channel_ids: Mutex<HashMap<String, String>>,
}

impl SlackMessenger {
    pub fn new(token: String) -> Result<Self, MessengerError> {
        Self::with_base_url(token, SLACK_API_URL)
    }

    pub fn with_base_url(token: String, base_url: &str) -> Result<Self, MessengerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MessengerError::Network(e.to_string()))?;
        Ok(SlackMessenger {
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            self_id: RwLock::new(None),
            user_names: Mutex::new(HashMap::new()),
            channel_ids: Mutex::new(HashMap::new()),
        })
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T, MessengerError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| MessengerError::Network(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| MessengerError::Network(e.to_string()))?;
        parse_envelope(body)
    }

    async fn post(&self, method: &str, payload: Value) -> Result<Value, MessengerError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MessengerError::Network(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| MessengerError::Network(e.to_string()))?;
        parse_envelope(body)
    }

    async fn user_name(&self, user_id: &str) -> String {
        if let Some(name) = self
            .user_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
        {
            return name.clone();
        }

        let name = match self.get::<UsersInfo>("users.info", &[("user", user_id)]).await {
            Ok(info) => display_name(&info.user).unwrap_or_else(|| user_id.to_string()),
            Err(e) => {
                debug!("Slack: users.info failed for {}: {}", user_id, e);
                user_id.to_string()
            }
        };
        self.user_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), name.clone());
        name
    }

    fn channel_id(&self, entity: &str) -> String {
        let entity = entity.trim_start_matches('#');
        self.channel_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_string())
    }

    fn self_id(&self) -> Option<String> {
        self.self_id.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn parse_envelope<T: DeserializeOwned>(body: Value) -> Result<T, MessengerError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(MessengerError::Api {
            service: "Slack",
            message,
        });
    }
    serde_json::from_value(body).map_err(|e| MessengerError::Api {
        service: "Slack",
        message: format!("unexpected response: {}", e),
    })
}

fn display_name(user: &SlackUser) -> Option<String> {
    user.real_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| user.name.as_deref().filter(|n| !n.is_empty()))
        .map(str::to_string)
}

/// "1700000000.000100" -> 1700000000
fn ts_seconds(ts: &str) -> i64 {
    ts.split('.').next().and_then(|s| s.parse().ok()).unwrap_or(0)
}

// IMs carry no is_member flag; they always belong to the token owner.
fn is_member(channel: &SlackChannel) -> bool {
    channel.is_im || channel.is_member.unwrap_or(false)
}

fn to_contact(channel: &SlackChannel, peer_name: Option<String>) -> Contact {
    Contact {
        id: channel.id.clone(),
        name: peer_name
            .or_else(|| channel.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        username: channel.name.clone(),
        is_user: channel.is_im,
        is_group: channel.is_group || channel.is_mpim,
        is_channel: channel.is_channel,
    }
}

#[async_trait]
impl Messenger for SlackMessenger {
    fn name(&self) -> &str {
        "Slack"
    }

    async fn init(&self) -> Result<(), MessengerError> {
        let auth: AuthTest = self.get("auth.test", &[]).await?;
        info!(
            "Slack authenticated as {} ({})",
            auth.user.as_deref().unwrap_or("unknown"),
            auth.user_id
        );
        *self.self_id.write().unwrap_or_else(|e| e.into_inner()) = Some(auth.user_id);
        Ok(())
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>, MessengerError> {
        let list: ConversationsList = self
            .get(
                "conversations.list",
                &[
                    ("types", CONVERSATION_TYPES),
                    ("exclude_archived", "true"),
                    ("limit", CONVERSATION_PAGE_LIMIT),
                ],
            )
            .await?;

        let mut contacts = Vec::new();
        for channel in list.channels.iter().filter(|c| is_member(c)) {
            let peer_name = match (&channel.user, channel.is_im) {
                (Some(user), true) => Some(self.user_name(user).await),
                _ => None,
            };
            if let Some(name) = &channel.name {
                self.channel_ids
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(name.clone(), channel.id.clone());
            }
            contacts.push(to_contact(channel, peer_name));
        }
        Ok(contacts)
    }

    async fn get_messages(&self, entity_id: &str, limit: usize) -> Result<Vec<Message>, MessengerError> {
        let channel = self.channel_id(entity_id);
        let limit = limit.to_string();
        let history: History = self
            .get(
                "conversations.history",
                &[("channel", channel.as_str()), ("limit", limit.as_str())],
            )
            .await?;

        let me = self.self_id();
        let mut messages = Vec::with_capacity(history.messages.len());
        for msg in history.messages {
            let sender_name = match &msg.user {
                Some(user) => self.user_name(user).await,
                None => String::new(),
            };
            messages.push(Message {
                out: msg.user.is_some() && msg.user == me,
                date: ts_seconds(&msg.ts),
                id: MessageId::Text(msg.ts),
                text: msg.text,
                sender_name,
            });
        }
        Ok(messages)
    }

    async fn send_message(&self, text: &str, recipient: &str) -> Result<(), MessengerError> {
        let channel = self.channel_id(recipient);
        self.post("chat.postMessage", json!({ "channel": channel, "text": text }))
            .await?;
        Ok(())
    }
}
