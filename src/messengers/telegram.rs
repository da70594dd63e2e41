use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use async_trait::async_trait;
use grammers_client::types::{Chat, Dialog};
use grammers_client::{Client, Config};
use grammers_session::{PackedChat, Session};
use grammers_tl_types as tl;
use log::{debug, info};
use tokio::sync::OnceCell;
use crate::messengers::{Messenger, MessengerError};
use crate::models::conversation::{Contact, Message, MessageId};
use crate::services::telegram_auth::has_session;

const DIALOG_LIMIT: usize = 100;

/// Telegram user account over MTProto, using the session saved by the
/// settings login flow.
pub struct TelegramMessenger {
    api_id: i32,
    api_hash: String,
    session_path: PathBuf,
    client: OnceCell<Client>,
    // Keyed by chat id and by lowercase username.
    peers: Mutex<HashMap<String, PackedChat>>,
}

fn network(e: impl std::fmt::Display) -> MessengerError {
    MessengerError::Network(e.to_string())
}

fn is_pinned(dialog: &Dialog) -> bool {
    match &dialog.raw {
        tl::enums::Dialog::Dialog(d) => d.pinned,
        tl::enums::Dialog::Folder(f) => f.pinned,
    }
}

fn to_contact(chat: &Chat) -> Contact {
    let name = chat.name();
    Contact {
        id: chat.id().to_string(),
        name: if name.is_empty() { "Unknown".to_string() } else { name.to_string() },
        username: chat.username().map(str::to_string),
        is_user: matches!(chat, Chat::User(_)),
        is_group: matches!(chat, Chat::Group(_)),
        is_channel: matches!(chat, Chat::Channel(_)),
    }
}

impl TelegramMessenger {
    pub fn new(api_id: i32, api_hash: String, session_path: PathBuf) -> Result<Self, MessengerError> {
        if !has_session(&session_path) {
            return Err(MessengerError::NotConfigured(
                "Telegram not authenticated. Please authenticate via Settings.".to_string(),
            ));
        }
        Ok(TelegramMessenger {
            api_id,
            api_hash,
            session_path,
            client: OnceCell::new(),
            peers: Mutex::new(HashMap::new()),
        })
    }

    fn client(&self) -> Result<&Client, MessengerError> {
        self.client
            .get()
            .ok_or_else(|| MessengerError::NotConfigured("Telegram client not initialised".to_string()))
    }

    fn remember(&self, chat: &Chat) {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        let packed = chat.pack();
        peers.insert(chat.id().to_string(), packed);
        if let Some(username) = chat.username() {
            peers.insert(username.to_lowercase(), packed);
        }
    }

    fn cached(&self, entity_id: &str) -> Option<PackedChat> {
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers
            .get(entity_id)
            .or_else(|| peers.get(&entity_id.trim_start_matches('@').to_lowercase()))
            .copied()
    }

    /// Walks dialogs, caching every peer; returns the chats of pinned ones.
    async fn load_dialogs(&self, limit: Option<usize>) -> Result<Vec<Chat>, MessengerError> {
        let client = self.client()?;
        let mut dialogs = client.iter_dialogs();
        if let Some(limit) = limit {
            dialogs = dialogs.limit(limit);
        }
        let mut pinned = Vec::new();
        while let Some(dialog) = dialogs.next().await.map_err(network)? {
            self.remember(dialog.chat());
            if is_pinned(&dialog) {
                pinned.push(dialog.chat().clone());
            }
        }
        Ok(pinned)
    }

    async fn resolve(&self, entity_id: &str) -> Result<PackedChat, MessengerError> {
        if let Some(packed) = self.cached(entity_id) {
            return Ok(packed);
        }
        if entity_id.parse::<i64>().is_err() {
            let username = entity_id.trim_start_matches('@');
            if let Some(chat) = self
                .client()?
                .resolve_username(username)
                .await
                .map_err(network)?
            {
                self.remember(&chat);
                return Ok(chat.pack());
            }
        } else {
            debug!("Telegram: peer {} not cached, reloading dialogs", entity_id);
            self.load_dialogs(None).await?;
            if let Some(packed) = self.cached(entity_id) {
                return Ok(packed);
            }
        }
        Err(MessengerError::NotFound(format!("Telegram peer not found: {}", entity_id)))
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn name(&self) -> &str {
        "Telegram"
    }

    async fn init(&self) -> Result<(), MessengerError> {
        let session = Session::load_file(&self.session_path).map_err(|e| {
            MessengerError::Auth(format!("could not read Telegram session: {}", e))
        })?;
        let client = Client::connect(Config {
            session,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: Default::default(),
        })
        .await
        .map_err(network)?;

        if !client.is_authorized().await.map_err(network)? {
            return Err(MessengerError::Auth(
                "Telegram session is no longer authorised".to_string(),
            ));
        }
        // Re-initialising an adapter is not supported; a fresh one is built per selection.
        let _ = self.client.set(client);
        info!("Telegram client connected with saved session");
        Ok(())
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>, MessengerError> {
        let pinned = self.load_dialogs(Some(DIALOG_LIMIT)).await?;
        Ok(pinned.iter().map(to_contact).collect())
    }

    async fn get_messages(&self, entity_id: &str, limit: usize) -> Result<Vec<Message>, MessengerError> {
        let chat = self.resolve(entity_id).await?;
        let mut iter = self.client()?.iter_messages(chat).limit(limit);
        let mut messages = Vec::with_capacity(limit);
        while let Some(message) = iter.next().await.map_err(network)? {
            messages.push(Message {
                id: MessageId::Number(i64::from(message.id())),
                text: message.text().to_string(),
                out: message.outgoing(),
                date: message.date().timestamp(),
                sender_name: message
                    .sender()
                    .map(|sender| sender.name().to_string())
                    .unwrap_or_default(),
            });
        }
        Ok(messages)
    }

    async fn send_message(&self, text: &str, recipient: &str) -> Result<(), MessengerError> {
        let chat = self.resolve(recipient).await?;
        self.client()?
            .send_message(chat, text)
            .await
            .map_err(network)?;
        Ok(())
    }
}
