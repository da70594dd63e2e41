use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use crate::messengers::mail_text;
use crate::messengers::{FolderMessenger, Messenger, MessengerError};
use crate::models::conversation::{Contact, Folder, FolderMessage, Message};

/// Mailboxes shown to the user, keyed by IMAP path.
const FOLDER_NAMES: [(&str, &str); 6] = [
    ("INBOX", "Inbox"),
    ("[Gmail]/Starred", "Starred"),
    ("[Gmail]/Sent Mail", "Sent"),
    ("[Gmail]/Drafts", "Drafts"),
    ("[Gmail]/Important", "Important"),
    ("[Gmail]/Spam", "Spam"),
];

const INBOX: &str = "INBOX";

/// One message as the mail transport delivers it, before normalisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMail {
    pub seq: u32,
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from_name: Option<String>,
    pub from_address: Option<String>,
    pub in_reply_to: Option<String>,
    pub date: Option<i64>,
    pub seen: bool,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReply {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub in_reply_to: String,
    pub references: String,
}

/// IMAP + SMTP operations the Gmail adapter needs. Each call holds the
/// mailbox for its whole duration.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailBackend: Send + Sync {
    /// Logs into IMAP and verifies the SMTP relay.
    async fn connect(&self) -> Result<(), MessengerError>;

    async fn list_mailboxes(&self) -> Result<Vec<String>, MessengerError>;

    async fn unseen_count(&self, mailbox: &str) -> Result<u32, MessengerError>;

    /// The last `limit` messages by sequence number, oldest first.
    async fn fetch_recent(&self, mailbox: &str, limit: usize) -> Result<Vec<RawMail>, MessengerError>;

    /// Looks a message up by its Message-ID header and flags it as seen.
    async fn fetch_by_message_id(&self, mailbox: &str, message_id: &str) -> Result<Option<RawMail>, MessengerError>;

    async fn send(&self, reply: OutgoingReply) -> Result<(), MessengerError>;
}

#[derive(Debug, Clone)]
struct ReplyMeta {
    from_address: String,
    subject: String,
    references: Option<String>,
}

pub struct GmailMessenger<B> {
    address: String,
    backend: B,
    reply_meta: Mutex<HashMap<String, ReplyMeta>>,
}

fn folder_name(path: &str) -> Option<&'static str> {
    FOLDER_NAMES
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, name)| *name)
}

/// Inbox first, the rest alphabetically by display name.
pub fn sort_folders(folders: &mut [Folder]) {
    folders.sort_by(|a, b| match (a.id == INBOX, b.id == INBOX) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

fn to_folder_message(raw: &RawMail, is_read: bool) -> FolderMessage {
    let from_address = raw.from_address.clone().unwrap_or_default();
    let from = raw
        .from_name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| Some(from_address.clone()).filter(|a| !a.is_empty()))
        .unwrap_or_else(|| "Unknown".to_string());
    let body = mail_text::plain_body(&raw.body);

    FolderMessage {
        id: raw
            .message_id
            .clone()
            .unwrap_or_else(|| raw.seq.to_string()),
        subject: raw
            .subject
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "(no subject)".to_string()),
        snippet: mail_text::snippet(&body),
        body: mail_text::display_body(&body),
        from,
        from_address,
        date: raw.date.unwrap_or(0),
        is_read,
    }
}

impl<B: MailBackend> GmailMessenger<B> {
    pub fn new(address: String, backend: B) -> Self {
        GmailMessenger {
            address,
            backend,
            reply_meta: Mutex::new(HashMap::new()),
        }
    }

    fn remember(&self, raw: &RawMail, message: &FolderMessage) {
        self.reply_meta
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                message.id.clone(),
                ReplyMeta {
                    from_address: message.from_address.clone(),
                    subject: message.subject.clone(),
                    references: raw.in_reply_to.clone(),
                },
            );
    }

    fn reply_meta(&self, message_id: &str) -> Option<ReplyMeta> {
        self.reply_meta
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(message_id)
            .cloned()
    }
}

#[async_trait]
impl<B: MailBackend> Messenger for GmailMessenger<B> {
    fn name(&self) -> &str {
        "Gmail"
    }

    async fn init(&self) -> Result<(), MessengerError> {
        self.backend.connect().await?;
        info!("Gmail authenticated as {}", self.address);
        Ok(())
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>, MessengerError> {
        Ok(Vec::new())
    }

    async fn get_messages(&self, _entity_id: &str, _limit: usize) -> Result<Vec<Message>, MessengerError> {
        Ok(Vec::new())
    }

    async fn send_message(&self, _text: &str, _recipient: &str) -> Result<(), MessengerError> {
        Err(MessengerError::Unsupported(
            "Gmail sends replies only; use reply_to_message instead of send_message".to_string(),
        ))
    }

    fn folders(&self) -> Option<&dyn FolderMessenger> {
        Some(self)
    }
}

#[async_trait]
impl<B: MailBackend> FolderMessenger for GmailMessenger<B> {
    async fn get_folders(&self) -> Result<Vec<Folder>, MessengerError> {
        let mut folders = Vec::new();
        for path in self.backend.list_mailboxes().await? {
            let Some(name) = folder_name(&path) else {
                continue;
            };
            // Not every mailbox answers STATUS.
            let unread_count = match self.backend.unseen_count(&path).await {
                Ok(count) => count,
                Err(e) => {
                    debug!("Gmail: no unseen count for {}: {}", path, e);
                    0
                }
            };
            folders.push(Folder {
                id: path,
                name: name.to_string(),
                unread_count,
            });
        }
        sort_folders(&mut folders);
        Ok(folders)
    }

    async fn get_folder_messages(&self, folder_id: &str, limit: usize) -> Result<Vec<FolderMessage>, MessengerError> {
        let raws = self.backend.fetch_recent(folder_id, limit).await?;
        let mut messages = Vec::with_capacity(raws.len());
        for raw in &raws {
            let message = to_folder_message(raw, raw.seen);
            self.remember(raw, &message);
            messages.push(message);
        }
        messages.reverse();
        Ok(messages)
    }

    async fn get_folder_message(&self, folder_id: &str, message_id: &str) -> Result<FolderMessage, MessengerError> {
        let raw = self
            .backend
            .fetch_by_message_id(folder_id, message_id)
            .await?
            .ok_or_else(|| MessengerError::NotFound("Message not found".to_string()))?;
        let mut message = to_folder_message(&raw, true);
        message.id = message_id.to_string();
        self.remember(&raw, &message);
        Ok(message)
    }

    async fn reply_to_message(&self, message_id: &str, text: &str) -> Result<(), MessengerError> {
        let meta = self.reply_meta(message_id).ok_or_else(|| {
            MessengerError::NotFound("Message metadata not found. View the message first.".to_string())
        })?;

        let reply = OutgoingReply {
            from: self.address.clone(),
            to: meta.from_address.clone(),
            subject: mail_text::reply_subject(&meta.subject),
            text: text.to_string(),
            in_reply_to: message_id.to_string(),
            references: mail_text::build_references(meta.references.as_deref(), message_id),
        };
        self.backend.send(reply).await?;
        info!("Gmail reply sent to {}", meta.from_address);
        Ok(())
    }
}
