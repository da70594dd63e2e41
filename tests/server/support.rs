use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use voice_bridge::handlers::ws_handler::{FrameSink, SinkClosed};
use voice_bridge::messengers::{FolderMessenger, Messenger, MessengerError, MessengerFactory};
use voice_bridge::models::conversation::{Contact, Folder, FolderMessage, Message, MessageId};
use voice_bridge::models::ws_frame::ServerFrame;
use voice_bridge::routes::app_state::AppState;
use voice_bridge::services::active_messenger::ActiveMessenger;
use voice_bridge::services::last_recipient_service::LastRecipientStore;
use voice_bridge::services::settings_service::CredentialStore;
use voice_bridge::services::telegram_auth::{AuthError, LoginDriver, LoginPrompts, TelegramAuth};
use voice_bridge::services::transcription_service::{Transcriber, TranscriptionError};

pub fn contact(id: &str, name: &str) -> Contact {
    Contact {
        id: id.to_string(),
        name: name.to_string(),
        username: None,
        is_user: true,
        is_group: false,
        is_channel: false,
    }
}

pub struct FakeMessenger {
    pub name: String,
    pub init_delay: Duration,
    pub fail_init: bool,
    pub with_folders: bool,
    pub contacts: Vec<Contact>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub replies: Mutex<Vec<(String, String)>>,
}

impl FakeMessenger {
    pub fn chat(name: &str) -> Self {
        FakeMessenger {
            name: name.to_string(),
            init_delay: Duration::ZERO,
            fail_init: false,
            with_folders: false,
            contacts: vec![contact("1", "Bob"), contact("2", "Alice")],
            sent: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn mail(name: &str) -> Self {
        FakeMessenger {
            with_folders: true,
            contacts: Vec::new(),
            ..FakeMessenger::chat(name)
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), MessengerError> {
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        if self.fail_init {
            return Err(MessengerError::Auth("bad token".to_string()));
        }
        Ok(())
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>, MessengerError> {
        Ok(self.contacts.clone())
    }

    async fn get_messages(&self, entity_id: &str, limit: usize) -> Result<Vec<Message>, MessengerError> {
        Ok((0..limit)
            .map(|i| Message {
                id: MessageId::Number(i as i64),
                text: format!("{} #{}", entity_id, i),
                out: i % 2 == 0,
                date: 1_700_000_000 + i as i64,
                sender_name: "Bob".to_string(),
            })
            .collect())
    }

    async fn send_message(&self, text: &str, recipient: &str) -> Result<(), MessengerError> {
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), recipient.to_string()));
        Ok(())
    }

    fn folders(&self) -> Option<&dyn FolderMessenger> {
        if self.with_folders {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl FolderMessenger for FakeMessenger {
    async fn get_folders(&self) -> Result<Vec<Folder>, MessengerError> {
        Ok(vec![Folder {
            id: "INBOX".to_string(),
            name: "Inbox".to_string(),
            unread_count: 2,
        }])
    }

    async fn get_folder_messages(&self, folder_id: &str, limit: usize) -> Result<Vec<FolderMessage>, MessengerError> {
        Ok((0..limit.min(3))
            .map(|i| FolderMessage {
                id: format!("<{}-{}@mail>", folder_id, i),
                subject: format!("Subject {}", i),
                snippet: String::new(),
                body: String::new(),
                from: "Ann".to_string(),
                from_address: "ann@example.com".to_string(),
                date: 0,
                is_read: false,
            })
            .collect())
    }

    async fn get_folder_message(&self, _folder_id: &str, message_id: &str) -> Result<FolderMessage, MessengerError> {
        Err(MessengerError::NotFound(format!("{} not found", message_id)))
    }

    async fn reply_to_message(&self, message_id: &str, text: &str) -> Result<(), MessengerError> {
        self.replies
            .lock()
            .unwrap()
            .push((message_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Hands out pre-built messengers by name.
#[derive(Default)]
pub struct FakeFactory {
    pub messengers: HashMap<String, Arc<FakeMessenger>>,
}

impl FakeFactory {
    pub fn with(mut self, key: &str, messenger: FakeMessenger) -> Self {
        self.messengers.insert(key.to_string(), Arc::new(messenger));
        self
    }
}

impl MessengerFactory for FakeFactory {
    fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.messengers.keys().cloned().collect();
        names.sort();
        names
    }

    fn create(&self, name: &str) -> Result<Arc<dyn Messenger>, MessengerError> {
        self.messengers
            .get(name)
            .map(|m| m.clone() as Arc<dyn Messenger>)
            .ok_or_else(|| MessengerError::UnknownMessenger(name.to_string()))
    }
}

pub struct RecordingTranscriber {
    pub reply: String,
    pub calls: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTranscriber {
    pub fn replying(text: &str) -> Self {
        RecordingTranscriber {
            reply: text.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transcriber for RecordingTranscriber {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, TranscriptionError> {
        self.calls.lock().unwrap().push(pcm.to_vec());
        Ok(self.reply.clone())
    }
}

pub struct NoLogin;

#[async_trait]
impl LoginDriver for NoLogin {
    async fn login(&self, _phone: &str, _prompts: LoginPrompts) -> Result<(), AuthError> {
        Err(AuthError::NotConfigured)
    }
}

/// Collects every frame the connection writes.
#[derive(Default)]
pub struct VecSink {
    pub frames: Vec<ServerFrame>,
}

#[async_trait(?Send)]
impl FrameSink for VecSink {
    async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), SinkClosed> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn app_state(dir: &Path, factory: FakeFactory, transcriber: Arc<RecordingTranscriber>) -> AppState {
    init_logger();
    AppState {
        active: ActiveMessenger::new(),
        registry: Arc::new(factory),
        credentials: CredentialStore::new(dir.join("settings.json")).without_env_fallback(),
        last_recipients: LastRecipientStore::new(dir),
        transcriber,
        telegram_auth: TelegramAuth::new(Arc::new(NoLogin), dir.join("telegram-session.txt")),
    }
}
