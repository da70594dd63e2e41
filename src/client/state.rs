//! Navigation state machine for the front-ends.
//!
//! Every transition goes through [`reduce`], which returns the next state and
//! the effects the runtime must carry out. Async results carry the `nav`
//! generation they were issued under; results from an older generation are
//! dropped, so a late fetch or poll can never repaint a screen the user has
//! already left.

use std::time::Duration;
use crate::config;
use crate::messengers::display_name;
use crate::models::conversation::{Contact, Folder, FolderMessage, Message};
use crate::models::last_recipient::LastRecipient;
use crate::models::settings::SettingsStatus;
use crate::models::ws_frame::{ClientFrame, ServerFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Startup,
    MessengerSelect,
    Processing,
    Contacts,
    FolderSelect,
    Conversation,
    MessageList,
    MessageView,
    Recording,
    Preview,
    Settings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSession {
    pub contacts: Vec<Contact>,
    pub selected_contact: Option<Contact>,
    pub conversation: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderSession {
    pub folders: Vec<Folder>,
    pub selected_folder: Option<Folder>,
    pub messages: Vec<FolderMessage>,
    pub selected_message: Option<FolderMessage>,
}

/// Navigation data for the active messenger. Its shape follows the
/// messenger family and is never mixed.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Chat(ChatSession),
    Folder(FolderSession),
}

impl Session {
    /// Who a recording made now would be addressed to.
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Session::Chat(chat) => chat.selected_contact.as_ref().map(|c| c.name.as_str()),
            Session::Folder(folder) => folder.selected_message.as_ref().map(|m| m.from.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    AvailableMessengers,
    /// Contacts together with the last recipient.
    Contacts,
    Messages { entity_id: String },
    Folders,
    FolderMessages { folder_id: String },
    FolderMessage { folder_id: String, message_id: String },
    SettingsStatus,
}

impl Request {
    /// Where to go once every retry failed. `None` means the request is not
    /// retried at all.
    fn fallback(&self) -> Option<NavTarget> {
        match self {
            Request::Contacts | Request::Folders => Some(NavTarget::MessengerSelect),
            Request::Messages { .. } => Some(NavTarget::Contacts),
            Request::FolderMessages { .. } => Some(NavTarget::FolderSelect),
            Request::FolderMessage { .. } => Some(NavTarget::MessageList),
            Request::AvailableMessengers | Request::SettingsStatus => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    AvailableMessengers(Vec<String>),
    Contacts {
        contacts: Vec<Contact>,
        last_recipient: Option<LastRecipient>,
    },
    Messages(Vec<Message>),
    Folders(Vec<Folder>),
    FolderMessages(Vec<FolderMessage>),
    FolderMessage(FolderMessage),
    SettingsStatus(SettingsStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// Initial load of a screen; retried, then falls back.
    Load,
    /// One-shot reload after send/cancel/wake.
    Refresh,
    /// Periodic conversation refresh.
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    MessengerSelect,
    Contacts,
    FolderSelect,
    Conversation,
    MessageList,
    MessageView,
}

/// Wearable touch input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    DoubleTap,
    ScrollUp,
    ScrollDown,
    ListSelect(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started,
    Gesture(Gesture),
    SelectMessenger(String),
    OpenContact(usize),
    OpenFolder(usize),
    OpenMessage(usize),
    Back,
    ToggleRecording,
    SendPending,
    CancelPreview,
    OpenSettings,
    FetchOk {
        nav: u64,
        purpose: FetchPurpose,
        response: Response,
    },
    FetchFailed {
        nav: u64,
        purpose: FetchPurpose,
        request: Request,
        attempt: u32,
        error: String,
    },
    PollTick {
        nav: u64,
    },
    Navigate {
        nav: u64,
        target: NavTarget,
    },
    Server(ServerFrame),
    Connected,
    Disconnected,
    Hidden,
    Visible,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render,
    Fetch {
        nav: u64,
        purpose: FetchPurpose,
        request: Request,
        attempt: u32,
        delay: Duration,
    },
    Send(ClientFrame),
    Schedule {
        delay: Duration,
        event: Event,
    },
    AbortFetches,
    Reconnect,
    StartCapture,
    StopCapture,
    SaveHistory {
        text: String,
        contact: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientState {
    pub screen: Screen,
    pub nav: u64,
    pub status: Status,
    pub available: Vec<String>,
    /// Highlighted row on the messenger list.
    pub cursor: usize,
    pub messenger: Option<String>,
    pub session: Option<Session>,
    pub pending_text: String,
    pub recording: bool,
    /// The screen-load request in flight, re-issued after the page wakes.
    pub loading: Option<Request>,
    pub settings: Option<SettingsStatus>,
    pub connected: bool,
    pub hidden: bool,
}

impl Default for ClientState {
    fn default() -> Self {
        ClientState {
            screen: Screen::Startup,
            nav: 0,
            status: Status {
                text: "Initializing...".to_string(),
                is_error: false,
            },
            available: Vec::new(),
            cursor: 0,
            messenger: None,
            session: None,
            pending_text: String::new(),
            recording: false,
            loading: None,
            settings: None,
            connected: false,
            hidden: false,
        }
    }
}

impl ClientState {
    pub fn chat(&self) -> Option<&ChatSession> {
        match &self.session {
            Some(Session::Chat(chat)) => Some(chat),
            _ => None,
        }
    }

    pub fn folder(&self) -> Option<&FolderSession> {
        match &self.session {
            Some(Session::Folder(folder)) => Some(folder),
            _ => None,
        }
    }

    fn chat_mut(&mut self) -> Option<&mut ChatSession> {
        match &mut self.session {
            Some(Session::Chat(chat)) => Some(chat),
            _ => None,
        }
    }

    fn folder_mut(&mut self) -> Option<&mut FolderSession> {
        match &mut self.session {
            Some(Session::Folder(folder)) => Some(folder),
            _ => None,
        }
    }

    fn enter(&mut self, screen: Screen) {
        self.screen = screen;
        self.nav += 1;
        self.loading = None;
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Status {
            text: text.into(),
            is_error: false,
        };
    }

    fn error(&mut self, text: impl Into<String>) {
        self.status = Status {
            text: text.into(),
            is_error: true,
        };
    }

    fn load(&mut self, request: Request) -> Effect {
        self.loading = Some(request.clone());
        Effect::Fetch {
            nav: self.nav,
            purpose: FetchPurpose::Load,
            request,
            attempt: 1,
            delay: Duration::ZERO,
        }
    }

    fn poll_later(&self) -> Effect {
        Effect::Schedule {
            delay: config::CONVERSATION_POLL_INTERVAL,
            event: Event::PollTick { nav: self.nav },
        }
    }

    /// Closest screen that needs nothing from the failed operation.
    fn recovery_target(&self) -> NavTarget {
        match &self.session {
            Some(Session::Chat(chat)) if chat.selected_contact.is_some() => NavTarget::Conversation,
            Some(Session::Chat(_)) => NavTarget::Contacts,
            Some(Session::Folder(f)) if f.selected_message.is_some() => NavTarget::MessageView,
            Some(Session::Folder(f)) if f.selected_folder.is_some() => NavTarget::MessageList,
            Some(Session::Folder(_)) => NavTarget::FolderSelect,
            None => NavTarget::MessengerSelect,
        }
    }
}

type Transition = (ClientState, Vec<Effect>);

fn unchanged(s: ClientState) -> Transition {
    (s, Vec::new())
}

/// Moves the last recipient, when present further down, to the front.
pub fn prioritise_last_recipient(mut contacts: Vec<Contact>, last: Option<&LastRecipient>) -> Vec<Contact> {
    if let Some(last) = last {
        if let Some(idx) = contacts.iter().position(|c| c.id == last.id) {
            if idx > 0 {
                let contact = contacts.remove(idx);
                contacts.insert(0, contact);
            }
        }
    }
    contacts
}

pub fn reduce(state: &ClientState, event: Event) -> Transition {
    let mut s = state.clone();
    match event {
        Event::Started => go_to_messenger_select(s),
        Event::Gesture(gesture) => on_gesture(s, gesture),
        Event::SelectMessenger(name) => select_messenger(s, name),
        Event::OpenContact(idx) => open_contact(s, idx),
        Event::OpenFolder(idx) => open_folder(s, idx),
        Event::OpenMessage(idx) => open_message(s, idx),
        Event::Back => back(s),
        Event::ToggleRecording => toggle_recording(s),
        Event::SendPending => send_pending(s),
        Event::CancelPreview => cancel_preview(s),
        Event::OpenSettings => open_settings(s),
        Event::FetchOk { nav, purpose, response } => {
            if nav != s.nav {
                return unchanged(s);
            }
            on_fetch_ok(s, purpose, response)
        }
        Event::FetchFailed {
            nav,
            purpose,
            request,
            attempt,
            ..
        } => {
            if nav != s.nav {
                return unchanged(s);
            }
            on_fetch_failed(s, purpose, request, attempt)
        }
        Event::PollTick { nav } => {
            if nav != s.nav || s.screen != Screen::Conversation {
                return unchanged(s);
            }
            let Some(entity_id) = s
                .chat()
                .and_then(|c| c.selected_contact.as_ref())
                .map(|c| c.entity_id().to_string())
            else {
                return unchanged(s);
            };
            let effects = vec![
                Effect::Fetch {
                    nav,
                    purpose: FetchPurpose::Poll,
                    request: Request::Messages { entity_id },
                    attempt: 1,
                    delay: Duration::ZERO,
                },
                s.poll_later(),
            ];
            (s, effects)
        }
        Event::Navigate { nav, target } => {
            if nav != s.nav {
                return unchanged(s);
            }
            navigate(s, target)
        }
        Event::Server(frame) => on_server_frame(s, frame),
        Event::Connected => {
            s.connected = true;
            (s, vec![Effect::Render])
        }
        Event::Disconnected => {
            s.connected = false;
            (s, vec![Effect::Render])
        }
        Event::Hidden => {
            s.hidden = true;
            (s, vec![Effect::AbortFetches])
        }
        Event::Visible => on_visible(s),
        Event::Quit => unchanged(s),
    }
}

fn navigate(s: ClientState, target: NavTarget) -> Transition {
    match target {
        NavTarget::MessengerSelect => go_to_messenger_select(s),
        NavTarget::Contacts => go_to_contacts(s),
        NavTarget::FolderSelect => go_to_folder_select(s),
        NavTarget::Conversation => refresh_conversation(s),
        NavTarget::MessageList => reopen_folder(s),
        NavTarget::MessageView => show_message_view(s),
    }
}

fn go_to_messenger_select(mut s: ClientState) -> Transition {
    let mut effects = Vec::new();
    if s.recording {
        s.recording = false;
        effects.push(Effect::StopCapture);
    }
    s.enter(Screen::MessengerSelect);
    s.messenger = None;
    s.session = None;
    s.pending_text.clear();
    s.info("Loading messengers...");
    effects.push(s.load(Request::AvailableMessengers));
    effects.push(Effect::Render);
    (s, effects)
}

fn select_messenger(mut s: ClientState, name: String) -> Transition {
    if s.screen != Screen::MessengerSelect || !s.available.contains(&name) {
        return unchanged(s);
    }
    s.enter(Screen::Processing);
    s.info(format!("Connecting to {}...", display_name(&name)));
    s.messenger = Some(name.clone());
    (
        s,
        vec![Effect::Send(ClientFrame::SelectMessenger { name }), Effect::Render],
    )
}

fn go_to_contacts(mut s: ClientState) -> Transition {
    s.enter(Screen::Contacts);
    s.session = Some(Session::Chat(ChatSession::default()));
    s.pending_text.clear();
    s.info("Loading contacts...");
    let fetch = s.load(Request::Contacts);
    (s, vec![fetch, Effect::Render])
}

fn open_contact(mut s: ClientState, idx: usize) -> Transition {
    if s.screen != Screen::Contacts {
        return unchanged(s);
    }
    let Some(contact) = s.chat().and_then(|c| c.contacts.get(idx)).cloned() else {
        return unchanged(s);
    };
    s.enter(Screen::Conversation);
    s.info(format!("Loading conversation with {}...", contact.name));
    let entity_id = contact.entity_id().to_string();
    if let Some(chat) = s.chat_mut() {
        chat.selected_contact = Some(contact);
        chat.conversation.clear();
    }
    let fetch = s.load(Request::Messages { entity_id });
    (s, vec![fetch, Effect::Render])
}

fn refresh_conversation(mut s: ClientState) -> Transition {
    let Some(contact) = s.chat().and_then(|c| c.selected_contact.clone()) else {
        return go_to_contacts(s);
    };
    s.enter(Screen::Conversation);
    s.info(format!("Conversation with {}", contact.name));
    let effects = vec![
        Effect::Fetch {
            nav: s.nav,
            purpose: FetchPurpose::Refresh,
            request: Request::Messages {
                entity_id: contact.entity_id().to_string(),
            },
            attempt: 1,
            delay: Duration::ZERO,
        },
        s.poll_later(),
        Effect::Render,
    ];
    (s, effects)
}

fn go_to_folder_select(mut s: ClientState) -> Transition {
    s.enter(Screen::FolderSelect);
    s.session = Some(Session::Folder(FolderSession::default()));
    s.pending_text.clear();
    s.info("Loading folders...");
    let fetch = s.load(Request::Folders);
    (s, vec![fetch, Effect::Render])
}

fn open_folder(mut s: ClientState, idx: usize) -> Transition {
    if s.screen != Screen::FolderSelect {
        return unchanged(s);
    }
    let Some(folder) = s.folder().and_then(|f| f.folders.get(idx)).cloned() else {
        return unchanged(s);
    };
    if let Some(session) = s.folder_mut() {
        session.selected_folder = Some(folder);
    }
    reopen_folder(s)
}

/// Message list of the selected folder, freshly fetched.
fn reopen_folder(mut s: ClientState) -> Transition {
    let Some(folder) = s.folder().and_then(|f| f.selected_folder.clone()) else {
        return go_to_folder_select(s);
    };
    s.enter(Screen::MessageList);
    s.pending_text.clear();
    s.info(format!("Loading {}...", folder.name));
    if let Some(session) = s.folder_mut() {
        session.messages.clear();
        session.selected_message = None;
    }
    let fetch = s.load(Request::FolderMessages { folder_id: folder.id });
    (s, vec![fetch, Effect::Render])
}

fn open_message(mut s: ClientState, idx: usize) -> Transition {
    if s.screen != Screen::MessageList {
        return unchanged(s);
    }
    let Some((folder_id, message)) = s.folder().and_then(|f| {
        let folder_id = f.selected_folder.as_ref()?.id.clone();
        Some((folder_id, f.messages.get(idx)?.clone()))
    }) else {
        return unchanged(s);
    };
    s.enter(Screen::MessageView);
    s.info("Loading message...");
    let message_id = message.id.clone();
    if let Some(session) = s.folder_mut() {
        session.selected_message = Some(message);
    }
    let fetch = s.load(Request::FolderMessage {
        folder_id,
        message_id,
    });
    (s, vec![fetch, Effect::Render])
}

fn show_message_view(mut s: ClientState) -> Transition {
    let Some(message) = s.folder().and_then(|f| f.selected_message.clone()) else {
        return reopen_folder(s);
    };
    s.enter(Screen::MessageView);
    s.info(format!("From {}: {}", message.from, message.subject));
    (s, vec![Effect::Render])
}

fn open_settings(mut s: ClientState) -> Transition {
    if s.recording {
        return unchanged(s);
    }
    s.enter(Screen::Settings);
    s.info("Loading settings...");
    let fetch = s.load(Request::SettingsStatus);
    (s, vec![fetch, Effect::Render])
}

fn back(s: ClientState) -> Transition {
    match s.screen {
        Screen::Contacts | Screen::FolderSelect | Screen::Settings => go_to_messenger_select(s),
        Screen::Conversation => go_to_contacts(s),
        Screen::MessageList => go_to_folder_select(s),
        Screen::MessageView => reopen_folder(s),
        Screen::Preview => cancel_preview(s),
        _ => unchanged(s),
    }
}

fn on_gesture(mut s: ClientState, gesture: Gesture) -> Transition {
    match (s.screen, gesture) {
        (Screen::MessengerSelect, Gesture::Tap) => match s.available.get(s.cursor).cloned() {
            Some(name) => select_messenger(s, name),
            None => unchanged(s),
        },
        (Screen::MessengerSelect, Gesture::ListSelect(idx)) => match s.available.get(idx).cloned() {
            Some(name) => select_messenger(s, name),
            None => unchanged(s),
        },
        (Screen::MessengerSelect, Gesture::ScrollDown) => {
            s.cursor = (s.cursor + 1).min(s.available.len().saturating_sub(1));
            (s, vec![Effect::Render])
        }
        (Screen::MessengerSelect, Gesture::ScrollUp) => {
            s.cursor = s.cursor.saturating_sub(1);
            (s, vec![Effect::Render])
        }
        (Screen::Contacts, Gesture::ListSelect(idx)) => open_contact(s, idx),
        (Screen::FolderSelect, Gesture::ListSelect(idx)) => open_folder(s, idx),
        (Screen::MessageList, Gesture::ListSelect(idx)) => open_message(s, idx),
        (Screen::Contacts | Screen::FolderSelect | Screen::MessageList, Gesture::DoubleTap) => back(s),
        (Screen::Conversation | Screen::MessageView, Gesture::DoubleTap) => toggle_recording(s),
        (Screen::Conversation | Screen::MessageView, Gesture::ScrollUp | Gesture::ScrollDown) => back(s),
        (Screen::Recording, Gesture::Tap) => toggle_recording(s),
        (Screen::Preview, Gesture::Tap) => send_pending(s),
        (Screen::Preview, Gesture::ScrollUp | Gesture::ScrollDown) => cancel_preview(s),
        _ => unchanged(s),
    }
}

fn toggle_recording(mut s: ClientState) -> Transition {
    if s.recording {
        if s.screen != Screen::Recording {
            return unchanged(s);
        }
        s.recording = false;
        s.enter(Screen::Processing);
        s.info("Processing...");
        return (
            s,
            vec![Effect::StopCapture, Effect::Send(ClientFrame::Stop), Effect::Render],
        );
    }

    if !matches!(s.screen, Screen::Conversation | Screen::MessageView) {
        return unchanged(s);
    }
    let Some(target) = s.session.as_ref().and_then(|x| x.target_name()).map(str::to_string) else {
        return unchanged(s);
    };
    s.recording = true;
    s.enter(Screen::Recording);
    s.info(format!("Recording for {}...", target));
    (s, vec![Effect::StartCapture, Effect::Render])
}

fn send_pending(mut s: ClientState) -> Transition {
    if s.pending_text.is_empty() {
        return unchanged(s);
    }
    let text = s.pending_text.clone();
    let frame = match &s.session {
        Some(Session::Folder(folder)) => match &folder.selected_message {
            Some(message) => ClientFrame::Reply {
                text: Some(text),
                message_id: Some(message.id.clone()),
            },
            None => return unchanged(s),
        },
        Some(Session::Chat(chat)) => match &chat.selected_contact {
            Some(contact) => ClientFrame::Send {
                text: Some(text),
                recipient: Some(contact.entity_id().to_string()),
                recipient_id: Some(contact.id.clone()),
                recipient_name: Some(contact.name.clone()),
                recipient_username: contact.username.clone(),
            },
            None => return unchanged(s),
        },
        None => return unchanged(s),
    };
    s.enter(Screen::Processing);
    s.info("Sending...");
    (s, vec![Effect::Send(frame), Effect::Render])
}

fn cancel_preview(mut s: ClientState) -> Transition {
    if s.screen != Screen::Preview {
        return unchanged(s);
    }
    s.pending_text.clear();
    match s.session {
        Some(Session::Folder(_)) => show_message_view(s),
        Some(Session::Chat(_)) => refresh_conversation(s),
        None => go_to_messenger_select(s),
    }
}

fn on_server_frame(mut s: ClientState, frame: ServerFrame) -> Transition {
    match frame {
        ServerFrame::Status { text } => {
            s.info(text);
            (s, vec![Effect::Render])
        }
        ServerFrame::MessengerSelected { name, has_folders } => {
            s.messenger = Some(name.to_lowercase());
            if has_folders {
                go_to_folder_select(s)
            } else {
                go_to_contacts(s)
            }
        }
        ServerFrame::Preview { text } => {
            s.pending_text = text;
            s.enter(Screen::Preview);
            s.info("Preview: tap to send, swipe to cancel");
            (s, vec![Effect::Render])
        }
        ServerFrame::Sent { text } => {
            let contact = s
                .session
                .as_ref()
                .and_then(|x| x.target_name())
                .unwrap_or("Unknown")
                .to_string();
            s.pending_text.clear();
            let save = Effect::SaveHistory { text, contact };
            let (s, mut effects) = match s.session {
                Some(Session::Chat(_)) => refresh_conversation(s),
                Some(Session::Folder(_)) => show_message_view(s),
                None => go_to_messenger_select(s),
            };
            effects.insert(0, save);
            (s, effects)
        }
        ServerFrame::Error { text } => {
            s.error(text);
            let mut effects = Vec::new();
            if s.recording {
                s.recording = false;
                effects.push(Effect::StopCapture);
            }
            effects.push(Effect::Schedule {
                delay: config::FALLBACK_DELAY,
                event: Event::Navigate {
                    nav: s.nav,
                    target: s.recovery_target(),
                },
            });
            effects.push(Effect::Render);
            (s, effects)
        }
    }
}

fn on_fetch_ok(mut s: ClientState, purpose: FetchPurpose, response: Response) -> Transition {
    if purpose == FetchPurpose::Load {
        s.loading = None;
    }
    let mut effects = Vec::new();
    match response {
        Response::AvailableMessengers(names) => {
            s.available = names;
            s.cursor = 0;
            if s.available.is_empty() {
                s.error("No messengers configured");
            } else {
                s.info("Select a messenger");
            }
        }
        Response::Contacts {
            contacts,
            last_recipient,
        } => {
            let contacts = prioritise_last_recipient(contacts, last_recipient.as_ref());
            let empty = contacts.is_empty();
            if let Some(chat) = s.chat_mut() {
                chat.contacts = contacts;
            }
            if empty {
                s.error("No contacts found");
            } else {
                s.info("Select a contact");
            }
        }
        Response::Messages(messages) => {
            let name = s
                .chat()
                .and_then(|c| c.selected_contact.as_ref())
                .map(|c| c.name.clone())
                .unwrap_or_default();
            if let Some(chat) = s.chat_mut() {
                chat.conversation = messages;
            }
            if purpose == FetchPurpose::Load {
                s.info(format!("Conversation with {}", name));
                effects.push(s.poll_later());
            }
        }
        Response::Folders(folders) => {
            let empty = folders.is_empty();
            if let Some(session) = s.folder_mut() {
                session.folders = folders;
            }
            if empty {
                s.error("No folders found");
            } else {
                s.info("Select a folder");
            }
        }
        Response::FolderMessages(messages) => {
            let count = messages.len();
            let name = s
                .folder()
                .and_then(|f| f.selected_folder.as_ref())
                .map(|f| f.name.clone())
                .unwrap_or_default();
            if let Some(session) = s.folder_mut() {
                session.messages = messages;
            }
            if count == 0 {
                s.info(format!("No messages in {}", name));
            } else {
                s.info(format!("{} ({})", name, count));
            }
        }
        Response::FolderMessage(message) => {
            s.info(format!("From {}: {}", message.from, message.subject));
            if let Some(session) = s.folder_mut() {
                if let Some(listed) = session.messages.iter_mut().find(|m| m.id == message.id) {
                    listed.is_read = true;
                }
                session.selected_message = Some(message);
            }
        }
        Response::SettingsStatus(status) => {
            s.settings = Some(status);
            s.info("Settings");
        }
    }
    effects.push(Effect::Render);
    (s, effects)
}

fn on_fetch_failed(mut s: ClientState, purpose: FetchPurpose, request: Request, attempt: u32) -> Transition {
    if purpose != FetchPurpose::Load {
        return unchanged(s);
    }
    let Some(fallback) = request.fallback() else {
        s.loading = None;
        s.error(match request {
            Request::SettingsStatus => "Error loading settings",
            _ => "Error loading messengers",
        });
        return (s, vec![Effect::Render]);
    };

    if attempt <= config::FETCH_MAX_RETRIES {
        s.info(format!("Retrying ({}/{})...", attempt, config::FETCH_MAX_RETRIES));
        let retry = Effect::Fetch {
            nav: s.nav,
            purpose,
            request,
            attempt: attempt + 1,
            delay: config::FETCH_RETRY_DELAY,
        };
        return (s, vec![retry, Effect::Render]);
    }

    s.loading = None;
    s.error("Connection failed");
    let fall_back = Effect::Schedule {
        delay: config::FALLBACK_DELAY,
        event: Event::Navigate {
            nav: s.nav,
            target: fallback,
        },
    };
    (s, vec![fall_back, Effect::Render])
}

fn on_visible(mut s: ClientState) -> Transition {
    s.hidden = false;
    let mut effects = Vec::new();
    if !s.connected {
        effects.push(Effect::Reconnect);
    }
    if let Some(request) = s.loading.clone() {
        effects.push(Effect::Fetch {
            nav: s.nav,
            purpose: FetchPurpose::Load,
            request,
            attempt: 1,
            delay: Duration::ZERO,
        });
        effects.push(Effect::Render);
        return (s, effects);
    }
    if s.screen == Screen::Conversation {
        let (s, more) = refresh_conversation(s);
        effects.extend(more);
        return (s, effects);
    }
    effects.push(Effect::Render);
    (s, effects)
}
