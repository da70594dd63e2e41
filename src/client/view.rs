//! What each screen shows. Panels are derived from the screen alone, so a
//! transition can never leave a stale panel visible.

use std::io::Write;
use crate::client::state::{ClientState, Screen};
use crate::config;
use crate::messengers::display_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    MessengerList,
    ContactList,
    ConversationHistory,
    FolderList,
    MessageList,
    MessageBody,
    RecordButton,
    PreviewText,
    SettingsForm,
}

pub fn visible_panels(screen: Screen) -> &'static [Panel] {
    match screen {
        Screen::Startup | Screen::Processing => &[],
        Screen::MessengerSelect => &[Panel::MessengerList],
        Screen::Contacts => &[Panel::ContactList],
        Screen::Conversation => &[Panel::ConversationHistory, Panel::RecordButton],
        Screen::FolderSelect => &[Panel::FolderList],
        Screen::MessageList => &[Panel::MessageList],
        Screen::MessageView => &[Panel::MessageBody, Panel::RecordButton],
        Screen::Recording => &[Panel::RecordButton],
        Screen::Preview => &[Panel::PreviewText],
        Screen::Settings => &[Panel::SettingsForm],
    }
}

/// Names on the glasses are trimmed and cut to the display width. Blank
/// names show as "Unknown".
pub fn sanitize_name(name: &str) -> String {
    let name: String = name.trim().chars().take(config::DISPLAY_NAME_MAX_CHARS).collect();
    let name = name.trim_end();
    if name.is_empty() {
        "Unknown".to_string()
    } else {
        name.to_string()
    }
}

fn panel_lines(panel: Panel, state: &ClientState, lines: &mut Vec<String>) {
    match panel {
        Panel::MessengerList => {
            for (idx, name) in state.available.iter().enumerate() {
                let marker = if idx == state.cursor { ">" } else { " " };
                lines.push(format!("{} {}", marker, display_name(name)));
            }
        }
        Panel::ContactList => {
            if let Some(chat) = state.chat() {
                lines.extend(chat.contacts.iter().map(|c| sanitize_name(&c.name)));
            }
        }
        Panel::ConversationHistory => {
            if let Some(chat) = state.chat() {
                for message in &chat.conversation {
                    let sender = if message.out { "Me" } else { message.sender_name.as_str() };
                    lines.push(format!("{}: {}", sanitize_name(sender), message.text));
                }
            }
        }
        Panel::FolderList => {
            if let Some(folder) = state.folder() {
                for f in &folder.folders {
                    if f.unread_count > 0 {
                        lines.push(format!("{} ({})", f.name, f.unread_count));
                    } else {
                        lines.push(f.name.clone());
                    }
                }
            }
        }
        Panel::MessageList => {
            if let Some(folder) = state.folder() {
                for m in &folder.messages {
                    let marker = if m.is_read { " " } else { "*" };
                    lines.push(format!("{} {}: {}", marker, sanitize_name(&m.from), m.subject));
                }
            }
        }
        Panel::MessageBody => {
            if let Some(m) = state.folder().and_then(|f| f.selected_message.as_ref()) {
                lines.push(format!("From: {}", sanitize_name(&m.from)));
                lines.push(format!("Subject: {}", m.subject));
                lines.push(m.body.clone());
            }
        }
        Panel::RecordButton => {
            lines.push(if state.recording {
                "[tap to stop]".to_string()
            } else {
                "[double tap to record]".to_string()
            });
        }
        Panel::PreviewText => lines.push(state.pending_text.clone()),
        Panel::SettingsForm => {
            if let Some(settings) = &state.settings {
                for (service, status) in settings {
                    let mut line = format!(
                        "{}: {}",
                        display_name(service),
                        if status.configured { "configured" } else { "not configured" }
                    );
                    if let Some(authenticated) = status.authenticated {
                        line.push_str(if authenticated { ", signed in" } else { ", signed out" });
                    }
                    lines.push(line);
                }
            }
        }
    }
}

/// Lines for the glasses display: the status line followed by the visible
/// panels of the current screen.
pub fn glasses_text(state: &ClientState) -> Vec<String> {
    let mut lines = vec![state.status.text.clone()];
    for panel in visible_panels(state.screen) {
        panel_lines(*panel, state, &mut lines);
    }
    lines
}

pub trait Renderer: Send {
    fn render(&mut self, state: &ClientState);
}

/// Prints every frame to a writer, stdout by default.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        TerminalRenderer { out: std::io::stdout() }
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        TerminalRenderer { out }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, state: &ClientState) {
        let mut frame = String::new();
        let connection = if state.connected { "online" } else { "offline" };
        frame.push_str(&format!("--- {:?} [{}] ---\n", state.screen, connection));
        for (idx, line) in glasses_text(state).into_iter().enumerate() {
            if idx == 0 && state.status.is_error {
                frame.push_str(&format!("! {}\n", line));
            } else {
                frame.push_str(&line);
                frame.push('\n');
            }
        }
        if let Err(e) = self.out.write_all(frame.as_bytes()).and_then(|_| self.out.flush()) {
            log::warn!("Render failed: {}", e);
        }
    }
}
