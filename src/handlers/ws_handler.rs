//! Per-connection WebSocket session: messenger selection, audio buffering,
//! transcription and send/reply confirmation.

use actix_ws::{CloseReason, Message as WsMessage, MessageStream, Session};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use log::{debug, error, info, warn};
use crate::messengers::display_name;
use crate::models::last_recipient::LastRecipient;
use crate::models::ws_frame::{ClientFrame, ServerFrame};
use crate::routes::app_state::AppState;
use crate::services::transcription_service::pcm_duration_secs;

const MAX_FRAME_SIZE: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
#[error("WebSocket closed")]
pub struct SinkClosed;

/// Where server frames go. The live implementation is the actix-ws session.
#[async_trait(?Send)]
pub trait FrameSink {
    async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), SinkClosed>;
}

#[async_trait(?Send)]
impl FrameSink for Session {
    async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), SinkClosed> {
        let json = serde_json::to_string(frame).map_err(|e| {
            error!("Could not encode frame: {}", e);
            SinkClosed
        })?;
        self.text(json).await.map_err(|_| SinkClosed)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub struct WsConnection {
    state: AppState,
    chunks: Vec<Bytes>,
}

impl WsConnection {
    pub fn new(state: AppState) -> Self {
        WsConnection {
            state,
            chunks: Vec::new(),
        }
    }

    /// Binary frames are stored verbatim until `stop`.
    pub fn push_audio(&mut self, data: Bytes) {
        self.chunks.push(data);
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn close(&mut self) {
        self.chunks.clear();
    }

    pub async fn handle_text<S: FrameSink>(&mut self, raw: &str, sink: &mut S) -> Result<(), SinkClosed> {
        let Some(frame) = ClientFrame::parse(raw) else {
            debug!("Ignoring unrecognised text frame");
            return Ok(());
        };
        match frame {
            ClientFrame::SelectMessenger { name } => self.select_messenger(&name, sink).await,
            ClientFrame::Stop => self.stop(sink).await,
            ClientFrame::Send {
                text,
                recipient,
                recipient_id,
                recipient_name,
                recipient_username,
            } => {
                let identity = non_empty(recipient_id).map(|id| LastRecipient {
                    id,
                    name: non_empty(recipient_name).unwrap_or_else(|| "Unknown".to_string()),
                    username: non_empty(recipient_username),
                });
                self.send(non_empty(text), non_empty(recipient), identity, sink).await
            }
            ClientFrame::Reply { text, message_id } => {
                self.reply(non_empty(text), non_empty(message_id), sink).await
            }
        }
    }

    async fn select_messenger<S: FrameSink>(&mut self, name: &str, sink: &mut S) -> Result<(), SinkClosed> {
        let display = display_name(name);
        let messenger = match self.state.registry.create(name) {
            Ok(messenger) => messenger,
            Err(e) => {
                error!("Error creating {}: {}", name, e);
                return sink
                    .send_frame(&ServerFrame::error(format!("Failed to connect to {}", display)))
                    .await;
            }
        };

        let ticket = self.state.active.begin_selection();
        sink.send_frame(&ServerFrame::status(format!("Connecting to {}...", display)))
            .await?;

        if let Err(e) = messenger.init().await {
            error!("Error initializing {}: {}", name, e);
            return sink
                .send_frame(&ServerFrame::error(format!("Failed to connect to {}", display)))
                .await;
        }

        let selected = ServerFrame::MessengerSelected {
            name: messenger.name().to_string(),
            has_folders: messenger.has_folders(),
        };
        if !self.state.active.install(ticket, messenger) {
            return sink
                .send_frame(&ServerFrame::error("Messenger selection superseded"))
                .await;
        }
        info!("Messenger selected: {}", display);
        sink.send_frame(&selected).await
    }

    async fn stop<S: FrameSink>(&mut self, sink: &mut S) -> Result<(), SinkClosed> {
        info!("Recording stopped. Received {} audio chunks.", self.chunks.len());
        if self.chunks.is_empty() {
            return sink.send_frame(&ServerFrame::error("No audio recorded")).await;
        }

        let pcm = self.chunks.concat();
        self.chunks.clear();
        info!(
            "Processing {} bytes ({:.1}s) of audio...",
            pcm.len(),
            pcm_duration_secs(pcm.len())
        );
        sink.send_frame(&ServerFrame::status("Transcribing...")).await?;

        let reply = match self.state.transcriber.transcribe(&pcm).await {
            Ok(text) if !text.trim().is_empty() => {
                info!("Transcription: {} chars", text.len());
                ServerFrame::Preview { text }
            }
            Ok(_) => ServerFrame::error("No speech detected"),
            Err(e) => {
                error!("Transcription error: {}", e);
                ServerFrame::error("Error transcribing audio")
            }
        };
        sink.send_frame(&reply).await
    }

    async fn send<S: FrameSink>(
        &mut self,
        text: Option<String>,
        recipient: Option<String>,
        identity: Option<LastRecipient>,
        sink: &mut S,
    ) -> Result<(), SinkClosed> {
        let Some(messenger) = self.state.active.current() else {
            return sink.send_frame(&ServerFrame::error("No messenger selected")).await;
        };
        let (Some(text), Some(recipient)) = (text, recipient) else {
            return sink
                .send_frame(&ServerFrame::error("Missing text or recipient"))
                .await;
        };

        if let Err(e) = messenger.send_message(&text, &recipient).await {
            error!("Send error: {}", e);
            return sink.send_frame(&ServerFrame::error("Error sending message")).await;
        }

        if let Some(identity) = identity {
            let key = messenger.name().to_lowercase();
            if let Err(e) = self.state.last_recipients.save(&key, &identity) {
                warn!("Could not save last recipient for {}: {}", key, e);
            }
        }
        info!("Sent to {} successfully", recipient);
        sink.send_frame(&ServerFrame::Sent { text }).await
    }

    async fn reply<S: FrameSink>(
        &mut self,
        text: Option<String>,
        message_id: Option<String>,
        sink: &mut S,
    ) -> Result<(), SinkClosed> {
        let (Some(text), Some(message_id)) = (text, message_id) else {
            return sink
                .send_frame(&ServerFrame::error("Missing text or messageId"))
                .await;
        };
        let Some(messenger) = self.state.active.current() else {
            return sink.send_frame(&ServerFrame::error("No messenger selected")).await;
        };
        let Some(folders) = messenger.folders() else {
            return sink
                .send_frame(&ServerFrame::error("Messenger does not support replies"))
                .await;
        };

        match folders.reply_to_message(&message_id, &text).await {
            Ok(()) => {
                info!("Replied to {} successfully", message_id);
                sink.send_frame(&ServerFrame::Sent { text }).await
            }
            Err(e) => {
                error!("Reply error: {}", e);
                sink.send_frame(&ServerFrame::error("Error sending reply")).await
            }
        }
    }
}

/// Drives one socket until the client goes away.
pub async fn run(mut conn: WsConnection, mut session: Session, stream: MessageStream) {
    info!("Client connected");
    let mut stream = stream.max_frame_size(MAX_FRAME_SIZE);
    let mut close_reason: Option<CloseReason> = None;

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                if conn.handle_text(&text, &mut session).await.is_err() {
                    break;
                }
            }
            Ok(WsMessage::Binary(bytes)) => conn.push_audio(bytes),
            Ok(WsMessage::Ping(bytes)) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            Ok(WsMessage::Close(reason)) => {
                close_reason = reason;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket protocol error: {}", e);
                break;
            }
        }
    }

    conn.close();
    let _ = session.close(close_reason).await;
    info!("Client disconnected");
}
