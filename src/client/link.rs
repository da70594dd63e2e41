use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;
use crate::client::state::Event;
use crate::client::ClientError;
use crate::config;
use crate::models::ws_frame::{ClientFrame, ServerFrame};

/// The duplex `/ws` connection as seen by the runtime.
#[async_trait]
pub trait ServerLink: Send + Sync {
    /// Starts the connection and keeps it alive, reporting server frames and
    /// connect/disconnect transitions on `events`.
    fn connect(&self, events: mpsc::UnboundedSender<Event>);

    /// Skips the remaining wait before the next reconnect attempt.
    fn reconnect_now(&self);

    async fn send_frame(&self, frame: &ClientFrame) -> Result<(), ClientError>;

    async fn send_audio(&self, pcm: Bytes) -> Result<(), ClientError>;
}

/// `http(s)://host/base` to `ws(s)://host/ws`.
pub fn ws_url(base: &Url) -> Result<Url, ClientError> {
    let mut url = base.join("/ws")?;
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Link(format!("Cannot derive websocket URL from {}", base)))?;
    Ok(url)
}

pub struct WsLink {
    url: Url,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<WsMessage>>>>,
    wake: Arc<Notify>,
}

impl WsLink {
    pub fn new(base: &Url) -> Result<Self, ClientError> {
        Ok(WsLink {
            url: ws_url(base)?,
            outbound: Arc::new(Mutex::new(None)),
            wake: Arc::new(Notify::new()),
        })
    }

    fn queue(&self, message: WsMessage) -> Result<(), ClientError> {
        let guard = self
            .outbound
            .lock()
            .map_err(|_| ClientError::Link("Connection state poisoned".to_string()))?;
        let tx = guard
            .as_ref()
            .ok_or_else(|| ClientError::Link("Not connected".to_string()))?;
        tx.send(message)
            .map_err(|_| ClientError::Link("Connection closed".to_string()))
    }
}

fn set_outbound(
    slot: &Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    value: Option<mpsc::UnboundedSender<WsMessage>>,
) {
    if let Ok(mut guard) = slot.lock() {
        *guard = value;
    }
}

#[async_trait]
impl ServerLink for WsLink {
    fn connect(&self, events: mpsc::UnboundedSender<Event>) {
        let url = self.url.clone();
        let outbound = self.outbound.clone();
        let wake = self.wake.clone();

        tokio::spawn(async move {
            loop {
                match tokio_tungstenite::connect_async(url.as_str()).await {
                    Ok((stream, _)) => {
                        info!("Connected to {}", url);
                        let (mut sink, mut source) = stream.split();
                        let (tx, mut rx) = mpsc::unbounded_channel();
                        set_outbound(&outbound, Some(tx));
                        if events.send(Event::Connected).is_err() {
                            return;
                        }

                        loop {
                            tokio::select! {
                                out = rx.recv() => match out {
                                    Some(message) => {
                                        if let Err(e) = sink.send(message).await {
                                            warn!("Websocket send failed: {}", e);
                                            break;
                                        }
                                    }
                                    None => break,
                                },
                                incoming = source.next() => match incoming {
                                    Some(Ok(WsMessage::Text(text))) => {
                                        match serde_json::from_str::<ServerFrame>(&text) {
                                            Ok(frame) => {
                                                if events.send(Event::Server(frame)).is_err() {
                                                    return;
                                                }
                                            }
                                            Err(e) => warn!("Ignoring malformed server frame: {}", e),
                                        }
                                    }
                                    Some(Ok(WsMessage::Close(_))) | None => break,
                                    Some(Err(e)) => {
                                        warn!("Websocket error: {}", e);
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                },
                            }
                        }

                        set_outbound(&outbound, None);
                        info!("Disconnected from {}", url);
                        if events.send(Event::Disconnected).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Connecting to {} failed: {}", url, e),
                }

                tokio::select! {
                    _ = tokio::time::sleep(config::RECONNECT_DELAY) => {}
                    _ = wake.notified() => {}
                }
            }
        });
    }

    fn reconnect_now(&self) {
        self.wake.notify_one();
    }

    async fn send_frame(&self, frame: &ClientFrame) -> Result<(), ClientError> {
        let text = serde_json::to_string(frame)?;
        self.queue(WsMessage::Text(text))
    }

    async fn send_audio(&self, pcm: Bytes) -> Result<(), ClientError> {
        self.queue(WsMessage::Binary(pcm.to_vec()))
    }
}
