//! Executes the effects produced by the state machine and feeds results
//! back in as events.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use bytes::Bytes;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use crate::client::api::BridgeApi;
use crate::client::history::HistoryStore;
use crate::client::link::ServerLink;
use crate::client::state::{reduce, ClientState, Effect, Event};
use crate::client::view::Renderer;
use crate::models::ws_frame::ServerFrame;

/// Microphone stand-in. Captured PCM is pushed as chunks until `stop`.
pub trait AudioSource: Send {
    fn start(&mut self, chunks: mpsc::UnboundedSender<Bytes>);
    fn stop(&mut self);
}

/// 256 ms of 16 kHz mono 16-bit audio.
const PCM_CHUNK_BYTES: usize = 8192;
const PCM_CHUNK_INTERVAL: Duration = Duration::from_millis(256);

/// Replays a raw PCM file at real-time pace.
pub struct PcmFileSource {
    path: PathBuf,
    running: Option<Arc<AtomicBool>>,
}

impl PcmFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PcmFileSource {
            path: path.into(),
            running: None,
        }
    }
}

impl AudioSource for PcmFileSource {
    fn start(&mut self, chunks: mpsc::UnboundedSender<Bytes>) {
        self.stop();
        let pcm = match std::fs::read(&self.path) {
            Ok(pcm) => Bytes::from(pcm),
            Err(e) => {
                warn!("Cannot read audio from {}: {}", self.path.display(), e);
                return;
            }
        };
        let running = Arc::new(AtomicBool::new(true));
        self.running = Some(running.clone());
        info!("Streaming {} bytes from {}", pcm.len(), self.path.display());

        tokio::spawn(async move {
            let mut offset = 0;
            while offset < pcm.len() && running.load(Ordering::SeqCst) {
                let end = (offset + PCM_CHUNK_BYTES).min(pcm.len());
                if chunks.send(pcm.slice(offset..end)).is_err() {
                    break;
                }
                offset = end;
                tokio::time::sleep(PCM_CHUNK_INTERVAL).await;
            }
        });
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct FetchSet {
    next_id: u64,
    handles: HashMap<u64, AbortHandle>,
}

/// In-flight fetches, so they can all be cancelled when the page hides.
#[derive(Clone, Default)]
struct FetchRegistry {
    inner: Arc<Mutex<FetchSet>>,
}

impl FetchRegistry {
    fn register(&self) -> (u64, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let mut set = match self.inner.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.next_id += 1;
        let id = set.next_id;
        set.handles.insert(id, handle);
        (id, registration)
    }

    fn finish(&self, id: u64) {
        if let Ok(mut set) = self.inner.lock() {
            set.handles.remove(&id);
        }
    }

    fn abort_all(&self) {
        if let Ok(mut set) = self.inner.lock() {
            for (_, handle) in set.handles.drain() {
                handle.abort();
            }
        }
    }
}

pub struct Runtime {
    state: ClientState,
    api: Arc<dyn BridgeApi>,
    link: Arc<dyn ServerLink>,
    audio: Box<dyn AudioSource>,
    renderer: Box<dyn Renderer>,
    history: HistoryStore,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    audio_tx: mpsc::UnboundedSender<Bytes>,
    audio_rx: mpsc::UnboundedReceiver<Bytes>,
    fetches: FetchRegistry,
}

impl Runtime {
    pub fn new(
        api: Arc<dyn BridgeApi>,
        link: Arc<dyn ServerLink>,
        audio: Box<dyn AudioSource>,
        renderer: Box<dyn Renderer>,
        history: HistoryStore,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        Runtime {
            state: ClientState::default(),
            api,
            link,
            audio,
            renderer,
            history,
            events_tx,
            events_rx,
            audio_tx,
            audio_rx,
            fetches: FetchRegistry::default(),
        }
    }

    /// Handle for feeding user input into the running loop.
    pub fn events(&self) -> mpsc::UnboundedSender<Event> {
        self.events_tx.clone()
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Runs until an `Event::Quit` arrives and returns the final state.
    pub async fn run(mut self) -> ClientState {
        self.link.connect(self.events_tx.clone());
        self.dispatch(Event::Started).await;

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(Event::Quit) | None => break,
                    Some(event) => self.dispatch(event).await,
                },
                Some(chunk) = self.audio_rx.recv() => {
                    if self.state.recording {
                        if let Err(e) = self.link.send_audio(chunk).await {
                            warn!("Dropping audio chunk: {}", e);
                        }
                    }
                }
            }
        }

        self.fetches.abort_all();
        self.audio.stop();
        self.state
    }

    pub async fn dispatch(&mut self, event: Event) {
        debug!("Event: {:?}", event);
        let (next, effects) = reduce(&self.state, event);
        self.state = next;
        for effect in effects {
            self.execute(effect).await;
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Render => self.renderer.render(&self.state),
            Effect::Fetch {
                nav,
                purpose,
                request,
                attempt,
                delay,
            } => {
                let (id, registration) = self.fetches.register();
                let api = self.api.clone();
                let events = self.events_tx.clone();
                let fetches = self.fetches.clone();
                tokio::spawn(async move {
                    let pending = request.clone();
                    let work = Abortable::new(
                        async move {
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            api.fetch(&pending).await
                        },
                        registration,
                    );
                    match work.await {
                        Ok(Ok(response)) => {
                            let _ = events.send(Event::FetchOk {
                                nav,
                                purpose,
                                response,
                            });
                        }
                        Ok(Err(e)) => {
                            warn!("Fetch {:?} attempt {} failed: {}", request, attempt, e);
                            let _ = events.send(Event::FetchFailed {
                                nav,
                                purpose,
                                request,
                                attempt,
                                error: e.to_string(),
                            });
                        }
                        Err(_) => debug!("Fetch {:?} aborted", request),
                    }
                    fetches.finish(id);
                });
            }
            Effect::Send(frame) => {
                if let Err(e) = self.link.send_frame(&frame).await {
                    warn!("Cannot send frame: {}", e);
                    let _ = self
                        .events_tx
                        .send(Event::Server(ServerFrame::error("Not connected to server")));
                }
            }
            Effect::Schedule { delay, event } => {
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(event);
                });
            }
            Effect::AbortFetches => self.fetches.abort_all(),
            Effect::Reconnect => self.link.reconnect_now(),
            Effect::StartCapture => self.audio.start(self.audio_tx.clone()),
            Effect::StopCapture => self.audio.stop(),
            Effect::SaveHistory { text, contact } => {
                if let Err(e) = self.history.push(&text, &contact) {
                    warn!("Could not save history: {}", e);
                }
            }
        }
    }
}
