//! Interactive Telegram login driven by polling HTTP calls.
//!
//! The vendor login runs once in a background task. Whenever it needs a code
//! or a password it parks on a one-shot channel whose sender lives in
//! [`TelegramAuth`] until `submit_code` / `submit_password` delivers it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use grammers_client::{Client, Config, SignInError};
use grammers_session::Session;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use crate::config;
use crate::models::settings::CredentialKey;
use crate::services::settings_service::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Idle,
    AwaitingCode,
    AwaitingPassword,
    Authenticated,
    Error,
}

impl AuthPhase {
    fn in_progress(&self) -> bool {
        matches!(self, AuthPhase::AwaitingCode | AuthPhase::AwaitingPassword)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSnapshot {
    pub state: AuthPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Auth already in progress")]
    InProgress,

    #[error("Not awaiting code")]
    NotAwaitingCode,

    #[error("Not awaiting password")]
    NotAwaitingPassword,

    #[error("Telegram API credentials not configured")]
    NotConfigured,

    #[error("Auth reset")]
    Cancelled,

    #[error("{0}")]
    Login(String),
}

/// Vendor login procedure. Implementations ask `prompts` for the code and,
/// when two-factor auth is on, the password.
#[async_trait]
pub trait LoginDriver: Send + Sync {
    async fn login(&self, phone: &str, prompts: LoginPrompts) -> Result<(), AuthError>;
}

#[derive(Clone, Copy)]
enum Prompt {
    Code,
    Password,
}

/// Handed to a [`LoginDriver`]; each call parks until the matching submit
/// arrives or the flow is reset.
pub struct LoginPrompts {
    auth: TelegramAuth,
    flow_id: u64,
}

impl LoginPrompts {
    pub async fn code(&self) -> Result<String, AuthError> {
        let rx = self.auth.park(self.flow_id, Prompt::Code)?;
        rx.await.map_err(|_| AuthError::Cancelled)
    }

    pub async fn password(&self) -> Result<String, AuthError> {
        let rx = self.auth.park(self.flow_id, Prompt::Password)?;
        rx.await.map_err(|_| AuthError::Cancelled)
    }
}

struct AuthInner {
    phase: AuthPhase,
    error: Option<String>,
    flow_id: u64,
    pending_code: Option<oneshot::Sender<String>>,
    pending_password: Option<oneshot::Sender<String>>,
}

#[derive(Clone)]
pub struct TelegramAuth {
    inner: Arc<Mutex<AuthInner>>,
    phase_tx: Arc<watch::Sender<AuthPhase>>,
    driver: Arc<dyn LoginDriver>,
    session_path: PathBuf,
}

impl TelegramAuth {
    pub fn new(driver: Arc<dyn LoginDriver>, session_path: impl Into<PathBuf>) -> Self {
        let (phase_tx, _) = watch::channel(AuthPhase::Idle);
        TelegramAuth {
            inner: Arc::new(Mutex::new(AuthInner {
                phase: AuthPhase::Idle,
                error: None,
                flow_id: 0,
                pending_code: None,
                pending_password: None,
            })),
            phase_tx: Arc::new(phase_tx),
            driver,
            session_path: session_path.into(),
        }
    }

    /// Grammers-backed flow using the configured data directory.
    pub fn with_grammers(credentials: CredentialStore) -> Self {
        let session_path = config::data_dir().join(config::TELEGRAM_SESSION_FILE);
        let driver = GrammersLoginDriver::new(credentials, session_path.clone());
        Self::new(Arc::new(driver), session_path)
    }

    fn lock(&self) -> MutexGuard<'_, AuthInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, inner: &mut AuthInner, phase: AuthPhase) {
        inner.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let inner = self.lock();
        AuthSnapshot {
            state: inner.phase,
            error: if inner.phase == AuthPhase::Error {
                inner.error.clone()
            } else {
                None
            },
        }
    }

    /// Whether a saved session exists on disk.
    pub fn authenticated(&self) -> bool {
        has_session(&self.session_path)
    }

    /// Launches the login task and waits (bounded) until it asks for a code,
    /// finishes, or fails.
    pub async fn start(&self, phone: &str) -> AuthSnapshot {
        let flow_id = {
            let mut inner = self.lock();
            if inner.phase.in_progress() {
                return AuthSnapshot {
                    state: inner.phase,
                    error: Some(AuthError::InProgress.to_string()),
                };
            }
            inner.flow_id += 1;
            inner.error = None;
            inner.pending_code = None;
            inner.pending_password = None;
            self.set_phase(&mut inner, AuthPhase::Idle);
            inner.flow_id
        };

        let mut phase_rx = self.phase_tx.subscribe();
        let auth = self.clone();
        let phone = phone.to_string();
        tokio::spawn(async move {
            let prompts = LoginPrompts {
                auth: auth.clone(),
                flow_id,
            };
            let result = auth.driver.login(&phone, prompts).await;
            auth.finish(flow_id, result);
        });

        let settled = tokio::time::timeout(
            config::AUTH_START_WAIT,
            phase_rx.wait_for(|phase| {
                matches!(
                    phase,
                    AuthPhase::AwaitingCode | AuthPhase::Authenticated | AuthPhase::Error
                )
            }),
        )
        .await
        .is_ok();
        if !settled {
            warn!("Telegram auth: no response from login within {:?}", config::AUTH_START_WAIT);
        }
        self.snapshot()
    }

    pub fn submit_code(&self, code: &str) -> Result<(), AuthError> {
        let mut inner = self.lock();
        if inner.phase != AuthPhase::AwaitingCode {
            return Err(AuthError::NotAwaitingCode);
        }
        let sender = inner.pending_code.take().ok_or(AuthError::NotAwaitingCode)?;
        sender.send(code.trim().to_string()).map_err(|_| AuthError::Cancelled)
    }

    pub fn submit_password(&self, password: &str) -> Result<(), AuthError> {
        let mut inner = self.lock();
        if inner.phase != AuthPhase::AwaitingPassword {
            return Err(AuthError::NotAwaitingPassword);
        }
        let sender = inner
            .pending_password
            .take()
            .ok_or(AuthError::NotAwaitingPassword)?;
        sender.send(password.to_string()).map_err(|_| AuthError::Cancelled)
    }

    /// Drops pending prompts, which rejects whatever the login task awaits,
    /// and detaches that task from the state.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.flow_id += 1;
        inner.pending_code = None;
        inner.pending_password = None;
        inner.error = None;
        self.set_phase(&mut inner, AuthPhase::Idle);
        info!("Telegram auth reset");
    }

    fn park(&self, flow_id: u64, prompt: Prompt) -> Result<oneshot::Receiver<String>, AuthError> {
        let mut inner = self.lock();
        if inner.flow_id != flow_id {
            return Err(AuthError::Cancelled);
        }
        let (tx, rx) = oneshot::channel();
        match prompt {
            Prompt::Code => {
                inner.pending_code = Some(tx);
                self.set_phase(&mut inner, AuthPhase::AwaitingCode);
            }
            Prompt::Password => {
                inner.pending_password = Some(tx);
                self.set_phase(&mut inner, AuthPhase::AwaitingPassword);
            }
        }
        Ok(rx)
    }

    fn finish(&self, flow_id: u64, result: Result<(), AuthError>) {
        let mut inner = self.lock();
        if inner.flow_id != flow_id {
            return;
        }
        inner.pending_code = None;
        inner.pending_password = None;
        match result {
            Ok(()) => {
                inner.error = None;
                self.set_phase(&mut inner, AuthPhase::Authenticated);
                info!("Telegram authenticated via settings");
            }
            Err(e) => {
                error!("Telegram auth failed: {}", e);
                inner.error = Some(e.to_string());
                self.set_phase(&mut inner, AuthPhase::Error);
            }
        }
    }
}

pub fn has_session(path: &Path) -> bool {
    fs::read(path).map(|bytes| !bytes.is_empty()).unwrap_or(false)
}

/// Loads the saved session, or starts an in-memory one. Nothing is written
/// until sign-in succeeds.
pub fn open_session(path: &Path) -> Result<Session, AuthError> {
    if has_session(path) {
        Session::load_file(path).map_err(login_error)
    } else {
        Ok(Session::new())
    }
}

pub struct GrammersLoginDriver {
    credentials: CredentialStore,
    session_path: PathBuf,
}

impl GrammersLoginDriver {
    pub fn new(credentials: CredentialStore, session_path: PathBuf) -> Self {
        GrammersLoginDriver {
            credentials,
            session_path,
        }
    }

    fn api_credentials(&self) -> Result<(i32, String), AuthError> {
        let api_id = self
            .credentials
            .credential(CredentialKey::TelegramApiId)
            .and_then(|id| id.parse::<i32>().ok())
            .filter(|id| *id != 0);
        let api_hash = self.credentials.credential(CredentialKey::TelegramApiHash);
        match (api_id, api_hash) {
            (Some(id), Some(hash)) => Ok((id, hash)),
            _ => Err(AuthError::NotConfigured),
        }
    }
}

fn login_error(e: impl std::fmt::Display) -> AuthError {
    AuthError::Login(e.to_string())
}

#[async_trait]
impl LoginDriver for GrammersLoginDriver {
    async fn login(&self, phone: &str, prompts: LoginPrompts) -> Result<(), AuthError> {
        let (api_id, api_hash) = self.api_credentials()?;
        let session = open_session(&self.session_path)?;
        let client = Client::connect(Config {
            session,
            api_id,
            api_hash,
            params: Default::default(),
        })
        .await
        .map_err(login_error)?;

        if !client.is_authorized().await.map_err(login_error)? {
            let token = client.request_login_code(phone).await.map_err(login_error)?;
            let code = prompts.code().await?;
            match client.sign_in(&token, &code).await {
                Ok(_) => {}
                Err(SignInError::PasswordRequired(password_token)) => {
                    let password = prompts.password().await?;
                    client
                        .check_password(password_token, password.trim())
                        .await
                        .map_err(login_error)?;
                }
                Err(e) => return Err(login_error(e)),
            }
        }

        client
            .session()
            .save_to_file(&self.session_path)
            .map_err(login_error)?;
        Ok(())
    }
}
