use log::{debug, info};
use serde_json::Value;
use crate::config;
use crate::models::settings::SettingsStatus;
use crate::routes::app_state::AppState;
use crate::services::settings_service::SettingsError;
use crate::services::telegram_auth::AuthSnapshot;

/// Configured flags per service. Telegram also reports whether a saved
/// session exists.
pub fn status(state: &AppState) -> SettingsStatus {
    let mut status = state.credentials.status();
    if let Some(telegram) = status.get_mut("telegram") {
        telegram.authenticated = Some(state.telegram_auth.authenticated());
    }
    status
}

pub fn save(state: &AppState, service: &str, body: &Value) -> Result<(), SettingsError> {
    state.credentials.update(service, body)
}

pub fn remove(state: &AppState, service: &str) -> Result<(), SettingsError> {
    state.credentials.remove(service)
}

pub async fn start_telegram_auth(state: &AppState, phone: &str) -> AuthSnapshot {
    info!("Telegram auth requested");
    state.telegram_auth.start(phone).await
}

pub async fn submit_telegram_code(state: &AppState, code: &str) -> AuthSnapshot {
    if let Err(e) = state.telegram_auth.submit_code(code) {
        debug!("Telegram code ignored: {}", e);
    }
    tokio::time::sleep(config::AUTH_SUBMIT_WAIT).await;
    state.telegram_auth.snapshot()
}

pub async fn submit_telegram_password(state: &AppState, password: &str) -> AuthSnapshot {
    if let Err(e) = state.telegram_auth.submit_password(password) {
        debug!("Telegram password ignored: {}", e);
    }
    tokio::time::sleep(config::AUTH_SUBMIT_WAIT).await;
    state.telegram_auth.snapshot()
}
