use std::sync::Arc;
use log::info;
use crate::handlers::ApiError;
use crate::messengers::Messenger;
use crate::models::conversation::{Contact, Folder, FolderMessage, Message};
use crate::models::last_recipient::LastRecipient;
use crate::routes::app_state::AppState;
use crate::config;

fn active(state: &AppState) -> Result<Arc<dyn Messenger>, ApiError> {
    state.active.current().ok_or_else(ApiError::no_messenger)
}

pub fn available_messengers(state: &AppState) -> Vec<String> {
    state.registry.available()
}

pub async fn contacts(state: &AppState) -> Result<Vec<Contact>, ApiError> {
    let messenger = active(state)?;
    let started = std::time::Instant::now();
    let contacts = messenger
        .get_contacts()
        .await
        .map_err(ApiError::upstream("Failed to fetch contacts"))?;
    info!("api:contacts {} in {:?}", contacts.len(), started.elapsed());
    Ok(contacts)
}

pub fn last_recipient(state: &AppState) -> Option<LastRecipient> {
    let name = state
        .active
        .current_name()
        .map(|n| n.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());
    state.last_recipients.load(&name)
}

pub async fn messages(state: &AppState, entity_id: &str) -> Result<Vec<Message>, ApiError> {
    let messenger = active(state)?;
    messenger
        .get_messages(entity_id, config::CONVERSATION_MESSAGE_LIMIT)
        .await
        .map_err(ApiError::upstream("Failed to fetch messages"))
}

pub async fn folders(state: &AppState) -> Result<Vec<Folder>, ApiError> {
    let messenger = active(state)?;
    let folders = messenger
        .folders()
        .ok_or_else(|| ApiError::BadRequest("Messenger does not support folders".to_string()))?;
    let started = std::time::Instant::now();
    let result = folders
        .get_folders()
        .await
        .map_err(ApiError::upstream("Failed to fetch folders"))?;
    info!("api:folders {} in {:?}", result.len(), started.elapsed());
    Ok(result)
}

/// `limit` falls back to the default when missing, zero or not a number.
pub fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|l| l.trim().parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(config::FOLDER_MESSAGE_LIMIT)
}

pub async fn folder_messages(
    state: &AppState,
    folder_id: &str,
    limit: usize,
) -> Result<Vec<FolderMessage>, ApiError> {
    let messenger = active(state)?;
    let folders = messenger.folders().ok_or_else(|| {
        ApiError::BadRequest("Messenger does not support folder messages".to_string())
    })?;
    let started = std::time::Instant::now();
    let messages = folders
        .get_folder_messages(folder_id, limit)
        .await
        .map_err(ApiError::upstream("Failed to fetch folder messages"))?;
    info!("api:folder-messages {} in {:?}", messages.len(), started.elapsed());
    Ok(messages)
}

pub async fn folder_message(
    state: &AppState,
    folder_id: &str,
    message_id: &str,
) -> Result<FolderMessage, ApiError> {
    let messenger = active(state)?;
    let folders = messenger.folders().ok_or_else(|| {
        ApiError::BadRequest("Messenger does not support folder messages".to_string())
    })?;
    folders
        .get_folder_message(folder_id, message_id)
        .await
        .map_err(ApiError::upstream("Failed to fetch message"))
}
