pub mod active_messenger;
pub mod last_recipient_service;
pub mod settings_service;
pub mod telegram_auth;
pub mod transcription_service;
