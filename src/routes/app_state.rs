use std::sync::Arc;
use crate::messengers::MessengerFactory;
use crate::services::active_messenger::ActiveMessenger;
use crate::services::last_recipient_service::LastRecipientStore;
use crate::services::settings_service::CredentialStore;
use crate::services::telegram_auth::TelegramAuth;
use crate::services::transcription_service::Transcriber;

#[derive(Clone)]
pub struct AppState {
    pub active: ActiveMessenger,
    pub registry: Arc<dyn MessengerFactory>,
    pub credentials: CredentialStore,
    pub last_recipients: LastRecipientStore,
    pub transcriber: Arc<dyn Transcriber>,
    pub telegram_auth: TelegramAuth,
}
