pub mod api_handler;
pub mod settings_handler;
pub mod ws_handler;

use actix_web::HttpResponse;
use log::error;
use serde_json::json;
use crate::messengers::MessengerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// An adapter call failed. `context` is what the client is told.
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: MessengerError,
    },
}

impl ApiError {
    pub fn no_messenger() -> Self {
        ApiError::BadRequest("No messenger selected".to_string())
    }

    pub fn upstream(context: &'static str) -> impl FnOnce(MessengerError) -> ApiError {
        move |source| ApiError::Upstream { context, source }
    }

    pub fn to_response(&self) -> HttpResponse {
        match self {
            ApiError::BadRequest(message) => HttpResponse::BadRequest().json(json!({ "error": message })),
            ApiError::Upstream { context, source } => {
                error!("{}: {}", context, source);
                HttpResponse::InternalServerError().json(json!({ "error": context }))
            }
        }
    }
}
