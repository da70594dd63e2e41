//! Front-end session logic shared by the browser and wearable clients,
//! driven here from a terminal.

pub mod api;
pub mod history;
pub mod link;
pub mod runtime;
pub mod state;
pub mod view;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Connection error: {0}")]
    Link(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
