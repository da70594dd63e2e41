use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub fn init_logging() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

/// Loads `.env` if one exists. Missing files are fine.
pub fn load_env() {
    if dotenv::dotenv().is_ok() {
        log::info!("Loaded environment from .env");
    }
}

const DEFAULT_PORT: u16 = 3000;
const BIND_HOST: &str = "0.0.0.0";

pub fn port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

pub fn bind_host() -> &'static str {
    BIND_HOST
}

pub fn data_dir() -> PathBuf {
    env::var("BRIDGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn public_dir() -> PathBuf {
    env::var("BRIDGE_PUBLIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./public"))
}

pub const SETTINGS_FILE: &str = "settings.json";
pub const TELEGRAM_SESSION_FILE: &str = "telegram-session.txt";

// Audio arrives as 16 kHz mono signed 16-bit little-endian PCM.
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

pub const WHISPER_MODEL: &str = "whisper-1";
pub const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

pub const CONVERSATION_MESSAGE_LIMIT: usize = 4;
pub const FOLDER_MESSAGE_LIMIT: usize = 10;
pub const SNIPPET_MAX_CHARS: usize = 80;
pub const BODY_MAX_CHARS: usize = 2000;

pub const AUTH_START_WAIT: Duration = Duration::from_secs(15);
pub const AUTH_SUBMIT_WAIT: Duration = Duration::from_secs(2);

// Front-end pacing.
pub const FETCH_MAX_RETRIES: u32 = 3;
pub const FETCH_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const FALLBACK_DELAY: Duration = Duration::from_secs(3);
pub const CONVERSATION_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const DISPLAY_NAME_MAX_CHARS: usize = 28;
pub const HISTORY_MAX_ENTRIES: usize = 100;
