//! Speech-to-text for recorded PCM audio.
//!
//! Raw 16 kHz mono PCM is wrapped into a WAV container and posted to the
//! OpenAI transcription endpoint.

use std::io::Cursor;
use std::time::Duration;
use async_trait::async_trait;
use log::{error, info};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use crate::config;
use crate::models::settings::CredentialKey;
use crate::services::settings_service::CredentialStore;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("OpenAI API key not configured. Add it in Settings or set OPENAI_API_KEY.")]
    MissingApiKey,

    #[error("Failed to encode audio: {0}")]
    Encoding(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("OpenAI API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

impl From<hound::Error> for TranscriptionError {
    fn from(e: hound::Error) -> Self {
        TranscriptionError::Encoding(e.to_string())
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, TranscriptionError>;
}

/// Playback length of a PCM buffer in seconds.
pub fn pcm_duration_secs(byte_len: usize) -> f64 {
    let bytes_per_second = config::SAMPLE_RATE as usize
        * config::CHANNELS as usize
        * (config::BITS_PER_SAMPLE as usize / 8);
    byte_len as f64 / bytes_per_second as f64
}

/// Wraps little-endian 16-bit PCM in a RIFF/WAVE container.
/// A trailing odd byte is dropped.
pub fn pcm_to_wav(pcm: &[u8]) -> Result<Vec<u8>, TranscriptionError> {
    let spec = hound::WavSpec {
        channels: config::CHANNELS,
        sample_rate: config::SAMPLE_RATE,
        bits_per_sample: config::BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for frame in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([frame[0], frame[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct WhisperTranscriber {
    credentials: CredentialStore,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(credentials: CredentialStore) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;
        Ok(WhisperTranscriber { credentials, client })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, TranscriptionError> {
        let api_key = self
            .credentials
            .credential(CredentialKey::OpenAiApiKey)
            .ok_or(TranscriptionError::MissingApiKey)?;

        let wav = pcm_to_wav(pcm)?;
        info!("Transcribing {} bytes of WAV audio", wav.len());

        let file_part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Encoding(e.to_string()))?;
        let form = Form::new()
            .part("file", file_part)
            .text("model", config::WHISPER_MODEL);

        let response = self
            .client
            .post(config::OPENAI_TRANSCRIPTION_URL)
            .bearer_auth(&api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: WhisperResponse = response
                .json()
                .await
                .map_err(|e| TranscriptionError::Parse(e.to_string()))?;
            info!("Transcription successful: {} chars", body.text.len());
            Ok(body.text)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&error_text) {
                Ok(parsed) => parsed.error.message,
                Err(_) => error_text,
            };
            error!("OpenAI API error ({}): {}", status.as_u16(), message);
            Err(TranscriptionError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
