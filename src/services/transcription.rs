use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Transcriber initialization failed: {0}")]
    InitError(String),
}

/// An uploaded recording. Only the file extension of `file_name` matters to backends.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioInput {
    /// Uploads without a usable extension are treated as `.wav`.
    pub fn new(file_name: Option<&str>, bytes: Vec<u8>) -> Self {
        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("wav");

        Self {
            file_name: format!("audio.{}", extension),
            bytes,
        }
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioInput) -> Result<String, TranscriptionError>;
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn Transcriber>, TranscriptionError> + Send + Sync>;

/// Builds the backend on first use and reuses it for every later call.
pub struct LazyTranscriber {
    backend: OnceCell<Arc<dyn Transcriber>>,
    loader: Loader,
}

impl LazyTranscriber {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Transcriber>, TranscriptionError> + Send + Sync + 'static,
    {
        Self {
            backend: OnceCell::new(),
            loader: Box::new(loader),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let base_url = config.transcription_url.clone();
        let model = config.transcription_model.clone();
        let timeout = config.transcription_timeout();

        Self::new(move || {
            tracing::info!("Loading speech recognition backend (model {})", model);
            let backend = WhisperHttpTranscriber::new(base_url.clone(), model.clone(), timeout)?;
            Ok(Arc::new(backend) as Arc<dyn Transcriber>)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.backend.initialized()
    }

    async fn backend(&self) -> Result<&Arc<dyn Transcriber>, TranscriptionError> {
        self.backend
            .get_or_try_init(|| async { (self.loader)() })
            .await
    }
}

#[async_trait]
impl Transcriber for LazyTranscriber {
    async fn transcribe(&self, audio: AudioInput) -> Result<String, TranscriptionError> {
        self.backend().await?.transcribe(audio).await
    }
}

/// Client for an OpenAI-compatible `/v1/audio/transcriptions` endpoint (faster-whisper servers speak it).
#[derive(Clone)]
pub struct WhisperHttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl WhisperHttpTranscriber {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::InitError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperHttpTranscriber {
    async fn transcribe(&self, audio: AudioInput) -> Result<String, TranscriptionError> {
        let size = audio.bytes.len();
        let file = reqwest::multipart::Part::bytes(audio.bytes).file_name(audio.file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        tracing::debug!("Sending {} bytes of audio for transcription", size);

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranscriptionError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        body.into_text()
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
    segments: Option<Vec<Segment>>,
}

#[derive(Deserialize)]
struct Segment {
    text: String,
}

impl TranscriptionResponse {
    /// Segment texts joined by a space, falling back to the whole-text field.
    fn into_text(self) -> Result<String, TranscriptionError> {
        match (self.segments, self.text) {
            (Some(segments), _) if !segments.is_empty() => Ok(segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string()),
            (_, Some(text)) => Ok(text.trim().to_string()),
            (Some(_), None) => Ok(String::new()),
            (None, None) => Err(TranscriptionError::InvalidResponse(
                "response carries neither segments nor text".to_string(),
            )),
        }
    }
}
