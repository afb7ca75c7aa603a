use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

/// Main configuration for the AI diary service
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// HTTP server port
    #[validate(range(min = 1024, max = 65535))]
    pub server_port: u16,

    /// Address the HTTP server binds to
    pub server_host: String,

    /// Database URL (SeaORM / SQLite)
    pub database_url: String,

    /// Maximum database connections
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    /// Gemini API key; without one every diary draft comes from the heuristic
    pub gemini_api_key: Option<String>,

    /// Gemini REST base URL
    #[validate(url)]
    pub gemini_base_url: String,

    /// Model used for chat replies
    pub chat_model: String,

    /// Model used for diary synthesis
    pub diary_model: String,

    /// Timeout for a single generation call, in seconds
    #[validate(range(min = 1, max = 600))]
    pub generation_timeout_secs: u64,

    /// Whisper-compatible transcription server base URL
    #[validate(url)]
    pub transcription_url: String,

    /// Speech recognition model name
    pub transcription_model: String,

    /// Timeout for a single transcription call, in seconds
    #[validate(range(min = 1, max = 600))]
    pub transcription_timeout_secs: u64,

    /// Largest accepted audio upload, in bytes
    #[validate(range(min = 1024))]
    pub max_audio_bytes: usize,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8001,
            server_host: "127.0.0.1".to_string(),
            database_url: "sqlite://ai-diary.db".to_string(),
            max_connections: 10,
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            chat_model: "gemini-2.0-flash-lite".to_string(),
            diary_model: "gemini-2.0-flash-lite".to_string(),
            generation_timeout_secs: 30,
            transcription_url: "http://localhost:9000".to_string(),
            transcription_model: "tiny".to_string(),
            transcription_timeout_secs: 120,
            max_audio_bytes: 25 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `~/.ai-diary/config` (or `path`), then `AI_DIARY__*` environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Config::default();

        let file_source = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::from(default_config_path()).required(false),
        };

        let settings = config::Config::builder()
            .set_default("server_port", defaults.server_port as i64)?
            .set_default("server_host", defaults.server_host)?
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", defaults.max_connections as i64)?
            .set_default("gemini_base_url", defaults.gemini_base_url)?
            .set_default("chat_model", defaults.chat_model)?
            .set_default("diary_model", defaults.diary_model)?
            .set_default("generation_timeout_secs", defaults.generation_timeout_secs as i64)?
            .set_default("transcription_url", defaults.transcription_url)?
            .set_default("transcription_model", defaults.transcription_model)?
            .set_default("transcription_timeout_secs", defaults.transcription_timeout_secs as i64)?
            .set_default("max_audio_bytes", defaults.max_audio_bytes as i64)?
            .set_default("log_level", defaults.log_level)?
            .add_source(file_source)
            // Environment overrides: AI_DIARY__SERVER_PORT, AI_DIARY__GEMINI_API_KEY, etc.
            .add_source(config::Environment::with_prefix("AI_DIARY").separator("__"))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    pub fn has_gemini_key(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ai-diary")
        .join("config")
}
