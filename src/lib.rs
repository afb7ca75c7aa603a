//! AI Diary - chat through the day, get a diary entry at night

pub mod api;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;

// Re-export main types for convenience
pub use crate::api::dto::*;
pub use crate::api::routes::{create_router, ApiDoc, AppState};
pub use crate::config::Config;
pub use crate::models::internal::{
    Conversation, Diary, DiaryDraft, Message, Mood, Preferences, Role,
};
pub use crate::orchestrator::{heuristic_draft, DiaryPipeline};
pub use crate::services::{ChatService, GeminiClient, LazyTranscriber, TextGenerator, Transcriber};
pub use crate::storage::db::init_db;
pub use crate::storage::diary_repository::{DiaryStore, SeaOrmDiaryStore};
pub use crate::storage::repository::{SeaOrmTranscriptStore, TranscriptStore};
