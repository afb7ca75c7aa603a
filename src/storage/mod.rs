pub mod db;
pub mod diary_repository;
pub mod entities;
pub mod repository;

pub use db::{init_db, init_db_with};
pub use diary_repository::{DiaryStore, SeaOrmDiaryStore};
pub use entities::{conversations, diaries, messages};
pub use repository::{SeaOrmTranscriptStore, StoreError, TranscriptStore, GREETING};
