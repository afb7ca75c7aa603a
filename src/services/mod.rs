pub mod chat_responder;
pub mod chat_service;
pub mod gemini_client;
pub mod generator;
pub mod transcription;

pub use chat_responder::ChatResponder;
pub use chat_service::{ChatError, ChatService, ChatTurn};
pub use gemini_client::GeminiClient;
pub use generator::{GenerationError, TextGenerator};
pub use transcription::{AudioInput, LazyTranscriber, Transcriber, TranscriptionError};
