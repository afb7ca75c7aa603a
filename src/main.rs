use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_diary::{
    api::routes::{self, AppState},
    config::Config,
    orchestrator::DiaryPipeline,
    services::{ChatResponder, ChatService, GeminiClient, LazyTranscriber},
    storage::{self, SeaOrmDiaryStore, SeaOrmTranscriptStore},
};

#[derive(Parser, Debug)]
#[command(name = "ai-diary", version, about = "Conversational diary service")]
struct Args {
    /// Config file (defaults to ~/.ai-diary/config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::load_from(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server_port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ai_diary={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(config);

    let db_conn = storage::init_db_with(&config.database_url, config.max_connections).await?;
    let store = Arc::new(SeaOrmTranscriptStore::new(db_conn.clone()));
    let diaries = Arc::new(SeaOrmDiaryStore::new(db_conn));

    if !config.has_gemini_key() {
        tracing::warn!(
            "⚠️ No Gemini API key configured. Chat replies will fail and diary drafts use the heuristic."
        );
    }

    let chat_client = Arc::new(GeminiClient::chat_from_config(&config)?);
    let diary_client = Arc::new(GeminiClient::diary_from_config(&config)?);
    tracing::info!(
        "🤖 Gemini models: chat={}, diary={}",
        chat_client.model(),
        diary_client.model()
    );

    let pipeline = Arc::new(DiaryPipeline::new(diary_client).with_timeout(config.generation_timeout()));
    let chat = Arc::new(ChatService::new(store.clone(), ChatResponder::new(chat_client)));
    let transcriber = Arc::new(LazyTranscriber::from_config(&config));

    let state = AppState {
        config: config.clone(),
        store,
        diaries,
        pipeline,
        chat,
        transcriber,
    };

    let app = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!("🎙️ Transcription server: {}", config.transcription_url);

    axum::serve(listener, app).await?;

    Ok(())
}
