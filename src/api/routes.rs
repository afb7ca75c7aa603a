use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::dto::*;
use crate::config::Config;
use crate::models::internal::{
    ConversationStatus, Diary, DiaryDraft, DiaryUpdate, Message, Mood, NewDiary, Preferences,
    Role,
};
use crate::orchestrator::synthesizer::{coerce_mood_score, FALLBACK_TITLE};
use crate::orchestrator::DiaryPipeline;
use crate::services::chat_service::{ChatError, ChatService};
use crate::services::transcription::{AudioInput, Transcriber};
use crate::storage::diary_repository::DiaryStore;
use crate::storage::repository::{StoreError, TranscriptStore, DAY_FORMAT};

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn TranscriptStore>,
    pub diaries: Arc<dyn DiaryStore>,
    pub pipeline: Arc<DiaryPipeline>,
    pub chat: Arc<ChatService>,
    pub transcriber: Arc<dyn Transcriber>,
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: status.as_u16() as u32,
        }),
    )
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => error(StatusCode::NOT_FOUND, "Conversation not found"),
        StoreError::ConversationCompleted(_) => error(StatusCode::CONFLICT, e.to_string()),
        StoreError::DiaryNotFound(_) => error(StatusCode::NOT_FOUND, "Diary not found"),
        StoreError::DbError(_) | StoreError::Corrupt(_) => {
            tracing::error!("Transcript store failure: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn chat_error(e: ChatError) -> ApiError {
    match e {
        ChatError::Store(inner) => store_error(inner),
        ChatError::Generation(_) => {
            tracing::warn!("Chat reply failed: {}", e);
            error(StatusCode::BAD_GATEWAY, e.to_string())
        }
        ChatError::Transcription(_) => {
            tracing::warn!("{}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    error(e.status(), e.body_text())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT).ok()
}

fn summaries(diaries: &[Diary]) -> Vec<DiarySummary> {
    diaries.iter().map(DiarySummary::from).collect()
}

/// First multipart field named `file`, if any.
async fn read_audio(multipart: &mut Multipart) -> Result<Option<AudioInput>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(AudioInput::new(file_name.as_deref(), bytes.to_vec())));
    }
    Ok(None)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply and today's history", body = ChatResponse),
        (status = 400, description = "Missing user_id or text", body = ErrorResponse),
        (status = 502, description = "Reply generation failed", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Missing user_id"));
    }
    if req.text.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Missing text"));
    }

    let turn = state
        .chat
        .chat_turn(&req.user_id, &req.text)
        .await
        .map_err(chat_error)?;

    Ok(Json(ChatResponse {
        reply: turn.reply,
        history: turn.history,
    }))
}

#[utoipa::path(
    post,
    path = "/api/chat/audio",
    params(("user_id" = String, Query, description = "Current user id")),
    responses(
        (status = 200, description = "Assistant reply to the transcribed recording", body = ChatResponse),
        (status = 400, description = "Missing user_id or file", body = ErrorResponse),
        (status = 500, description = "Transcription failed", body = ErrorResponse),
        (status = 502, description = "Reply generation failed", body = ErrorResponse)
    )
)]
pub async fn chat_audio(
    State(state): State<AppState>,
    Query(params): Query<AudioChatParams>,
    mut multipart: Multipart,
) -> Result<Json<ChatResponse>, ApiError> {
    if params.user_id.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Missing user_id"));
    }

    let audio = read_audio(&mut multipart)
        .await?
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "Missing file"))?;

    let turn = state
        .chat
        .audio_turn(&params.user_id, audio, state.transcriber.as_ref())
        .await
        .map_err(chat_error)?;

    Ok(Json(ChatResponse {
        reply: turn.reply,
        history: turn.history,
    }))
}

#[utoipa::path(
    post,
    path = "/api/transcribe",
    responses(
        (status = 200, description = "Recognized text", body = TranscribeResponse),
        (status = 400, description = "Missing file", body = ErrorResponse),
        (status = 500, description = "Transcription failed", body = ErrorResponse)
    )
)]
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let audio = read_audio(&mut multipart)
        .await?
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "Missing file"))?;

    let text = state.transcriber.transcribe(audio).await.map_err(|e| {
        tracing::warn!("Transcription failed: {}", e);
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Transcription failed: {}", e),
        )
    })?;

    Ok(Json(TranscribeResponse { text }))
}

#[utoipa::path(
    post,
    path = "/api/generate-diary",
    request_body = GenerateDiaryRequest,
    responses(
        (status = 200, description = "Diary draft", body = DiaryDraft),
        (status = 400, description = "Empty or assistant-only transcript", body = ErrorResponse)
    )
)]
pub async fn generate_diary(
    State(state): State<AppState>,
    Json(req): Json<GenerateDiaryRequest>,
) -> Result<Json<DiaryDraft>, ApiError> {
    if req.messages.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "No messages provided"));
    }

    let messages: Vec<Message> = req.messages.into_iter().map(Message::from).collect();
    if !messages.iter().any(|m| m.role.is_user()) {
        return Err(error(StatusCode::BAD_REQUEST, "Transcript has no user messages"));
    }

    let draft = state
        .pipeline
        .generate_draft(&messages, req.preferences.as_ref())
        .await;
    Ok(Json(draft))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/draft",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = DraftRequest,
    responses(
        (status = 200, description = "Diary draft for the stored transcript", body = ConversationDraftResponse),
        (status = 400, description = "Conversation has no user messages", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    )
)]
pub async fn draft_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<DraftRequest>>,
) -> Result<Json<ConversationDraftResponse>, ApiError> {
    let conversation = state
        .store
        .find_by_id(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Conversation not found"))?;

    if !conversation.has_user_message() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Conversation has no user messages",
        ));
    }

    let preferences = body.and_then(|Json(req)| req.preferences);
    let draft = state
        .pipeline
        .generate_draft(&conversation.messages, preferences.as_ref())
        .await;

    Ok(Json(ConversationDraftResponse::new(
        conversation.id,
        conversation.day,
        draft,
    )))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/complete",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation completed", body = CompleteResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
        (status = 409, description = "Conversation already completed", body = ErrorResponse)
    )
)]
pub async fn complete_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompleteResponse>, ApiError> {
    state.store.complete(id).await.map_err(store_error)?;

    Ok(Json(CompleteResponse {
        conversation_id: id,
        status: ConversationStatus::Completed.as_str().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/save",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = SaveDiaryRequest,
    responses(
        (status = 200, description = "Diary saved", body = DiaryResponse),
        (status = 400, description = "Missing content", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    )
)]
pub async fn save_diary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveDiaryRequest>,
) -> Result<Json<DiaryResponse>, ApiError> {
    let conversation = state
        .store
        .find_by_id(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Conversation not found"))?;

    if req.content.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Missing content"));
    }

    let entry_date = req
        .entry_date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or_else(today);
    let title = match req.title.trim() {
        "" => FALLBACK_TITLE.to_string(),
        title => title.to_string(),
    };

    let draft = DiaryDraft {
        title,
        content: req.content.trim().to_string(),
        summary: req.summary.map(|s| s.trim().to_string()).unwrap_or_default(),
        mood: req.mood.as_deref().map(Mood::parse_lenient).unwrap_or_default(),
        mood_score: req.mood_score.as_ref().map(coerce_mood_score).unwrap_or(0),
    };

    let diary = state
        .diaries
        .save(NewDiary {
            owner_id: conversation.owner_id,
            conversation_id: Some(conversation.id),
            entry_date,
            draft,
        })
        .await
        .map_err(store_error)?;

    // Saving closes the day's conversation
    match state.store.complete(id).await {
        Ok(()) | Err(StoreError::ConversationCompleted(_)) => {}
        Err(e) => tracing::warn!("Saved diary {} but could not complete {}: {}", diary.id, id, e),
    }

    Ok(Json(DiaryResponse::from(diary)))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/diaries",
    params(
        ("user_id" = String, Path, description = "Owner id"),
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("limit" = Option<u64>, Query, description = "Page size, default 10, at most 100")
    ),
    responses((status = 200, description = "Diaries, newest entry date first", body = DiaryListResponse))
)]
pub async fn list_diaries(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<DiaryListParams>,
) -> Result<Json<DiaryListResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let (diaries, total) = state
        .diaries
        .list(&user_id, page, limit)
        .await
        .map_err(store_error)?;

    Ok(Json(DiaryListResponse {
        diaries: summaries(&diaries),
        total,
        page,
        pages: total.div_ceil(limit),
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/diaries/search",
    params(
        ("user_id" = String, Path, description = "Owner id"),
        ("q" = String, Query, description = "Text to find in title or content")
    ),
    responses((status = 200, description = "Matching diaries", body = DiarySearchResponse))
)]
pub async fn search_diaries(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<DiarySearchParams>,
) -> Result<Json<DiarySearchResponse>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(DiarySearchResponse {
            diaries: Vec::new(),
        }));
    }

    let diaries = state
        .diaries
        .search(&user_id, query)
        .await
        .map_err(store_error)?;

    Ok(Json(DiarySearchResponse {
        diaries: summaries(&diaries),
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/diaries/calendar",
    params(
        ("user_id" = String, Path, description = "Owner id"),
        ("year" = Option<i32>, Query, description = "Defaults to the current UTC year"),
        ("month" = Option<u32>, Query, description = "1-12, defaults to the current UTC month")
    ),
    responses(
        (status = 200, description = "The month's diaries grouped by entry date", body = CalendarResponse),
        (status = 400, description = "Month out of range", body = ErrorResponse)
    )
)]
pub async fn diary_calendar(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<CalendarParams>,
) -> Result<Json<CalendarResponse>, ApiError> {
    let now = today();
    let year = params.year.unwrap_or(now.year());
    let month = params.month.unwrap_or(now.month());
    if !(1..=12).contains(&month) {
        return Err(error(StatusCode::BAD_REQUEST, "month must be between 1 and 12"));
    }

    let diaries = state
        .diaries
        .in_month(&user_id, year, month)
        .await
        .map_err(store_error)?;

    let mut diaries_by_date: BTreeMap<String, Vec<DiarySummary>> = BTreeMap::new();
    for diary in &diaries {
        diaries_by_date
            .entry(diary.entry_date.format(DAY_FORMAT).to_string())
            .or_default()
            .push(DiarySummary::from(diary));
    }

    Ok(Json(CalendarResponse {
        year,
        month,
        diaries_by_date,
    }))
}

#[utoipa::path(
    get,
    path = "/api/diaries/{id}",
    params(("id" = Uuid, Path, description = "Diary id")),
    responses(
        (status = 200, description = "Diary", body = DiaryResponse),
        (status = 404, description = "Diary not found", body = ErrorResponse)
    )
)]
pub async fn get_diary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DiaryResponse>, ApiError> {
    let diary = state
        .diaries
        .get(id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Diary not found"))?;

    Ok(Json(DiaryResponse::from(diary)))
}

#[utoipa::path(
    put,
    path = "/api/diaries/{id}",
    params(("id" = Uuid, Path, description = "Diary id")),
    request_body = UpdateDiaryRequest,
    responses(
        (status = 200, description = "Updated diary", body = DiaryResponse),
        (status = 400, description = "Invalid entry_date", body = ErrorResponse),
        (status = 404, description = "Diary not found", body = ErrorResponse)
    )
)]
pub async fn update_diary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDiaryRequest>,
) -> Result<Json<DiaryResponse>, ApiError> {
    let entry_date = match req.entry_date.as_deref() {
        Some(raw) => Some(
            parse_date(raw)
                .ok_or_else(|| error(StatusCode::BAD_REQUEST, "entry_date must be YYYY-MM-DD"))?,
        ),
        None => None,
    };

    let update = DiaryUpdate {
        title: req.title,
        content: req.content,
        summary: req.summary,
        mood: req.mood.as_deref().map(Mood::parse_lenient),
        mood_score: req.mood_score.as_ref().map(coerce_mood_score),
        entry_date,
    };

    let diary = state
        .diaries
        .update(id, update)
        .await
        .map_err(store_error)?;

    Ok(Json(DiaryResponse::from(diary)))
}

#[utoipa::path(
    delete,
    path = "/api/diaries/{id}",
    params(("id" = Uuid, Path, description = "Diary id")),
    responses(
        (status = 200, description = "Diary deleted", body = DeleteResponse),
        (status = 404, description = "Diary not found", body = ErrorResponse)
    )
)]
pub async fn delete_diary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.diaries.delete(id).await.map_err(store_error)?;
    Ok(Json(DeleteResponse { deleted: true }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        chat,
        chat_audio,
        transcribe,
        generate_diary,
        draft_conversation,
        complete_conversation,
        save_diary,
        list_diaries,
        search_diaries,
        diary_calendar,
        get_diary,
        update_diary,
        delete_diary
    ),
    components(schemas(
        ChatRequest,
        ChatResponse,
        TranscribeResponse,
        TranscriptMessageDto,
        GenerateDiaryRequest,
        DraftRequest,
        ConversationDraftResponse,
        CompleteResponse,
        SaveDiaryRequest,
        UpdateDiaryRequest,
        DiaryResponse,
        DiarySummary,
        DiaryListResponse,
        DiarySearchResponse,
        CalendarResponse,
        DeleteResponse,
        HealthResponse,
        ErrorResponse,
        DiaryDraft,
        Message,
        Mood,
        Preferences,
        Role
    )),
    tags((name = "ai-diary", description = "Conversational diary API"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_audio_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/audio", post(chat_audio))
        .route("/api/transcribe", post(transcribe))
        .route("/api/generate-diary", post(generate_diary))
        .route("/api/conversations/{id}/draft", post(draft_conversation))
        .route("/api/conversations/{id}/complete", post(complete_conversation))
        .route("/api/conversations/{id}/save", post(save_diary))
        .route("/api/users/{user_id}/diaries", get(list_diaries))
        .route("/api/users/{user_id}/diaries/search", get(search_diaries))
        .route("/api/users/{user_id}/diaries/calendar", get(diary_calendar))
        .route(
            "/api/diaries/{id}",
            get(get_diary).put(update_diary).delete(delete_diary),
        )
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
