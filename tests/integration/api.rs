use super::{
    create_test_app, create_test_app_with, json, Arc, BrokenTranscriber, FixedGenerator,
    FixedTranscriber, UnavailableGenerator, Uuid,
};
use ai_diary::models::internal::{DiaryDraft, Mood, NewDiary};
use ai_diary::orchestrator::heuristic;
use ai_diary::storage::DiaryStore;
use chrono::NaiveDate;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "diary-test-boundary";

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, value)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_audio(uri: &str, field_name: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"note.m4a\"\r\n\
         Content-Type: audio/mp4\r\n\r\nfake-audio-bytes\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field_name
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

// ============================================
// Health & docs
// ============================================

#[tokio::test]
async fn test_health() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/chat"));
    assert!(paths.contains_key("/api/generate-diary"));
    assert!(paths.contains_key("/api/conversations/{id}/draft"));
    assert!(paths.contains_key("/api/conversations/{id}/save"));
    assert!(paths.contains_key("/api/diaries/{id}"));
}

// ============================================
// Chat
// ============================================

#[tokio::test]
async fn test_chat_returns_reply_and_history() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        post_json("/api/chat", json!({"user_id": "u1", "text": "I baked bread"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "What a day! Glad you told me.");
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["role"], "assistant");
    assert_eq!(history[0]["text"], "Hi! How was your day?");
    assert_eq!(history[1]["role"], "user");
    assert_eq!(history[1]["text"], "I baked bread");
    assert_eq!(history[2]["role"], "assistant");

    let (_, body) = send(
        &app.router,
        post_json("/api/chat", json!({"user_id": "u1", "text": "It was tasty"})),
    )
    .await;
    assert_eq!(body["history"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_chat_rejects_blank_fields() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        post_json("/api/chat", json!({"user_id": "", "text": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, _) = send(
        &app.router,
        post_json("/api/chat", json!({"user_id": "u1", "text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_generator_failure_is_bad_gateway() {
    let app = create_test_app_with(
        Arc::new(UnavailableGenerator),
        Arc::new(UnavailableGenerator),
        Arc::new(FixedTranscriber("unused")),
    )
    .await;

    let (status, body) = send(
        &app.router,
        post_json("/api/chat", json!({"user_id": "u1", "text": "hello"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], 502);
}

#[tokio::test]
async fn test_chat_audio_uses_transcription() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, post_audio("/api/chat/audio?user_id=u2", "file")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"][1]["text"], "I went for a run today");
}

#[tokio::test]
async fn test_chat_audio_empty_transcription_placeholder() {
    let app = create_test_app_with(
        Arc::new(FixedGenerator("Silence is golden.".to_string())),
        Arc::new(FixedGenerator(super::DIARY_JSON.to_string())),
        Arc::new(FixedTranscriber("")),
    )
    .await;

    let (status, body) = send(&app.router, post_audio("/api/chat/audio?user_id=u2", "file")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"][1]["text"], "(empty transcription)");
}

#[tokio::test]
async fn test_chat_audio_requires_user_id() {
    let app = create_test_app().await;

    let (status, _) = send(&app.router, post_audio("/api/chat/audio", "file")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_audio_transcription_failure() {
    let app = create_test_app_with(
        Arc::new(FixedGenerator("unused".to_string())),
        Arc::new(FixedGenerator(super::DIARY_JSON.to_string())),
        Arc::new(BrokenTranscriber),
    )
    .await;

    let (status, body) = send(&app.router, post_audio("/api/chat/audio?user_id=u3", "file")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Transcription failed:"));
}

// ============================================
// Transcription
// ============================================

#[tokio::test]
async fn test_transcribe_returns_text() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, post_audio("/api/transcribe", "file")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"text": "I went for a run today"}));
}

#[tokio::test]
async fn test_transcribe_missing_file() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, post_audio("/api/transcribe", "attachment")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing file");
}

#[tokio::test]
async fn test_transcribe_failure() {
    let app = create_test_app_with(
        Arc::new(FixedGenerator("unused".to_string())),
        Arc::new(FixedGenerator(super::DIARY_JSON.to_string())),
        Arc::new(BrokenTranscriber),
    )
    .await;

    let (status, body) = send(&app.router, post_audio("/api/transcribe", "file")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("model file missing"));
}

// ============================================
// Diary generation
// ============================================

#[tokio::test]
async fn test_generate_diary_from_model_json() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/generate-diary",
            json!({
                "messages": [
                    {"role": "assistant", "text": "Hi! How was your day?"},
                    {"role": "user", "text": "Pretty good, I finished my book."}
                ],
                "preferences": {"theme": "growth", "style": "poetic"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"title": "T", "content": "C", "summary": "S", "mood": "positive", "mood_score": 2})
    );
}

#[tokio::test]
async fn test_generate_diary_falls_back_when_model_unavailable() {
    let app = create_test_app_with(
        Arc::new(FixedGenerator("unused".to_string())),
        Arc::new(UnavailableGenerator),
        Arc::new(FixedTranscriber("unused")),
    )
    .await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/generate-diary",
            json!({"messages": [
                {"role": "user", "text": "I feel tired, stressed and very upset about the exam."}
            ]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mood"], "negative");
    assert_eq!(body["title"], heuristic::EXAM_TITLE);
    assert_eq!(
        body["content"],
        "I feel tired, stressed and very upset about the exam."
    );
}

#[tokio::test]
async fn test_generate_diary_rejects_empty_transcript() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app.router,
        post_json("/api/generate-diary", json!({"messages": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/generate-diary",
            json!({"messages": [{"role": "assistant", "text": "Anyone there?"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

// ============================================
// Stored conversations
// ============================================

async fn chat_once(app: &super::TestApp, user: &str, text: &str) -> Uuid {
    let (status, _) = send(
        &app.router,
        post_json("/api/chat", json!({"user_id": user, "text": text})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conversation = ai_diary::storage::TranscriptStore::get_or_create_active(
        app.store.as_ref(),
        user,
        chrono::Utc::now().date_naive(),
    )
    .await
    .unwrap();
    conversation.id
}

#[tokio::test]
async fn test_draft_for_stored_conversation() {
    let app = create_test_app().await;
    let id = chat_once(&app, "u4", "I went to the beach").await;

    let (status, body) = send(
        &app.router,
        post_json(
            &format!("/api/conversations/{}/draft", id),
            json!({"preferences": {"custom_instructions": "Keep it short"}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversation_id"], id.to_string());
    assert_eq!(
        body["suggested_date"],
        chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
    );
    assert_eq!(body["title"], "T");
    assert_eq!(body["mood_score"], 2);
}

#[tokio::test]
async fn test_draft_without_body() {
    let app = create_test_app().await;
    let id = chat_once(&app, "u5", "Quiet evening").await;

    let (status, body) = send(&app.router, post_empty(&format!("/api/conversations/{}/draft", id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "S");
}

#[tokio::test]
async fn test_draft_unknown_conversation() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        post_empty(&format!("/api/conversations/{}/draft", Uuid::new_v4())),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_draft_requires_user_message() {
    let app = create_test_app().await;
    let conversation = ai_diary::storage::TranscriptStore::get_or_create_active(
        app.store.as_ref(),
        "u6",
        chrono::Utc::now().date_naive(),
    )
    .await
    .unwrap();

    let (status, _) = send(
        &app.router,
        post_empty(&format!("/api/conversations/{}/draft", conversation.id)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_complete_conversation() {
    let app = create_test_app().await;
    let id = chat_once(&app, "u7", "Done for today").await;
    let uri = format!("/api/conversations/{}/complete", id);

    let (status, body) = send(&app.router, post_empty(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, body) = send(&app.router, post_empty(&uri)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 409);

    let (status, _) = send(
        &app.router,
        post_empty(&format!("/api/conversations/{}/complete", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_after_completion_starts_new_conversation() {
    let app = create_test_app().await;
    let first = chat_once(&app, "u8", "Morning").await;

    let (status, _) = send(
        &app.router,
        post_empty(&format!("/api/conversations/{}/complete", first)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let second = chat_once(&app, "u8", "Evening").await;
    assert_ne!(first, second);
}

// ============================================
// Saved diaries
// ============================================

async fn insert_diary(app: &super::TestApp, owner: &str, date: &str, title: &str, content: &str) -> Uuid {
    app.diaries
        .save(NewDiary {
            owner_id: owner.to_string(),
            conversation_id: None,
            entry_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            draft: DiaryDraft {
                title: title.to_string(),
                content: content.to_string(),
                summary: String::new(),
                mood: Mood::Neutral,
                mood_score: 0,
            },
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_save_diary_invalid_entry_date() {
    let app = create_test_app().await;
    let id = chat_once(&app, "u9", "Long day").await;

    let (status, body) = send(
        &app.router,
        post_json(
            &format!("/api/conversations/{}/save", id),
            json!({
                "title": "Test",
                "content": "Content",
                "mood": "neutral",
                "mood_score": 0,
                "entry_date": "invalid-date"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["diary_id"].is_string());
    let entry_date = body["entry_date"].as_str().unwrap();
    assert_eq!(entry_date.len(), 10);
    assert_eq!(entry_date.matches('-').count(), 2);
    assert_eq!(&entry_date[4..5], "-");
    assert_eq!(
        entry_date,
        chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
    );
}

#[tokio::test]
async fn test_save_diary_keeps_edits_and_closes_conversation() {
    let app = create_test_app().await;
    let id = chat_once(&app, "u10", "Picnic in the park").await;

    let (status, body) = send(
        &app.router,
        post_json(
            &format!("/api/conversations/{}/save", id),
            json!({
                "title": "  ",
                "content": "We ate on the grass.",
                "summary": "Picnic",
                "mood": "POSITIVE",
                "mood_score": 0.9,
                "entry_date": "2025-05-04"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Today's Diary");
    assert_eq!(body["mood"], "positive");
    assert_eq!(body["mood_score"], 0);
    assert_eq!(body["entry_date"], "2025-05-04");
    assert_eq!(body["conversation_id"], id.to_string());

    let diary_id: Uuid = body["diary_id"].as_str().unwrap().parse().unwrap();
    let saved = app.diaries.get(diary_id).await.unwrap().unwrap();
    assert_eq!(saved.owner_id, "u10");
    assert_eq!(saved.content, "We ate on the grass.");

    let (status, _) = send(&app.router, post_empty(&format!("/api/conversations/{}/complete", id))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_save_diary_rejects_missing_content_and_unknown_conversation() {
    let app = create_test_app().await;
    let id = chat_once(&app, "u11", "Rainy").await;

    let (status, _) = send(
        &app.router,
        post_json(&format!("/api/conversations/{}/save", id), json!({"title": "Empty"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        post_json(
            &format!("/api/conversations/{}/save", Uuid::new_v4()),
            json!({"title": "T", "content": "C"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_diary_crud_and_search() {
    let app = create_test_app().await;
    let long_content = "x".repeat(120);
    insert_diary(&app, "writer", "2025-01-01", "New year", "Fireworks").await;
    let night = insert_diary(&app, "writer", "2025-01-03", "Night diary", &long_content).await;
    insert_diary(&app, "writer", "2025-01-02", "Errands", "Groceries at night market").await;
    insert_diary(&app, "someone-else", "2025-01-04", "Night out", "Not mine").await;

    let (status, body) = send(&app.router, request("GET", "/api/users/writer/diaries?page=1&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pages"], 2);
    let diaries = body["diaries"].as_array().unwrap();
    assert_eq!(diaries.len(), 2);
    assert_eq!(diaries[0]["entry_date"], "2025-01-03");
    assert_eq!(diaries[1]["entry_date"], "2025-01-02");
    assert_eq!(diaries[0]["preview"].as_str().unwrap().chars().count(), 80);

    let (_, body) = send(&app.router, request("GET", "/api/users/writer/diaries?page=2&limit=2")).await;
    assert_eq!(body["diaries"][0]["title"], "New year");

    let uri = format!("/api/diaries/{}", night);
    let (status, body) = send(&app.router, request("GET", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Night diary");
    assert_eq!(body["content"], long_content);

    let (status, body) = send(&app.router, put_json(&uri, json!({"content": "Edited"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Edited");
    assert_eq!(body["title"], "Night diary");

    let (status, _) = send(&app.router, put_json(&uri, json!({"entry_date": "soon"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app.router, request("GET", "/api/users/writer/diaries/search?q=night")).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body["diaries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Night diary", "Errands"]);

    let (status, body) = send(&app.router, request("GET", "/api/users/writer/diaries/search?q=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"diaries": []}));

    let (status, body) = send(&app.router, request("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": true}));

    let (status, _) = send(&app.router, request("GET", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app.router, request("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app.router, put_json(&uri, json!({"title": "Gone"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_calendar_groups_month_by_date() {
    let app = create_test_app().await;
    insert_diary(&app, "alice", "2025-01-15", "Mid Jan diary", "Test content").await;
    insert_diary(&app, "alice", "2025-01-15", "Another Jan 15 diary", "More content").await;
    insert_diary(&app, "alice", "2025-01-20", "Late Jan diary", "Final content").await;
    insert_diary(&app, "alice", "2025-02-01", "February", "Next month").await;

    let (status, body) = send(
        &app.router,
        request("GET", "/api/users/alice/diaries/calendar?year=2025&month=1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["year"], 2025);
    assert_eq!(body["month"], 1);
    let by_date = body["diaries_by_date"].as_object().unwrap();
    assert_eq!(by_date.len(), 2);
    assert_eq!(by_date["2025-01-15"].as_array().unwrap().len(), 2);
    assert_eq!(by_date["2025-01-20"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_calendar_defaults_to_current_month() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, request("GET", "/api/users/alice/diaries/calendar")).await;
    assert_eq!(status, StatusCode::OK);
    let today = chrono::Utc::now().date_naive();
    assert_eq!(body["year"], chrono::Datelike::year(&today));
    assert_eq!(body["month"], chrono::Datelike::month(&today));
    assert!(body["diaries_by_date"].as_object().unwrap().is_empty());

    let (status, _) = send(
        &app.router,
        request("GET", "/api/users/alice/diaries/calendar?year=2025&month=13"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
