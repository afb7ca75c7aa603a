use super::{create_file_store, Uuid};
use ai_diary::models::internal::{ConversationStatus, Role};
use ai_diary::storage::{init_db, SeaOrmTranscriptStore, StoreError, TranscriptStore, GREETING};
use chrono::NaiveDate;
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

async fn memory_store() -> SeaOrmTranscriptStore {
    SeaOrmTranscriptStore::new(init_db("sqlite::memory:").await.unwrap())
}

#[tokio::test]
async fn test_same_owner_and_day_reuses_conversation() {
    let store = memory_store().await;

    let first = store.get_or_create_active("alice", day(1)).await.unwrap();
    let again = store.get_or_create_active("alice", day(1)).await.unwrap();
    let next_day = store.get_or_create_active("alice", day(2)).await.unwrap();
    let other_owner = store.get_or_create_active("bob", day(1)).await.unwrap();

    assert_eq!(first.id, again.id);
    assert_ne!(first.id, next_day.id);
    assert_ne!(first.id, other_owner.id);
    assert_eq!(first.status, ConversationStatus::Active);
    assert_eq!(first.day, day(1));
    assert_eq!(again.messages, first.messages);
}

#[tokio::test]
async fn test_new_conversation_opens_with_greeting() {
    let store = memory_store().await;
    let conv = store.get_or_create_active("alice", day(6)).await.unwrap();

    assert_eq!(conv.messages.len(), 1);
    assert_eq!(conv.messages[0].role, Role::Assistant);
    assert_eq!(conv.messages[0].text, GREETING);
    assert!(!conv.has_user_message());

    let stored = store.get_messages(conv.id).await.unwrap();
    assert_eq!(stored, conv.messages);
}

#[tokio::test]
async fn test_messages_come_back_in_append_order() {
    let store = memory_store().await;
    let conv = store.get_or_create_active("alice", day(3)).await.unwrap();

    for (i, role) in [Role::Assistant, Role::User, Role::Assistant, Role::User]
        .into_iter()
        .enumerate()
    {
        store
            .append_message(conv.id, role, &format!("message {}", i))
            .await
            .unwrap();
    }

    let messages = store.get_messages(conv.id).await.unwrap();
    let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![GREETING, "message 0", "message 1", "message 2", "message 3"]
    );
    assert_eq!(messages[2].role, Role::User);

    let loaded = store.find_by_id(conv.id).await.unwrap().unwrap();
    assert_eq!(loaded.messages, messages);
    assert!(loaded.has_user_message());
}

#[tokio::test]
async fn test_complete_is_one_way() {
    let store = memory_store().await;
    let conv = store.get_or_create_active("carol", day(4)).await.unwrap();
    store.append_message(conv.id, Role::User, "hello").await.unwrap();

    store.complete(conv.id).await.unwrap();

    assert!(matches!(
        store.complete(conv.id).await,
        Err(StoreError::ConversationCompleted(id)) if id == conv.id
    ));
    assert!(matches!(
        store.append_message(conv.id, Role::User, "too late").await,
        Err(StoreError::ConversationCompleted(_))
    ));

    let loaded = store.find_by_id(conv.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ConversationStatus::Completed);
    assert_eq!(loaded.messages.len(), 2);

    // A fresh active conversation is allowed once the old one is closed
    let fresh = store.get_or_create_active("carol", day(4)).await.unwrap();
    assert_ne!(fresh.id, conv.id);
    assert_eq!(fresh.status, ConversationStatus::Active);
}

#[tokio::test]
async fn test_unknown_conversation() {
    let store = memory_store().await;
    let id = Uuid::new_v4();

    assert!(store.find_by_id(id).await.unwrap().is_none());
    assert!(matches!(
        store.append_message(id, Role::User, "hi").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(store.complete(id).await, Err(StoreError::NotFound(_))));
    assert!(store.get_messages(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let conv_id = {
        let store = create_file_store(&dir).await;
        let conv = store.get_or_create_active("dave", day(5)).await.unwrap();
        store.append_message(conv.id, Role::User, "persisted").await.unwrap();
        conv.id
    };

    let store = create_file_store(&dir).await;
    let conv = store.get_or_create_active("dave", day(5)).await.unwrap();
    assert_eq!(conv.id, conv_id);
    assert_eq!(conv.messages.len(), 2);
    assert_eq!(conv.messages[1].text, "persisted");
}
