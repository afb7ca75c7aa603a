use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    prelude::*, sea_query::Expr, ConnectionTrait, DbBackend, QueryOrder, Set, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use crate::models::internal::{Conversation, ConversationStatus, Message, Role};
use crate::storage::entities::{conversations, messages};

pub(crate) const DAY_FORMAT: &str = "%Y-%m-%d";

/// First assistant message of every new conversation.
pub const GREETING: &str = "Hi! How was your day?";

// Status check and insert in one statement; a concurrent `complete` cannot slip between them
const APPEND_IF_ACTIVE: &str = r#"
    INSERT INTO messages (id, conversation_id, role, text, timestamp)
    SELECT ?, ?, ?, ?, ?
    WHERE EXISTS (SELECT 1 FROM conversations WHERE id = ? AND status = 'active')
"#;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DbError(#[from] sea_orm::DbErr),
    #[error("Conversation not found: {0}")]
    NotFound(Uuid),
    #[error("Conversation {0} is already completed")]
    ConversationCompleted(Uuid),
    #[error("Diary not found: {0}")]
    DiaryNotFound(Uuid),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Per-conversation transcript persistence. Messages are append-only while the
/// conversation is active and come back in insertion order.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// The owner's active conversation for `day`, created with a greeting if none exists.
    async fn get_or_create_active(
        &self,
        owner_id: &str,
        day: NaiveDate,
    ) -> Result<Conversation, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, StoreError>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        text: &str,
    ) -> Result<Message, StoreError>;

    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// active → completed, exactly once.
    async fn complete(&self, conversation_id: Uuid) -> Result<(), StoreError>;
}

pub struct SeaOrmTranscriptStore {
    db: DatabaseConnection,
}

impl SeaOrmTranscriptStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_active(
        &self,
        owner_id: &str,
        day: &str,
    ) -> Result<Option<conversations::Model>, StoreError> {
        Ok(conversations::Entity::find()
            .filter(conversations::Column::OwnerId.eq(owner_id))
            .filter(conversations::Column::Day.eq(day))
            .filter(conversations::Column::Status.eq(ConversationStatus::Active.as_str()))
            .one(&self.db)
            .await?)
    }

    /// Why a write that required an active conversation matched nothing.
    async fn not_active(&self, conversation_id: Uuid) -> Result<StoreError, StoreError> {
        let exists = conversations::Entity::find_by_id(conversation_id.to_string())
            .one(&self.db)
            .await?
            .is_some();

        Ok(if exists {
            StoreError::ConversationCompleted(conversation_id)
        } else {
            StoreError::NotFound(conversation_id)
        })
    }

    async fn load(&self, model: conversations::Model) -> Result<Conversation, StoreError> {
        let id = parse_uuid(&model.id)?;
        let messages = self.get_messages(id).await?;
        conversation_from_model(model, messages)
    }
}

#[async_trait]
impl TranscriptStore for SeaOrmTranscriptStore {
    async fn get_or_create_active(
        &self,
        owner_id: &str,
        day: NaiveDate,
    ) -> Result<Conversation, StoreError> {
        let day_str = day.format(DAY_FORMAT).to_string();

        if let Some(existing) = self.find_active(owner_id, &day_str).await? {
            return self.load(existing).await;
        }

        let id = Uuid::new_v4();
        let conversation = conversations::ActiveModel {
            id: Set(id.to_string()),
            owner_id: Set(owner_id.to_string()),
            day: Set(day_str.clone()),
            status: Set(ConversationStatus::Active.as_str().to_string()),
            created_at: Set(Utc::now().to_rfc3339()),
        };

        let txn = self.db.begin().await?;
        match conversation.insert(&txn).await {
            Ok(model) => {
                let greeting = Message::assistant(GREETING);
                message_row(id, &greeting).insert(&txn).await?;
                txn.commit().await?;

                tracing::info!("Created conversation {} for {} on {}", id, owner_id, day_str);
                conversation_from_model(model, vec![greeting])
            }
            Err(e) => {
                txn.rollback().await?;
                // A concurrent request may have created it between our lookup and insert
                match self.find_active(owner_id, &day_str).await? {
                    Some(existing) => self.load(existing).await,
                    None => Err(StoreError::DbError(e)),
                }
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let model = conversations::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?;

        match model {
            Some(m) => Ok(Some(self.load(m).await?)),
            None => Ok(None),
        }
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        text: &str,
    ) -> Result<Message, StoreError> {
        let message = Message::new(role, text);
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                APPEND_IF_ACTIVE,
                [
                    Uuid::new_v4().to_string().into(),
                    conversation_id.to_string().into(),
                    role.as_str().into(),
                    message.text.clone().into(),
                    message.timestamp.to_rfc3339().into(),
                    conversation_id.to_string().into(),
                ],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_active(conversation_id).await?);
        }

        tracing::debug!("Appended {} message to {}", role.as_str(), conversation_id);
        Ok(message)
    }

    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id.to_string()))
            .order_by_asc(messages::Column::Seq)
            .all(&self.db)
            .await?;

        rows.into_iter().map(message_from_model).collect()
    }

    async fn complete(&self, conversation_id: Uuid) -> Result<(), StoreError> {
        let result = conversations::Entity::update_many()
            .col_expr(
                conversations::Column::Status,
                Expr::value(ConversationStatus::Completed.as_str()),
            )
            .filter(conversations::Column::Id.eq(conversation_id.to_string()))
            .filter(conversations::Column::Status.eq(ConversationStatus::Active.as_str()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 1 {
            tracing::info!("Completed conversation {}", conversation_id);
            return Ok(());
        }

        Err(self.not_active(conversation_id).await?)
    }
}

fn message_row(conversation_id: Uuid, message: &Message) -> messages::ActiveModel {
    messages::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        conversation_id: Set(conversation_id.to_string()),
        role: Set(message.role.as_str().to_string()),
        text: Set(message.text.clone()),
        timestamp: Set(message.timestamp.to_rfc3339()),
        ..Default::default()
    }
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad id {}: {}", raw, e)))
}

fn parse_status(raw: &str) -> Result<ConversationStatus, StoreError> {
    ConversationStatus::parse(raw).ok_or_else(|| StoreError::Corrupt(format!("bad status {}", raw)))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {}: {}", raw, e)))
}

fn conversation_from_model(
    model: conversations::Model,
    messages: Vec<Message>,
) -> Result<Conversation, StoreError> {
    Ok(Conversation {
        id: parse_uuid(&model.id)?,
        day: NaiveDate::parse_from_str(&model.day, DAY_FORMAT)
            .map_err(|e| StoreError::Corrupt(format!("bad day {}: {}", model.day, e)))?,
        status: parse_status(&model.status)?,
        created_at: parse_timestamp(&model.created_at)?,
        owner_id: model.owner_id,
        messages,
    })
}

fn message_from_model(model: messages::Model) -> Result<Message, StoreError> {
    Ok(Message {
        role: Role::from(model.role.as_str()),
        timestamp: parse_timestamp(&model.timestamp)?,
        text: model.text,
    })
}
