use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{prelude::*, Condition, QueryOrder, QuerySelect, Select, Set};
use uuid::Uuid;

use crate::models::internal::{Diary, DiaryUpdate, Mood, NewDiary};
use crate::storage::entities::diaries;
use crate::storage::repository::{parse_timestamp, parse_uuid, StoreError, DAY_FORMAT};

/// Saved diaries, listed newest entry date first.
#[async_trait]
pub trait DiaryStore: Send + Sync {
    async fn save(&self, diary: NewDiary) -> Result<Diary, StoreError>;

    /// One page (1-based) of the owner's diaries and the owner's total count.
    async fn list(
        &self,
        owner_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Diary>, u64), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Diary>, StoreError>;

    async fn update(&self, id: Uuid, update: DiaryUpdate) -> Result<Diary, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Case-insensitive substring match on title or content.
    async fn search(&self, owner_id: &str, query: &str) -> Result<Vec<Diary>, StoreError>;

    async fn in_month(
        &self,
        owner_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<Diary>, StoreError>;
}

pub struct SeaOrmDiaryStore {
    db: DatabaseConnection,
}

impl SeaOrmDiaryStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn owned(owner_id: &str) -> Select<diaries::Entity> {
        diaries::Entity::find()
            .filter(diaries::Column::OwnerId.eq(owner_id))
            .order_by_desc(diaries::Column::EntryDate)
            .order_by_desc(diaries::Column::CreatedAt)
    }
}

#[async_trait]
impl DiaryStore for SeaOrmDiaryStore {
    async fn save(&self, diary: NewDiary) -> Result<Diary, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        let row = diaries::ActiveModel {
            id: Set(id.to_string()),
            owner_id: Set(diary.owner_id.clone()),
            conversation_id: Set(diary.conversation_id.map(|c| c.to_string())),
            entry_date: Set(diary.entry_date.format(DAY_FORMAT).to_string()),
            title: Set(diary.draft.title),
            content: Set(diary.draft.content),
            summary: Set(diary.draft.summary),
            mood: Set(diary.draft.mood.as_str().to_string()),
            mood_score: Set(diary.draft.mood_score),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };
        let model = row.insert(&self.db).await?;

        tracing::info!("Saved diary {} for {} on {}", id, diary.owner_id, diary.entry_date);
        diary_from_model(model)
    }

    async fn list(
        &self,
        owner_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Diary>, u64), StoreError> {
        let query = Self::owned(owner_id);
        let total = query.clone().count(&self.db).await?;

        let rows = query
            .limit(limit)
            .offset(page.saturating_sub(1) * limit)
            .all(&self.db)
            .await?;

        let items = rows
            .into_iter()
            .map(diary_from_model)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Diary>, StoreError> {
        diaries::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(diary_from_model)
            .transpose()
    }

    async fn update(&self, id: Uuid, update: DiaryUpdate) -> Result<Diary, StoreError> {
        let model = diaries::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or(StoreError::DiaryNotFound(id))?;

        let mut active: diaries::ActiveModel = model.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(content) = update.content {
            active.content = Set(content);
        }
        if let Some(summary) = update.summary {
            active.summary = Set(summary);
        }
        if let Some(mood) = update.mood {
            active.mood = Set(mood.as_str().to_string());
        }
        if let Some(score) = update.mood_score {
            active.mood_score = Set(score);
        }
        if let Some(date) = update.entry_date {
            active.entry_date = Set(date.format(DAY_FORMAT).to_string());
        }
        active.updated_at = Set(Utc::now().to_rfc3339());

        let model = active.update(&self.db).await?;
        tracing::debug!("Updated diary {}", id);
        diary_from_model(model)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = diaries::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::DiaryNotFound(id));
        }

        tracing::info!("Deleted diary {}", id);
        Ok(())
    }

    async fn search(&self, owner_id: &str, query: &str) -> Result<Vec<Diary>, StoreError> {
        let rows = Self::owned(owner_id)
            .filter(
                Condition::any()
                    .add(diaries::Column::Title.contains(query))
                    .add(diaries::Column::Content.contains(query)),
            )
            .all(&self.db)
            .await?;

        rows.into_iter().map(diary_from_model).collect()
    }

    async fn in_month(
        &self,
        owner_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<Diary>, StoreError> {
        let prefix = format!("{:04}-{:02}-", year, month);
        let rows = Self::owned(owner_id)
            .filter(diaries::Column::EntryDate.starts_with(prefix.as_str()))
            .all(&self.db)
            .await?;

        rows.into_iter().map(diary_from_model).collect()
    }
}

fn diary_from_model(model: diaries::Model) -> Result<Diary, StoreError> {
    let conversation_id = model.conversation_id.as_deref().map(parse_uuid).transpose()?;

    Ok(Diary {
        id: parse_uuid(&model.id)?,
        conversation_id,
        entry_date: NaiveDate::parse_from_str(&model.entry_date, DAY_FORMAT).map_err(|e| {
            StoreError::Corrupt(format!("bad entry date {}: {}", model.entry_date, e))
        })?,
        mood: Mood::parse_lenient(&model.mood),
        created_at: parse_timestamp(&model.created_at)?,
        updated_at: parse_timestamp(&model.updated_at)?,
        owner_id: model.owner_id,
        title: model.title,
        content: model.content,
        summary: model.summary,
        mood_score: model.mood_score,
    })
}
