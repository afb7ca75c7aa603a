use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        day TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_owner_day ON conversations (owner_id, day)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_status ON conversations (status)",
    // One active conversation per owner per day
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_one_active
        ON conversations (owner_id, day) WHERE status = 'active'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        conversation_id TEXT NOT NULL REFERENCES conversations (id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        text TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation_id ON messages (conversation_id, seq)",
    r#"
    CREATE TABLE IF NOT EXISTS diaries (
        id TEXT PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        conversation_id TEXT REFERENCES conversations (id) ON DELETE SET NULL,
        entry_date TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        summary TEXT NOT NULL,
        mood TEXT NOT NULL,
        mood_score INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_diaries_owner_date ON diaries (owner_id, entry_date)",
];

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    init_db_with(database_url, 10).await
}

pub async fn init_db_with(
    database_url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    tracing::info!("Connecting to database: {}", database_url);

    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);

    if database_url.starts_with("sqlite::memory:") {
        // Every pooled connection would otherwise get its own empty database
        options.max_connections(1).min_connections(1);
    } else if let Some(path_str) = database_url.strip_prefix("sqlite://") {
        let path_str = path_str.split('?').next().unwrap_or(path_str);
        let path = std::path::Path::new(path_str);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbErr::Custom(format!("Failed to create DB directory: {}", e)))?;
                tracing::info!("Created database directory: {}", parent.display());
            }
        }

        if !path.exists() {
            std::fs::File::create(path)
                .map_err(|e| DbErr::Custom(format!("Failed to create DB file: {}", e)))?;
            tracing::info!("Created database file: {}", path.display());
        }

        options.max_connections(max_connections);
    } else {
        return Err(DbErr::Custom("Invalid SQLite URL format".to_string()));
    }

    let db = Database::connect(options)
        .await
        .map_err(|e| DbErr::Custom(format!("Connection failed: {}", e)))?;

    for sql in SCHEMA {
        db.execute_unprepared(sql).await?;
    }
    tracing::info!("Database schema ready");

    Ok(db)
}
