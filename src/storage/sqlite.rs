use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{info, warn};

use super::{ChatSummary, Conversation, ConversationStore, MAX_STORED_CHATS};
use crate::chat::{ChatMode, Message};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory database (single connection, lost on drop).
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Unreadable timestamps fall back to the Unix epoch so the row sorts last.
fn from_db_time(id: &str, raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(id = %id, value = %raw, error = %e, "Stored timestamp is unreadable");
            DateTime::<Utc>::UNIX_EPOCH
        })
}

#[async_trait]
impl ConversationStore for SqliteStorage {
    async fn save_conversation(&self, conversation: &Conversation) -> StorageResult<()> {
        let messages =
            serde_json::to_string(&conversation.messages).map_err(|e| StorageError::Query {
                message: format!("Failed to serialize messages: {}", e),
            })?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, mode, title, messages, message_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                mode = excluded.mode,
                title = excluded.title,
                messages = excluded.messages,
                message_count = excluded.message_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&conversation.id)
        .bind(conversation.mode.as_str())
        .bind(conversation.title())
        .bind(&messages)
        .bind(conversation.messages.len() as i64)
        .bind(to_db_time(&conversation.created_at))
        .bind(to_db_time(&conversation.updated_at))
        .execute(&self.pool)
        .await?;

        let pruned = sqlx::query(
            r#"
            DELETE FROM conversations
            WHERE id NOT IN (
                SELECT id FROM conversations
                ORDER BY julianday(updated_at) IS NULL, updated_at DESC, rowid DESC
                LIMIT ?
            )
            "#,
        )
        .bind(MAX_STORED_CHATS as i64)
        .execute(&self.pool)
        .await?;

        if pruned.rows_affected() > 0 {
            info!(pruned = pruned.rows_affected(), "Pruned old conversations");
        }

        Ok(())
    }

    async fn load_conversation(&self, id: &str) -> StorageResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, mode, messages, created_at, updated_at
            FROM conversations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_chats(&self, limit: usize) -> StorageResult<Vec<ChatSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT id, title, mode, message_count, updated_at
            FROM conversations
            ORDER BY julianday(updated_at) IS NULL, updated_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit.min(MAX_STORED_CHATS) as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn delete_conversation(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            });
        }

        Ok(())
    }
}

// Row types for SQLx

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    mode: String,
    messages: String,
    created_at: String,
    updated_at: String,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        let messages: Vec<Message> = serde_json::from_str(&row.messages).unwrap_or_else(|e| {
            warn!(id = %row.id, error = %e, "Stored messages are unreadable");
            Vec::new()
        });

        Self {
            mode: ChatMode::from_str_lossy(&row.mode),
            messages,
            created_at: from_db_time(&row.id, &row.created_at),
            updated_at: from_db_time(&row.id, &row.updated_at),
            id: row.id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    title: String,
    mode: String,
    message_count: i64,
    updated_at: String,
}

impl From<SummaryRow> for ChatSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            updated_at: from_db_time(&row.id, &row.updated_at),
            id: row.id,
            title: row.title,
            mode: ChatMode::from_str_lossy(&row.mode),
            message_count: row.message_count.max(0) as usize,
        }
    }
}
