//! PostgreSQL implementation of ConversationStore.
//!
//! Messages live in one `messages` table keyed by id and indexed by their
//! normalised conversation members. `seq` is a BIGSERIAL
//! that orders rows sharing a timestamp; values burned by a rolled back
//! transaction leave gaps, which paging tolerates.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use crate::domain::foundation::{MessageId, Timestamp, UserId};
use crate::domain::messaging::{
    ConversationPair, HistoryCursor, HistoryPage, Message, MessageOrigin,
};
use crate::ports::{ConversationStore, ConversationTransaction, StoreError};

const SELECT_COLUMNS: &str =
    "id, seq, sender_id, receiver_id, member_low, member_high, content, created_at, origin, is_read";

/// PostgreSQL implementation of ConversationStore.
#[derive(Clone)]
pub struct PostgresConversationStore {
    pool: PgPool,
}

impl PostgresConversationStore {
    /// Creates a new PostgresConversationStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    async fn append(&self, message: &Message) -> Result<Message, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            StoreError::Database(format!("Failed to acquire connection: {}", e))
        })?;
        insert_message(&mut *conn, message).await
    }

    async fn get_history(
        &self,
        pair: ConversationPair,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<HistoryPage, StoreError> {
        let (low, high) = pair.members();
        let sql = format!(
            r#"
            SELECT {}
            FROM messages
            WHERE member_low = $1 AND member_high = $2
              AND ($3::timestamptz IS NULL
                OR created_at < $3
                OR ($4::bigint IS NOT NULL AND created_at = $3 AND seq < $4))
            ORDER BY created_at DESC, seq DESC
            LIMIT $5
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(low.as_uuid())
            .bind(high.as_uuid())
            .bind(cursor.map(|c| *c.before.as_datetime()))
            .bind(cursor.and_then(|c| c.before_seq))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to fetch history: {}", e)))?;

        let items = rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()?;
        Ok(HistoryPage::from_descending(items, limit))
    }

    async fn begin(&self) -> Result<Box<dyn ConversationTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(|e| {
            StoreError::Database(format!("Failed to start transaction: {}", e))
        })?;
        Ok(Box::new(PostgresConversationTransaction { tx }))
    }
}

/// An open PostgreSQL transaction. Dropping it rolls back.
pub struct PostgresConversationTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ConversationTransaction for PostgresConversationTransaction {
    async fn append(&mut self, message: &Message) -> Result<Message, StoreError> {
        insert_message(&mut *self.tx, message).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(|e| {
            StoreError::Database(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(|e| {
            StoreError::Database(format!("Failed to roll back transaction: {}", e))
        })
    }
}

/// Inserts a message, or returns the stored row if the id already exists.
async fn insert_message(conn: &mut PgConnection, message: &Message) -> Result<Message, StoreError> {
    let (low, high) = message.conversation().members();
    let inserted = sqlx::query(
        r#"
        INSERT INTO messages
            (id, sender_id, receiver_id, member_low, member_high, content, created_at, origin, is_read)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO NOTHING
        RETURNING seq
        "#,
    )
    .bind(message.id().as_uuid())
    .bind(message.sender_id().as_uuid())
    .bind(message.receiver_id().as_uuid())
    .bind(low.as_uuid())
    .bind(high.as_uuid())
    .bind(message.content())
    .bind(*message.timestamp().as_datetime())
    .bind(message.origin().as_str())
    .bind(message.is_read())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| StoreError::Database(format!("Failed to insert message: {}", e)))?;

    if let Some(row) = inserted {
        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| StoreError::Database(format!("Missing seq: {}", e)))?;
        return Ok(message.clone().with_seq(seq));
    }

    let sql = format!("SELECT {} FROM messages WHERE id = $1", SELECT_COLUMNS);
    let existing = sqlx::query(&sql)
        .bind(message.id().as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch message: {}", e)))?
        .ok_or(StoreError::NotFound)?;

    row_to_message(&existing)
}

fn row_to_message(row: &PgRow) -> Result<Message, StoreError> {
    let map = |e: sqlx::Error| StoreError::Database(format!("Malformed message row: {}", e));

    let id: uuid::Uuid = row.try_get("id").map_err(map)?;
    let seq: i64 = row.try_get("seq").map_err(map)?;
    let sender_id: uuid::Uuid = row.try_get("sender_id").map_err(map)?;
    let receiver_id: uuid::Uuid = row.try_get("receiver_id").map_err(map)?;
    let member_low: uuid::Uuid = row.try_get("member_low").map_err(map)?;
    let member_high: uuid::Uuid = row.try_get("member_high").map_err(map)?;
    let content: String = row.try_get("content").map_err(map)?;
    let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at").map_err(map)?;
    let origin: String = row.try_get("origin").map_err(map)?;
    let is_read: bool = row.try_get("is_read").map_err(map)?;

    let origin = MessageOrigin::parse(&origin).map_err(|e| StoreError::Database(e.to_string()))?;
    let conversation =
        ConversationPair::new(UserId::from_uuid(member_low), UserId::from_uuid(member_high))
            .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(Message::reconstitute(
        MessageId::from_uuid(id),
        UserId::from_uuid(sender_id),
        UserId::from_uuid(receiver_id),
        conversation,
        content,
        Timestamp::from_datetime(created_at),
        origin,
        is_read,
    )
    .with_seq(seq))
}
