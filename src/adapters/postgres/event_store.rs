use crate::domain::{
    CommentAction, CommentEvent, CommentId, EventId, EventKind, LikeAction, LikeEvent,
    MalformedEvent, NewCommentEvent, NewLikeEvent, PostId, UnprocessedBatch, UserId,
};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

const MARK_LIKE_EVENTS_PROCESSED: &str = r#"
    UPDATE like_events
    SET processed = TRUE, processed_at = NOW()
    WHERE id = ANY($1) AND processed = FALSE
"#;

const MARK_COMMENT_EVENTS_PROCESSED: &str = r#"
    UPDATE comment_events
    SET processed = TRUE, processed_at = NOW()
    WHERE id = ANY($1) AND processed = FALSE
"#;

/// Convert a batch size into a `LIMIT` parameter
fn sql_limit(limit: usize) -> Result<i64> {
    Ok(i64::try_from(limit)?)
}

/// Either a decoded event or a row whose action text could not be parsed
enum DecodedRow<E> {
    Event(E),
    Malformed(MalformedEvent),
}

fn map_row_to_like_event(row: &PgRow) -> DecodedRow<LikeEvent> {
    let id = EventId::new(row.get("id"));
    let post_id = PostId::new(row.get("post_id"));
    let raw_action: String = row.get("action");

    match raw_action.parse::<LikeAction>() {
        Ok(action) => DecodedRow::Event(LikeEvent {
            id,
            post_id,
            user_id: UserId::from_uuid(row.get("user_id")),
            action,
            created_at: row.get("created_at"),
            processed: row.get("processed"),
            processed_at: row.get("processed_at"),
        }),
        Err(_) => DecodedRow::Malformed(MalformedEvent {
            id,
            post_id,
            raw_action,
        }),
    }
}

fn map_row_to_comment_event(row: &PgRow) -> DecodedRow<CommentEvent> {
    let id = EventId::new(row.get("id"));
    let post_id = PostId::new(row.get("post_id"));
    let raw_action: String = row.get("action");

    match raw_action.parse::<CommentAction>() {
        Ok(action) => DecodedRow::Event(CommentEvent {
            id,
            post_id,
            comment_id: row
                .get::<Option<i64>, _>("comment_id")
                .map(CommentId::new),
            user_id: UserId::from_uuid(row.get("user_id")),
            action,
            created_at: row.get("created_at"),
            processed: row.get("processed"),
            processed_at: row.get("processed_at"),
        }),
        Err(_) => DecodedRow::Malformed(MalformedEvent {
            id,
            post_id,
            raw_action,
        }),
    }
}

fn split_rows<E>(rows: Vec<DecodedRow<E>>) -> UnprocessedBatch<E> {
    let mut batch = UnprocessedBatch::default();
    for row in rows {
        match row {
            DecodedRow::Event(event) => batch.events.push(event),
            DecodedRow::Malformed(malformed) => batch.malformed.push(malformed),
        }
    }
    batch
}

/// PostgreSQL implementation of EventStore
///
/// Like and comment events live in separate append-only tables.
/// `created_at` is assigned by the database (`clock_timestamp()`), `id` by a
/// BIGSERIAL, so both are monotonic for a single writer.
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    /// Append one like event
    ///
    /// A single INSERT is atomic, so concurrent readers never see a partial row.
    async fn publish_like_event(&self, event: NewLikeEvent) -> Result<EventId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO like_events (post_id, user_id, action)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(event.post_id.value())
        .bind(event.user_id.value())
        .bind(event.action.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(EventId::new(id))
    }

    /// Append one comment event
    async fn publish_comment_event(&self, event: NewCommentEvent) -> Result<EventId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO comment_events (post_id, comment_id, user_id, action)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(event.post_id.value())
        .bind(event.comment_id.map(|c| c.value()))
        .bind(event.user_id.value())
        .bind(event.action.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(EventId::new(id))
    }

    /// Fetch the oldest unprocessed like events
    ///
    /// Served by the partial index on `(created_at, id) WHERE processed = FALSE`.
    async fn fetch_unprocessed_like_events(
        &self,
        limit: usize,
    ) -> Result<UnprocessedBatch<LikeEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, user_id, action, created_at, processed, processed_at
            FROM like_events
            WHERE processed = FALSE
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(sql_limit(limit)?)
        .fetch_all(&self.pool)
        .await?;

        Ok(split_rows(rows.iter().map(map_row_to_like_event).collect()))
    }

    /// Fetch the oldest unprocessed comment events
    async fn fetch_unprocessed_comment_events(
        &self,
        limit: usize,
    ) -> Result<UnprocessedBatch<CommentEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, comment_id, user_id, action, created_at, processed, processed_at
            FROM comment_events
            WHERE processed = FALSE
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(sql_limit(limit)?)
        .fetch_all(&self.pool)
        .await?;

        Ok(split_rows(rows.iter().map(map_row_to_comment_event).collect()))
    }

    /// Mark events processed as one UPDATE statement
    ///
    /// Rows that are already processed are left untouched so `processed_at`
    /// keeps its first value.
    async fn mark_processed(&self, kind: EventKind, ids: &[EventId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        let query = match kind {
            EventKind::Like => MARK_LIKE_EVENTS_PROCESSED,
            EventKind::Comment => MARK_COMMENT_EVENTS_PROCESSED,
        };

        sqlx::query(query).bind(&ids).execute(&self.pool).await?;

        Ok(())
    }
}
