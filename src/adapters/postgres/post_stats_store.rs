use crate::domain::{Like, LikeChanges, PostId, PostStats, UserId};
use crate::ports::post_stats_store::{PostStatsStore as PostStatsStoreTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

fn map_row_to_post_stats(row: &PgRow) -> PostStats {
    PostStats {
        post_id: PostId::new(row.get("post_id")),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        last_updated: row.get("last_updated"),
        version: row.get("version"),
    }
}

/// Lock the post row for the rest of the transaction
///
/// Returns false when the post has been deleted. `FOR SHARE` keeps a
/// concurrent delete from cascading away the rows we are about to write.
async fn lock_post(tx: &mut Transaction<'_, Postgres>, post_id: PostId) -> Result<bool> {
    let row = sqlx::query("SELECT id FROM posts WHERE id = $1 FOR SHARE")
        .bind(post_id.value())
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.is_some())
}

/// PostgreSQL implementation of PostStatsStore
///
/// Every write runs in a transaction scoped to a single post and recounts
/// its column from the source relation instead of applying a delta.
pub struct PostStatsStore {
    pool: PgPool,
}

impl PostStatsStore {
    /// Create a new PostStatsStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStatsStoreTrait for PostStatsStore {
    /// Create the zeroed stats row for a freshly created post
    async fn initialize(&self, post_id: PostId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_stats (post_id, like_count, comment_count, last_updated, version)
            VALUES ($1, 0, 0, NOW(), 1)
            ON CONFLICT (post_id) DO NOTHING
            "#,
        )
        .bind(post_id.value())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_post_id(&self, post_id: PostId) -> Result<Option<PostStats>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, like_count, comment_count, last_updated, version
            FROM post_stats
            WHERE post_id = $1
            "#,
        )
        .bind(post_id.value())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_row_to_post_stats))
    }

    /// Apply consolidated like changes for one post
    ///
    /// Deletes only touch existing rows, inserts use `ON CONFLICT DO NOTHING`
    /// against the `(post_id, user_id)` unique constraint, and the counter is
    /// a fresh `COUNT(*)`, so replaying the same changes is harmless.
    /// Any error drops the transaction, which rolls it back.
    async fn apply_like_changes(
        &self,
        post_id: PostId,
        changes: &LikeChanges,
    ) -> Result<Option<PostStats>> {
        let mut tx = self.pool.begin().await?;

        if !lock_post(&mut tx, post_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        if !changes.to_remove.is_empty() {
            let user_ids: Vec<uuid::Uuid> =
                changes.to_remove.iter().map(|u| u.value()).collect();

            sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = ANY($2)")
                .bind(post_id.value())
                .bind(&user_ids)
                .execute(&mut *tx)
                .await?;
        }

        if !changes.to_add.is_empty() {
            let user_ids: Vec<uuid::Uuid> =
                changes.to_add.iter().map(|p| p.user_id.value()).collect();
            let liked_at: Vec<DateTime<Utc>> = changes.to_add.iter().map(|p| p.liked_at).collect();

            // Batch INSERT using UNNEST
            sqlx::query(
                r#"
                INSERT INTO likes (post_id, user_id, created_at)
                SELECT $1::bigint, u.user_id, u.created_at
                FROM UNNEST($2::uuid[], $3::timestamptz[]) AS u(user_id, created_at)
                ON CONFLICT (post_id, user_id) DO NOTHING
                "#,
            )
            .bind(post_id.value())
            .bind(&user_ids)
            .bind(&liked_at)
            .execute(&mut *tx)
            .await?;
        }

        let like_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id.value())
            .fetch_one(&mut *tx)
            .await?;

        // A row created here also gets an accurate comment_count; an existing
        // row keeps the comment worker's value.
        let row = sqlx::query(
            r#"
            INSERT INTO post_stats (post_id, like_count, comment_count, last_updated, version)
            VALUES (
                $1,
                $2,
                (SELECT COUNT(*) FROM comments WHERE post_id = $1),
                NOW(),
                1
            )
            ON CONFLICT (post_id)
            DO UPDATE SET
                like_count = EXCLUDED.like_count,
                last_updated = EXCLUDED.last_updated,
                version = post_stats.version + 1
            RETURNING post_id, like_count, comment_count, last_updated, version
            "#,
        )
        .bind(post_id.value())
        .bind(like_count)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(map_row_to_post_stats(&row)))
    }

    /// Recount comments for one post and store the result
    async fn recount_comments(&self, post_id: PostId) -> Result<Option<PostStats>> {
        let mut tx = self.pool.begin().await?;

        if !lock_post(&mut tx, post_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let comment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
                .bind(post_id.value())
                .fetch_one(&mut *tx)
                .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO post_stats (post_id, like_count, comment_count, last_updated, version)
            VALUES (
                $1,
                (SELECT COUNT(*) FROM likes WHERE post_id = $1),
                $2,
                NOW(),
                1
            )
            ON CONFLICT (post_id)
            DO UPDATE SET
                comment_count = EXCLUDED.comment_count,
                last_updated = EXCLUDED.last_updated,
                version = post_stats.version + 1
            RETURNING post_id, like_count, comment_count, last_updated, version
            "#,
        )
        .bind(post_id.value())
        .bind(comment_count)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(map_row_to_post_stats(&row)))
    }

    async fn likes_for_post(&self, post_id: PostId) -> Result<Vec<Like>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, user_id, created_at
            FROM likes
            WHERE post_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(post_id.value())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Like {
                post_id: PostId::new(row.get("post_id")),
                user_id: UserId::from_uuid(row.get("user_id")),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn is_liked_by(&self, post_id: PostId, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id.value())
        .bind(user_id.value())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
