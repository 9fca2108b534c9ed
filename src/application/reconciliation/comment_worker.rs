use crate::config::CommentWorkerConfig;
use crate::domain::{EventId, EventKind, PostId};
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use super::errors::{ReconciliationError, Result};
use super::shutdown::ShutdownSignal;
use super::stats_service::ReconciliationDependencies;

/// コメントイベントを1バッチ処理する
///
/// イベントの内容は使わず、影響を受けた投稿ごとにコメント行を数え直す。
/// 同じ投稿に複数のイベントがあっても数え直しは1回。
pub async fn process_comment_batch(
    deps: &ReconciliationDependencies,
    config: &CommentWorkerConfig,
) -> Result<usize> {
    let batch = deps
        .event_store
        .fetch_unprocessed_comment_events(config.batch_size)
        .await
        .map_err(ReconciliationError::EventStoreError)?;

    if batch.is_empty() {
        return Ok(0);
    }

    for event in &batch.malformed {
        warn!(
            event_id = %event.id,
            post_id = %event.post_id,
            action = %event.raw_action,
            "Skipping comment event with unknown action"
        );
    }

    let post_ids: BTreeSet<PostId> = batch.events.iter().map(|e| e.post_id).collect();
    for &post_id in &post_ids {
        let outcome = deps
            .post_stats_store
            .recount_comments(post_id)
            .await
            .map_err(|source| ReconciliationError::PostStatsStoreError { post_id, source })?;

        match outcome {
            Some(stats) => debug!(
                post_id = %post_id,
                comment_count = stats.comment_count,
                version = stats.version,
                "Recounted comments"
            ),
            None => warn!(post_id = %post_id, "Post no longer exists, discarding comment events"),
        }
    }

    let ids: Vec<EventId> = batch
        .events
        .iter()
        .map(|e| e.id)
        .chain(batch.malformed.iter().map(|e| e.id))
        .collect();
    deps.event_store
        .mark_processed(EventKind::Comment, &ids)
        .await
        .map_err(ReconciliationError::EventStoreError)?;

    info!(
        event_count = ids.len(),
        post_count = post_ids.len(),
        "Processed comment events"
    );
    Ok(ids.len())
}

/// コメントワーカーのメインループ
///
/// 成功したパスの後は `poll_interval`、エラーの後は `error_delay` 待機する。
pub async fn run_comment_worker(
    deps: ReconciliationDependencies,
    config: CommentWorkerConfig,
    mut shutdown: ShutdownSignal,
) {
    info!(
        batch_size = config.batch_size,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Comment worker started"
    );

    while !shutdown.is_shutdown() {
        let wait = match process_comment_batch(&deps, &config).await {
            Ok(_) => config.poll_interval,
            Err(e) => {
                error!(error = ?e, "Failed to process comment events");
                config.error_delay
            }
        };
        if shutdown.sleep(wait).await {
            break;
        }
    }

    info!("Comment worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEventStore, InMemoryPostStatsStore};
    use crate::domain::UserId;
    use crate::ports::PostStatsStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_many_events_for_one_post_recount_once() {
        let events = Arc::new(InMemoryEventStore::new());
        let stats = Arc::new(InMemoryPostStatsStore::new());
        let deps = ReconciliationDependencies {
            event_store: events.clone(),
            post_stats_store: stats.clone(),
        };
        let post_id = PostId::new(7);
        stats.add_comments(post_id, 3);
        for _ in 0..3 {
            events.append_raw_comment_event(post_id, UserId::new(), "CREATE");
        }

        let processed = process_comment_batch(&deps, &CommentWorkerConfig::default())
            .await
            .unwrap();

        assert_eq!(processed, 3);
        let row = stats.get_by_post_id(post_id).await.unwrap().unwrap();
        assert_eq!(row.comment_count, 3);
        assert_eq!(row.version, 1);
        assert_eq!(events.unprocessed_count(EventKind::Comment), 0);
    }

    #[tokio::test]
    async fn test_unknown_action_is_marked_without_recount() {
        let events = Arc::new(InMemoryEventStore::new());
        let stats = Arc::new(InMemoryPostStatsStore::new());
        let deps = ReconciliationDependencies {
            event_store: events.clone(),
            post_stats_store: stats.clone(),
        };
        let post_id = PostId::new(7);
        let id = events.append_raw_comment_event(post_id, UserId::new(), "EDIT");

        let processed = process_comment_batch(&deps, &CommentWorkerConfig::default())
            .await
            .unwrap();

        assert_eq!(processed, 1);
        assert!(events.is_processed(EventKind::Comment, id));
        assert!(stats.get_by_post_id(post_id).await.unwrap().is_none());
    }
}
