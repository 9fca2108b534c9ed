use crate::config::{LikeWorkerConfig, MarkPolicy};
use crate::domain::{
    EventId, EventKind, MalformedEvent, consolidate_like_events, event_ids, group_by_post,
};
use tracing::{debug, error, info, trace, warn};

use super::adaptive_delay::AdaptiveDelay;
use super::errors::{ReconciliationError, Result};
use super::shutdown::ShutdownSignal;
use super::stats_service::ReconciliationDependencies;

/// いいねイベントを1バッチ処理する
///
/// 1. 未処理イベントを古い順に取得
/// 2. 投稿ごとにまとめ、後勝ちで最終状態に集約
/// 3. 投稿単位のトランザクションでいいね行を反映し、件数を数え直す
/// 4. 反映済みのイベントを処理済みにする
///
/// # 戻り値
/// 取得したイベント数（不正なイベントを含む）。0 ならアイドル。
///
/// # エラー
/// 投稿グループの反映に失敗した時点で中断する。`MarkPolicy::WholeBatch`
/// ではバッチ全体が未処理のまま残り、次のパスで再取得される。
pub async fn process_like_batch(
    deps: &ReconciliationDependencies,
    config: &LikeWorkerConfig,
) -> Result<usize> {
    let batch = deps
        .event_store
        .fetch_unprocessed_like_events(config.batch_size)
        .await
        .map_err(ReconciliationError::EventStoreError)?;

    if batch.is_empty() {
        return Ok(0);
    }

    let fetched = batch.len();
    let malformed_ids = skip_malformed(&batch.malformed);
    let groups = group_by_post(batch.events);
    let group_count = groups.len();

    let mut applied_ids: Vec<EventId> = Vec::with_capacity(fetched);
    for (post_id, events) in groups {
        let changes = consolidate_like_events(&events);
        let ids = event_ids(&events);

        let outcome = deps
            .post_stats_store
            .apply_like_changes(post_id, &changes)
            .await
            .map_err(|source| ReconciliationError::PostStatsStoreError { post_id, source })?;

        match outcome {
            Some(stats) => debug!(
                post_id = %post_id,
                added = changes.to_add.len(),
                removed = changes.to_remove.len(),
                like_count = stats.like_count,
                version = stats.version,
                "Applied like changes"
            ),
            None => warn!(
                post_id = %post_id,
                event_count = ids.len(),
                "Post no longer exists, discarding like events"
            ),
        }

        match config.mark_policy {
            MarkPolicy::PerPostGroup => mark(deps, &ids).await?,
            MarkPolicy::WholeBatch => applied_ids.extend(ids),
        }
    }

    applied_ids.extend(malformed_ids);
    mark(deps, &applied_ids).await?;

    info!(
        event_count = fetched,
        post_count = group_count,
        "Processed like events"
    );
    Ok(fetched)
}

/// いいねワーカーのメインループ
///
/// 停止シグナルを受け取るまでバッチ処理を繰り返す。待機時間はイベントが
/// あれば最小値、無ければ 1.5 倍ずつ最大値まで伸びる。エラー時は
/// `error_delay` 待ってから最小値で再開する。
pub async fn run_like_worker(
    deps: ReconciliationDependencies,
    config: LikeWorkerConfig,
    mut shutdown: ShutdownSignal,
) {
    info!(
        batch_size = config.batch_size,
        min_delay_ms = config.min_delay.as_millis() as u64,
        max_delay_ms = config.max_delay.as_millis() as u64,
        mark_policy = ?config.mark_policy,
        "Like worker started"
    );

    let mut delay = AdaptiveDelay::new(config.min_delay, config.max_delay);

    while !shutdown.is_shutdown() {
        match process_like_batch(&deps, &config).await {
            Ok(processed) => {
                let next = delay.record_pass(processed);
                if processed == 0 {
                    trace!(next_delay_ms = next.as_millis() as u64, "No like events");
                } else {
                    debug!(
                        processed,
                        next_delay_ms = next.as_millis() as u64,
                        "Like pass finished"
                    );
                }
                if shutdown.sleep(next).await {
                    break;
                }
            }
            Err(e) => {
                error!(error = ?e, "Failed to process like events");
                if shutdown.sleep(config.error_delay).await {
                    break;
                }
                delay.reset();
            }
        }
    }

    info!("Like worker stopped");
}

fn skip_malformed(malformed: &[MalformedEvent]) -> Vec<EventId> {
    for event in malformed {
        warn!(
            event_id = %event.id,
            post_id = %event.post_id,
            action = %event.raw_action,
            "Skipping like event with unknown action"
        );
    }
    malformed.iter().map(|e| e.id).collect()
}

async fn mark(deps: &ReconciliationDependencies, ids: &[EventId]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    deps.event_store
        .mark_processed(EventKind::Like, ids)
        .await
        .map_err(ReconciliationError::EventStoreError)
}
