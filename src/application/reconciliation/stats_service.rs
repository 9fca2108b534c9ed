use crate::domain::{
    CommentAction, CommentId, EventId, Like, LikeAction, NewCommentEvent, NewLikeEvent,
    PostId, PostStats, UserId,
};
use crate::ports::*;
use std::sync::Arc;
use tracing::debug;

use super::errors::{ReconciliationError, Result};

/// サービスの依存関係
///
/// 振る舞いは持たず、ワーカー・発行関数に明示的に渡す。
/// ワーカーごとに tokio タスクへ移すため Clone できる。
#[derive(Clone)]
pub struct ReconciliationDependencies {
    pub event_store: Arc<dyn EventStore>,
    pub post_stats_store: Arc<dyn PostStatsStore>,
}

/// いいねイベントを発行する
///
/// イベントログへの追記が完了した時点で戻る（fire-and-forget）。
/// 呼び出し側はPostStatsの更新を待たない。
pub async fn publish_like_event(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    user_id: UserId,
    action: LikeAction,
) -> Result<EventId> {
    let event_id = deps
        .event_store
        .publish_like_event(NewLikeEvent {
            post_id,
            user_id,
            action,
        })
        .await
        .map_err(ReconciliationError::EventStoreError)?;

    debug!(
        event_id = %event_id,
        post_id = %post_id,
        user_id = %user_id,
        action = action.as_str(),
        "Published like event"
    );
    Ok(event_id)
}

/// コメントイベントを発行する
pub async fn publish_comment_event(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    comment_id: Option<CommentId>,
    user_id: UserId,
    action: CommentAction,
) -> Result<EventId> {
    let event_id = deps
        .event_store
        .publish_comment_event(NewCommentEvent {
            post_id,
            comment_id,
            user_id,
            action,
        })
        .await
        .map_err(ReconciliationError::EventStoreError)?;

    debug!(
        event_id = %event_id,
        post_id = %post_id,
        action = action.as_str(),
        "Published comment event"
    );
    Ok(event_id)
}

pub async fn publish_like(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    user_id: UserId,
) -> Result<EventId> {
    publish_like_event(deps, post_id, user_id, LikeAction::Like).await
}

pub async fn publish_unlike(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    user_id: UserId,
) -> Result<EventId> {
    publish_like_event(deps, post_id, user_id, LikeAction::Unlike).await
}

pub async fn publish_comment_created(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    comment_id: CommentId,
    user_id: UserId,
) -> Result<EventId> {
    publish_comment_event(deps, post_id, Some(comment_id), user_id, CommentAction::Create).await
}

pub async fn publish_comment_deleted(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    comment_id: CommentId,
    user_id: UserId,
) -> Result<EventId> {
    publish_comment_event(deps, post_id, Some(comment_id), user_id, CommentAction::Delete).await
}

/// 投稿作成時に統計行を作成する
///
/// リクエスト処理側が投稿と同時に呼ぶ。ワーカーは行が無い場合にも
/// 作成するため、呼び忘れても最終的には整合する。
pub async fn initialize_post_stats(
    deps: &ReconciliationDependencies,
    post_id: PostId,
) -> Result<()> {
    deps.post_stats_store
        .initialize(post_id)
        .await
        .map_err(|source| ReconciliationError::PostStatsStoreError { post_id, source })
}

/// 投稿の統計を取得する
///
/// カウントはワーカーの1周期分遅れうる。
pub async fn get_post_stats(
    deps: &ReconciliationDependencies,
    post_id: PostId,
) -> Result<Option<PostStats>> {
    deps.post_stats_store
        .get_by_post_id(post_id)
        .await
        .map_err(ReconciliationError::ReadError)
}

/// 投稿についたいいねを古い順に取得する
pub async fn likes_for_post(
    deps: &ReconciliationDependencies,
    post_id: PostId,
) -> Result<Vec<Like>> {
    deps.post_stats_store
        .likes_for_post(post_id)
        .await
        .map_err(ReconciliationError::ReadError)
}

/// ユーザーが投稿にいいね済みか確認する
///
/// いいね行はワーカーが作成するため、発行直後のいいねはまだ反映されていない。
pub async fn is_post_liked_by_user(
    deps: &ReconciliationDependencies,
    post_id: PostId,
    user_id: UserId,
) -> Result<bool> {
    deps.post_stats_store
        .is_liked_by(post_id, user_id)
        .await
        .map_err(ReconciliationError::ReadError)
}
