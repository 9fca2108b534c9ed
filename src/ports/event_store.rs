use crate::domain::{
    CommentEvent, EventId, EventKind, LikeEvent, NewCommentEvent, NewLikeEvent, UnprocessedBatch,
};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// イベントストアポート
///
/// いいね・コメントのイベントを追記専用ログとして保持する（outbox）。
/// イベントは作成後に変更されず、processed への遷移だけが一度だけ起こる。
///
/// 単一ワーカーインスタンスを前提とする。fetch 系は取得したイベントを
/// 占有（claim）しないため、同じ種類のワーカーを複数同時に動かすと
/// 同じバッチを重複処理する。
#[async_trait]
pub trait EventStore: Send + Sync {
    /// いいねイベントを追記する
    ///
    /// processed = false で永続化し、採番されたIDを返す。
    /// 読み手が書きかけのイベントを観測することはない。
    async fn publish_like_event(&self, event: NewLikeEvent) -> Result<EventId>;

    /// コメントイベントを追記する
    async fn publish_comment_event(&self, event: NewCommentEvent) -> Result<EventId>;

    /// 未処理のいいねイベントを古い順に最大 limit 件取得する
    ///
    /// created_at 昇順、同時刻は id 昇順。
    /// アクションを解釈できない行は `malformed` に入る。
    async fn fetch_unprocessed_like_events(
        &self,
        limit: usize,
    ) -> Result<UnprocessedBatch<LikeEvent>>;

    /// 未処理のコメントイベントを古い順に最大 limit 件取得する
    async fn fetch_unprocessed_comment_events(
        &self,
        limit: usize,
    ) -> Result<UnprocessedBatch<CommentEvent>>;

    /// 指定したイベントを処理済みにする
    ///
    /// processed = true と processed_at = now を集合としてアトミックに設定する。
    /// 既に処理済みのイベントは変更しない（processed_at は最初の値のまま）。
    /// 対応する集約の更新がコミットされた後にのみ呼ぶこと。
    async fn mark_processed(&self, kind: EventKind, ids: &[EventId]) -> Result<()>;
}
