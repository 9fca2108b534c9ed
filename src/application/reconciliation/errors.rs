use crate::domain::PostId;
use thiserror::Error;

/// カウンター整合処理のエラー
///
/// リクエスト処理には伝播せず、ワーカーのループでログに記録される。
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// EventStoreのエラー
    #[error("Event store error")]
    EventStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// PostStatsStoreのエラー（投稿単位のトランザクションはロールバック済み）
    #[error("Post stats store error for post {post_id}")]
    PostStatsStoreError {
        post_id: PostId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 読み取り系のエラー
    #[error("Post stats read error")]
    ReadError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, ReconciliationError>;
