use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PostId, UserId};

/// 投稿統計（非正規化された集約）
///
/// 投稿ごとに1行。like_count / comment_count は最終的に
/// イベントを全件再生した結果と一致する（結果整合性）。
/// 書き込みのたびに version が単調増加する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub post_id: PostId,
    pub like_count: i64,
    pub comment_count: i64,
    pub last_updated: DateTime<Utc>,
    pub version: i64,
}

impl PostStats {
    /// 投稿作成時の初期状態（カウント0、version 1）
    pub fn initial(post_id: PostId, now: DateTime<Utc>) -> Self {
        Self {
            post_id,
            like_count: 0,
            comment_count: 0,
            last_updated: now,
            version: 1,
        }
    }
}

/// いいね（誰がどの投稿にいいねしたか）
///
/// (post_id, user_id) で一意。ワーカーのみが作成・削除する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub post_id: PostId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}
