use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{CommentId, EventId, PostId, UserId};

/// いいねイベントのアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    /// イベントログに保存される文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeAction::Like => "LIKE",
            LikeAction::Unlike => "UNLIKE",
        }
    }
}

impl FromStr for LikeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(LikeAction::Like),
            "UNLIKE" => Ok(LikeAction::Unlike),
            _ => Err(format!("Invalid like action: {}", s)),
        }
    }
}

/// コメントイベントのアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentAction {
    Create,
    Delete,
}

impl CommentAction {
    /// イベントログに保存される文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentAction::Create => "CREATE",
            CommentAction::Delete => "DELETE",
        }
    }
}

impl FromStr for CommentAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(CommentAction::Create),
            "DELETE" => Ok(CommentAction::Delete),
            _ => Err(format!("Invalid comment action: {}", s)),
        }
    }
}

/// イベントの種類
///
/// 種類ごとに別のログ（テーブル）に保存され、別のワーカーが処理する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Like,
    Comment,
}

/// 発行前のいいねイベント
///
/// id・created_at はイベントストアが追記時に採番する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLikeEvent {
    pub post_id: PostId,
    pub user_id: UserId,
    pub action: LikeAction,
}

/// 発行前のコメントイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommentEvent {
    pub post_id: PostId,
    /// 作成前に発行されるケースに備えて省略可能
    pub comment_id: Option<CommentId>,
    pub user_id: UserId,
    pub action: CommentAction,
}

/// イベント：ユーザーが投稿にいいね／いいね取り消しをした
///
/// 不変条件：processed / processed_at 以外は作成後に変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeEvent {
    pub id: EventId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub action: LikeAction,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// イベント：コメントが作成／削除された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEvent {
    pub id: EventId,
    pub post_id: PostId,
    pub comment_id: Option<CommentId>,
    pub user_id: UserId,
    pub action: CommentAction,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// アクションを解釈できなかったイベント
///
/// ワーカーは適用をスキップし、再処理ループを避けるため処理済みにする。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedEvent {
    pub id: EventId,
    pub post_id: PostId,
    pub raw_action: String,
}

/// 未処理イベントのバッチ
///
/// `events` は created_at 昇順（同時刻は id 昇順）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprocessedBatch<E> {
    pub events: Vec<E>,
    pub malformed: Vec<MalformedEvent>,
}

impl<E> UnprocessedBatch<E> {
    pub fn new(events: Vec<E>, malformed: Vec<MalformedEvent>) -> Self {
        Self { events, malformed }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.malformed.is_empty()
    }

    /// 取得した行数（不正なイベントを含む）
    pub fn len(&self) -> usize {
        self.events.len() + self.malformed.len()
    }
}

impl<E> Default for UnprocessedBatch<E> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_action_round_trips_wire_format() {
        assert_eq!("LIKE".parse::<LikeAction>(), Ok(LikeAction::Like));
        assert_eq!("UNLIKE".parse::<LikeAction>(), Ok(LikeAction::Unlike));
        assert_eq!(LikeAction::Unlike.as_str(), "UNLIKE");
    }

    #[test]
    fn test_like_action_rejects_unknown_value() {
        assert!("like".parse::<LikeAction>().is_err());
        assert!("LOVE".parse::<LikeAction>().is_err());
    }

    #[test]
    fn test_comment_action_parse() {
        assert_eq!("CREATE".parse::<CommentAction>(), Ok(CommentAction::Create));
        assert_eq!("DELETE".parse::<CommentAction>(), Ok(CommentAction::Delete));
        assert!("UPDATE".parse::<CommentAction>().is_err());
    }

    #[test]
    fn test_unprocessed_batch_counts_malformed_rows() {
        let batch: UnprocessedBatch<LikeEvent> = UnprocessedBatch::new(
            vec![],
            vec![MalformedEvent {
                id: EventId::new(1),
                post_id: PostId::new(1),
                raw_action: "LOVE".to_string(),
            }],
        );

        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 1);
        assert!(UnprocessedBatch::<LikeEvent>::default().is_empty());
    }
}
