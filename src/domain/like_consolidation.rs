use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{EventId, LikeAction, LikeEvent, PostId, UserId};

/// 追加すべきいいね
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLike {
    pub user_id: UserId,
    /// いいね行の作成日時として使う、採用されたLIKEイベントの時刻
    pub liked_at: DateTime<Utc>,
}

/// 1投稿分のいいねの正味の変更
///
/// 不変条件：同じユーザーが to_add と to_remove の両方に現れることはない。
/// 永続化済みの状態との突き合わせは適用時に行う（追加は未存在の場合のみ、
/// 削除は存在する行のみ）ため、同じ変更を二度適用しても結果は変わらない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeChanges {
    pub to_add: Vec<PendingLike>,
    pub to_remove: Vec<UserId>,
}

impl LikeChanges {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    fn like(&mut self, user_id: UserId, at: DateTime<Utc>) {
        self.to_remove.retain(|u| *u != user_id);
        if !self.to_add.iter().any(|p| p.user_id == user_id) {
            self.to_add.push(PendingLike {
                user_id,
                liked_at: at,
            });
        }
    }

    fn unlike(&mut self, user_id: UserId) {
        self.to_add.retain(|p| p.user_id != user_id);
        if !self.to_remove.contains(&user_id) {
            self.to_remove.push(user_id);
        }
    }
}

/// いいねイベントを投稿ごとにまとめる
///
/// 投稿IDの昇順で返すため、適用順序はバッチ内容だけで決まる。
pub fn group_by_post(events: Vec<LikeEvent>) -> BTreeMap<PostId, Vec<LikeEvent>> {
    let mut groups: BTreeMap<PostId, Vec<LikeEvent>> = BTreeMap::new();
    for event in events {
        groups.entry(event.post_id).or_default().push(event);
    }
    groups
}

/// 1投稿分のいいねイベントを正味の変更に集約する（純粋な関数）
///
/// イベントを created_at 昇順（同時刻は id 昇順）で処理し、
/// ユーザーごとに時系列で最後のアクションを採用する（last-writer-wins）。
///
/// # 引数
/// * `events` - 同じ投稿に対するいいねイベント（順序は問わない）
///
/// # 戻り値
/// 追加・削除すべきユーザーの集合
pub fn consolidate_like_events(events: &[LikeEvent]) -> LikeChanges {
    let mut ordered: Vec<&LikeEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.created_at, e.id));

    let mut changes = LikeChanges::default();
    for event in ordered {
        match event.action {
            LikeAction::Like => changes.like(event.user_id, event.created_at),
            LikeAction::Unlike => changes.unlike(event.user_id),
        }
    }
    changes
}

/// イベントIDを取り出す
pub fn event_ids(events: &[LikeEvent]) -> Vec<EventId> {
    events.iter().map(|e| e.id).collect()
}
