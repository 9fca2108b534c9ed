use crate::domain::{Like, LikeChanges, PostId, PostStats, UserId};
use crate::ports::post_stats_store::{PostStatsStore as PostStatsStoreTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    stats: HashMap<PostId, PostStats>,
    likes: Vec<Like>,
    comment_counts: HashMap<PostId, i64>,
    deleted_posts: HashSet<PostId>,
    failing_posts: HashSet<PostId>,
}

impl State {
    fn check_post(&self, post_id: PostId) -> Result<()> {
        if self.failing_posts.contains(&post_id) {
            return Err(format!("injected failure for post {}", post_id).into());
        }
        Ok(())
    }

    fn like_count(&self, post_id: PostId) -> i64 {
        self.likes.iter().filter(|l| l.post_id == post_id).count() as i64
    }

    fn comment_count(&self, post_id: PostId) -> i64 {
        self.comment_counts.get(&post_id).copied().unwrap_or(0)
    }

    /// 統計行を upsert する。`update` は既存行・新規行の両方に適用される
    fn upsert_stats(
        &mut self,
        post_id: PostId,
        now: DateTime<Utc>,
        update: impl FnOnce(&mut PostStats),
    ) -> PostStats {
        let fresh = PostStats {
            post_id,
            like_count: self.like_count(post_id),
            comment_count: self.comment_count(post_id),
            last_updated: now,
            version: 1,
        };

        let existed = self.stats.contains_key(&post_id);
        let stats = self.stats.entry(post_id).or_insert(fresh);
        if existed {
            stats.version += 1;
            stats.last_updated = now;
        }
        update(stats);
        stats.clone()
    }
}

/// PostStatsStoreのインメモリ実装
///
/// ロック1回の中で全ての変更を行うため、各操作はトランザクションと同様に
/// 全体が適用されるか、何も適用されないかのどちらかになる。
/// 投稿は削除されるまで存在するものとして扱う。
pub struct PostStatsStore {
    state: Mutex<State>,
}

impl PostStatsStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 情報源となるコメント行を追加する
    pub fn add_comments(&self, post_id: PostId, count: i64) {
        *self.state().comment_counts.entry(post_id).or_insert(0) += count;
    }

    /// 投稿を削除する（統計・いいね・コメントも連鎖削除）
    pub fn delete_post(&self, post_id: PostId) {
        let mut state = self.state();
        state.stats.remove(&post_id);
        state.likes.retain(|l| l.post_id != post_id);
        state.comment_counts.remove(&post_id);
        state.deleted_posts.insert(post_id);
    }

    /// 指定した投稿への書き込みを失敗させる
    pub fn fail_on_post(&self, post_id: PostId) {
        self.state().failing_posts.insert(post_id);
    }

    /// 障害注入を解除する
    pub fn recover_post(&self, post_id: PostId) {
        self.state().failing_posts.remove(&post_id);
    }
}

impl Default for PostStatsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStatsStoreTrait for PostStatsStore {
    async fn initialize(&self, post_id: PostId) -> Result<()> {
        let mut state = self.state();
        state
            .stats
            .entry(post_id)
            .or_insert_with(|| PostStats::initial(post_id, Utc::now()));
        Ok(())
    }

    async fn get_by_post_id(&self, post_id: PostId) -> Result<Option<PostStats>> {
        Ok(self.state().stats.get(&post_id).cloned())
    }

    async fn apply_like_changes(
        &self,
        post_id: PostId,
        changes: &LikeChanges,
    ) -> Result<Option<PostStats>> {
        let mut state = self.state();
        state.check_post(post_id)?;
        if state.deleted_posts.contains(&post_id) {
            return Ok(None);
        }

        state
            .likes
            .retain(|l| !(l.post_id == post_id && changes.to_remove.contains(&l.user_id)));

        for pending in &changes.to_add {
            let exists = state
                .likes
                .iter()
                .any(|l| l.post_id == post_id && l.user_id == pending.user_id);
            if !exists {
                state.likes.push(Like {
                    post_id,
                    user_id: pending.user_id,
                    created_at: pending.liked_at,
                });
            }
        }

        let like_count = state.like_count(post_id);
        let stats = state.upsert_stats(post_id, Utc::now(), |s| s.like_count = like_count);
        Ok(Some(stats))
    }

    async fn recount_comments(&self, post_id: PostId) -> Result<Option<PostStats>> {
        let mut state = self.state();
        state.check_post(post_id)?;
        if state.deleted_posts.contains(&post_id) {
            return Ok(None);
        }

        let comment_count = state.comment_count(post_id);
        let stats = state.upsert_stats(post_id, Utc::now(), |s| s.comment_count = comment_count);
        Ok(Some(stats))
    }

    async fn likes_for_post(&self, post_id: PostId) -> Result<Vec<Like>> {
        Ok(self
            .state()
            .likes
            .iter()
            .filter(|l| l.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn is_liked_by(&self, post_id: PostId, user_id: UserId) -> Result<bool> {
        Ok(self
            .state()
            .likes
            .iter()
            .any(|l| l.post_id == post_id && l.user_id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PendingLike;

    fn add(user_id: UserId) -> PendingLike {
        PendingLike {
            user_id,
            liked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = PostStatsStore::new();
        let post_id = PostId::new(1);

        store.initialize(post_id).await.unwrap();
        store.initialize(post_id).await.unwrap();

        let stats = store.get_by_post_id(post_id).await.unwrap().unwrap();
        assert_eq!(stats.like_count, 0);
        assert_eq!(stats.comment_count, 0);
        assert_eq!(stats.version, 1);
    }

    #[tokio::test]
    async fn test_apply_like_changes_creates_missing_row() {
        let store = PostStatsStore::new();
        let post_id = PostId::new(1);
        store.add_comments(post_id, 2);

        let changes = LikeChanges {
            to_add: vec![add(UserId::new())],
            to_remove: vec![],
        };
        let stats = store
            .apply_like_changes(post_id, &changes)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.like_count, 1);
        assert_eq!(stats.comment_count, 2);
        assert_eq!(stats.version, 1);
    }

    #[tokio::test]
    async fn test_remove_of_missing_like_is_noop() {
        let store = PostStatsStore::new();
        let post_id = PostId::new(1);
        store.initialize(post_id).await.unwrap();

        let changes = LikeChanges {
            to_add: vec![],
            to_remove: vec![UserId::new()],
        };
        let stats = store
            .apply_like_changes(post_id, &changes)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.like_count, 0);
        assert_eq!(stats.version, 2);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_state_untouched() {
        let store = PostStatsStore::new();
        let post_id = PostId::new(1);
        store.initialize(post_id).await.unwrap();
        store.fail_on_post(post_id);

        let changes = LikeChanges {
            to_add: vec![add(UserId::new())],
            to_remove: vec![],
        };
        assert!(store.apply_like_changes(post_id, &changes).await.is_err());

        assert!(store.likes_for_post(post_id).await.unwrap().is_empty());
        let stats = store.get_by_post_id(post_id).await.unwrap().unwrap();
        assert_eq!(stats.version, 1);
    }

    #[tokio::test]
    async fn test_deleted_post_is_skipped() {
        let store = PostStatsStore::new();
        let post_id = PostId::new(1);
        store.initialize(post_id).await.unwrap();
        store.delete_post(post_id);

        let result = store.recount_comments(post_id).await.unwrap();

        assert!(result.is_none());
        assert!(store.get_by_post_id(post_id).await.unwrap().is_none());
    }
}
