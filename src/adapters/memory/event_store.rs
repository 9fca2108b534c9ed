use crate::domain::{
    CommentAction, CommentEvent, CommentId, EventId, EventKind, LikeAction, LikeEvent,
    MalformedEvent, NewCommentEvent, NewLikeEvent, PostId, UnprocessedBatch, UserId,
};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

/// 保存されたイベント行（アクションは文字列のまま保持）
#[derive(Debug, Clone)]
struct StoredEvent {
    id: EventId,
    post_id: PostId,
    user_id: UserId,
    comment_id: Option<CommentId>,
    action: String,
    created_at: DateTime<Utc>,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    like_events: Vec<StoredEvent>,
    comment_events: Vec<StoredEvent>,
    unavailable: bool,
}

impl State {
    fn append(
        &mut self,
        kind: EventKind,
        post_id: PostId,
        user_id: UserId,
        comment_id: Option<CommentId>,
        action: &str,
        created_at: DateTime<Utc>,
    ) -> EventId {
        self.next_id += 1;
        let id = EventId::new(self.next_id);
        let row = StoredEvent {
            id,
            post_id,
            user_id,
            comment_id,
            action: action.to_string(),
            created_at,
            processed: false,
            processed_at: None,
        };
        match kind {
            EventKind::Like => self.like_events.push(row),
            EventKind::Comment => self.comment_events.push(row),
        }
        id
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err("event store unavailable".into());
        }
        Ok(())
    }
}

/// 未処理の行を created_at, id 昇順で最大 limit 件返す
fn oldest_unprocessed(rows: &[StoredEvent], limit: usize) -> Vec<&StoredEvent> {
    let mut pending: Vec<&StoredEvent> = rows.iter().filter(|r| !r.processed).collect();
    pending.sort_by_key(|r| (r.created_at, r.id));
    pending.truncate(limit);
    pending
}

fn malformed(row: &StoredEvent) -> MalformedEvent {
    MalformedEvent {
        id: row.id,
        post_id: row.post_id,
        raw_action: row.action.clone(),
    }
}

/// EventStoreのインメモリ実装
///
/// PostgreSQL実装と同じ順序・処理済み遷移の規則に従う。
/// テスト用に、任意の時刻・任意のアクション文字列での追記と
/// ストア全体の障害注入をサポートする。
pub struct EventStore {
    state: Mutex<State>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 作成日時を指定していいねイベントを追記する
    pub fn append_like_event_at(
        &self,
        post_id: PostId,
        user_id: UserId,
        action: LikeAction,
        created_at: DateTime<Utc>,
    ) -> EventId {
        self.state().append(
            EventKind::Like,
            post_id,
            user_id,
            None,
            action.as_str(),
            created_at,
        )
    }

    /// 任意のアクション文字列でいいねイベントを追記する（不正イベントの再現用）
    pub fn append_raw_like_event(&self, post_id: PostId, user_id: UserId, action: &str) -> EventId {
        self.state()
            .append(EventKind::Like, post_id, user_id, None, action, Utc::now())
    }

    /// 任意のアクション文字列でコメントイベントを追記する
    pub fn append_raw_comment_event(
        &self,
        post_id: PostId,
        user_id: UserId,
        action: &str,
    ) -> EventId {
        self.state()
            .append(EventKind::Comment, post_id, user_id, None, action, Utc::now())
    }

    /// ストア全体を障害状態にする（すべての操作がエラーを返す）
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// イベントが処理済みか確認する
    pub fn is_processed(&self, kind: EventKind, id: EventId) -> bool {
        let state = self.state();
        let rows = match kind {
            EventKind::Like => &state.like_events,
            EventKind::Comment => &state.comment_events,
        };
        rows.iter().any(|r| r.id == id && r.processed)
    }

    /// 処理済みになった時刻を取得する
    pub fn processed_at(&self, kind: EventKind, id: EventId) -> Option<DateTime<Utc>> {
        let state = self.state();
        let rows = match kind {
            EventKind::Like => &state.like_events,
            EventKind::Comment => &state.comment_events,
        };
        rows.iter().find(|r| r.id == id).and_then(|r| r.processed_at)
    }

    /// 未処理イベントの件数
    pub fn unprocessed_count(&self, kind: EventKind) -> usize {
        let state = self.state();
        let rows = match kind {
            EventKind::Like => &state.like_events,
            EventKind::Comment => &state.comment_events,
        };
        rows.iter().filter(|r| !r.processed).count()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    async fn publish_like_event(&self, event: NewLikeEvent) -> Result<EventId> {
        let mut state = self.state();
        state.check_available()?;
        Ok(state.append(
            EventKind::Like,
            event.post_id,
            event.user_id,
            None,
            event.action.as_str(),
            Utc::now(),
        ))
    }

    async fn publish_comment_event(&self, event: NewCommentEvent) -> Result<EventId> {
        let mut state = self.state();
        state.check_available()?;
        Ok(state.append(
            EventKind::Comment,
            event.post_id,
            event.user_id,
            event.comment_id,
            event.action.as_str(),
            Utc::now(),
        ))
    }

    async fn fetch_unprocessed_like_events(
        &self,
        limit: usize,
    ) -> Result<UnprocessedBatch<LikeEvent>> {
        let state = self.state();
        state.check_available()?;

        let mut batch = UnprocessedBatch::default();
        for row in oldest_unprocessed(&state.like_events, limit) {
            match row.action.parse::<LikeAction>() {
                Ok(action) => batch.events.push(LikeEvent {
                    id: row.id,
                    post_id: row.post_id,
                    user_id: row.user_id,
                    action,
                    created_at: row.created_at,
                    processed: row.processed,
                    processed_at: row.processed_at,
                }),
                Err(_) => batch.malformed.push(malformed(row)),
            }
        }
        Ok(batch)
    }

    async fn fetch_unprocessed_comment_events(
        &self,
        limit: usize,
    ) -> Result<UnprocessedBatch<CommentEvent>> {
        let state = self.state();
        state.check_available()?;

        let mut batch = UnprocessedBatch::default();
        for row in oldest_unprocessed(&state.comment_events, limit) {
            match row.action.parse::<CommentAction>() {
                Ok(action) => batch.events.push(CommentEvent {
                    id: row.id,
                    post_id: row.post_id,
                    comment_id: row.comment_id,
                    user_id: row.user_id,
                    action,
                    created_at: row.created_at,
                    processed: row.processed,
                    processed_at: row.processed_at,
                }),
                Err(_) => batch.malformed.push(malformed(row)),
            }
        }
        Ok(batch)
    }

    async fn mark_processed(&self, kind: EventKind, ids: &[EventId]) -> Result<()> {
        let mut state = self.state();
        state.check_available()?;

        let now = Utc::now();
        let rows = match kind {
            EventKind::Like => &mut state.like_events,
            EventKind::Comment => &mut state.comment_events,
        };
        for row in rows.iter_mut().filter(|r| ids.contains(&r.id) && !r.processed) {
            row.processed = true;
            row.processed_at = Some(now);
        }
        Ok(())
    }
}
