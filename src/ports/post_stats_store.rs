use crate::domain::{Like, LikeChanges, PostId, PostStats, UserId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 投稿統計ストアポート
///
/// PostStats集約と、その情報源であるいいね・コメントのリレーションを扱う。
/// 書き込み系の操作はそれぞれ1投稿に閉じたトランザクションで実行され、
/// 失敗時は全体がロールバックされる。
///
/// カウントは差分加算ではなく、情報源のリレーションから毎回数え直す。
/// これにより、いいねワーカーとコメントワーカーが同じ行を独立に更新しても
/// それぞれの列は収束する（version / last_updated は後勝ち）。
#[async_trait]
pub trait PostStatsStore: Send + Sync {
    /// 投稿作成時に統計行を作成する
    ///
    /// カウント0、version 1。既に存在する場合は何もしない。
    async fn initialize(&self, post_id: PostId) -> Result<()>;

    /// 投稿の統計を取得する
    ///
    /// 読み手は結果整合性を許容すること（ワーカーの1周期分遅れうる）。
    async fn get_by_post_id(&self, post_id: PostId) -> Result<Option<PostStats>>;

    /// いいねの正味の変更を1トランザクションで適用する
    ///
    /// 1. to_remove のユーザーのいいね行を削除（存在する行のみ）
    /// 2. to_add のユーザーのいいね行を、存在しない場合のみ追加
    /// 3. いいね行を数え直して like_count とする
    /// 4. 統計行を upsert（無ければ作成）し、version を上げ last_updated を更新
    ///
    /// 同じ変更を二度適用しても結果は同じ（version 以外）。
    /// 投稿が既に削除されている場合は何もせず None を返す。
    async fn apply_like_changes(
        &self,
        post_id: PostId,
        changes: &LikeChanges,
    ) -> Result<Option<PostStats>>;

    /// コメント行を数え直して comment_count を更新する
    ///
    /// 統計行を upsert（無ければ作成）し、version を上げ last_updated を更新する。
    /// 投稿が既に削除されている場合は None を返す。
    async fn recount_comments(&self, post_id: PostId) -> Result<Option<PostStats>>;

    /// 投稿に対するいいね行を取得する
    async fn likes_for_post(&self, post_id: PostId) -> Result<Vec<Like>>;

    /// ユーザーが投稿にいいね済みか確認する
    async fn is_liked_by(&self, post_id: PostId, user_id: UserId) -> Result<bool>;
}
