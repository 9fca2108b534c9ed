use std::time::Duration;

/// いいねワーカーがイベントを処理済みにする単位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPolicy {
    /// 全投稿グループの適用が成功した後、バッチ全体を1回で処理済みにする
    WholeBatch,
    /// 投稿グループのコミット直後に、そのグループのイベントを処理済みにする
    PerPostGroup,
}

/// いいねワーカーの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeWorkerConfig {
    pub batch_size: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// 処理エラー後の待機時間（アイドル時のバックオフとは別）
    pub error_delay: Duration,
    pub mark_policy: MarkPolicy,
}

impl Default for LikeWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            error_delay: Duration::from_secs(10),
            mark_policy: MarkPolicy::WholeBatch,
        }
    }
}

/// コメントワーカーの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentWorkerConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub error_delay: Duration,
}

impl Default for CommentWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            error_delay: Duration::from_secs(10),
        }
    }
}

/// ワーカープロセス全体の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub like_worker: LikeWorkerConfig,
    pub comment_worker: CommentWorkerConfig,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    ///
    /// 未設定・解釈できない値、0 の件数・待機時間はデフォルトになる。
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_u64 = |key: &str| lookup(key).and_then(|s| s.parse::<u64>().ok());
        // 待機時間に 0 は使わない
        let millis = |key: &str, default: Duration| {
            parse_u64(key)
                .filter(|n| *n > 0)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let like_defaults = LikeWorkerConfig::default();
        let min_delay = millis("LIKE_WORKER_MIN_DELAY_MS", like_defaults.min_delay);
        let max_delay = millis("LIKE_WORKER_MAX_DELAY_MS", like_defaults.max_delay).max(min_delay);
        let mark_policy = match lookup("LIKE_WORKER_MARK_PER_GROUP").as_deref() {
            Some("true") | Some("1") => MarkPolicy::PerPostGroup,
            _ => MarkPolicy::WholeBatch,
        };

        let like_worker = LikeWorkerConfig {
            batch_size: parse_u64("LIKE_WORKER_BATCH_SIZE")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(like_defaults.batch_size),
            min_delay,
            max_delay,
            error_delay: millis("LIKE_WORKER_ERROR_DELAY_MS", like_defaults.error_delay),
            mark_policy,
        };

        let comment_defaults = CommentWorkerConfig::default();
        let comment_worker = CommentWorkerConfig {
            batch_size: parse_u64("COMMENT_WORKER_BATCH_SIZE")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(comment_defaults.batch_size),
            poll_interval: millis(
                "COMMENT_WORKER_POLL_INTERVAL_MS",
                comment_defaults.poll_interval,
            ),
            error_delay: millis("COMMENT_WORKER_ERROR_DELAY_MS", comment_defaults.error_delay),
        };

        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/forum".to_string()),
            max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            like_worker,
            comment_worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.database_url, "postgres://localhost/forum");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.like_worker, LikeWorkerConfig::default());
        assert_eq!(config.comment_worker.poll_interval, Duration::from_secs(5));
        assert_eq!(config.comment_worker.error_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/forum"),
            ("LIKE_WORKER_BATCH_SIZE", "50"),
            ("LIKE_WORKER_MIN_DELAY_MS", "200"),
            ("LIKE_WORKER_MAX_DELAY_MS", "4000"),
            ("LIKE_WORKER_MARK_PER_GROUP", "true"),
            ("COMMENT_WORKER_POLL_INTERVAL_MS", "750"),
        ]);

        assert_eq!(config.database_url, "postgres://db/forum");
        assert_eq!(config.like_worker.batch_size, 50);
        assert_eq!(config.like_worker.min_delay, Duration::from_millis(200));
        assert_eq!(config.like_worker.max_delay, Duration::from_millis(4000));
        assert_eq!(config.like_worker.mark_policy, MarkPolicy::PerPostGroup);
        assert_eq!(config.comment_worker.poll_interval, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("LIKE_WORKER_BATCH_SIZE", "0"),
            ("COMMENT_WORKER_BATCH_SIZE", "many"),
            ("DATABASE_MAX_CONNECTIONS", "-1"),
            ("LIKE_WORKER_MIN_DELAY_MS", "0"),
            ("LIKE_WORKER_ERROR_DELAY_MS", "0"),
            ("COMMENT_WORKER_POLL_INTERVAL_MS", "0"),
            ("COMMENT_WORKER_ERROR_DELAY_MS", "0"),
        ]);

        assert_eq!(config.like_worker.batch_size, 100);
        assert_eq!(config.comment_worker.batch_size, 100);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.like_worker.min_delay, Duration::from_secs(1));
        assert_eq!(config.like_worker.error_delay, Duration::from_secs(10));
        assert_eq!(config.comment_worker.poll_interval, Duration::from_secs(5));
        assert_eq!(config.comment_worker.error_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_max_delay_is_clamped_to_min_delay() {
        let config = config_from(&[
            ("LIKE_WORKER_MIN_DELAY_MS", "5000"),
            ("LIKE_WORKER_MAX_DELAY_MS", "1000"),
        ]);

        assert_eq!(config.like_worker.max_delay, Duration::from_millis(5000));
    }
}
