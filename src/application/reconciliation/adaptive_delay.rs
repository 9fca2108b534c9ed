use std::time::Duration;

/// アイドル時の待機時間の増加率
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// 適応的ポーリング間隔
///
/// 処理したイベントがあれば最小値に戻し、無ければ最大値を上限に
/// 1.5倍ずつ伸ばす。ワーカーのループ内のローカル状態として持つ。
///
/// 不変条件：min <= current <= max
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveDelay {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl AdaptiveDelay {
    /// max < min の場合は max = min として扱う
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            current: min,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// 1回のパスの結果から次の待機時間を決める
    pub fn record_pass(&mut self, processed: usize) -> Duration {
        self.current = if processed > 0 {
            self.min
        } else {
            self.current.mul_f64(BACKOFF_MULTIPLIER).min(self.max)
        };
        self.current
    }

    /// エラーからの復帰時に最小値へ戻す
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}
