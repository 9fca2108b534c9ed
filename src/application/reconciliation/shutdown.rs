use std::time::Duration;
use tokio::sync::watch;

/// 停止シグナルを送る側
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// すべてのワーカーに停止を通知する
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// ワーカーが受け取る停止シグナル
///
/// クローンして各ワーカーに渡す。送信側が破棄された場合も停止とみなす。
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// 停止が通知済みか確認する
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// 指定時間待機する。待機中に停止が通知されたら即座に戻る
    ///
    /// # 戻り値
    /// 停止が通知された場合は true
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_shutdown(),
            changed = self.rx.changed() => changed.is_err() || *self.rx.borrow(),
        }
    }
}

/// 停止シグナルのチャネルを作成する
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_without_shutdown() {
        let (_trigger, mut signal) = shutdown_channel();

        let cancelled = signal.sleep(Duration::from_millis(10)).await;

        assert!(!cancelled);
        assert!(!signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_trigger_interrupts_sleep() {
        let (trigger, mut signal) = shutdown_channel();
        let started = Instant::now();

        let sleeper = tokio::spawn(async move { signal.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();

        let cancelled = sleeper.await.unwrap();
        assert!(cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sleep_returns_immediately_when_already_shut_down() {
        let (trigger, mut signal) = shutdown_channel();
        trigger.trigger();

        assert!(signal.is_shutdown());
        assert!(signal.sleep(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, mut signal) = shutdown_channel();
        drop(trigger);

        assert!(signal.sleep(Duration::from_secs(60)).await);
    }
}
