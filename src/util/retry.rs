/// 指数バックオフ+ジッター付き再試行ロジック。
///
/// AWS推奨のFull Jitter戦略を実装します。
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// 再試行戦略の設定。
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// 最大試行回数（初回を含む）
    pub max_attempts: usize,
    /// ベースとなる遅延時間（ミリ秒）
    pub base_delay_ms: u64,
    /// 最大遅延時間（ミリ秒）
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 10000,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// 指定された試行回数に対する遅延時間を計算する（Full Jitter戦略）。
    ///
    /// `attempt` は0始まり。0回目は待機しない。
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        // 指数バックオフ: base * 2^(attempt-1)
        let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(1_u64.checked_shl(shift).unwrap_or(u64::MAX));

        let capped_delay = exponential_delay.min(self.max_delay_ms);

        // Full Jitter: random(0, capped_delay)
        let jittered_delay = if capped_delay > 0 {
            rand::rng().random_range(0..=capped_delay)
        } else {
            0
        };

        Duration::from_millis(jittered_delay)
    }

    #[must_use]
    pub const fn can_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

/// エラーが再試行可能かどうかを判定する。
///
/// ネットワークエラー、タイムアウト、5xx、429 を再試行可能とみなす。
#[must_use]
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }

    if let Some(status) = error.status() {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return true;
        }
    }

    false
}

/// `operation` を再試行設定に従って実行する。
///
/// エラーチェーンに再試行可能な `reqwest::Error` が含まれる場合のみ再試行する。
///
/// # Errors
/// 再試行不可能なエラー、または最大試行回数に達した場合は最後のエラーを返す。
pub async fn with_retry<T, F, Fut>(
    config: RetryConfig,
    label: &'static str,
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0;
    loop {
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                let retryable = error
                    .chain()
                    .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
                    .any(is_retryable_error);
                if !retryable || !config.can_retry(attempt) {
                    return Err(error);
                }
                warn!(
                    operation = label,
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %error,
                    "retrying after transient failure"
                );
            }
        }
    }
}
