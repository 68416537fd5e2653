//! Cooperative cancellation.

use std::time::Duration;
pub use tokio_util::sync::CancellationToken;

/// Sleep for `delay`, waking early if `token` is cancelled. Returns `false`
/// when the delay was cut short.
pub async fn cancellable_delay(token: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_delay_runs_to_completion() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(cancellable_delay(&token, Duration::from_secs(5)).await);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_delay_short() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        assert!(!cancellable_delay(&token, Duration::from_secs(3600)).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_delay_reports_cancellation() {
        let token = CancellationToken::new();
        assert!(cancellable_delay(&token, Duration::ZERO).await);
        token.cancel();
        assert!(!cancellable_delay(&token, Duration::ZERO).await);
    }
}
