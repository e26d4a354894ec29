//! Bounded polling for effects the mount bridge doesn't report synchronously

use std::time::Duration;

use tokio::time::Instant;

/// Default total wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timeout and retry interval for [`PollSpec::wait_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSpec {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollSpec {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Run `probe` every `interval` until it returns true or `timeout` elapses.
    ///
    /// The probe runs once more at the deadline, so a condition that turns
    /// true right before it is still observed. Never sleeps past the deadline.
    pub async fn wait_for<F>(&self, mut probe: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if probe() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}

/// The path can be stat'ed
pub(crate) fn path_exists(path: &std::path::Path) -> bool {
    std::fs::metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_true_immediately() {
        let start = Instant::now();
        assert!(PollSpec::default().wait_for(|| true).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_becomes_true_after_retries() {
        let mut calls = 0;
        let start = Instant::now();
        let ok = PollSpec::default()
            .wait_for(|| {
                calls += 1;
                calls == 4
            })
            .await;

        assert!(ok);
        assert_eq!(calls, 4);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_timeout() {
        let spec = PollSpec::new(Duration::from_secs(10), Duration::from_millis(10));
        let start = Instant::now();
        let mut calls = 0u32;

        let ok = spec
            .wait_for(|| {
                calls += 1;
                false
            })
            .await;

        let elapsed = start.elapsed();
        assert!(!ok);
        assert!(elapsed >= spec.timeout);
        assert!(elapsed <= spec.timeout + spec.interval);
        // roughly one probe per interval, plus the final one at the deadline
        assert!(calls > 900 && calls <= 1001, "calls = {calls}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_longer_than_timeout() {
        let spec = PollSpec::new(Duration::from_millis(25), Duration::from_secs(1));
        let start = Instant::now();
        let mut calls = 0u32;

        assert!(
            !spec
                .wait_for(|| {
                    calls += 1;
                    false
                })
                .await
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(25));
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(path_exists(dir.path()));
        assert!(!path_exists(&dir.path().join("missing")));
    }
}
