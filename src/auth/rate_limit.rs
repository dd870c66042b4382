//! IP-scoped PIN attempt limiter
//!
//! Fixed one-hour windows per source IP, evaluated before the
//! per-session counter. This guards against distributed brute force
//! spread over many sessions; the per-session lockout remains the
//! authoritative defence for one table.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter keyed by source IP
#[derive(Debug)]
pub struct IpRateLimiter {
    windows: DashMap<String, Window>,
    max_per_window: u32,
    window: Duration,
}

impl IpRateLimiter {
    pub fn new(max_per_hour: u32) -> Self {
        Self::with_window(max_per_hour, Duration::from_secs(3600))
    }

    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_per_window,
            window,
        }
    }

    /// Register one attempt from `ip`. `Err(retry_after_secs)` when the
    /// window is exhausted.
    pub fn check(&self, ip: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut entry = self.windows.entry(ip.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_per_window {
            let elapsed = now.duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed (periodic housekeeping)
    pub fn evict_stale(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_and_reports_retry_after() {
        let limiter = IpRateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
        let retry_after = limiter.check("10.0.0.1").unwrap_err();
        assert!(retry_after > 0 && retry_after <= 3600);
        // Other IPs are unaffected
        assert!(limiter.check("10.0.0.2").is_ok());
    }

    #[test]
    fn window_resets_after_elapse() {
        let limiter = IpRateLimiter::with_window(1, Duration::from_millis(10));
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_err());
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check("10.0.0.1").is_ok());
    }
}
