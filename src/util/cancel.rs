// loglens - util/cancel.rs
//
// Cooperative cancellation and rate-limited progress reporting, shared by
// every long scan (index build, search, filter, analysis, fingerprint).
//
// Long operations check the token between bounded batches and abort with
// `EngineError::Cancelled` at the next suspension point. Partial side
// effects may remain observable; the high-level operation reports no
// success.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Long operations abort at their next batch
    /// boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Mutable callback receiving a completion fraction in `0.0..=1.0`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(f64);

/// Rate limiter for progress notifications. The first call always fires;
/// subsequent calls fire only after the configured interval has elapsed.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval: Duration::from_millis(min_interval_ms),
            last: None,
        }
    }

    /// Emit `fraction` through `progress` if the interval has elapsed.
    pub fn report(&mut self, progress: &mut Option<ProgressFn<'_>>, fraction: f64) {
        let due = match self.last {
            None => true,
            Some(at) => at.elapsed() >= self.min_interval,
        };
        if !due {
            return;
        }
        self.last = Some(Instant::now());
        if let Some(cb) = progress.as_mut() {
            cb(fraction.clamp(0.0, 1.0));
        }
    }

    /// Emit a final notification unconditionally (completion is never
    /// rate-limited away).
    pub fn finish(&mut self, progress: &mut Option<ProgressFn<'_>>) {
        if let Some(cb) = progress.as_mut() {
            cb(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_throttle_first_report_fires() {
        let mut throttle = ProgressThrottle::new(10_000);
        let mut seen = Vec::new();
        let mut cb = |f: f64| seen.push(f);
        let mut progress: Option<ProgressFn<'_>> = Some(&mut cb);
        throttle.report(&mut progress, 0.25);
        throttle.report(&mut progress, 0.5); // suppressed by interval
        assert_eq!(seen, vec![0.25]);
    }

    #[test]
    fn test_throttle_finish_always_fires() {
        let mut throttle = ProgressThrottle::new(10_000);
        let mut seen = Vec::new();
        let mut cb = |f: f64| seen.push(f);
        let mut progress: Option<ProgressFn<'_>> = Some(&mut cb);
        throttle.report(&mut progress, 0.1);
        throttle.finish(&mut progress);
        assert_eq!(seen, vec![0.1, 1.0]);
    }
}
