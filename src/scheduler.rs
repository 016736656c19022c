//! Chained delay scheduling
//!
//! A single sleep cannot represent every delay this bot needs: a ban can
//! last weeks, while classic one-shot timers top out at `i32::MAX`
//! milliseconds. [`DelayScheduler`] chains sleeps of at most `max_step`
//! until the requested delay has elapsed, then runs the callback once.
//! [`TimerToken::cancel`] stops the chain at any step; once it returns, the
//! callback will not start.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

/// Largest delay a 32-bit millisecond timer can represent in one shot.
pub const MAX_TIMER_STEP: Duration = Duration::from_millis(i32::MAX as u64);

/// Handle to a scheduled callback.
///
/// Dropping the token does not cancel the timer; the token exists so the
/// owner can cancel explicitly. A token is never reused for another timer.
#[derive(Debug)]
pub struct TimerToken {
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
    steps: Arc<AtomicU32>,
}

impl TimerToken {
    /// Prevent the callback from ever firing.
    ///
    /// Effective at any point in the chain. A callback that has already
    /// started is not interrupted; one that has not started never will be.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of sleep steps the chain has completed so far.
    #[must_use]
    pub fn chain_steps(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }
}

/// Fires callbacks after arbitrary delays by chaining bounded sleeps.
#[derive(Debug, Clone)]
pub struct DelayScheduler {
    max_step: Duration,
}

impl Default for DelayScheduler {
    fn default() -> Self {
        Self::new(MAX_TIMER_STEP)
    }
}

impl DelayScheduler {
    /// Create a scheduler whose single sleeps never exceed `max_step`.
    #[must_use]
    pub fn new(max_step: Duration) -> Self {
        assert!(!max_step.is_zero(), "max_step must be non-zero");
        Self { max_step }
    }

    /// Run `callback` once after `delay`, chaining through `max_step`
    /// sleeps as needed. Returns a token that cancels the chain.
    pub fn schedule<F, Fut>(&self, delay: Duration, callback: F) -> TimerToken
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let steps = Arc::new(AtomicU32::new(0));

        let token = TimerToken {
            cancelled: Arc::clone(&cancelled),
            wake: Arc::clone(&wake),
            steps: Arc::clone(&steps),
        };

        let max_step = self.max_step;
        tokio::spawn(async move {
            let mut remaining = delay;
            while !remaining.is_zero() {
                let step = remaining.min(max_step);
                tokio::select! {
                    () = wake.notified() => {
                        debug!(remaining_ms = remaining.as_millis() as u64, "timer cancelled mid-chain");
                        return;
                    }
                    () = tokio::time::sleep(step) => {
                        remaining = remaining.saturating_sub(step);
                        steps.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            // A cancel that lands between the last sleep and this check
            // still wins; past this point the callback is committed.
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            callback().await;
        });

        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{Instant, advance};

    /// Let the spawned timer task observe the advanced clock.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in = Arc::clone(&fired);
        let cb = move || {
            let fired = Arc::clone(&fired_in);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
        };
        (fired, cb)
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_delay_fires_once() {
        let scheduler = DelayScheduler::new(Duration::from_millis(10_000));
        let (fired, cb) = counter();

        scheduler.schedule(Duration::from_millis(500), cb);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        advance(Duration::from_millis(60_000)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1, "must not fire twice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_delay_chains_and_fires_at_the_right_time() {
        let max_step = Duration::from_millis(1_000);
        let scheduler = DelayScheduler::new(max_step);
        let (fired, cb) = counter();

        // 3 full steps plus a 500ms remainder.
        let start = Instant::now();
        let token = scheduler.schedule(max_step * 3 + Duration::from_millis(500), cb);
        settle().await;

        // After three full steps the callback is still pending.
        for _ in 0..3 {
            advance(max_step).await;
            settle().await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(token.chain_steps(), 3);

        advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(token.chain_steps(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(3_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_chain_prevents_the_callback() {
        let max_step = Duration::from_millis(1_000);
        let scheduler = DelayScheduler::new(max_step);
        let (fired, cb) = counter();

        let token = scheduler.schedule(max_step * 4, cb);
        settle().await;

        advance(max_step).await;
        settle().await;
        advance(max_step).await;
        settle().await;
        assert_eq!(token.chain_steps(), 2);

        token.cancel();
        assert!(token.is_cancelled());

        advance(max_step * 10).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0, "cancelled timer must never fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_step() {
        let scheduler = DelayScheduler::new(Duration::from_millis(1_000));
        let (fired, cb) = counter();

        let token = scheduler.schedule(Duration::from_millis(2_500), cb);
        token.cancel();

        advance(Duration::from_millis(10_000)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_fires_immediately() {
        let scheduler = DelayScheduler::default();
        let (fired, cb) = counter();

        scheduler.schedule(Duration::ZERO, cb);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
