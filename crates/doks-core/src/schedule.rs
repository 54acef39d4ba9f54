//! Timer and delay abstractions.
//!
//! The health monitor and the answer reveal never touch tokio timers
//! directly. They go through [`Scheduler`] and [`Delay`] so tests can drive
//! ticks by hand and reveal answers without waiting.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Callback run on every tick of a repeating schedule.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Creates repeating schedules.
pub trait Scheduler: Send + Sync {
    /// Runs `tick` every `every`, first after one full interval.
    ///
    /// The schedule lives until the returned handle is cancelled or dropped.
    fn schedule_repeating(&self, every: Duration, tick: TickFn) -> ScheduleHandle;
}

/// Cancellation handle for a repeating schedule.
///
/// Cancelling stops future ticks only; a tick that is already running
/// completes normally.
#[derive(Debug)]
pub struct ScheduleHandle {
    token: CancellationToken,
}

impl ScheduleHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Scheduler backed by `tokio::time::interval`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, every: Duration, tick: TickFn) -> ScheduleHandle {
        // interval_at panics on a zero period
        let every = every.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tick().await;
            }
            tracing::trace!("[TokioScheduler] schedule ({:?}) stopped", every);
        });

        ScheduleHandle::new(token)
    }
}

/// Pauses between steps of an artificial stream.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real wall-clock delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Delay that only yields to the runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn pause(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}
