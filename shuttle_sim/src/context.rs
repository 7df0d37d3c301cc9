//! Simulation context implementing ShuttleContext for deterministic replay.

use async_trait::async_trait;
use shuttle_env::{EnvError, ShuttleContext};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

/// Times a sleeper yields before moving the clock, so tasks that are still
/// running at the current instant can register their own, earlier deadlines.
const SETTLE_YIELDS: usize = 4;

/// Virtual clock state.
#[derive(Debug, Default)]
struct Clock {
    /// Current virtual time (nanoseconds since simulation start)
    now_ns: u64,

    /// Pending sleeps as `(deadline_ns, ticket)`
    sleepers: BTreeSet<(u64, u64)>,

    next_ticket: u64,
}

/// Simulation context backed by a virtual clock.
///
/// This implements `ShuttleContext` using:
/// - A virtual clock that can be advanced manually
/// - Simulated sleep that waits for the clock to reach its own deadline
///
/// When every task is asleep, the sleeper with the earliest deadline moves
/// the clock forward to that deadline, like a timer wheel. Loops with
/// different intervals sharing one context therefore keep their own cadence,
/// and location timestamps and prediction elapsed times come out the same on
/// every run.
pub struct SimContext {
    clock: Arc<Mutex<Clock>>,

    /// Signalled whenever virtual time moves or a sleeper leaves
    changed: Arc<Notify>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

/// A registered sleep. Deregisters on drop, including when the sleeping
/// future is cancelled.
struct Sleeper {
    clock: Arc<Mutex<Clock>>,
    changed: Arc<Notify>,
    key: (u64, u64),
}

impl Drop for Sleeper {
    fn drop(&mut self) {
        lock(&self.clock).sleepers.remove(&self.key);
        self.changed.notify_waiters();
    }
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where a sleeper stands relative to the clock.
enum Turn {
    Due,
    Earliest,
    Waiting,
}

impl SimContext {
    /// Creates a new SimContext starting at virtual time zero.
    pub fn new() -> Self {
        Self::with_epoch(UNIX_EPOCH + Duration::from_secs(1704067200)) // 2024-01-01 00:00:00 UTC
    }

    /// Creates a context whose virtual time zero maps to `epoch`.
    pub fn with_epoch(epoch: SystemTime) -> Self {
        Self {
            clock: Arc::new(Mutex::new(Clock::default())),
            changed: Arc::new(Notify::new()),
            epoch,
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        lock(&self.clock)
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        {
            let mut clock = self.clock();
            let step = duration.as_nanos().min(u64::MAX as u128) as u64;
            clock.now_ns = clock.now_ns.saturating_add(step);
        }
        self.changed.notify_waiters();
    }

    /// Sets the virtual time to a specific value.
    ///
    /// The clock never runs backwards.
    pub fn set_time(&self, time_ns: u64) -> Result<(), EnvError> {
        {
            let mut clock = self.clock();
            if time_ns < clock.now_ns {
                return Err(EnvError::context(format!(
                    "cannot rewind virtual clock from {}ns to {}ns",
                    clock.now_ns, time_ns
                )));
            }
            clock.now_ns = time_ns;
        }
        self.changed.notify_waiters();
        Ok(())
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.clock().now_ns
    }

    /// Number of sleeps currently waiting on the virtual clock.
    pub fn pending_sleeps(&self) -> usize {
        self.clock().sleepers.len()
    }

    fn register(&self, duration: Duration) -> Sleeper {
        let mut clock = self.clock();
        let step = duration.as_nanos().min(u64::MAX as u128) as u64;
        let deadline = clock.now_ns.saturating_add(step);
        let ticket = clock.next_ticket;
        clock.next_ticket += 1;
        clock.sleepers.insert((deadline, ticket));

        Sleeper {
            clock: Arc::clone(&self.clock),
            changed: Arc::clone(&self.changed),
            key: (deadline, ticket),
        }
    }

    fn turn(&self, deadline: u64) -> Turn {
        let clock = self.clock();
        if clock.now_ns >= deadline {
            Turn::Due
        } else if clock.sleepers.first().map(|(d, _)| *d) == Some(deadline) {
            Turn::Earliest
        } else {
            Turn::Waiting
        }
    }

    /// Moves the clock to `deadline` if no earlier sleep has shown up.
    fn advance_to(&self, deadline: u64) {
        {
            let mut clock = self.clock();
            let earliest = clock.sleepers.first().map(|(d, _)| *d);
            if clock.now_ns >= deadline || earliest != Some(deadline) {
                return;
            }
            clock.now_ns = deadline;
        }
        self.changed.notify_waiters();
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
            changed: Arc::clone(&self.changed),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl ShuttleContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        let sleeper = self.register(duration);
        let deadline = sleeper.key.0;

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a clock move between the
            // check and the await is not missed
            notified.as_mut().enable();

            match self.turn(deadline) {
                Turn::Due => break,
                Turn::Earliest => {
                    for _ in 0..SETTLE_YIELDS {
                        tokio::task::yield_now().await;
                    }
                    self.advance_to(deadline);
                }
                Turn::Waiting => notified.await,
            }
        }

        drop(sleeper);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.to_string();
        let handle = tokio::spawn(future);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(task = %name, "simulated task panicked");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shuttle_env::unix_seconds;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new();
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new();
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        // Both should see the same time
        assert_eq!(ctx1.now(), ctx2.now());
    }

    #[test]
    fn test_set_time_never_rewinds() {
        let ctx = SimContext::new();
        ctx.set_time(5_000).unwrap();
        assert_eq!(ctx.time_ns(), 5_000);

        assert!(ctx.set_time(1_000).is_err());
        assert_eq!(ctx.time_ns(), 5_000);
    }

    #[test]
    fn test_unix_now_follows_virtual_clock() {
        let ctx = SimContext::new();
        assert_eq!(ctx.unix_now(), 1704067200.0);

        ctx.advance_time(Duration::from_millis(2500));
        assert_eq!(ctx.unix_now(), 1704067202.5);
        assert_eq!(unix_seconds(ctx.system_time()), ctx.unix_now());
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let ctx = SimContext::new();
        ctx.sleep(Duration::from_secs(10)).await;
        ctx.sleep(Duration::from_secs(10)).await;
        assert_eq!(ctx.now(), Duration::from_secs(20));
        assert_eq!(ctx.pending_sleeps(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_sleeps_wake_at_own_deadline() {
        let ctx = SimContext::new();

        let (long, short) = tokio::join!(
            async {
                ctx.sleep(Duration::from_secs(3)).await;
                ctx.now()
            },
            async {
                ctx.sleep(Duration::from_secs(1)).await;
                ctx.now()
            }
        );

        assert_eq!(short, Duration::from_secs(1));
        assert_eq!(long, Duration::from_secs(3));
        // Sleeps overlap; they do not add up
        assert_eq!(ctx.now(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_periodic_loops_keep_their_cadence() {
        let ctx = SimContext::new();

        let (slow, fast) = tokio::join!(
            async {
                let mut times = Vec::new();
                for _ in 0..3 {
                    ctx.sleep(Duration::from_secs(10)).await;
                    times.push(ctx.now().as_secs());
                }
                times
            },
            async {
                let mut times = Vec::new();
                for _ in 0..25 {
                    ctx.sleep(Duration::from_secs(1)).await;
                    times.push(ctx.now().as_secs());
                }
                times
            }
        );

        assert_eq!(slow, vec![10, 20, 30]);
        assert_eq!(fast, (1..=25).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_cancelled_sleep_deregisters() {
        let ctx = SimContext::new();

        tokio::select! {
            _ = ctx.sleep(Duration::from_secs(5)) => panic!("longer sleep finished first"),
            _ = ctx.sleep(Duration::from_secs(2)) => {}
        }

        assert_eq!(ctx.now(), Duration::from_secs(2));
        assert_eq!(ctx.pending_sleeps(), 0);
    }

    #[tokio::test]
    async fn test_manual_advance_wakes_sleeper() {
        let ctx = SimContext::shared();
        let sleeper = Arc::clone(&ctx);
        let task = tokio::spawn(async move {
            sleeper.sleep(Duration::from_secs(60)).await;
            sleeper.now()
        });

        // Let the sleeper register, then jump past its deadline by hand
        while ctx.pending_sleeps() == 0 {
            tokio::task::yield_now().await;
        }
        ctx.advance_time(Duration::from_secs(90));

        assert_eq!(task.await.unwrap(), Duration::from_secs(90));
    }
}
