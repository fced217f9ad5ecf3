use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{error, info};

use crate::{
    services::{leaderboard_service, schedule_service},
    state::SharedState,
};

/// How often due broadcasts are delivered.
pub const DISPATCH_PERIOD: Duration = Duration::from_secs(60);
/// How often the leaderboard message is refreshed, on wall-clock boundaries.
pub const LEADERBOARD_PERIOD: Duration = Duration::from_secs(300);

/// A background job run on a fixed period.
///
/// Aligned jobs fire on wall-clock multiples of the period (every full five
/// minutes, say) instead of counting from process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periodic {
    period: Duration,
    align: bool,
}

impl Periodic {
    /// Run every `period`, first tick right away.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            align: false,
        }
    }

    /// Run every `period`, on wall-clock boundaries.
    pub fn aligned(period: Duration) -> Self {
        Self {
            period,
            align: true,
        }
    }

    /// Delay before the first tick, given the time elapsed since the epoch.
    pub fn initial_delay(&self, since_epoch: Duration) -> Duration {
        if !self.align {
            return Duration::ZERO;
        }
        let period = self.period.as_millis().max(1);
        let remainder = since_epoch.as_millis() % period;
        if remainder == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(u64::try_from(period - remainder).unwrap_or(u64::MAX))
        }
    }

    /// Spawn the job on the runtime. A slow run delays the next tick instead
    /// of piling up missed ones.
    pub fn spawn<F, Fut>(self, name: &'static str, mut job: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            let since_epoch = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            let delay = self.initial_delay(since_epoch);
            let mut ticker = interval_at(Instant::now() + delay, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                job = name,
                period_secs = self.period.as_secs(),
                first_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "periodic job started"
            );
            loop {
                ticker.tick().await;
                job().await;
            }
        })
    }
}

/// Start the broadcast dispatcher and the leaderboard refresher.
pub fn spawn_background_jobs(state: SharedState) -> Vec<JoinHandle<()>> {
    let dispatch_state = state.clone();
    let dispatcher = Periodic::every(DISPATCH_PERIOD).spawn("scheduled-messages", move || {
        let state = dispatch_state.clone();
        async move {
            if let Err(err) = schedule_service::dispatch_due_messages(&state).await {
                error!(error = ?err, "scheduled message pass failed");
            }
        }
    });

    let leaderboard = Periodic::aligned(LEADERBOARD_PERIOD).spawn("leaderboard", move || {
        let state = state.clone();
        async move {
            if let Err(err) = leaderboard_service::refresh_leaderboard(&state).await {
                error!(error = ?err, "leaderboard refresh failed");
            }
        }
    });

    vec![dispatcher, leaderboard]
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn aligned_jobs_wait_for_the_next_boundary() {
        let five_minutes = Periodic::aligned(Duration::from_secs(300));
        let boundary = Duration::from_secs(999_999_900);
        assert_eq!(
            five_minutes.initial_delay(boundary + Duration::from_secs(200)),
            Duration::from_secs(100)
        );
        assert_eq!(
            five_minutes.initial_delay(boundary + Duration::from_secs(500)),
            Duration::from_secs(100)
        );
        assert_eq!(five_minutes.initial_delay(boundary), Duration::ZERO);
    }

    #[test]
    fn plain_jobs_start_immediately() {
        let minute = Periodic::every(Duration::from_secs(60));
        assert_eq!(minute.initial_delay(Duration::from_secs(1234)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_jobs_tick_on_their_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = Periodic::every(Duration::from_secs(60)).spawn("test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
