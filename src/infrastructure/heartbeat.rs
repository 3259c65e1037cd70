use std::time::Duration;
use tokio::time::{self, Instant};

/// Periodic keep-alive driver.
///
/// The first tick fires one full interval after [`run`](Self::run) starts;
/// the loop exits as soon as the tick callback reports that the connection
/// it was started for is gone.
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    interval: Duration,
}

impl KeepAlive {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Calls `tick` every interval until it returns `false`
    pub async fn run<F>(self, mut tick: F)
    where
        F: FnMut() -> bool + Send,
    {
        if self.interval.is_zero() {
            tracing::debug!("Keep-alive disabled (zero interval)");
            return;
        }

        let mut timer = time::interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if !tick() {
                tracing::debug!("Keep-alive stopped");
                break;
            }
        }
    }
}
