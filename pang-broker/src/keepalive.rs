//! Periodic self-ping for hosts that idle out quiet services.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawn a task that issues `GET url` every `period`, starting one period
/// from now. Failures are logged and ignored. Abort the handle to stop it.
pub fn spawn_self_ping(client: reqwest::Client, url: String, period: Duration) -> JoinHandle<()> {
    tracing::info!(url = %url, interval_secs = period.as_secs(), "Self-ping enabled");

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match client.get(&url).send().await {
                Ok(response) => {
                    tracing::debug!(status = response.status().as_u16(), "Self-ping sent");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Self-ping failed");
                }
            }
        }
    })
}
