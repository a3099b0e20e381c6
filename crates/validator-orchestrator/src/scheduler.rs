//! Scheduled loop (spec §4.H): single-threaded cooperative tick driving the
//! pipeline, with graceful shutdown generalized from the oracle's
//! reconnect-loop `select!` shape (spec.md Ambient Stack, "Graceful
//! shutdown").

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::info;

use validator_substrate::SubstrateClient;

use crate::pipeline::Orchestrator;

/// spec §4.B: "A background health-check pings the chain head every 30 s."
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub enum Interval {
    Fixed(Duration),
    /// Randomized uniformly in `[min, max]` each tick, to avoid herd effects
    /// across validators on the same schedule (spec §4.H).
    Randomized { min: Duration, max: Duration },
}

impl Interval {
    fn next_delay(&self) -> Duration {
        match self {
            Interval::Fixed(d) => *d,
            Interval::Randomized { min, max } => {
                if max <= min {
                    return *min;
                }
                let min_ms = min.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
            }
        }
    }
}

/// Runs `orchestrator.run_once_logged()` on every tick until a shutdown
/// signal arrives. No two runs overlap: a tick fired while a run is still
/// in progress is impossible by construction since the loop body awaits
/// the run before sleeping again (spec §5 "no two runs overlap").
///
/// Alongside the tick loop, a background task drives the substrate client's
/// spec §4.B health-check every 30 s, independent of the run schedule;
/// `reconnect()`'s exponential backoff only ever runs if something calls
/// `health_check()`, so this task is what actually makes the `Connecting`/
/// `Reconnecting` states reachable at runtime. On shutdown both the health
/// check and the connection itself are torn down (spec §4.H "closing the
/// substrate client").
pub async fn run_forever(mut orchestrator: Orchestrator, interval: Interval) {
    let substrate = orchestrator.substrate_handle();
    let health_check = tokio::spawn(health_check_loop(substrate.clone()));

    loop {
        orchestrator.run_once_logged().await;

        let delay = interval.next_delay();
        info!(delay_secs = delay.as_secs(), "scheduling next run");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_signal() => {
                info!("shutdown signal received, exiting scheduler loop");
                break;
            }
        }
    }

    health_check.abort();
    substrate.close();
    info!("substrate client closed, shutdown complete");
}

/// Pings the chain head on a fixed 30 s tick until aborted by the caller.
async fn health_check_loop(substrate: Arc<SubstrateClient>) {
    let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        substrate.health_check().await;
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn randomized_interval_respects_bounds() {
        let interval = Interval::Randomized {
            min: Duration::from_secs(10),
            max: Duration::from_secs(30),
        };
        for _ in 0..50 {
            let d = interval.next_delay();
            assert!(d >= Duration::from_secs(10) && d <= Duration::from_secs(30));
        }
    }

    #[test]
    fn fixed_interval_is_constant() {
        let interval = Interval::Fixed(Duration::from_secs(600));
        assert_eq!(interval.next_delay(), Duration::from_secs(600));
    }
}
