//! Per-match fixed-rate tick loop

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::settlement::ResultReporter;
use crate::util::time::tick_period;

use super::registry::MatchRegistry;

/// Owned handle to a running tick loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start the tick loop for one match instance.
///
/// The first tick fires one period after the call. Each tick checks that the
/// match is still registered under `match_id` as the same instance and stops
/// on its own otherwise.
pub fn spawn_ticker(
    registry: Arc<MatchRegistry>,
    match_id: String,
    instance: Uuid,
    reporter: Arc<dyn ResultReporter>,
) -> TickerHandle {
    let period = tick_period();
    let first_tick = Instant::now() + period;

    let task = tokio::spawn(async move {
        info!(match_id = %match_id, "Tick loop started");

        let mut ticks = interval_at(first_tick, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;

            let Some(handle) = registry.get(&match_id) else {
                debug!(match_id = %match_id, "Match no longer registered, stopping tick loop");
                break;
            };

            let finished = {
                let mut entry = handle.lock();
                if entry.instance != instance {
                    debug!(match_id = %match_id, "Match replaced, stopping tick loop");
                    break;
                }
                entry.tick()
            };
            drop(handle);

            if let Some(result) = finished {
                info!(
                    match_id = %match_id,
                    winner = ?result.winner,
                    score1 = result.score1,
                    score2 = result.score2,
                    "Match over"
                );
                registry.delete_instance(&match_id, instance);
                reporter.report(result);
                break;
            }
        }
    });

    TickerHandle { task }
}
