//! Retention sweeper (§3: "Retention sweeper hard-deletes messages
//! older than channel.retention_hours"). A single dedicated task,
//! mirroring the teacher's `cleanup_db` interval loop in
//! `warpgate/src/commands/run.rs` — wake up on a fixed period, do one
//! pass, go back to sleep; never driven by request traffic.

use std::time::Duration;

use tracing::info;

use crate::memdb::MemDb;

/// Runs until the process shuts down. `period` is independent of
/// `checkpoint_interval_ms` — retention is a correctness sweep, not a
/// durability one, so it can run on a much coarser cadence.
pub async fn run(memdb: MemDb, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let removed = memdb.sweep_retention().await;
        if removed > 0 {
            info!(removed, "retention sweep removed expired messages");
        }
    }
}
