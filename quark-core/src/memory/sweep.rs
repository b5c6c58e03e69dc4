//! Reclamation Sweeper
//!
//! Index entries go stale when the last handle clone for an address is
//! dropped: the `Weak` in the address index no longer upgrades, lookups
//! against it report absent, and the entry is pure bookkeeping overhead. The
//! sweeper purges that bookkeeping incrementally.
//!
//! # Pass structure
//!
//! A pass snapshots the set of indexed addresses up front, then walks it in
//! fixed-size batches, removing each entry whose slot has been reclaimed,
//! and yields back to the scheduler between batches so a large index never
//! monopolizes the executor. A completed pass reports what it did and logs
//! the same figures at `debug` level.
//!
//! # Invocation discipline
//!
//! A pass runs once and does not reschedule itself; callers decide when (and
//! whether) to sweep again. Running two passes concurrently is safe — each
//! removal is an atomic check-and-remove, so the worst case is that one pass
//! finds the other's work already done. Dropping the future between batches
//! is the cancellation mechanism: the index is left consistent, just less
//! swept.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::store::Memory;

/// Entries examined per batch before yielding back to the scheduler.
pub const SWEEP_BATCH_SIZE: usize = 5000;

/// Outcome of one completed sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Index entries examined during the pass.
    pub scanned: usize,
    /// Stale entries removed.
    pub reclaimed: usize,
    /// Wall-clock duration of the pass, yields included.
    pub elapsed: Duration,
}

impl Memory {
    /// Run one sweep pass with the default batch size.
    ///
    /// See [`Memory::sweep_batched`].
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_batched(SWEEP_BATCH_SIZE).await
    }

    /// Run one sweep pass, yielding to the scheduler after every
    /// `batch_size` entries examined.
    ///
    /// Only entries whose slot has been reclaimed are removed; live entries
    /// — and entries allocated after the pass snapshotted the index — are
    /// untouched. Safe to run concurrently with itself and with every other
    /// memory operation.
    pub async fn sweep_batched(&self, batch_size: usize) -> SweepReport {
        let started = Instant::now();
        let addresses = self.snapshot_addresses();
        let batch_size = batch_size.max(1);

        let mut scanned = 0usize;
        let mut reclaimed = 0usize;
        for (index, batch) in addresses.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::task::yield_now().await;
            }
            for &address in batch {
                scanned += 1;
                if self.purge_if_stale(address) {
                    reclaimed += 1;
                }
            }
        }

        let elapsed = started.elapsed();
        debug!(scanned, reclaimed, elapsed_us = elapsed.as_micros() as u64, "sweep pass complete");
        SweepReport {
            scanned,
            reclaimed,
            elapsed,
        }
    }
}
