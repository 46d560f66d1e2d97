//! Lifecycle management for the blaster pool.
//!
//! The pool is mutated only by the control task; stop requests cross over to
//! the worker tasks through their per-worker cancellation tokens, so no lock
//! is needed around the live-handle collection itself.

use std::sync::Arc;

use rand::seq::{SliceRandom, index};
use thiserror::Error;
use tracing::info;

use crate::{config::Destination, monitor::QpsMonitor, worker::Blaster};

/// Pool lifecycle errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// A partial stop asked for more workers than are running.
    #[error("cannot stop {requested} blasters, only {live} running")]
    NotEnoughBlasters {
        /// How many blasters the caller asked to stop.
        requested: usize,
        /// How many were actually running.
        live: usize,
    },
}

/// Owns every live blaster and the shared monitor reference.
pub struct BlasterPool {
    destinations: Vec<Arc<Destination>>,
    monitor: Arc<QpsMonitor>,
    live: Vec<Blaster>,
    next_id: u64,
}

impl BlasterPool {
    /// Creates an empty pool over the active destination set.
    pub fn new(
        destinations: impl IntoIterator<Item = Destination>,
        monitor: Arc<QpsMonitor>,
    ) -> Self {
        Self {
            destinations: destinations.into_iter().map(Arc::new).collect(),
            monitor,
            live: Vec::new(),
            next_id: 0,
        }
    }

    /// Spawns `n` blasters, each bound to a destination drawn uniformly at
    /// random (with replacement). Returns immediately; the workers run
    /// concurrently with the caller and with each other.
    pub fn start(&mut self, n: usize) {
        let mut rng = rand::thread_rng();
        for _ in 0..n {
            // SAFETY: config validation guarantees at least one destination
            let dest = self.destinations.choose(&mut rng).unwrap().clone();
            self.live.push(Blaster::spawn(self.next_id, dest, self.monitor.clone()));
            self.next_id += 1;
        }
        info!(started = n, live = self.live.len(), "started blasters");
    }

    /// Signals every live blaster to stop, forgets the handles and resets
    /// the monitor. Fire-and-forget: in-flight request cycles still finish
    /// on their own time.
    pub fn stop_all(&mut self) {
        let stopped = self.live.len();
        for blaster in self.live.drain(..) {
            blaster.stop();
        }
        self.monitor.clear();
        info!(stopped, "stopped all blasters");
    }

    /// Stops `n` blasters picked uniformly at random without replacement,
    /// leaving the remainder (and the monitor) untouched.
    pub fn stop_some(&mut self, n: usize) -> Result<(), PoolError> {
        if n > self.live.len() {
            return Err(PoolError::NotEnoughBlasters { requested: n, live: self.live.len() });
        }
        // sample indices instead of shuffling the pool itself
        let mut picked = index::sample(&mut rand::thread_rng(), self.live.len(), n).into_vec();
        picked.sort_unstable_by(|a, b| b.cmp(a));
        for idx in picked {
            self.live.swap_remove(idx).stop();
        }
        info!(stopped = n, live = self.live.len(), "stopped random blasters");
        Ok(())
    }

    /// Full stop that waits for every worker to finish its in-flight cycle
    /// before resetting the monitor. Used on shutdown paths where the caller
    /// needs a hard drain.
    pub async fn shutdown(&mut self) {
        let stopping: Vec<Blaster> = self.live.drain(..).collect();
        for blaster in &stopping {
            blaster.stop();
        }
        for blaster in stopping {
            let _ = blaster.join().await;
        }
        self.monitor.clear();
    }

    /// Number of live blasters.
    pub fn live(&self) -> usize {
        self.live.len()
    }
}
