//! Shared QPS accounting for the blaster pool.
//!
//! Workers record one [`Outcome`] per completed request via
//! [`QpsMonitor::note`]; the control surface periodically calls
//! [`QpsMonitor::touch`] to snapshot the counters and derive the interval
//! rate. The monitor keeps a bounded FIFO window of the most recent snapshots
//! so [`QpsMonitor::avg`] can report the average QPS over the retained span.
//!
//! All counter updates and multi-field reads happen under a single mutex with
//! bounded critical sections, so concurrent workers never observe torn
//! aggregates.

use std::{
    collections::{HashMap, VecDeque},
    num::NonZeroUsize,
};

use chrono::{DateTime, Utc};
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::outcome::Outcome;

/// Number of `(hits, time)` snapshots retained for windowed averages.
const WINDOW_SNAPSHOTS: NonZeroUsize = nonzero!(30usize);

/// Errors from windowed-average queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// The window holds fewer than two snapshots.
    #[error("not enough snapshots to compute an average")]
    InsufficientHistory,
    /// The window spans zero elapsed time.
    #[error("snapshot window spans zero elapsed time")]
    ZeroTimespan,
}

/// One interval report produced by [`QpsMonitor::touch`].
#[derive(Debug, Clone)]
pub struct TouchStats {
    /// Start of the interval (previous snapshot time).
    pub from: DateTime<Utc>,
    /// End of the interval (this snapshot time).
    pub to: DateTime<Utc>,
    /// Cumulative request count at the end of the interval.
    pub total_hits: u64,
    /// Requests completed within the interval.
    pub hits_diff: u64,
    /// Instantaneous rate over the interval; zero when no time elapsed.
    pub qps: f64,
    /// Cumulative per-outcome counts.
    pub by_outcome: Vec<(Outcome, u64)>,
}

/// Average rate over the retained snapshot window.
#[derive(Debug, Clone, Copy)]
pub struct AvgQps {
    /// Average queries per second over the window span.
    pub qps: f64,
    /// Window span in seconds.
    pub span_secs: f64,
}

/// One row of [`QpsMonitor::history`]: a snapshot plus its delta from the
/// previous row.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    /// Snapshot timestamp.
    pub time: DateTime<Utc>,
    /// Cumulative request count at the snapshot.
    pub hits: u64,
    /// Requests completed since the previous snapshot.
    pub diff: u64,
    /// Rate over the interval ending at this snapshot.
    pub qps: f64,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    hits: u64,
    time: DateTime<Utc>,
}

/// A bounded FIFO of cumulative-count snapshots. Pushing past capacity
/// evicts the oldest entry first.
struct SnapshotWindow {
    snapshots: VecDeque<Snapshot>,
    size: NonZeroUsize,
}

impl SnapshotWindow {
    fn seeded(size: NonZeroUsize, seed: Snapshot) -> Self {
        let mut win = Self { snapshots: VecDeque::with_capacity(size.get()), size };
        win.push(seed);
        win
    }

    fn push(&mut self, snapshot: Snapshot) {
        if self.snapshots.len() == self.size.get() {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    fn oldest(&self) -> &Snapshot {
        // SAFETY: `snapshots` is never empty
        self.snapshots.front().unwrap()
    }

    fn newest(&self) -> &Snapshot {
        // SAFETY: `snapshots` is never empty
        self.snapshots.back().unwrap()
    }

    fn len(&self) -> usize {
        self.snapshots.len()
    }

    fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}

struct MonitorState {
    hits_per_outcome: HashMap<Outcome, u64>,
    total_hits: u64,
    touched_hits: u64,
    touched_time: DateTime<Utc>,
    window: SnapshotWindow,
}

impl MonitorState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            hits_per_outcome: HashMap::new(),
            total_hits: 0,
            touched_hits: 0,
            touched_time: now,
            window: SnapshotWindow::seeded(WINDOW_SNAPSHOTS, Snapshot { hits: 0, time: now }),
        }
    }

    /// Snapshots the counters: appends `(total, now)` to the window, rolls
    /// the last-touch bookkeeping forward and returns the interval report.
    fn advance(&mut self, now: DateTime<Utc>) -> TouchStats {
        let hits_diff = self.total_hits - self.touched_hits;
        let elapsed = seconds_between(self.touched_time, now);
        let stats = TouchStats {
            from: self.touched_time,
            to: now,
            total_hits: self.total_hits,
            hits_diff,
            qps: if elapsed > 0.0 { hits_diff as f64 / elapsed } else { 0.0 },
            by_outcome: self.hits_per_outcome.iter().map(|(k, &v)| (k.clone(), v)).collect(),
        };
        self.window.push(Snapshot { hits: self.total_hits, time: now });
        self.touched_hits = self.total_hits;
        self.touched_time = now;
        stats
    }

    fn windowed_avg(&self) -> Result<AvgQps, MonitorError> {
        if self.window.len() < 2 {
            return Err(MonitorError::InsufficientHistory);
        }
        let (oldest, newest) = (self.window.oldest(), self.window.newest());
        let span = seconds_between(oldest.time, newest.time);
        if span <= 0.0 {
            return Err(MonitorError::ZeroTimespan);
        }
        Ok(AvgQps { qps: (newest.hits - oldest.hits) as f64 / span, span_secs: span })
    }
}

/// Thread-safe QPS aggregator shared by every worker.
pub struct QpsMonitor {
    state: Mutex<MonitorState>,
}

impl QpsMonitor {
    /// Creates a monitor with empty counters and the window seeded with a
    /// single `(0, now)` snapshot, so the first `touch`/`avg` has a defined
    /// baseline.
    pub fn new() -> Self {
        Self { state: Mutex::new(MonitorState::new(Utc::now())) }
    }

    /// Records one completed request.
    pub fn note(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        state.total_hits += 1;
        *state.hits_per_outcome.entry(outcome).or_insert(0) += 1;
    }

    /// Takes a snapshot and returns the interval report since the previous
    /// one. Rendering is up to the caller; discarding the returned value is a
    /// silent touch.
    pub fn touch(&self) -> TouchStats {
        self.touch_at(Utc::now())
    }

    fn touch_at(&self, now: DateTime<Utc>) -> TouchStats {
        self.state.lock().advance(now)
    }

    /// Average QPS over the whole retained window. The window is refreshed
    /// first, exactly like a silent [`touch`](Self::touch).
    pub fn avg(&self) -> Result<AvgQps, MonitorError> {
        self.avg_at(Utc::now())
    }

    fn avg_at(&self, now: DateTime<Utc>) -> Result<AvgQps, MonitorError> {
        let mut state = self.state.lock();
        state.advance(now);
        state.windowed_avg()
    }

    /// Yields one row per retained snapshot with deltas against the previous
    /// row. Restartable: each call walks a fresh copy of the window.
    pub fn history(&self) -> impl Iterator<Item = HistoryRow> {
        let snapshots: Vec<Snapshot> = self.state.lock().window.iter().copied().collect();
        let mut prev: Option<Snapshot> = None;
        snapshots.into_iter().map(move |snap| {
            let (diff, qps) = match prev {
                Some(p) => {
                    let diff = snap.hits - p.hits;
                    let secs = seconds_between(p.time, snap.time);
                    (diff, if secs > 0.0 { diff as f64 / secs } else { 0.0 })
                }
                None => (0, 0.0),
            };
            prev = Some(snap);
            HistoryRow { time: snap.time, hits: snap.hits, diff, qps }
        })
    }

    /// Resets every counter and re-seeds the window with a single zero
    /// snapshot.
    pub fn clear(&self) {
        self.clear_at(Utc::now());
    }

    fn clear_at(&self, now: DateTime<Utc>) {
        *self.state.lock() = MonitorState::new(now);
    }

    /// Cumulative number of recorded outcomes.
    pub fn total_hits(&self) -> u64 {
        self.state.lock().total_hits
    }
}

impl Default for QpsMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
