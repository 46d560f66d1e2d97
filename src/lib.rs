//! Synthetic SMS-MO traffic generation.
//!
//! `moblast` floods one or more configured message-gateway endpoints with
//! randomly generated `SMS_MO` documents from a pool of concurrent blasters,
//! while a shared [`QpsMonitor`] aggregates per-status counters into live and
//! windowed QPS statistics.
//!
//! The usual flow: load a [`config::Config`], create a [`QpsMonitor`] and a
//! [`BlasterPool`] over the active destinations, then drive the pool
//! (`start`, `stop_all`, `stop_some`) while querying the monitor for interval
//! reports, windowed averages and snapshot history.
#![deny(missing_docs)]

mod worker;

pub mod config;
pub mod console;
pub mod monitor;
pub mod outcome;
pub mod payload;
pub mod pool;

pub use crate::{
    config::Destination,
    monitor::QpsMonitor,
    outcome::Outcome,
    pool::{BlasterPool, PoolError},
};
