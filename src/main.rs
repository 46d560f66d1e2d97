use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, ensure};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use moblast::{BlasterPool, QpsMonitor, config::Config, console};

/// Synthetic SMS-MO traffic blaster.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Opts {
    /// Path to the destination config file
    #[clap(short = 'f', long, default_value = "moblast.toml")]
    config: PathBuf,

    /// Number of blasters to start immediately
    #[clap(short = 'c', long, default_value_t = 0)]
    blasters: usize,

    /// Interval between periodic QPS reports
    ///
    /// Examples: -i 5s, -i 1m
    #[clap(short = 'i', long, default_value = "5s")]
    report_interval: humantime::Duration,

    /// Disable the periodic report ticker (commands still work)
    #[clap(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let opts = Opts::parse();
    let report_interval: std::time::Duration = opts.report_interval.into();
    ensure!(!report_interval.is_zero(), "report interval must be positive");

    let config = Config::load(&opts.config)?;
    let monitor = Arc::new(QpsMonitor::new());
    let mut pool = BlasterPool::new(config.active_destinations().to_vec(), monitor.clone());
    if opts.blasters > 0 {
        pool.start(opts.blasters);
    }

    console::run(&mut pool, &monitor, report_interval, opts.quiet).await
}
