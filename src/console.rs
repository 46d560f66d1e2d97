//! Interactive control surface: stdin commands, a periodic report ticker and
//! Ctrl-C handling.
//!
//! Commands: `start <n>`, `stop [n]`, `report`, `avg`, `history [json]`,
//! `quit`. The ticker touches the monitor on a fixed interval and prints the
//! interval report while blasters are live.

use std::{cmp::Reverse, time::Duration};

use anyhow::Result;
use crossterm::style::Stylize;
use itertools::Itertools;
use tabled::{
    builder::Builder,
    settings::{Alignment, Padding, Style},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{Instant, MissedTickBehavior},
};

use crate::{
    monitor::{AvgQps, HistoryRow, MonitorError, QpsMonitor, TouchStats},
    pool::BlasterPool,
};

const TIME_FORMAT: &str = "%H:%M:%S";

enum Command {
    Start(usize),
    StopAll,
    StopSome(usize),
    Report,
    Avg,
    History { json: bool },
    Quit,
    Help,
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Quit,
}

/// Runs the console until `quit`, Ctrl-C or end of input. Always leaves with
/// the pool drained.
pub async fn run(
    pool: &mut BlasterPool,
    monitor: &QpsMonitor,
    report_interval: Duration,
    quiet: bool,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval_at(Instant::now() + report_interval, report_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            _ = ticker.tick() => {
                if !quiet && pool.live() > 0 {
                    print_report(&monitor.touch());
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if dispatch(line.trim(), pool, monitor) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    pool.shutdown().await;
                    return Err(e.into());
                }
            },
        }
    }

    pool.shutdown().await;
    Ok(())
}

fn dispatch(line: &str, pool: &mut BlasterPool, monitor: &QpsMonitor) -> Flow {
    if line.is_empty() {
        return Flow::Continue;
    }
    let Some(command) = parse_command(line) else {
        print_help();
        return Flow::Continue;
    };
    match command {
        Command::Start(n) => pool.start(n),
        Command::StopAll => pool.stop_all(),
        Command::StopSome(n) => {
            if let Err(e) = pool.stop_some(n) {
                println!("{}", e.to_string().red());
            }
        }
        Command::Report => print_report(&monitor.touch()),
        Command::Avg => print_avg(monitor.avg()),
        Command::History { json } => print_history(monitor, json),
        Command::Quit => return Flow::Quit,
        Command::Help => print_help(),
    }
    Flow::Continue
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let arg = words.next();
    if words.next().is_some() {
        return None;
    }
    match (command, arg) {
        ("start", Some(n)) => n.parse::<usize>().ok().map(Command::Start),
        ("stop", None) => Some(Command::StopAll),
        ("stop", Some(n)) => n.parse::<usize>().ok().map(Command::StopSome),
        ("report", None) => Some(Command::Report),
        ("avg", None) => Some(Command::Avg),
        ("history", None) => Some(Command::History { json: false }),
        ("history", Some("json")) => Some(Command::History { json: true }),
        ("quit" | "exit", None) => Some(Command::Quit),
        ("help", None) => Some(Command::Help),
        _ => None,
    }
}

fn print_help() {
    println!("commands: start <n> | stop [n] | report | avg | history [json] | quit");
}

fn print_report(stats: &TouchStats) {
    println!("From {} to {}", stats.from.format(TIME_FORMAT), stats.to.format(TIME_FORMAT));
    println!(
        "  Hits {}  Diff {}  QPS {}",
        stats.total_hits.to_string().green().bold(),
        stats.hits_diff.to_string().green(),
        format!("{:.2}", stats.qps).green().bold(),
    );
    for (outcome, count) in stats.by_outcome.iter().sorted_unstable_by_key(|(_, count)| Reverse(*count)) {
        let outcome = if outcome.is_success() {
            outcome.to_string().green()
        } else if outcome.is_client_error() {
            outcome.to_string().yellow()
        } else {
            outcome.to_string().red()
        };
        println!("  [{count}] {outcome}");
    }
}

fn print_avg(avg: Result<AvgQps, MonitorError>) {
    match avg {
        Ok(avg) => println!(
            "Avg QPS over last {:.1} sec: {}",
            avg.span_secs,
            format!("{:.2}", avg.qps).green().bold(),
        ),
        Err(e) => println!("{}", e.to_string().yellow()),
    }
}

fn print_history(monitor: &QpsMonitor, json: bool) {
    let rows: Vec<HistoryRow> = monitor.history().collect();
    if json {
        match serde_json::to_string_pretty(&rows) {
            Ok(out) => println!("{out}"),
            Err(e) => println!("{}", e.to_string().red()),
        }
        return;
    }

    let header = vec!["Time".to_string(), "Hits".into(), "Diff".into(), "QPS".into()];
    let mut table = Builder::from_iter(std::iter::once(header).chain(rows.iter().map(|row| {
        vec![
            row.time.format(TIME_FORMAT).to_string(),
            row.hits.to_string(),
            row.diff.to_string(),
            format!("{:.2}", row.qps),
        ]
    })))
    .build();
    table
        .with(Style::empty())
        .with(Alignment::right())
        .with(Padding::new(0, 2, 0, 0));
    println!("{table}");
}
