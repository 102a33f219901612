//! Mintwatch - Position Lifecycle and Risk Management Core
//!
//! CLI for driving the trading engine from recorded signal/tick feeds and
//! inspecting the trading journal.

mod application;
mod config;
mod domain;
mod risk;
mod strategy;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use crate::application::TradingEngine;
use crate::config::{load_config, Config};
use crate::domain::journal::{JournalStore, JsonJournal};
use crate::domain::signal::{PriceTick, Signal, SocialSignals, TokenFeatures};

#[derive(Parser)]
#[command(name = "mintwatch", about = "Position lifecycle and risk management core")]
struct CliApp {
    /// Log at info level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded signal/tick feed through the engine
    Replay(ReplayCmd),
    /// Print the performance summary from the journal
    Summary(SummaryCmd),
}

#[derive(Args)]
struct ReplayCmd {
    /// Configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// JSONL feed file: one signal or tick event per line
    #[arg(short, long)]
    feed: String,
}

#[derive(Args)]
struct SummaryCmd {
    /// Configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<String>,
}

/// One line of a replay feed
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum FeedEvent {
    /// An analysis-pipeline signal arriving at `timestamp`
    Signal {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        signal: Signal,
        #[serde(default)]
        features: TokenFeatures,
        #[serde(default)]
        social: SocialSignals,
    },
    /// A price observation
    Tick {
        #[serde(flatten)]
        tick: PriceTick,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Replay(cmd) => replay_command(cmd).await,
        Command::Summary(cmd) => summary_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };

    fmt().with_env_filter(filter).init();
}

/// Load configuration, falling back to defaults when no file was given.
/// An explicitly named file that is missing or invalid is fatal.
fn resolve_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            load_config(&expanded).with_context(|| format!("Failed to load configuration '{}'", path))
        }
        None => Ok(Config::default()),
    }
}

/// Journal path with ~ expansion
fn journal_path(config: &Config) -> PathBuf {
    let raw = config.journal.path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).to_string())
}

async fn replay_command(cmd: ReplayCmd) -> Result<()> {
    let config = resolve_config(cmd.config.as_deref())?;

    let mut config = config;
    config.journal.path = journal_path(&config);
    let engine = TradingEngine::from_config(&config);

    let file = std::fs::File::open(&cmd.feed)
        .with_context(|| format!("Failed to open feed file '{}'", cmd.feed))?;
    let reader = std::io::BufReader::new(file);

    let mut line_no = 0usize;
    let mut last_time: Option<DateTime<Utc>> = None;

    for line in reader.lines() {
        line_no += 1;
        let line = line.with_context(|| format!("Failed to read feed line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }

        let event: FeedEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid feed event on line {}", line_no))?;

        match event {
            FeedEvent::Signal {
                timestamp,
                signal,
                features,
                social,
            } => {
                engine.watch(&signal, &features, &social, timestamp).await;
                last_time = Some(timestamp);
            }
            FeedEvent::Tick { tick } => {
                engine
                    .check_entry(&tick.mint, tick.price, None, tick.timestamp)
                    .await;
                engine.update(&tick).await;
                engine.sweep_expired(tick.timestamp).await;
                last_time = Some(tick.timestamp);
            }
        }
    }

    if let Some(time) = last_time {
        engine.sweep_expired(time).await;
    }

    print_summary(&engine.performance_summary().await);
    Ok(())
}

async fn summary_command(cmd: SummaryCmd) -> Result<()> {
    let config = resolve_config(cmd.config.as_deref())?;
    let journal = JsonJournal::new(journal_path(&config));

    let Some(snapshot) = journal.load().context("Failed to read journal")? else {
        println!("No journal found at {}", journal.path().display());
        return Ok(());
    };

    let win_rate = if snapshot.total_trades > 0 {
        snapshot.winning_trades as f64 / snapshot.total_trades as f64 * 100.0
    } else {
        0.0
    };

    println!("Capital:   ${:.2} (started ${:.2})", snapshot.current_capital, snapshot.initial_capital);
    println!(
        "Return:    {:.2}%",
        (snapshot.current_capital / snapshot.initial_capital - 1.0) * 100.0
    );
    println!("Total PnL: ${:.2}", snapshot.total_pnl);
    println!(
        "Trades:    {} ({} wins / {} losses, {:.1}% win rate)",
        snapshot.total_trades, snapshot.winning_trades, snapshot.losing_trades, win_rate
    );
    println!("Records:   {} closed positions", snapshot.closed_positions.len());
    println!("Updated:   {}", snapshot.last_updated);

    Ok(())
}

fn print_summary(summary: &crate::domain::ledger::PerformanceSummary) {
    println!("Capital:   ${:.2} (started ${:.2})", summary.current_capital, summary.initial_capital);
    println!("Return:    {:.2}%", summary.total_return_pct);
    println!("Total PnL: ${:.2}", summary.total_pnl);
    println!(
        "Trades:    {} ({} wins / {} losses, {:.1}% win rate)",
        summary.total_trades,
        summary.winning_trades,
        summary.losing_trades,
        summary.win_rate * 100.0
    );
    println!("Avg win:   ${:.2}   Avg loss: ${:.2}", summary.avg_win, summary.avg_loss);
    println!("Active:    {} positions", summary.active_positions);
}
