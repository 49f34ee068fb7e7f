// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Swing Bot - tiered-exit swing trading for Coinbase spot pairs.

mod config;
mod engine;
mod error;
mod executor;
mod feeds;
mod handlers;
mod history;
mod portfolio;
mod position;
mod strategies;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Config;
use engine::{ExitConfig, ExitEngine};
use executor::SimExecutor;
use feeds::{spawn_coinbase_feed, spawn_replay_feed, MarketTick};
use handlers::spawn_tick_handler;
use history::TradeHistory;
use portfolio::{Portfolio, PortfolioLimits};
use strategies::DipStrategy;

#[derive(Debug, Parser)]
#[command(name = "swing-bot", about = "Tiered-exit swing trading bot")]
struct Cli {
    /// Comma-separated product pairs to trade.
    #[arg(long, value_delimiter = ',', default_value = "BTC-USD,ETH-USD,SOL-USD")]
    pairs: Vec<String>,

    /// Replay a recorded CSV tick file instead of polling live prices.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Override the live poll interval in seconds.
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Print the portfolio and trade summaries, then exit.
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let limits = PortfolioLimits::from_config(&config);

    if cli.status {
        let portfolio = Portfolio::load(&config.positions_file, config.starting_balance, limits);
        let history = TradeHistory::load(&config.trades_file);
        portfolio.log_summary(&HashMap::new());
        history.log_summary();
        return Ok(());
    }

    info!("🚀 Swing Bot starting...");
    info!("📡 Pairs: {}", cli.pairs.join(", "));
    info!(
        "💰 Balance: ${:.2} start | {} positions max | {:.0}% exposure cap",
        config.starting_balance,
        config.max_positions,
        config.max_exposure * 100.0
    );
    info!(
        "🎯 Exits: {:.0}%/{:.0}% tiers | trailing arms at +{:.0}%, trails {:.0}%",
        config.tier1_fraction * 100.0,
        config.tier2_fraction * 100.0,
        config.trailing_activation_pct * 100.0,
        config.trailing_distance_pct * 100.0
    );

    let portfolio = Arc::new(Mutex::new(Portfolio::load(
        &config.positions_file,
        config.starting_balance,
        limits,
    )));
    let history = Arc::new(Mutex::new(TradeHistory::load(&config.trades_file)));

    let strategy = DipStrategy::from_config(&config);
    let exit_engine = ExitEngine::new(ExitConfig::from_config(&config));
    let sim_executor = SimExecutor::new(config.sell_slippage_pct);

    let (tick_tx, tick_rx) = mpsc::channel::<MarketTick>(100);

    let _feed_handle = match &cli.replay {
        Some(path) => {
            info!("📼 Replay mode: {}", path.display());
            spawn_replay_feed(path.clone(), tick_tx)
        }
        None => {
            let interval = Duration::from_secs(cli.interval_secs.unwrap_or(config.tick_interval_secs));
            spawn_coinbase_feed(
                config.coinbase_api_url.clone(),
                cli.pairs.clone(),
                interval,
                tick_tx,
            )
        }
    };

    let mut handler_handle = spawn_tick_handler(
        tick_rx,
        Arc::clone(&portfolio),
        Arc::clone(&history),
        strategy,
        exit_engine,
        sim_executor,
        config.positions_file.clone(),
    );

    info!("✅ Swing Bot ready!");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Shutdown signal received, saving state...");
        }
        _ = &mut handler_handle => {
            info!("Feed drained, shutting down");
        }
    }

    let portfolio = portfolio.lock().await;
    if let Err(e) = portfolio.save(&config.positions_file) {
        error!("❌ Failed to save positions: {}", e);
    } else {
        info!("✅ Positions saved ({} open)", portfolio.open_count());
    }

    let history = history.lock().await;
    if let Err(e) = history.save() {
        error!("❌ Failed to save trade history: {}", e);
    }

    portfolio.log_summary(&HashMap::new());
    history.log_summary();

    Ok(())
}
