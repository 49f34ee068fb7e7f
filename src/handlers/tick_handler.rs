// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tick handler - the single task that drains the market-tick channel.
//!
//! All portfolio mutation happens here, one tick at a time, so the exit
//! ladder and the admission checks never race. Each tick either manages an
//! open position (exit engine, then executor, then portfolio) or considers
//! a new entry (strategy, then sizing, then executor, then portfolio).
//! The portfolio is only re-synced from confirmed fills.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::{ExitAction, ExitEngine, Targets};
use crate::executor::SimExecutor;
use crate::feeds::MarketTick;
use crate::history::{TradeHistory, TradeRecord};
use crate::portfolio::Portfolio;
use crate::strategies::DipStrategy;

/// Spawn the tick handler task.
pub fn spawn_tick_handler(
    mut tick_rx: mpsc::Receiver<MarketTick>,
    portfolio: Arc<Mutex<Portfolio>>,
    history: Arc<Mutex<TradeHistory>>,
    mut strategy: DipStrategy,
    exit_engine: ExitEngine,
    executor: SimExecutor,
    positions_file: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("📡 Tick handler started");
        let mut current_prices: HashMap<String, f64> = HashMap::new();

        while let Some(tick) = tick_rx.recv().await {
            if let Err(e) = handle_tick(
                &tick,
                &mut current_prices,
                &portfolio,
                &history,
                &mut strategy,
                &exit_engine,
                &executor,
                &positions_file,
            )
            .await
            {
                error!("Tick handling failed for {}: {:#}", tick.pair, e);
            }
        }

        info!("Tick channel closed, handler exiting");
    })
}

#[allow(clippy::too_many_arguments)]
async fn handle_tick(
    tick: &MarketTick,
    current_prices: &mut HashMap<String, f64>,
    portfolio: &Mutex<Portfolio>,
    history: &Mutex<TradeHistory>,
    strategy: &mut DipStrategy,
    exit_engine: &ExitEngine,
    executor: &SimExecutor,
    positions_file: &str,
) -> anyhow::Result<()> {
    current_prices.insert(tick.pair.clone(), tick.price);

    let mut pf = portfolio.lock().await;

    // Manage an open position: exits take priority over new entries. The
    // engine emits at most one action per tick; its tier status only moves
    // in apply_action, so a failed sell is retried on the next tick.
    if let Some(position) = pf.get_mut(&tick.pair) {
        let Some(action) = exit_engine.evaluate(position, tick.price)? else {
            return Ok(());
        };

        let quantity = match &action {
            ExitAction::SellFraction { fraction, .. } => {
                (position.total_quantity * fraction).min(position.remaining_quantity)
            }
            ExitAction::CloseAll { .. } => position.remaining_quantity,
        };

        let fill = executor.market_sell(&tick.pair, quantity, tick.price).await?;
        let applied = pf.apply_action(&tick.pair, &action, fill.price)?;
        history
            .lock()
            .await
            .record(TradeRecord::exit(&tick.pair, &applied));

        pf.save(positions_file)?;
        return Ok(());
    }

    // No position: consider an entry. Price-only ticks carry no signal.
    let Some(indicators) = tick.indicators else {
        return Ok(());
    };

    let Some(decision) = strategy.should_buy(&tick.pair, tick.price, &indicators) else {
        return Ok(());
    };

    // Zero ATR collapses every exit level onto the entry price; a position
    // with no actionable range is never opened.
    if Targets::from_atr(tick.price, indicators.atr).is_degenerate() {
        warn!(
            "❌ REJECT [RANGE]: {} - ATR {:.6} leaves no exit levels",
            tick.pair, indicators.atr
        );
        return Ok(());
    }

    let Some((quantity, _cost)) = pf.position_size(tick.price, Some(indicators.atr), current_prices)
    else {
        return Ok(());
    };

    let fill = executor.market_buy(&tick.pair, quantity, tick.price).await?;
    let targets = Targets::from_atr(fill.price, indicators.atr);
    pf.open_position(&tick.pair, fill.price, fill.quantity, targets)?;
    history
        .lock()
        .await
        .record(TradeRecord::entry(&tick.pair, fill.price, fill.quantity, &decision.reason));

    pf.save(positions_file)?;
    Ok(())
}
