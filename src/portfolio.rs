// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Portfolio manager: owns the open-position map and the cash ledger,
//! gates new entries, and applies confirmed fills.
//!
//! All mutation goes through one `Arc<Mutex<Portfolio>>` held by the tick
//! handler - ticks for different pairs share the cash and exposure state and
//! must be serialized.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::targets::ATR_STOP_MULT;
use crate::engine::{ExitAction, ExitTrigger, Targets};
use crate::error::{Error, Result};
use crate::position::Position;

/// Admission-control limits, all relative to current equity unless noted.
#[derive(Debug, Clone)]
pub struct PortfolioLimits {
    pub max_positions: usize,
    pub max_exposure: f64,
    pub cash_buffer: f64,
    pub max_per_trade: f64,
    /// Absolute USD floor per trade.
    pub min_trade_size: f64,
    pub risk_per_trade: f64,
}

impl PortfolioLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_positions: config.max_positions,
            max_exposure: config.max_exposure,
            cash_buffer: config.cash_buffer,
            max_per_trade: config.max_per_trade,
            min_trade_size: config.min_trade_size,
            risk_per_trade: config.risk_per_trade,
        }
    }
}

/// Result of applying an exit fill, used for history and logging.
#[derive(Debug, Clone)]
pub struct AppliedExit {
    pub trigger: ExitTrigger,
    pub quantity: f64,
    pub fill_price: f64,
    pub entry_price: f64,
    pub proceeds: f64,
    pub pnl_usd: f64,
    pub pnl_percent: f64,
    /// True when the position fully closed and left the open set.
    pub closed: bool,
}

/// On-disk shape, separate from the in-memory manager so limits stay
/// config-driven across restarts.
#[derive(Debug, Serialize, Deserialize)]
struct PortfolioSnapshot {
    cash_balance: f64,
    starting_balance: f64,
    realized_pnl: f64,
    positions: HashMap<String, Position>,
}

/// Open positions plus the cash ledger.
#[derive(Debug)]
pub struct Portfolio {
    positions: HashMap<String, Position>,
    pub cash_balance: f64,
    pub starting_balance: f64,
    pub realized_pnl: f64,
    limits: PortfolioLimits,
}

impl Portfolio {
    pub fn new(starting_balance: f64, limits: PortfolioLimits) -> Self {
        Self {
            positions: HashMap::new(),
            cash_balance: starting_balance,
            starting_balance,
            realized_pnl: 0.0,
            limits,
        }
    }

    /// Load from file, or start fresh when no file exists.
    pub fn load<P: AsRef<Path>>(path: P, starting_balance: f64, limits: PortfolioLimits) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No portfolio file found, starting fresh");
            return Self::new(starting_balance, limits);
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<PortfolioSnapshot>(&content) {
                Ok(snapshot) => {
                    info!(
                        "Loaded portfolio: {} positions, ${:.2} cash",
                        snapshot.positions.len(),
                        snapshot.cash_balance
                    );
                    Self {
                        positions: snapshot.positions,
                        cash_balance: snapshot.cash_balance,
                        starting_balance: snapshot.starting_balance,
                        realized_pnl: snapshot.realized_pnl,
                        limits,
                    }
                }
                Err(e) => {
                    warn!("Failed to parse portfolio file: {}", e);
                    Self::new(starting_balance, limits)
                }
            },
            Err(e) => {
                warn!("Failed to read portfolio file: {}", e);
                Self::new(starting_balance, limits)
            }
        }
    }

    /// Save to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let snapshot = PortfolioSnapshot {
            cash_balance: self.cash_balance,
            starting_balance: self.starting_balance,
            realized_pnl: self.realized_pnl,
            positions: self.positions.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, pair: &str) -> Option<&Position> {
        self.positions.get(pair)
    }

    pub fn get_mut(&mut self, pair: &str) -> Option<&mut Position> {
        self.positions.get_mut(pair)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Market value of all open positions. Pairs without a known price are
    /// valued at entry.
    pub fn position_value(&self, current_prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = current_prices
                    .get(&pos.pair)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.value(price)
            })
            .sum()
    }

    /// Cash + open position value. Pure, no mutation.
    pub fn portfolio_value(&self, current_prices: &HashMap<String, f64>) -> f64 {
        self.cash_balance + self.position_value(current_prices)
    }

    /// Admission control for a candidate entry of the given USD cost.
    /// Declines are policy, not errors; every refusal is logged.
    pub fn can_open_position(
        &self,
        candidate_cost: f64,
        current_prices: &HashMap<String, f64>,
    ) -> bool {
        if self.positions.len() >= self.limits.max_positions {
            warn!(
                "❌ REJECT [POSITIONS]: {} open >= max {}",
                self.positions.len(),
                self.limits.max_positions
            );
            return false;
        }

        let equity = self.portfolio_value(current_prices);
        if equity <= 0.0 {
            warn!("❌ REJECT [EQUITY]: portfolio has no equity");
            return false;
        }

        if candidate_cost < self.limits.min_trade_size {
            warn!(
                "❌ REJECT [MIN SIZE]: ${:.2} < ${:.2}",
                candidate_cost, self.limits.min_trade_size
            );
            return false;
        }

        let per_trade_cap = self.limits.max_per_trade * equity;
        if candidate_cost > per_trade_cap {
            warn!(
                "❌ REJECT [TRADE CAP]: ${:.2} > ${:.2} ({:.0}% of equity)",
                candidate_cost,
                per_trade_cap,
                self.limits.max_per_trade * 100.0
            );
            return false;
        }

        let exposure = self.position_value(current_prices);
        if (exposure + candidate_cost) / equity > self.limits.max_exposure {
            warn!(
                "❌ REJECT [EXPOSURE]: ${:.2} + ${:.2} > {:.0}% of ${:.2}",
                exposure,
                candidate_cost,
                self.limits.max_exposure * 100.0,
                equity
            );
            return false;
        }

        if self.cash_balance - candidate_cost < self.limits.cash_buffer * equity {
            warn!(
                "❌ REJECT [CASH BUFFER]: ${:.2} cash after trade < {:.0}% of ${:.2}",
                self.cash_balance - candidate_cost,
                self.limits.cash_buffer * 100.0,
                equity
            );
            return false;
        }

        true
    }

    /// Size a candidate entry: the largest cost the limits admit, optionally
    /// tightened by ATR risk sizing (risk 2% of equity against a 1.5-ATR
    /// stop). Returns `(quantity, cost)` or `None` when no admissible size
    /// exists.
    pub fn position_size(
        &self,
        price: f64,
        atr: Option<f64>,
        current_prices: &HashMap<String, f64>,
    ) -> Option<(f64, f64)> {
        let equity = self.portfolio_value(current_prices);
        let exposure = self.position_value(current_prices);

        let available_exposure = self.limits.max_exposure * equity - exposure;
        let mut cost = available_exposure.min(self.limits.max_per_trade * equity);

        // Never dip into the cash buffer.
        cost = cost
            .min(self.cash_balance)
            .min(self.cash_balance - self.limits.cash_buffer * equity);

        if let Some(atr) = atr.filter(|a| *a > 0.0) {
            let stop_loss_pct = ATR_STOP_MULT * atr / price;
            let risk_usd = equity * self.limits.risk_per_trade;
            cost = cost.min(risk_usd / stop_loss_pct);
        }

        if !self.can_open_position(cost, current_prices) {
            return None;
        }

        Some((cost / price, cost))
    }

    /// Open a position from a confirmed buy fill. Debits cash.
    pub fn open_position(
        &mut self,
        pair: &str,
        fill_price: f64,
        quantity: f64,
        targets: Targets,
    ) -> Result<()> {
        if self.positions.contains_key(pair) {
            return Err(Error::InvalidState(format!(
                "{}: position already open",
                pair
            )));
        }

        let cost = fill_price * quantity;
        if cost > self.cash_balance {
            return Err(Error::InvalidState(format!(
                "{}: insufficient cash (need ${:.2}, have ${:.2})",
                pair, cost, self.cash_balance
            )));
        }

        self.cash_balance -= cost;
        let position = Position::open(pair, fill_price, quantity, targets);
        info!(
            "🟢 OPENED: {} | entry ${:.6} | qty {:.6} | value ${:.2} | cash ${:.2} | positions {}/{}",
            pair,
            fill_price,
            quantity,
            cost,
            self.cash_balance,
            self.positions.len() + 1,
            self.limits.max_positions
        );
        self.positions.insert(pair.to_string(), position);
        Ok(())
    }

    /// Apply a confirmed exit fill: advance the tier status, reduce the
    /// position, credit the cash, accrue realized P&L, and drop the position
    /// once empty.
    ///
    /// Tier transitions happen here and nowhere else - a decision with no
    /// fill leaves the status untouched, and applying the same tier twice is
    /// `InvalidState`. Fraction sells are computed against the ORIGINAL size
    /// and clamped to the remaining quantity so rounding can never oversell.
    pub fn apply_action(
        &mut self,
        pair: &str,
        action: &ExitAction,
        fill_price: f64,
    ) -> Result<AppliedExit> {
        let position = self
            .positions
            .get_mut(pair)
            .ok_or_else(|| Error::UnknownAsset(pair.to_string()))?;

        if let ExitAction::SellFraction { trigger, .. } = action {
            match trigger {
                ExitTrigger::Tier1 => position.mark_tier_sold(1)?,
                ExitTrigger::Tier2 => position.mark_tier_sold(2)?,
                _ => {}
            }
        }

        let quantity = match action {
            ExitAction::SellFraction { fraction, .. } => {
                (position.total_quantity * fraction).min(position.remaining_quantity)
            }
            ExitAction::CloseAll { .. } => position.remaining_quantity,
        };

        position.reduce_quantity(quantity)?;

        let entry_price = position.entry_price;
        let proceeds = fill_price * quantity;
        let pnl_usd = (fill_price - entry_price) * quantity;
        let pnl_percent = (fill_price - entry_price) / entry_price * 100.0;
        let closed = position.is_closed();

        self.cash_balance += proceeds;
        self.realized_pnl += pnl_usd;

        let applied = AppliedExit {
            trigger: action.trigger(),
            quantity,
            fill_price,
            entry_price,
            proceeds,
            pnl_usd,
            pnl_percent,
            closed,
        };

        if closed {
            self.positions.remove(pair);
            info!(
                "🔴 CLOSED: {} [{}] | exit ${:.6} | PnL ${:.2} ({:+.2}%) | cash ${:.2}",
                pair,
                applied.trigger.as_str(),
                fill_price,
                pnl_usd,
                pnl_percent,
                self.cash_balance
            );
        } else {
            info!(
                "🎯 PARTIAL: {} [{}] | sold {:.6} at ${:.6} | PnL ${:.2} | cash ${:.2}",
                pair,
                applied.trigger.as_str(),
                quantity,
                fill_price,
                pnl_usd,
                self.cash_balance
            );
        }

        Ok(applied)
    }

    /// Log a portfolio report banner.
    pub fn log_summary(&self, current_prices: &HashMap<String, f64>) {
        let equity = self.portfolio_value(current_prices);
        let position_value = self.position_value(current_prices);
        let exposure_pct = if equity > 0.0 {
            position_value / equity * 100.0
        } else {
            0.0
        };
        let total_return = (equity - self.starting_balance) / self.starting_balance * 100.0;

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 Portfolio Summary:");
        info!("   Starting balance: ${:.2}", self.starting_balance);
        info!("   Cash: ${:.2}", self.cash_balance);
        info!(
            "   Position value: ${:.2} ({:.1}% exposure, max {:.0}%)",
            position_value,
            exposure_pct,
            self.limits.max_exposure * 100.0
        );
        info!("   Equity: ${:.2} ({:+.2}%)", equity, total_return);
        info!("   Realized PnL: ${:.2}", self.realized_pnl);
        info!(
            "   Open positions: {}/{}",
            self.positions.len(),
            self.limits.max_positions
        );

        for pos in self.positions.values() {
            let price = current_prices
                .get(&pos.pair)
                .copied()
                .unwrap_or(pos.entry_price);
            info!(
                "   {} | entry ${:.6} | remaining {:.6} | value ${:.2} | unrealized ${:.2} | {:?}",
                pos.pair,
                pos.entry_price,
                pos.remaining_quantity,
                pos.value(price),
                pos.unrealized_pnl(price),
                pos.status
            );
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PortfolioLimits {
        PortfolioLimits {
            max_positions: 4,
            max_exposure: 0.75,
            cash_buffer: 0.25,
            max_per_trade: 0.25,
            min_trade_size: 50.0,
            risk_per_trade: 0.02,
        }
    }

    fn no_prices() -> HashMap<String, f64> {
        HashMap::new()
    }

    #[test]
    fn rejects_fifth_position_regardless_of_cost() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        for (i, pair) in ["BTC-USD", "ETH-USD", "SOL-USD", "ADA-USD"].iter().enumerate() {
            portfolio
                .open_position(pair, 10.0 + i as f64, 10.0, Targets::from_atr(10.0, 0.5))
                .unwrap();
        }
        assert_eq!(portfolio.open_count(), 4);
        assert!(!portfolio.can_open_position(60.0, &no_prices()));
    }

    #[test]
    fn rejects_cost_above_per_trade_cap() {
        let portfolio = Portfolio::new(1000.0, limits());
        // $260 > 25% of $1000.
        assert!(!portfolio.can_open_position(260.0, &no_prices()));
        assert!(portfolio.can_open_position(250.0, &no_prices()));
    }

    #[test]
    fn rejects_below_min_trade_size() {
        let portfolio = Portfolio::new(1000.0, limits());
        assert!(!portfolio.can_open_position(49.99, &no_prices()));
        assert!(portfolio.can_open_position(50.0, &no_prices()));
    }

    #[test]
    fn rejects_when_exposure_limit_would_be_breached() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        for pair in ["BTC-USD", "ETH-USD", "SOL-USD"] {
            portfolio
                .open_position(pair, 100.0, 2.0, Targets::from_atr(100.0, 2.0))
                .unwrap();
        }
        // 600 held, equity 1000: 150 lands exactly on 75% exposure, 160
        // passes it while staying under the per-trade cap.
        assert!(portfolio.can_open_position(150.0, &no_prices()));
        assert!(!portfolio.can_open_position(160.0, &no_prices()));
    }

    #[test]
    fn position_size_respects_cash_buffer() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("BTC-USD", 100.0, 5.0, Targets::from_atr(100.0, 2.0))
            .unwrap();
        // Cash 500, equity 1000, buffer 250: at most 250 may be spent.
        let (qty, cost) = portfolio.position_size(10.0, None, &no_prices()).unwrap();
        assert!(cost <= 250.0 + 1e-9);
        assert!((qty - cost / 10.0).abs() < 1e-12);
    }

    #[test]
    fn atr_risk_sizing_tightens_the_trade() {
        let portfolio = Portfolio::new(1000.0, limits());
        // stop pct = 1.5 * 2 / 100 = 3%; risk $20 => $666 cap, so the
        // per-trade cap of $250 still binds.
        let (_, cost) = portfolio
            .position_size(100.0, Some(2.0), &no_prices())
            .unwrap();
        assert!((cost - 250.0).abs() < 1e-9);

        // A violent ATR shrinks the size below the cap.
        // stop pct = 1.5 * 10 / 100 = 15%; risk $20 => $133.33 cap.
        let (_, cost) = portfolio
            .position_size(100.0, Some(10.0), &no_prices())
            .unwrap();
        assert!((cost - 20.0 / 0.15).abs() < 1e-9);

        // Extreme ATR pushes the size under the $50 minimum: declined.
        assert!(portfolio.position_size(100.0, Some(30.0), &no_prices()).is_none());
    }

    #[test]
    fn open_twice_is_invalid_state() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("BTC-USD", 100.0, 1.0, Targets::from_atr(100.0, 2.0))
            .unwrap();
        let err = portfolio
            .open_position("BTC-USD", 101.0, 1.0, Targets::from_atr(101.0, 2.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn apply_action_on_unknown_pair_fails() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        let err = portfolio
            .apply_action(
                "DOGE-USD",
                &ExitAction::CloseAll {
                    trigger: ExitTrigger::StopLoss,
                },
                0.1,
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAsset(_)));
    }

    #[test]
    fn tiered_exits_keep_the_ledger_consistent() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("ETH-USD", 100.0, 2.0, Targets::from_atr(100.0, 2.0))
            .unwrap();
        assert!((portfolio.cash_balance - 800.0).abs() < 1e-9);

        let tier1 = portfolio
            .apply_action(
                "ETH-USD",
                &ExitAction::SellFraction {
                    fraction: 0.30,
                    trigger: ExitTrigger::Tier1,
                },
                104.0,
            )
            .unwrap();
        assert!((tier1.quantity - 0.6).abs() < 1e-9);
        assert!((tier1.pnl_usd - 2.4).abs() < 1e-9);
        assert!(!tier1.closed);

        let close = portfolio
            .apply_action(
                "ETH-USD",
                &ExitAction::CloseAll {
                    trigger: ExitTrigger::TrailingStop,
                },
                116.0,
            )
            .unwrap();
        assert!((close.quantity - 1.4).abs() < 1e-9);
        assert!(close.closed);
        assert!(portfolio.get("ETH-USD").is_none());

        // cash = 800 + 0.6*104 + 1.4*116 = 1024.8
        assert!((portfolio.cash_balance - 1024.8).abs() < 1e-9);
        assert!((portfolio.realized_pnl - 24.8).abs() < 1e-9);
        // No open positions: equity == cash.
        assert!((portfolio.portfolio_value(&no_prices()) - portfolio.cash_balance).abs() < 1e-9);
    }

    #[test]
    fn tier_status_advances_only_on_fill_application() {
        use crate::position::PositionStatus;

        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("ETH-USD", 100.0, 2.0, Targets::from_atr(100.0, 2.0))
            .unwrap();
        assert_eq!(portfolio.get("ETH-USD").unwrap().status, PositionStatus::Opened);

        let tier1 = ExitAction::SellFraction {
            fraction: 0.30,
            trigger: ExitTrigger::Tier1,
        };
        portfolio.apply_action("ETH-USD", &tier1, 104.0).unwrap();
        assert_eq!(
            portfolio.get("ETH-USD").unwrap().status,
            PositionStatus::Tier1Partial
        );

        // Re-applying the same tier is an illegal transition, and the
        // quantity is untouched by the failed attempt.
        let err = portfolio.apply_action("ETH-USD", &tier1, 104.0).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!((portfolio.get("ETH-USD").unwrap().remaining_quantity - 1.4).abs() < 1e-9);
    }

    #[test]
    fn fraction_sell_clamps_to_remaining() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("ETH-USD", 100.0, 1.0, Targets::from_atr(100.0, 2.0))
            .unwrap();
        // Leave less than a full tier behind.
        portfolio
            .apply_action(
                "ETH-USD",
                &ExitAction::SellFraction {
                    fraction: 0.80,
                    trigger: ExitTrigger::Tier1,
                },
                104.0,
            )
            .unwrap();
        let tier2 = portfolio
            .apply_action(
                "ETH-USD",
                &ExitAction::SellFraction {
                    fraction: 0.30,
                    trigger: ExitTrigger::Tier2,
                },
                108.0,
            )
            .unwrap();
        assert!((tier2.quantity - 0.2).abs() < 1e-9, "clamped to remaining");
        assert!(tier2.closed);
    }

    #[test]
    fn valuation_uses_current_prices_with_entry_fallback() {
        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("BTC-USD", 100.0, 2.0, Targets::from_atr(100.0, 2.0))
            .unwrap();
        portfolio
            .open_position("ETH-USD", 50.0, 4.0, Targets::from_atr(50.0, 1.0))
            .unwrap();

        let mut prices = HashMap::new();
        prices.insert("BTC-USD".to_string(), 110.0);
        // ETH has no fresh price: valued at entry (200).
        assert!((portfolio.position_value(&prices) - 420.0).abs() < 1e-9);
        assert!((portfolio.portfolio_value(&prices) - 1020.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");

        let mut portfolio = Portfolio::new(1000.0, limits());
        portfolio
            .open_position("BTC-USD", 100.0, 1.5, Targets::from_atr(100.0, 2.0))
            .unwrap();
        portfolio.save(&path).unwrap();

        let loaded = Portfolio::load(&path, 9999.0, limits());
        assert_eq!(loaded.open_count(), 1);
        assert!((loaded.cash_balance - 850.0).abs() < 1e-9);
        // Starting balance comes from the snapshot, not the config default.
        assert!((loaded.starting_balance - 1000.0).abs() < 1e-9);
        let pos = loaded.get("BTC-USD").unwrap();
        assert!((pos.targets.tp1_price - 104.0).abs() < 1e-9);
    }
}
