// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade history tracking and profit logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::portfolio::AppliedExit;

/// A record of a single fill (entry or one leg of the exit ladder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub pair: String,
    pub kind: TradeKind,
    pub entry_price: f64,
    /// None for entries.
    pub exit_price: Option<f64>,
    pub quantity: f64,
    pub pnl_usd: f64,
    pub pnl_percent: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeKind {
    Entry,
    Tier1Exit,
    Tier2Exit,
    FullExit,
}

impl TradeRecord {
    pub fn entry(pair: &str, fill_price: f64, quantity: f64, reason: &str) -> Self {
        Self {
            pair: pair.to_string(),
            kind: TradeKind::Entry,
            entry_price: fill_price,
            exit_price: None,
            quantity,
            pnl_usd: 0.0,
            pnl_percent: 0.0,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn exit(pair: &str, applied: &AppliedExit) -> Self {
        use crate::engine::ExitTrigger;
        let kind = match applied.trigger {
            ExitTrigger::Tier1 => TradeKind::Tier1Exit,
            ExitTrigger::Tier2 => TradeKind::Tier2Exit,
            ExitTrigger::StopLoss | ExitTrigger::TrailingStop => TradeKind::FullExit,
        };
        Self {
            pair: pair.to_string(),
            kind,
            entry_price: applied.entry_price,
            exit_price: Some(applied.fill_price),
            quantity: applied.quantity,
            pnl_usd: applied.pnl_usd,
            pnl_percent: applied.pnl_percent,
            reason: applied.trigger.as_str().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Trade history tracker with persistence.
#[derive(Debug)]
pub struct TradeHistory {
    trades: Vec<TradeRecord>,
    path: PathBuf,
}

impl TradeHistory {
    /// Load trade history from file or create new.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let trades = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Failed to parse trade history: {}", e);
                Vec::new()
            }),
            Err(_) => {
                info!("No trade history file found, starting fresh");
                Vec::new()
            }
        };

        info!("📊 Loaded {} historical trades", trades.len());
        Self { trades, path }
    }

    /// Save trade history to file.
    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.trades)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Record a new fill.
    pub fn record(&mut self, trade: TradeRecord) {
        info!(
            "📝 Recording {:?}: {} {:.6} units | PnL ${:.2}",
            trade.kind, trade.pair, trade.quantity, trade.pnl_usd
        );
        self.trades.push(trade);

        if let Err(e) = self.save() {
            warn!("Failed to save trade history: {}", e);
        }
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Get profit/loss summary over all exits.
    pub fn get_summary(&self) -> TradeSummary {
        let mut summary = TradeSummary::default();

        for trade in &self.trades {
            match trade.kind {
                TradeKind::Entry => summary.entries += 1,
                _ => {
                    summary.exits += 1;
                    summary.realized_pnl += trade.pnl_usd;
                    if trade.pnl_usd > 0.0 {
                        summary.winning_exits += 1;
                    }
                }
            }
        }
        summary
    }

    /// Log summary on startup/shutdown.
    pub fn log_summary(&self) {
        let summary = self.get_summary();
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 Trade History Summary:");
        info!("   Entries: {}", summary.entries);
        info!(
            "   Exits: {} ({} winning, {:.1}% win rate)",
            summary.exits,
            summary.winning_exits,
            summary.win_rate() * 100.0
        );
        info!("   Realized PnL: ${:.2}", summary.realized_pnl);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

#[derive(Debug, Default)]
pub struct TradeSummary {
    pub entries: usize,
    pub exits: usize,
    pub winning_exits: usize,
    pub realized_pnl: f64,
}

impl TradeSummary {
    pub fn win_rate(&self) -> f64 {
        if self.exits == 0 {
            0.0
        } else {
            self.winning_exits as f64 / self.exits as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExitTrigger;

    fn applied(trigger: ExitTrigger, pnl: f64, closed: bool) -> AppliedExit {
        AppliedExit {
            trigger,
            quantity: 1.0,
            fill_price: 100.0 + pnl,
            entry_price: 100.0,
            proceeds: 100.0 + pnl,
            pnl_usd: pnl,
            pnl_percent: pnl,
            closed,
        }
    }

    #[test]
    fn summary_counts_wins_and_pnl() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TradeHistory::load(dir.path().join("trades.json"));

        history.record(TradeRecord::entry("BTC-USD", 100.0, 1.0, "dip entry"));
        history.record(TradeRecord::exit(
            "BTC-USD",
            &applied(ExitTrigger::Tier1, 4.0, false),
        ));
        history.record(TradeRecord::exit(
            "BTC-USD",
            &applied(ExitTrigger::StopLoss, -3.0, true),
        ));

        let summary = history.get_summary();
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.exits, 2);
        assert_eq!(summary.winning_exits, 1);
        assert!((summary.realized_pnl - 1.0).abs() < 1e-12);
        assert!((summary.win_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn history_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.json");

        let mut history = TradeHistory::load(&path);
        history.record(TradeRecord::entry("ETH-USD", 50.0, 2.0, "dip entry"));
        history.record(TradeRecord::exit(
            "ETH-USD",
            &applied(ExitTrigger::TrailingStop, 10.0, true),
        ));

        let reloaded = TradeHistory::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get_summary().exits, 1);
    }
}
