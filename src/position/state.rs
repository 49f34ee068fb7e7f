// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-pair position state for the tiered exit system.
//!
//! A position walks one ordered ladder of states; every transition is
//! one-shot and the quantity only ever shrinks. The historical version of
//! this tracked three independent booleans (`tier_1_sold`, `tier_2_sold`,
//! `trailing_stop_active`) which allowed nonsense combinations - the status
//! enum makes those unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Targets;
use crate::error::{Error, Result};

/// Remaining quantity at or below this is treated as fully closed
/// (float residue from the final partial fill).
pub const DUST_QTY: f64 = 1e-9;

/// Lifecycle status, strictly ordered. Tier 2 cannot be sold before tier 1,
/// trailing cannot activate before tier 2, and `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionStatus {
    Opened,
    Tier1Partial,
    Tier2Partial,
    TrailingActive,
    Closed,
}

/// One open position (at most one per pair).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub pair: String,
    pub entry_price: f64,
    pub total_quantity: f64,
    pub remaining_quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub highest_price: f64,
    pub status: PositionStatus,
    /// Only meaningful while `status == TrailingActive`; ratchets upward.
    pub trailing_stop_price: Option<f64>,
    /// Fixed at open from entry price and ATR.
    pub targets: Targets,
}

impl Position {
    /// Open a new position. Entry price and total quantity are immutable
    /// from here on.
    pub fn open(pair: &str, entry_price: f64, total_quantity: f64, targets: Targets) -> Self {
        Self {
            pair: pair.to_string(),
            entry_price,
            total_quantity,
            remaining_quantity: total_quantity,
            entry_time: Utc::now(),
            highest_price: entry_price,
            status: PositionStatus::Opened,
            trailing_stop_price: None,
            targets,
        }
    }

    pub fn tier_1_sold(&self) -> bool {
        self.status >= PositionStatus::Tier1Partial
    }

    pub fn tier_2_sold(&self) -> bool {
        self.status >= PositionStatus::Tier2Partial
    }

    pub fn trailing_active(&self) -> bool {
        self.status >= PositionStatus::TrailingActive && self.status != PositionStatus::Closed
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    /// Track a new observed price: highest price is monotonically
    /// non-decreasing, and an active trailing stop ratchets up to
    /// `highest * (1 - trailing_distance)` but never down.
    pub fn record_price(&mut self, current_price: f64, trailing_distance: f64) {
        if current_price > self.highest_price {
            self.highest_price = current_price;
        }

        if self.trailing_active() {
            let candidate = self.highest_price * (1.0 - trailing_distance);
            match self.trailing_stop_price {
                Some(stop) if candidate <= stop => {}
                _ => self.trailing_stop_price = Some(candidate),
            }
        }
    }

    /// Mark a tier as sold. Tier 1 is only valid from `Opened`, tier 2 only
    /// from `Tier1Partial`; anything else is an illegal transition.
    pub fn mark_tier_sold(&mut self, tier: u8) -> Result<()> {
        match (tier, self.status) {
            (1, PositionStatus::Opened) => {
                self.status = PositionStatus::Tier1Partial;
                Ok(())
            }
            (2, PositionStatus::Tier1Partial) => {
                self.status = PositionStatus::Tier2Partial;
                Ok(())
            }
            (tier @ (1 | 2), status) => Err(Error::InvalidState(format!(
                "{}: cannot mark tier {} sold from {:?}",
                self.pair, tier, status
            ))),
            (tier, _) => Err(Error::InvalidState(format!(
                "{}: no such tier {}",
                self.pair, tier
            ))),
        }
    }

    /// Activate the trailing stop. Requires both tiers sold and no prior
    /// activation.
    pub fn activate_trailing(&mut self, initial_stop_price: f64) -> Result<()> {
        if self.status != PositionStatus::Tier2Partial {
            return Err(Error::InvalidState(format!(
                "{}: cannot activate trailing stop from {:?}",
                self.pair, self.status
            )));
        }
        self.status = PositionStatus::TrailingActive;
        self.trailing_stop_price = Some(initial_stop_price);
        Ok(())
    }

    /// Reduce the remaining quantity by a filled sell amount. Underflow is an
    /// illegal transition; dust below [`DUST_QTY`] is absorbed and the
    /// position moves to `Closed`.
    pub fn reduce_quantity(&mut self, amount: f64) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState(format!(
                "{}: position already closed",
                self.pair
            )));
        }
        if amount < 0.0 || amount > self.remaining_quantity + DUST_QTY {
            return Err(Error::InvalidState(format!(
                "{}: cannot reduce quantity by {} (remaining {})",
                self.pair, amount, self.remaining_quantity
            )));
        }

        self.remaining_quantity = (self.remaining_quantity - amount).max(0.0);
        if self.remaining_quantity <= DUST_QTY {
            self.remaining_quantity = 0.0;
            self.status = PositionStatus::Closed;
        }
        Ok(())
    }

    /// Market value of the remaining quantity at the given price.
    pub fn value(&self, current_price: f64) -> f64 {
        self.remaining_quantity * current_price
    }

    /// Unrealized P&L of the remaining quantity at the given price.
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) * self.remaining_quantity
    }
}
