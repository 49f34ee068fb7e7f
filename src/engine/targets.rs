// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Volatility-based profit/loss targets.
//!
//! Targets are derived once at entry from the entry price and the ATR
//! supplied by the volatility source, then stored on the position and never
//! recomputed. With ATR 0 all three levels collapse to the entry price;
//! callers treat that as "no actionable range", not an error.

use serde::{Deserialize, Serialize};

/// ATR multiple for the first take-profit tier.
pub const ATR_TP1_MULT: f64 = 2.0;
/// ATR multiple for the second take-profit tier.
pub const ATR_TP2_MULT: f64 = 4.0;
/// ATR multiple for the stop-loss.
pub const ATR_STOP_MULT: f64 = 1.5;

/// Price levels for the tiered exit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub tp1_price: f64,
    pub tp2_price: f64,
    pub stop_loss_price: f64,
}

impl Targets {
    /// Compute targets from an entry price and an ATR value.
    ///
    /// `entry_price` must be positive, `atr` must be non-negative.
    pub fn from_atr(entry_price: f64, atr: f64) -> Self {
        debug_assert!(entry_price > 0.0, "entry price must be positive");
        debug_assert!(atr >= 0.0, "ATR must be non-negative");

        Self {
            tp1_price: entry_price + ATR_TP1_MULT * atr,
            tp2_price: entry_price + ATR_TP2_MULT * atr,
            stop_loss_price: entry_price - ATR_STOP_MULT * atr,
        }
    }

    /// True when ATR was 0 and all levels sit on the entry price.
    pub fn is_degenerate(&self) -> bool {
        self.stop_loss_price >= self.tp1_price
    }
}
