// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Simulated (paper-trading) order executor.
//!
//! Returns confirmed fills the way a live executor would, so the portfolio
//! is only ever re-synced from fill values, never from the requested price.
//! Slippage is configurable and defaults to none.

use tracing::info;

/// A confirmed execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
}

/// Paper executor with symmetric slippage.
pub struct SimExecutor {
    /// Adverse price movement applied to every fill (0.001 = 0.1%).
    slippage_pct: f64,
}

impl SimExecutor {
    pub fn new(slippage_pct: f64) -> Self {
        Self { slippage_pct }
    }

    /// Fill a market buy at the quoted price plus slippage.
    pub async fn market_buy(
        &self,
        pair: &str,
        quantity: f64,
        quoted_price: f64,
    ) -> anyhow::Result<Fill> {
        let price = quoted_price * (1.0 + self.slippage_pct);
        info!(
            "[SIMULATION] BUY {} | {:.6} units at ${:.6}",
            pair, quantity, price
        );
        Ok(Fill { price, quantity })
    }

    /// Fill a market sell at the quoted price minus slippage.
    pub async fn market_sell(
        &self,
        pair: &str,
        quantity: f64,
        quoted_price: f64,
    ) -> anyhow::Result<Fill> {
        let price = quoted_price * (1.0 - self.slippage_pct);
        info!(
            "[SIMULATION] SELL {} | {:.6} units at ${:.6}",
            pair, quantity, price
        );
        Ok(Fill { price, quantity })
    }
}
