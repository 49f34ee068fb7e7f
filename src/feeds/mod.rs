// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Market data feeds.
//!
//! Every feed streams [`MarketTick`]s into the tick channel; the tick
//! handler drains it sequentially. Indicator values ride on the tick when
//! the source has them (replay files do, the plain price poller does not) -
//! this crate never computes indicators itself.

pub mod coinbase;
pub mod replay;

pub use coinbase::spawn_coinbase_feed;
pub use replay::spawn_replay_feed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indicator values supplied by the upstream indicator source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ema_50: f64,
    pub macd_line: f64,
    pub signal_line: f64,
    pub atr: f64,
}

/// One price observation for one pair.
#[derive(Debug, Clone)]
pub struct MarketTick {
    pub pair: String,
    pub price: f64,
    /// Present when the feed carries indicator data; entries require it,
    /// exit management does not.
    pub indicators: Option<IndicatorSnapshot>,
    pub timestamp: DateTime<Utc>,
}
