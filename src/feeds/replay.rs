// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Deterministic CSV replay feed.
//!
//! Streams pre-recorded ticks (with indicator columns) through the same
//! channel the live feed uses, so a run against a file is a byte-for-byte
//! deterministic replay of the decision pipeline.
//!
//! Expected columns: `pair,price,rsi,ema_50,macd_line,signal_line,atr`.
//! Indicator columns may be empty on a row; such ticks drive exits only.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::{IndicatorSnapshot, MarketTick};

#[derive(Debug, Deserialize)]
struct ReplayRow {
    pair: String,
    price: f64,
    rsi: Option<f64>,
    ema_50: Option<f64>,
    macd_line: Option<f64>,
    signal_line: Option<f64>,
    atr: Option<f64>,
}

impl ReplayRow {
    fn into_tick(self) -> MarketTick {
        let indicators = match (self.rsi, self.ema_50, self.macd_line, self.signal_line, self.atr)
        {
            (Some(rsi), Some(ema_50), Some(macd_line), Some(signal_line), Some(atr)) => {
                Some(IndicatorSnapshot {
                    rsi,
                    ema_50,
                    macd_line,
                    signal_line,
                    atr,
                })
            }
            _ => None,
        };

        MarketTick {
            pair: self.pair,
            price: self.price,
            indicators,
            timestamp: Utc::now(),
        }
    }
}

/// Spawn the replay. Sends every row in file order, then ends.
pub fn spawn_replay_feed(
    path: PathBuf,
    tick_tx: mpsc::Sender<MarketTick>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match stream_file(&path, &tick_tx).await {
            Ok(count) => info!("📼 Replay complete: {} ticks from {}", count, path.display()),
            Err(e) => error!("Replay failed: {:#}", e),
        }
    })
}

async fn stream_file(path: &Path, tick_tx: &mpsc::Sender<MarketTick>) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open replay file {}", path.display()))?;

    let mut count = 0;
    for result in reader.deserialize::<ReplayRow>() {
        let row = result.with_context(|| format!("parse row {} of replay file", count + 1))?;
        if tick_tx.send(row.into_tick()).await.is_err() {
            anyhow::bail!("tick channel closed mid-replay");
        }
        count += 1;
    }
    Ok(count)
}
