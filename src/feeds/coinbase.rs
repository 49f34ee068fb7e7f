// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Coinbase Exchange price poller.
//!
//! Polls the public ticker endpoint per pair on a fixed interval. These
//! ticks carry no indicator data, so they drive exit management only; an
//! indicator-bearing feed (see [`crate::feeds::replay`]) is needed for
//! entries.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::MarketTick;

#[derive(Debug, Deserialize)]
struct Ticker {
    price: String,
}

/// Spawn the polling loop. Stops when the tick channel closes.
pub fn spawn_coinbase_feed(
    base_url: String,
    pairs: Vec<String>,
    interval: Duration,
    tick_tx: mpsc::Sender<MarketTick>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        info!(
            "🔌 Coinbase feed started: {} pairs every {}s",
            pairs.len(),
            interval.as_secs()
        );

        loop {
            for pair in &pairs {
                match fetch_price(&client, &base_url, pair).await {
                    Ok(price) => {
                        let tick = MarketTick {
                            pair: pair.clone(),
                            price,
                            indicators: None,
                            timestamp: Utc::now(),
                        };
                        if tick_tx.send(tick).await.is_err() {
                            info!("🔌 Coinbase feed stopped (channel closed)");
                            return;
                        }
                    }
                    Err(e) => warn!("Failed to fetch ticker for {}: {}", pair, e),
                }
            }
            tokio::time::sleep(interval).await;
        }
    })
}

async fn fetch_price(
    client: &reqwest::Client,
    base_url: &str,
    pair: &str,
) -> anyhow::Result<f64> {
    let url = format!("{}/products/{}/ticker", base_url, pair);
    let response = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, "swing-bot")
        .send()
        .await?
        .error_for_status()?;

    let ticker: Ticker = response.json().await?;
    Ok(ticker.price.parse()?)
}
