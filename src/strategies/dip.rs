// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! RSI-dip entry strategy.
//!
//! Buys oversold dips in an uptrend. Indicator values (RSI, EMA-50, MACD,
//! ATR) arrive on the tick from whatever computed them upstream - this
//! module only applies the filter chain and the per-pair signal throttle.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::feeds::IndicatorSnapshot;

/// Decision to open a position.
#[derive(Debug, Clone)]
pub struct BuyDecision {
    pub pair: String,
    pub price: f64,
    pub atr: f64,
    pub reason: String,
}

/// Per-pair cooldown between buy signals, against overtrading on
/// consecutive oversold ticks.
#[derive(Debug)]
pub struct SignalThrottle {
    last_signals: HashMap<String, Instant>,
    min_interval: Duration,
}

impl SignalThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_signals: HashMap::new(),
            min_interval,
        }
    }

    pub fn can_signal(&self, pair: &str) -> bool {
        match self.last_signals.get(pair) {
            Some(last) => last.elapsed() >= self.min_interval,
            None => true,
        }
    }

    pub fn record_signal(&mut self, pair: &str) {
        self.last_signals.insert(pair.to_string(), Instant::now());
    }
}

/// Entry filter chain.
pub struct DipStrategy {
    pub rsi_oversold: f64,
    pub rsi_super_oversold: f64,
    pub max_volatility_ratio: f64,
    throttle: SignalThrottle,
}

impl DipStrategy {
    pub fn new(
        rsi_oversold: f64,
        rsi_super_oversold: f64,
        max_volatility_ratio: f64,
        throttle_interval: Duration,
    ) -> Self {
        Self {
            rsi_oversold,
            rsi_super_oversold,
            max_volatility_ratio,
            throttle: SignalThrottle::new(throttle_interval),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rsi_oversold,
            config.rsi_super_oversold,
            config.max_volatility_ratio,
            Duration::from_secs(config.signal_throttle_secs),
        )
    }

    /// Evaluate whether to buy a pair at this tick.
    ///
    /// Returns `Some(BuyDecision)` when every filter passes, `None`
    /// otherwise.
    pub fn should_buy(
        &mut self,
        pair: &str,
        price: f64,
        indicators: &IndicatorSnapshot,
    ) -> Option<BuyDecision> {
        if !self.throttle.can_signal(pair) {
            debug!("⏳ Throttled: {} signalled recently", pair);
            return None;
        }

        // Volatility cap: ATR relative to price.
        let volatility_ratio = indicators.atr / price;
        if volatility_ratio >= self.max_volatility_ratio {
            warn!(
                "❌ REJECT [VOLATILITY]: {} - {:.2}% >= {:.1}% max",
                pair,
                volatility_ratio * 100.0,
                self.max_volatility_ratio * 100.0
            );
            return None;
        }

        // Trend confirmation: only buy dips above the 50 EMA.
        if price <= indicators.ema_50 {
            warn!(
                "❌ REJECT [TREND]: {} - ${:.6} below EMA-50 ${:.6}",
                pair, price, indicators.ema_50
            );
            return None;
        }

        // Oversold condition.
        if indicators.rsi >= self.rsi_oversold {
            debug!(
                "❌ REJECT [RSI]: {} - {:.2} not oversold (< {:.0})",
                pair, indicators.rsi, self.rsi_oversold
            );
            return None;
        }

        // Momentum: bullish MACD, or a super-oversold emergency entry that
        // skips the MACD confirmation.
        let macd_bullish = indicators.macd_line > indicators.signal_line;
        let super_oversold = indicators.rsi < self.rsi_super_oversold;
        if !macd_bullish && !super_oversold {
            warn!(
                "❌ REJECT [MACD]: {} - bearish MACD and RSI {:.2} not super oversold",
                pair, indicators.rsi
            );
            return None;
        }

        let reason = if super_oversold && !macd_bullish {
            format!(
                "emergency oversold entry: RSI {:.2} < {:.0}",
                indicators.rsi, self.rsi_super_oversold
            )
        } else {
            format!(
                "RSI {:.2} oversold, EMA uptrend, MACD bullish",
                indicators.rsi
            )
        };

        info!("🟢 BUY SIGNAL: {} at ${:.6} | {}", pair, price, reason);
        self.throttle.record_signal(pair);

        Some(BuyDecision {
            pair: pair.to_string(),
            price,
            atr: indicators.atr,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(throttle_secs: u64) -> DipStrategy {
        DipStrategy::new(32.0, 25.0, 0.03, Duration::from_secs(throttle_secs))
    }

    fn oversold_uptrend() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 28.0,
            ema_50: 95.0,
            macd_line: 0.5,
            signal_line: 0.2,
            atr: 2.0,
        }
    }

    #[test]
    fn buys_an_oversold_dip_in_an_uptrend() {
        let mut strategy = strategy(0);
        let decision = strategy.should_buy("BTC-USD", 100.0, &oversold_uptrend());
        let decision = decision.expect("all filters pass");
        assert_eq!(decision.pair, "BTC-USD");
        assert!((decision.atr - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_when_rsi_is_not_oversold() {
        let mut strategy = strategy(0);
        let mut ind = oversold_uptrend();
        ind.rsi = 45.0;
        assert!(strategy.should_buy("BTC-USD", 100.0, &ind).is_none());
    }

    #[test]
    fn rejects_below_the_trend_ema() {
        let mut strategy = strategy(0);
        let mut ind = oversold_uptrend();
        ind.ema_50 = 105.0;
        assert!(strategy.should_buy("BTC-USD", 100.0, &ind).is_none());
    }

    #[test]
    fn rejects_excess_volatility() {
        let mut strategy = strategy(0);
        let mut ind = oversold_uptrend();
        ind.atr = 5.0; // 5% of price
        assert!(strategy.should_buy("BTC-USD", 100.0, &ind).is_none());
    }

    #[test]
    fn bearish_macd_needs_a_super_oversold_rsi() {
        let mut strategy = strategy(0);
        let mut ind = oversold_uptrend();
        ind.macd_line = -0.5;
        ind.signal_line = 0.2;

        ind.rsi = 28.0;
        assert!(strategy.should_buy("BTC-USD", 100.0, &ind).is_none());

        ind.rsi = 24.0;
        let decision = strategy.should_buy("BTC-USD", 100.0, &ind).unwrap();
        assert!(decision.reason.contains("emergency"));
    }

    #[test]
    fn throttle_blocks_back_to_back_signals() {
        let mut strategy = strategy(3600);
        assert!(strategy
            .should_buy("BTC-USD", 100.0, &oversold_uptrend())
            .is_some());
        assert!(strategy
            .should_buy("BTC-USD", 100.0, &oversold_uptrend())
            .is_none());
        // Other pairs are unaffected.
        assert!(strategy
            .should_buy("ETH-USD", 100.0, &oversold_uptrend())
            .is_some());
    }
}
