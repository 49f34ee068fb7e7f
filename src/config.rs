// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration module - loads settings from environment variables.

/// Main configuration for the swing bot.
#[derive(Debug, Clone)]
pub struct Config {
    // Portfolio
    pub starting_balance: f64,
    pub max_positions: usize,
    pub max_exposure: f64,
    pub cash_buffer: f64,
    pub max_per_trade: f64,
    pub min_trade_size: f64,
    pub risk_per_trade: f64,

    // Tiered exits
    pub tier1_fraction: f64,
    pub tier2_fraction: f64,

    // Trailing stop
    pub trailing_activation_pct: f64,
    pub trailing_distance_pct: f64,

    // Entry strategy
    pub rsi_oversold: f64,
    pub rsi_super_oversold: f64,
    pub max_volatility_ratio: f64,
    pub signal_throttle_secs: u64,

    // Execution
    pub sell_slippage_pct: f64,

    // Feed
    pub coinbase_api_url: String,
    pub tick_interval_secs: u64,

    // Persistence
    pub positions_file: String,
    pub trades_file: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Portfolio
            starting_balance: env_var_or("STARTING_BALANCE_USD", "1000.0")
                .parse()
                .unwrap_or(1000.0),
            max_positions: env_var_or("MAX_POSITIONS", "4").parse().unwrap_or(4),
            max_exposure: env_var_or("MAX_EXPOSURE", "0.75").parse().unwrap_or(0.75),
            cash_buffer: env_var_or("CASH_BUFFER", "0.25").parse().unwrap_or(0.25),
            max_per_trade: env_var_or("MAX_PER_TRADE", "0.25").parse().unwrap_or(0.25),
            min_trade_size: env_var_or("MIN_TRADE_SIZE_USD", "50.0")
                .parse()
                .unwrap_or(50.0),
            risk_per_trade: env_var_or("RISK_PER_TRADE", "0.02").parse().unwrap_or(0.02),

            // Tiered exits
            tier1_fraction: env_var_or("TIER_1_EXIT_FRACTION", "0.30")
                .parse()
                .unwrap_or(0.30),
            tier2_fraction: env_var_or("TIER_2_EXIT_FRACTION", "0.30")
                .parse()
                .unwrap_or(0.30),

            // Trailing stop
            trailing_activation_pct: env_var_or("TRAILING_STOP_ACTIVATION_PCT", "0.15")
                .parse()
                .unwrap_or(0.15),
            trailing_distance_pct: env_var_or("TRAILING_STOP_DISTANCE_PCT", "0.03")
                .parse()
                .unwrap_or(0.03),

            // Entry strategy
            rsi_oversold: env_var_or("RSI_OVERSOLD_THRESHOLD", "32.0")
                .parse()
                .unwrap_or(32.0),
            rsi_super_oversold: env_var_or("RSI_SUPER_OVERSOLD_THRESHOLD", "25.0")
                .parse()
                .unwrap_or(25.0),
            max_volatility_ratio: env_var_or("MAX_VOLATILITY_RATIO", "0.03")
                .parse()
                .unwrap_or(0.03),
            signal_throttle_secs: env_var_or("SIGNAL_THROTTLE_SECS", "900")
                .parse()
                .unwrap_or(900),

            // Execution
            sell_slippage_pct: env_var_or("SELL_SLIPPAGE_PCT", "0.0").parse().unwrap_or(0.0),

            // Feed
            coinbase_api_url: env_var_or(
                "COINBASE_API_URL",
                "https://api.exchange.coinbase.com",
            ),
            tick_interval_secs: env_var_or("TICK_INTERVAL_SECS", "60").parse().unwrap_or(60),

            // Persistence
            positions_file: env_var_or("POSITIONS_FILE", "positions.json"),
            trades_file: env_var_or("TRADES_FILE", "trades.json"),
        })
    }
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
