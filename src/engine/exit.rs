// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exit decision engine.
//!
//! One pass per price tick: the engine reads the position state and emits
//! at most ONE exit action. Quantities, cash and the tier status are NOT
//! touched here - the caller executes the action, gets a confirmed fill,
//! and applies it through the portfolio, which is where the one-shot tier
//! transitions happen. An unexecuted decision therefore re-fires on the
//! next tick; an applied one never fires again.
//!
//! Rule precedence is fixed:
//!
//! 1. stop-loss (terminal, regardless of tier state)
//! 2. tier 1 partial sell at tp1
//! 3. tier 2 partial sell at tp2
//! 4. trailing-stop activation (requires tier 2 sold, +15% over entry;
//!    state only, no order)
//! 5. trailing-stop exit (terminal)
//!
//! The dependent chain advances one step per tick: a gap tick through every
//! level sells tier 1 only, tier 2 follows on the next tick, and the
//! trailing stop arms on the tick after that. Tier 1 and the trailing
//! activation can never fire together - activation requires tier 2 to have
//! been sold on an earlier tick.

use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::position::Position;

/// What triggered an exit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    StopLoss,
    Tier1,
    Tier2,
    TrailingStop,
}

impl ExitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitTrigger::StopLoss => "STOP_LOSS",
            ExitTrigger::Tier1 => "TIER_1_EXIT",
            ExitTrigger::Tier2 => "TIER_2_EXIT",
            ExitTrigger::TrailingStop => "TRAILING_STOP",
        }
    }
}

/// An exit the caller must execute and apply exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitAction {
    /// Sell a fraction of the ORIGINAL position size (stable 30/30/40
    /// split; the portfolio clamps to the remaining quantity on fills).
    SellFraction { fraction: f64, trigger: ExitTrigger },
    /// Liquidate the remaining quantity. Terminal for the position.
    CloseAll { trigger: ExitTrigger },
}

impl ExitAction {
    pub fn trigger(&self) -> ExitTrigger {
        match self {
            ExitAction::SellFraction { trigger, .. } => *trigger,
            ExitAction::CloseAll { trigger } => *trigger,
        }
    }

    pub fn is_full_exit(&self) -> bool {
        matches!(self, ExitAction::CloseAll { .. })
    }
}

/// Exit engine tunables.
#[derive(Debug, Clone)]
pub struct ExitConfig {
    /// Gain over entry required before the trailing stop arms (0.15 = +15%).
    pub trailing_activation_pct: f64,
    /// Distance below the highest price the stop trails at (0.03 = 3%).
    pub trailing_distance_pct: f64,
    /// Fraction of total quantity sold at tp1.
    pub tier1_fraction: f64,
    /// Fraction of total quantity sold at tp2.
    pub tier2_fraction: f64,
}

impl ExitConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            trailing_activation_pct: config.trailing_activation_pct,
            trailing_distance_pct: config.trailing_distance_pct,
            tier1_fraction: config.tier1_fraction,
            tier2_fraction: config.tier2_fraction,
        }
    }
}

/// Tiered-exit decision engine.
pub struct ExitEngine {
    config: ExitConfig,
}

impl ExitEngine {
    pub fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    /// Evaluate one price tick against a position.
    ///
    /// Updates the tracking state (highest price, trailing ratchet and
    /// activation) and returns the first rule that fires, or `None`. Tier
    /// status is advanced by the portfolio when the fill is applied, so a
    /// decision the caller never executed fires again on the next tick.
    pub fn evaluate(
        &self,
        position: &mut Position,
        current_price: f64,
    ) -> Result<Option<ExitAction>> {
        if position.is_closed() {
            return Ok(None);
        }

        let targets = position.targets;

        // Rule 1: stop-loss. Terminal, fires regardless of tier state.
        if current_price <= targets.stop_loss_price {
            info!(
                "🛑 STOP LOSS: {} at {:.6} (stop {:.6})",
                position.pair, current_price, targets.stop_loss_price
            );
            return Ok(Some(ExitAction::CloseAll {
                trigger: ExitTrigger::StopLoss,
            }));
        }

        // Track the tick: highest price and trailing ratchet.
        position.record_price(current_price, self.config.trailing_distance_pct);

        // Rule 2: tier 1 partial sell.
        if !position.tier_1_sold() && current_price >= targets.tp1_price {
            info!(
                "🎯 TIER 1: {} at {:.6} (tp1 {:.6})",
                position.pair, current_price, targets.tp1_price
            );
            return Ok(Some(ExitAction::SellFraction {
                fraction: self.config.tier1_fraction,
                trigger: ExitTrigger::Tier1,
            }));
        }

        // Rule 3: tier 2 partial sell.
        if position.tier_1_sold() && !position.tier_2_sold() && current_price >= targets.tp2_price
        {
            info!(
                "🎯 TIER 2: {} at {:.6} (tp2 {:.6})",
                position.pair, current_price, targets.tp2_price
            );
            return Ok(Some(ExitAction::SellFraction {
                fraction: self.config.tier2_fraction,
                trigger: ExitTrigger::Tier2,
            }));
        }

        // Rule 4: trailing-stop activation. No sell action, state only.
        if position.tier_2_sold()
            && !position.trailing_active()
            && current_price >= position.entry_price * (1.0 + self.config.trailing_activation_pct)
        {
            let initial_stop = current_price * (1.0 - self.config.trailing_distance_pct);
            position.activate_trailing(initial_stop)?;
            info!(
                "📈 TRAILING ACTIVATED: {} stop at {:.6}",
                position.pair, initial_stop
            );
        }

        // Rule 5: trailing-stop exit. Terminal. A stop armed this tick sits
        // below the current price and cannot fire until a later tick.
        if position.trailing_active() {
            if let Some(stop) = position.trailing_stop_price {
                if current_price <= stop {
                    info!(
                        "📉 TRAILING STOP: {} at {:.6} (stop {:.6})",
                        position.pair, current_price, stop
                    );
                    return Ok(Some(ExitAction::CloseAll {
                        trigger: ExitTrigger::TrailingStop,
                    }));
                }
            }
        }

        debug!(
            "{} holds at {:.6} (high {:.6}, status {:?})",
            position.pair, current_price, position.highest_price, position.status
        );

        Ok(None)
    }
}
