// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry-side trading strategies.

pub mod dip;

pub use dip::{BuyDecision, DipStrategy, SignalThrottle};
