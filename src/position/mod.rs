// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position state for open trades.

pub mod state;

pub use state::{Position, PositionStatus};
