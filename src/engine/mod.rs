// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tiered-exit decision engine.

pub mod exit;
pub mod targets;

pub use exit::{ExitAction, ExitConfig, ExitEngine, ExitTrigger};
pub use targets::Targets;
