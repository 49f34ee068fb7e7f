// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Order execution.

pub mod sim;

pub use sim::{Fill, SimExecutor};
