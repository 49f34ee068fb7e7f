// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event handlers.

pub mod tick_handler;

pub use tick_handler::spawn_tick_handler;
