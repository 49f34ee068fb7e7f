// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core error types.
//!
//! `InvalidState` and `UnknownAsset` are contract violations inside the
//! position/portfolio core and are always surfaced to the caller. Admission
//! refusals are not errors - they come back as declined results from the
//! portfolio. Plumbing failures (I/O, HTTP) use `anyhow` at the edges.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Illegal state transition: tier sold twice, quantity underflow,
    /// reopening a pair that already has a position, and friends.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Operation referenced a pair with no open position.
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
}

pub type Result<T> = std::result::Result<T, Error>;
