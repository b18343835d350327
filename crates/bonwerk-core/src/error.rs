// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bonwerk.
//
// Only input validation and configuration problems surface as errors.
// Network failures are folded into `ProbeResult` / `DispatchOutcome` values.

use thiserror::Error;

/// Top-level error type for all Bonwerk operations.
#[derive(Debug, Error)]
pub enum BonwerkError {
    // -- Input validation --
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("address {0} is not in a private range")]
    PublicAddress(String),

    #[error("invalid network prefix {0:?}: expected three octets and a trailing dot, e.g. \"192.168.1.\"")]
    InvalidPrefix(String),

    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u32),

    #[error("no ports given to scan")]
    EmptyPortSet,

    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error("concurrency limit must be greater than zero")]
    InvalidConcurrency,

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BonwerkError {
    /// Whether this error was raised by input validation (no I/O attempted).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::PublicAddress(_)
                | Self::InvalidPrefix(_)
                | Self::InvalidPort(_)
                | Self::EmptyPortSet
                | Self::InvalidTimeout
                | Self::InvalidConcurrency
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BonwerkError>;
