// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonwerk: core types, address validation, and error definitions shared
// across all crates.

pub mod address;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use address::ScanPrefix;
pub use config::BonwerkConfig;
pub use error::BonwerkError;
pub use types::*;
