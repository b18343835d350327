// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BonwerkError, Result};

/// Tunables for scanning and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonwerkConfig {
    /// Ports tried on every host when a scan names none (raw, LPR, IPP).
    pub default_ports: Vec<u16>,
    /// Per-operation timeout for probes.
    pub probe_timeout_ms: u64,
    /// Hard ceiling on simultaneously open probe sockets.
    pub max_concurrency: usize,
    /// Outer ceiling on a whole range scan.
    pub scan_deadline_ms: u64,
    /// Connect/write timeout for print dispatch.
    pub dispatch_timeout_ms: u64,
    /// How long a connection stays open after the payload is written, so
    /// slow printer firmware can drain its buffer.
    pub drain_grace_ms: u64,
    /// Count peers that accept the ESC/POS status query but never answer as
    /// printers.  Off by default: a false positive sends jobs to the wrong
    /// device.
    pub accept_silent_peers: bool,
}

impl Default for BonwerkConfig {
    fn default() -> Self {
        Self {
            default_ports: vec![9100, 9101, 9102, 515, 631],
            probe_timeout_ms: 1000,
            max_concurrency: 20,
            scan_deadline_ms: 30_000,
            dispatch_timeout_ms: 5000,
            drain_grace_ms: 1000,
            accept_silent_peers: false,
        }
    }
}

impl BonwerkConfig {
    /// Load a JSON config file.  Missing keys fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ports.is_empty() {
            return Err(BonwerkError::Config("default_ports must not be empty".into()));
        }
        if self.default_ports.contains(&0) {
            return Err(BonwerkError::Config("default_ports must not contain port 0".into()));
        }
        if self.max_concurrency == 0 {
            return Err(BonwerkError::Config("max_concurrency must be at least 1".into()));
        }
        for (name, value) in [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("scan_deadline_ms", self.scan_deadline_ms),
            ("dispatch_timeout_ms", self.dispatch_timeout_ms),
        ] {
            if value == 0 {
                return Err(BonwerkError::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn scan_deadline(&self) -> Duration {
        Duration::from_millis(self.scan_deadline_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}
