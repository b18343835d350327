// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for printer discovery and dispatch.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::{self, HOSTS_PER_PREFIX, ScanPrefix};
use crate::error::{BonwerkError, Result};

/// One `(host, port)` pair to probe.  The host is always private.
///
/// Deserialising goes through [`ScanTarget::new`], so a public host or port 0
/// in stored JSON is rejected rather than reaching a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawScanTarget")]
pub struct ScanTarget {
    host: Ipv4Addr,
    port: u16,
}

/// Unchecked wire form of a `ScanTarget`.
#[derive(Deserialize)]
struct RawScanTarget {
    host: Ipv4Addr,
    port: u16,
}

impl TryFrom<RawScanTarget> for ScanTarget {
    type Error = BonwerkError;

    fn try_from(raw: RawScanTarget) -> Result<Self> {
        Self::new(raw.host, raw.port)
    }
}

impl ScanTarget {
    /// Build a target, rejecting public hosts and port 0.
    pub fn new(host: Ipv4Addr, port: u16) -> Result<Self> {
        let host = address::validate_private_host(host)?;
        let port = address::validate_port(u32::from(port))?;
        Ok(Self { host, port })
    }

    /// Parse `host` as a dotted quad and build a target.
    pub fn parse(host: &str, port: u16) -> Result<Self> {
        Self::new(address::parse_private_host(host)?, port)
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Terminal outcome of a single TCP connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Connection established.
    Online,
    /// Peer actively rejected the connection.
    Refused,
    /// Nothing answered within the timeout.
    Timeout,
    /// The network layer had no route to the host.
    Unreachable,
    /// Anything else; the OS message is kept in `error_detail`.
    Error,
}

impl ProbeStatus {
    /// Classify a connect/write failure.  Never yields `Online`.
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::Unreachable
            }
            _ => Self::Error,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Refused => "refused",
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one TCP probe.
///
/// Fields are private so that an `Online` result can never carry an error
/// detail; build values through the constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    target: ScanTarget,
    status: ProbeStatus,
    response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_detail: Option<String>,
}

impl ProbeResult {
    pub fn online(target: ScanTarget, response_time_ms: u64) -> Self {
        Self {
            target,
            status: ProbeStatus::Online,
            response_time_ms,
            error_detail: None,
        }
    }

    pub fn timed_out(target: ScanTarget, response_time_ms: u64, detail: Option<String>) -> Self {
        Self {
            target,
            status: ProbeStatus::Timeout,
            response_time_ms,
            error_detail: detail,
        }
    }

    /// Record a failure reported by the OS, keeping its message verbatim.
    pub fn from_io_error(target: ScanTarget, err: &io::Error, response_time_ms: u64) -> Self {
        Self {
            target,
            status: ProbeStatus::from_io_error(err),
            response_time_ms,
            error_detail: Some(err.to_string()),
        }
    }

    /// Record a failure that did not come from a socket (e.g. a crashed task).
    pub fn errored(target: ScanTarget, response_time_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            target,
            status: ProbeStatus::Error,
            response_time_ms,
            error_detail: Some(detail.into()),
        }
    }

    pub fn target(&self) -> ScanTarget {
        self.target
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

/// How a printer candidate was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolGuess {
    /// Answered an ESC/POS real-time status query.
    #[serde(rename = "ESC/POS")]
    EscPos,
    /// Accepted the connection and stayed silent (only under the silent-peer policy).
    #[serde(rename = "TCP")]
    Tcp,
}

impl ProtocolGuess {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscPos => "ESC/POS",
            Self::Tcp => "TCP",
        }
    }
}

/// A device the scanner believes is a receipt printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterCandidate {
    pub target: ScanTarget,
    pub is_printer: bool,
    pub protocol_guess: ProtocolGuess,
    pub response_time_ms: u64,
}

/// Raw bytes destined for one printer.  Consumed by a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub target: ScanTarget,
    pub payload: Vec<u8>,
}

impl PrintJob {
    pub fn new(target: ScanTarget, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            payload: payload.into(),
        }
    }
}

/// Why a dispatch did not complete.  Each class has its own remediation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchFailure {
    /// The printer rejected the connection (powered off or wrong IP).
    Refused,
    /// Timed out or no route (network problem).
    Unreachable,
    /// Connected, but writing or flushing the payload failed.
    Transport,
}

impl DispatchFailure {
    /// Map a connect/write failure onto the three dispatch classes.
    pub fn from_io_error(err: &io::Error) -> Self {
        match ProbeStatus::from_io_error(err) {
            ProbeStatus::Refused => Self::Refused,
            ProbeStatus::Timeout | ProbeStatus::Unreachable => Self::Unreachable,
            ProbeStatus::Online | ProbeStatus::Error => Self::Transport,
        }
    }
}

/// Result of sending a print job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<DispatchFailure>,
}

impl DispatchOutcome {
    pub fn delivered(bytes_sent: usize) -> Self {
        Self {
            success: true,
            bytes_sent: Some(bytes_sent),
            error: None,
            failure: None,
        }
    }

    pub fn failed(failure: DispatchFailure, error: impl Into<String>) -> Self {
        Self {
            success: false,
            bytes_sent: None,
            error: Some(error.into()),
            failure: Some(failure),
        }
    }
}

/// Outcome of a single-host connectivity test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub status: ProbeStatus,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProbeResult> for ConnectionReport {
    fn from(result: &ProbeResult) -> Self {
        Self {
            status: result.status(),
            response_time_ms: result.response_time_ms(),
            error: result.error_detail().map(String::from),
        }
    }
}

/// State of one range scan.  Lives for a single call; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub prefix: ScanPrefix,
    pub ports: Vec<u16>,
    pub per_probe_timeout_ms: u64,
    pub concurrency_limit: usize,
    results: Vec<ProbeResult>,
    devices: Vec<PrinterCandidate>,
}

impl ScanSession {
    pub fn new(
        prefix: ScanPrefix,
        ports: Vec<u16>,
        per_probe_timeout_ms: u64,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            prefix,
            ports,
            per_probe_timeout_ms,
            concurrency_limit,
            results: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Upper bound on the number of results: every host times every port.
    pub fn capacity(&self) -> usize {
        HOSTS_PER_PREFIX * self.ports.len()
    }

    /// Append a probe result.  Returns `false` (and drops the result) once
    /// the session already holds one result per target.
    pub fn record(&mut self, result: ProbeResult) -> bool {
        if self.results.len() >= self.capacity() {
            return false;
        }
        self.results.push(result);
        true
    }

    /// Add a printer-classified device.
    pub fn record_device(&mut self, candidate: PrinterCandidate) {
        self.devices.push(candidate);
    }

    /// Results in the order they completed.
    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    /// Printer devices found so far, in completion order.
    pub fn devices(&self) -> &[PrinterCandidate] {
        &self.devices
    }

    /// Collapse the session into the caller-facing summary.
    pub fn into_report(self, scan_time_ms: u64) -> ScanReport {
        let mut devices = self.devices;
        devices.sort_by_key(|d| d.target);
        let timed_out = self
            .results
            .iter()
            .filter(|r| r.status() == ProbeStatus::Timeout)
            .count();
        ScanReport {
            session_id: self.id,
            total_found: devices.len(),
            devices,
            scan_time_ms,
            probes_run: self.results.len(),
            timed_out,
        }
    }
}

/// Caller-facing result of `scan_range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub session_id: Uuid,
    pub devices: Vec<PrinterCandidate>,
    pub total_found: usize,
    pub scan_time_ms: u64,
    pub probes_run: usize,
    pub timed_out: usize,
}
