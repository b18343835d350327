// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Private-network address validation and /24 prefix enumeration.
//
// Every socket Bonwerk opens goes to an address accepted here first.  The
// accepted blocks are 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16 and the
// loopback block 127.0.0.0/8.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BonwerkError, Result};

/// First host number enumerated inside a prefix (`.0` is the network address).
pub const FIRST_HOST: u8 = 1;

/// Last host number enumerated inside a prefix (`.255` is the broadcast address).
pub const LAST_HOST: u8 = 254;

/// Number of hosts a single prefix expands to.
pub const HOSTS_PER_PREFIX: usize = (LAST_HOST - FIRST_HOST + 1) as usize;

/// Whether `ip` lies in one of the private blocks Bonwerk may talk to.
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    match a {
        10 | 127 => true,
        172 => (16..=31).contains(&b),
        192 => b == 168,
        _ => false,
    }
}

/// Reject `ip` unless it is private.
pub fn validate_private_host(ip: Ipv4Addr) -> Result<Ipv4Addr> {
    if is_private_ipv4(ip) {
        Ok(ip)
    } else {
        Err(BonwerkError::PublicAddress(ip.to_string()))
    }
}

/// Parse a dotted-quad string and require it to be private.
pub fn parse_private_host(input: &str) -> Result<Ipv4Addr> {
    let ip = Ipv4Addr::from_str(input.trim())
        .map_err(|_| BonwerkError::InvalidAddress(input.to_string()))?;
    validate_private_host(ip)
}

/// Reject port 0 (and anything a wider integer could smuggle past `u16`).
pub fn validate_port(port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(BonwerkError::InvalidPort(port)),
    }
}

/// Convert a millisecond timeout into a `Duration`, rejecting zero.
pub fn validate_timeout_ms(timeout_ms: u64) -> Result<Duration> {
    if timeout_ms == 0 {
        return Err(BonwerkError::InvalidTimeout);
    }
    Ok(Duration::from_millis(timeout_ms))
}

/// Validate a port list for a scan: non-empty, no zeros, deduplicated and sorted.
pub fn normalize_ports(ports: &[u16]) -> Result<Vec<u16>> {
    if ports.is_empty() {
        return Err(BonwerkError::EmptyPortSet);
    }
    let mut out = Vec::with_capacity(ports.len());
    for &port in ports {
        out.push(validate_port(u32::from(port))?);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// A three-octet network prefix such as `192.168.1.`.
///
/// Expands to the hosts `.1` through `.254`; the network and broadcast
/// addresses are never part of a scan.
///
/// Serialised as its `a.b.c.` string; deserialising re-runs [`ScanPrefix::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ScanPrefix([u8; 3]);

impl ScanPrefix {
    /// Parse the `a.b.c.` form.  The prefix must sit inside a private block.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || BonwerkError::InvalidPrefix(input.to_string());

        let body = input.strip_suffix('.').ok_or_else(invalid)?;
        let mut octets = [0u8; 3];
        let mut parts = body.split('.');
        for slot in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 3 || !part.bytes().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse::<u8>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        let prefix = Self(octets);
        validate_private_host(prefix.host(FIRST_HOST))?;
        Ok(prefix)
    }

    /// The full address of host number `n` inside this prefix.
    pub fn host(&self, n: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, n)
    }

    /// All scannable hosts, `.1` through `.254`, in ascending order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (FIRST_HOST..=LAST_HOST).map(move |n| self.host(n))
    }
}

impl fmt::Display for ScanPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}.")
    }
}

impl From<ScanPrefix> for String {
    fn from(prefix: ScanPrefix) -> Self {
        prefix.to_string()
    }
}

impl TryFrom<String> for ScanPrefix {
    type Error = BonwerkError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl FromStr for ScanPrefix {
    type Err = BonwerkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
