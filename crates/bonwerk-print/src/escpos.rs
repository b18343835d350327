// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS printer detection and the built-in test ticket.
//
// Detection opens a fresh connection, sends the real-time status request
// `DLE EOT 1` and waits for any reply.  Thermal printers answer with a
// single status byte; HTTP, SSH and most other services either stay silent
// or hang up.  A silent peer is not reported as a printer unless the caller
// opts in.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{PrinterCandidate, ProtocolGuess, ScanTarget};

use crate::probe::elapsed_ms;
use crate::transport::Connector;

/// `DLE EOT 1`: transmit printer status in real time.
pub const STATUS_QUERY: [u8; 3] = [0x10, 0x04, 0x01];

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// What a peer did after receiving the status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolOutcome {
    /// Sent back at least one byte.
    Answered(Vec<u8>),
    /// Stayed connected but said nothing before the timeout.
    Silent,
    /// Closed or reset the connection.
    Closed,
    /// Could not connect or write the query at all.
    Failed(String),
}

impl ProtocolOutcome {
    /// Classify the outcome.  `Silent` only counts when `accept_silent` is set.
    pub fn printer_guess(&self, accept_silent: bool) -> Option<ProtocolGuess> {
        match self {
            Self::Answered(_) => Some(ProtocolGuess::EscPos),
            Self::Silent if accept_silent => Some(ProtocolGuess::Tcp),
            _ => None,
        }
    }
}

/// Send the status query to `target` over a new connection and report what
/// came back.  The connect, write and reply wait each get `timeout`.
pub async fn query_status<C>(connector: &C, target: ScanTarget, timeout: Duration) -> Result<ProtocolOutcome>
where
    C: Connector + ?Sized,
{
    if timeout.is_zero() {
        return Err(BonwerkError::InvalidTimeout);
    }
    Ok(query_status_unchecked(connector, target, timeout).await)
}

pub(crate) async fn query_status_unchecked<C>(
    connector: &C,
    target: ScanTarget,
    timeout: Duration,
) -> ProtocolOutcome
where
    C: Connector + ?Sized,
{
    let addr = target.socket_addr();

    let mut stream = match tokio::time::timeout(timeout, connector.connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return ProtocolOutcome::Failed(e.to_string()),
        Err(_) => return ProtocolOutcome::Failed("connect timed out".into()),
    };

    let write = async {
        stream.write_all(&STATUS_QUERY).await?;
        stream.flush().await
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return ProtocolOutcome::Failed(format!("status query write: {e}")),
        Err(_) => return ProtocolOutcome::Failed("status query write timed out".into()),
    }

    let mut buf = [0u8; 64];
    let outcome = match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(0)) => ProtocolOutcome::Closed,
        Ok(Ok(n)) => ProtocolOutcome::Answered(buf[..n].to_vec()),
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "peer reset after status query");
            ProtocolOutcome::Closed
        }
        Err(_) => ProtocolOutcome::Silent,
    };

    debug!(addr = %addr, outcome = ?outcome, "ESC/POS status query finished");
    outcome
}

/// Run the status query and turn the answer into a `PrinterCandidate`.
///
/// Returns `None` for anything not classified as a printer.
pub(crate) async fn detect_printer<C>(
    connector: &C,
    target: ScanTarget,
    timeout: Duration,
    accept_silent: bool,
) -> Option<PrinterCandidate>
where
    C: Connector + ?Sized,
{
    let started = Instant::now();
    let outcome = query_status_unchecked(connector, target, timeout).await;
    outcome
        .printer_guess(accept_silent)
        .map(|protocol_guess| PrinterCandidate {
            target,
            is_printer: true,
            protocol_guess,
            response_time_ms: elapsed_ms(started),
        })
}

/// Byte-level builder for small ESC/POS documents.
///
/// Covers what a test ticket needs: reset, alignment, emphasis, text, feed
/// and cut.  Real receipt layout is rendered by the caller.
#[derive(Debug, Clone)]
pub struct TicketBuilder {
    buf: Vec<u8>,
}

impl Default for TicketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Horizontal text alignment (`ESC a n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left = 0,
    Center = 1,
    Right = 2,
}

impl TicketBuilder {
    /// Start a document with `ESC @` (initialise printer).
    pub fn new() -> Self {
        Self { buf: vec![ESC, b'@'] }
    }

    pub fn align(mut self, align: Align) -> Self {
        self.buf.extend_from_slice(&[ESC, b'a', align as u8]);
        self
    }

    pub fn bold(mut self, on: bool) -> Self {
        self.buf.extend_from_slice(&[ESC, b'E', u8::from(on)]);
        self
    }

    /// Append a line of text.  Non-ASCII characters are replaced with `?`
    /// since code page selection is left to the printer default.
    pub fn line(mut self, text: &str) -> Self {
        self.buf
            .extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
        self.buf.push(LF);
        self
    }

    /// Feed `lines` blank lines (`ESC d n`).
    pub fn feed(mut self, lines: u8) -> Self {
        self.buf.extend_from_slice(&[ESC, b'd', lines]);
        self
    }

    /// Partial cut (`GS V 1`).
    pub fn cut(mut self) -> Self {
        self.buf.extend_from_slice(&[GS, b'V', 1]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// The ticket printed by `send_test_print`.
pub fn test_ticket(target: ScanTarget) -> Vec<u8> {
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    TicketBuilder::new()
        .align(Align::Center)
        .bold(true)
        .line("TEST PRINT")
        .bold(false)
        .line("Bonwerk")
        .align(Align::Left)
        .line("")
        .line(&format!("Printer: {target}"))
        .line(&format!("Time:    {stamp}"))
        .line("")
        .line("If you can read this, the printer")
        .line("is ready to take orders.")
        .feed(4)
        .cut()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Behaviour, FakeConnector};

    fn target() -> ScanTarget {
        ScanTarget::parse("10.0.0.5", 9100).unwrap()
    }

    #[tokio::test]
    async fn echoing_peer_is_an_escpos_printer() {
        let net = FakeConnector::new().with(
            "10.0.0.5:9100",
            Behaviour::Accept { reply: Some(vec![0x16]) },
        );
        let outcome = query_status(&net, target(), Duration::from_millis(200)).await.unwrap();
        assert_eq!(outcome, ProtocolOutcome::Answered(vec![0x16]));
        assert_eq!(outcome.printer_guess(false), Some(ProtocolGuess::EscPos));
        assert_eq!(net.received("10.0.0.5:9100"), STATUS_QUERY.to_vec());
    }

    #[tokio::test]
    async fn silent_peer_is_not_a_printer_by_default() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Accept { reply: None });
        let outcome = query_status(&net, target(), Duration::from_millis(50)).await.unwrap();
        assert_eq!(outcome, ProtocolOutcome::Silent);
        assert_eq!(outcome.printer_guess(false), None);
        assert_eq!(outcome.printer_guess(true), Some(ProtocolGuess::Tcp));
    }

    #[tokio::test]
    async fn resetting_peer_is_not_a_printer() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Reset);
        let outcome = query_status(&net, target(), Duration::from_millis(50)).await.unwrap();
        assert!(matches!(outcome, ProtocolOutcome::Closed | ProtocolOutcome::Failed(_)));
        assert_eq!(outcome.printer_guess(true), None);
    }

    #[tokio::test]
    async fn refused_peer_fails() {
        let net = FakeConnector::new();
        let outcome = query_status(&net, target(), Duration::from_millis(50)).await.unwrap();
        assert!(matches!(outcome, ProtocolOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn detection_closes_its_socket() {
        let net = FakeConnector::new().with(
            "10.0.0.5:9100",
            Behaviour::Accept { reply: Some(vec![0x12]) },
        );
        let candidate = detect_printer(&net, target(), Duration::from_millis(200), false)
            .await
            .unwrap();
        assert!(candidate.is_printer);
        assert_eq!(candidate.protocol_guess, ProtocolGuess::EscPos);
        assert_eq!(net.open_now(), 0);
    }

    #[test]
    fn ticket_starts_with_init_and_ends_with_cut() {
        let bytes = TicketBuilder::new().line("hi").cut().build();
        assert_eq!(bytes, vec![ESC, b'@', b'h', b'i', LF, GS, b'V', 1]);
    }

    #[test]
    fn non_ascii_is_replaced() {
        let bytes = TicketBuilder::new().line("Käse").build();
        assert_eq!(&bytes[2..], b"K?se\n");
    }

    #[test]
    fn test_ticket_names_the_printer() {
        let bytes = test_ticket(target());
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("10.0.0.5:9100"));
        assert!(bytes.ends_with(&[GS, b'V', 1]));
    }
}
