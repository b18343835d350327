// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print dispatch (JetDirect style, usually port 9100).
//
// Open a socket, write the whole payload, flush, hold the connection for a
// short grace period so slow thermal-printer firmware can drain its buffer,
// then close.  Exactly one attempt per job; reprinting is the caller's call.

use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use bonwerk_core::config::BonwerkConfig;
use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{DispatchFailure, DispatchOutcome, PrintJob, ScanTarget};

use crate::probe::elapsed_ms;
use crate::transport::Connector;

/// Default raw TCP port (HP JetDirect / ESC/POS over Ethernet).
pub const RAW_PORT: u16 = 9100;

/// Sends raw byte payloads to printers.
#[derive(Debug, Clone)]
pub struct PrintDispatcher<C> {
    connector: C,
    timeout: Duration,
    drain_grace: Duration,
}

impl<C: Connector> PrintDispatcher<C> {
    /// `timeout` bounds the connect and the write separately.
    pub fn new(connector: C, timeout: Duration, drain_grace: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(BonwerkError::InvalidTimeout);
        }
        Ok(Self {
            connector,
            timeout,
            drain_grace,
        })
    }

    pub fn from_config(connector: C, config: &BonwerkConfig) -> Result<Self> {
        Self::new(connector, config.dispatch_timeout(), config.drain_grace())
    }

    /// Deliver `job` once.
    ///
    /// Success means the transport accepted every byte; `bytes_sent` is then
    /// the payload length.  Any failure is classified as refused,
    /// unreachable, or transport, with a message naming the printer.
    pub async fn dispatch(&self, job: PrintJob) -> DispatchOutcome {
        let PrintJob { target, payload } = job;
        let addr = target.socket_addr();
        let started = Instant::now();
        info!(addr = %addr, total = payload.len(), "sending raw print job");

        let mut stream = match tokio::time::timeout(self.timeout, self.connector.connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let failure = DispatchFailure::from_io_error(&e);
                warn!(addr = %addr, error = %e, failure = ?failure, "raw connect failed");
                return DispatchOutcome::failed(failure, connect_message(failure, target, &e.to_string()));
            }
            Err(_) => {
                warn!(addr = %addr, timeout_ms = self.timeout.as_millis(), "raw connect timed out");
                return DispatchOutcome::failed(
                    DispatchFailure::Unreachable,
                    format!(
                        "Timed out connecting to printer at {target} after {}ms: check the network and the printer's IP address",
                        self.timeout.as_millis()
                    ),
                );
            }
        };

        let write = async {
            stream.write_all(&payload).await?;
            stream.flush().await
        };
        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(addr = %addr, error = %e, "raw write failed");
                return DispatchOutcome::failed(
                    DispatchFailure::Transport,
                    format!("Write to printer at {target} failed: {e}"),
                );
            }
            Err(_) => {
                warn!(addr = %addr, "raw write timed out");
                return DispatchOutcome::failed(
                    DispatchFailure::Unreachable,
                    format!(
                        "Timed out sending to printer at {target} after {}ms: the printer stopped accepting data",
                        self.timeout.as_millis()
                    ),
                );
            }
        }

        if !self.drain_grace.is_zero() {
            debug!(grace_ms = self.drain_grace.as_millis(), "holding connection for printer to drain");
            tokio::time::sleep(self.drain_grace).await;
        }

        // The payload is already acknowledged; a failed close does not undo it.
        if let Err(e) = stream.shutdown().await {
            debug!(addr = %addr, error = %e, "raw shutdown failed after successful write");
        }

        info!(
            addr = %addr,
            bytes = payload.len(),
            elapsed_ms = elapsed_ms(started),
            "raw print job sent successfully"
        );
        DispatchOutcome::delivered(payload.len())
    }
}

fn connect_message(failure: DispatchFailure, target: ScanTarget, detail: &str) -> String {
    match failure {
        DispatchFailure::Refused => format!(
            "Connection refused by printer at {target}: the printer is off or the IP address is wrong ({detail})"
        ),
        DispatchFailure::Unreachable => format!(
            "Printer at {target} is unreachable: check the network connection ({detail})"
        ),
        DispatchFailure::Transport => {
            format!("Could not open a connection to printer at {target}: {detail}")
        }
    }
}
