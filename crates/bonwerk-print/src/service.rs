// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entry points used by request handlers and the CLI.
//
// Every call re-validates its input (private host, port, non-zero timeout)
// before a socket is opened, then delegates to the probe, scanner or
// dispatcher.  Network failures come back inside the returned value; only
// invalid input is an `Err`.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use bonwerk_core::address::validate_timeout_ms;
use bonwerk_core::config::BonwerkConfig;
use bonwerk_core::error::Result;
use bonwerk_core::types::{
    ConnectionReport, DispatchOutcome, PrintJob, ProbeResult, ScanReport, ScanTarget,
};

use crate::escpos;
use crate::probe::{self, elapsed_ms};
use crate::raw_client::PrintDispatcher;
use crate::scanner::{RangeScanner, ScanOptions};
use crate::transport::{Connector, TcpConnector};

/// Printer discovery and dispatch over one transport.
pub struct PrinterService<C = TcpConnector> {
    connector: Arc<C>,
    config: BonwerkConfig,
}

impl PrinterService<TcpConnector> {
    /// Service over real TCP sockets.
    pub fn new(config: BonwerkConfig) -> Result<Self> {
        Self::with_connector(TcpConnector, config)
    }
}

impl<C> PrinterService<C>
where
    C: Connector + 'static,
{
    pub fn with_connector(connector: C, config: BonwerkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector: Arc::new(connector),
            config,
        })
    }

    pub fn config(&self) -> &BonwerkConfig {
        &self.config
    }

    /// Scan `prefix` for printers on `ports`.
    pub async fn scan_range(
        &self,
        prefix: &str,
        ports: &[u16],
        timeout_ms: u64,
        max_concurrency: usize,
    ) -> Result<ScanReport> {
        let options = ScanOptions {
            per_probe_timeout: validate_timeout_ms(timeout_ms)?,
            max_concurrency,
            ..ScanOptions::from_config(&self.config)
        };
        let scanner = RangeScanner::new(Arc::clone(&self.connector), options)?;

        let started = Instant::now();
        let session = scanner.scan(prefix, ports).await?;
        let report = session.into_report(elapsed_ms(started));
        info!(
            found = report.total_found,
            scan_time_ms = report.scan_time_ms,
            "scan report ready"
        );
        Ok(report)
    }

    /// Scan `prefix` with the configured ports, timeout and concurrency.
    pub async fn scan_with_defaults(&self, prefix: &str) -> Result<ScanReport> {
        self.scan_range(
            prefix,
            &self.config.default_ports,
            self.config.probe_timeout_ms,
            self.config.max_concurrency,
        )
        .await
    }

    /// One TCP connection attempt to `ip:port`, with the full probe result.
    pub async fn probe(&self, ip: &str, port: u16, timeout_ms: u64) -> Result<ProbeResult> {
        let target = ScanTarget::parse(ip, port)?;
        let timeout = validate_timeout_ms(timeout_ms)?;
        probe::probe(&*self.connector, target, timeout).await
    }

    /// One TCP connection attempt to `ip:port`.
    pub async fn test_tcp_connection(&self, ip: &str, port: u16, timeout_ms: u64) -> Result<ConnectionReport> {
        let result = self.probe(ip, port, timeout_ms).await?;
        Ok(ConnectionReport::from(&result))
    }

    /// Whether `ip:port` answers the ESC/POS status query like a printer.
    pub async fn test_printer_port(&self, ip: &str, port: u16, timeout_ms: u64) -> Result<bool> {
        let target = ScanTarget::parse(ip, port)?;
        let timeout = validate_timeout_ms(timeout_ms)?;
        let outcome = escpos::query_status(&*self.connector, target, timeout).await?;
        Ok(outcome
            .printer_guess(self.config.accept_silent_peers)
            .is_some())
    }

    /// Print the built-in test ticket on `ip:port`.
    pub async fn send_test_print(&self, ip: &str, port: u16, timeout_ms: u64) -> Result<DispatchOutcome> {
        let target = ScanTarget::parse(ip, port)?;
        self.send_job(PrintJob::new(target, escpos::test_ticket(target)), timeout_ms)
            .await
    }

    /// Send caller-rendered bytes (e.g. an ESC/POS receipt) to `ip:port`.
    pub async fn send_raw(
        &self,
        ip: &str,
        port: u16,
        payload: impl Into<Vec<u8>>,
        timeout_ms: u64,
    ) -> Result<DispatchOutcome> {
        let target = ScanTarget::parse(ip, port)?;
        self.send_job(PrintJob::new(target, payload), timeout_ms).await
    }

    /// Dispatch an already-built job.
    pub async fn send_job(&self, job: PrintJob, timeout_ms: u64) -> Result<DispatchOutcome> {
        let dispatcher = PrintDispatcher::new(
            Arc::clone(&self.connector),
            validate_timeout_ms(timeout_ms)?,
            self.config.drain_grace(),
        )?;
        Ok(dispatcher.dispatch(job).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Behaviour, FakeConnector};
    use bonwerk_core::error::BonwerkError;
    use bonwerk_core::types::{DispatchFailure, ProbeStatus, ProtocolGuess};

    fn service(net: &FakeConnector) -> PrinterService<FakeConnector> {
        let config = BonwerkConfig {
            drain_grace_ms: 0,
            ..Default::default()
        };
        PrinterService::with_connector(net.clone(), config).unwrap()
    }

    #[tokio::test]
    async fn printer_port_answering_status_is_a_printer() {
        let net = FakeConnector::new().with(
            "10.0.0.5:9100",
            Behaviour::Accept { reply: Some(vec![0x12]) },
        );
        assert!(service(&net).test_printer_port("10.0.0.5", 9100, 200).await.unwrap());
    }

    #[tokio::test]
    async fn printer_port_staying_silent_is_not_a_printer() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Accept { reply: None });
        assert!(!service(&net).test_printer_port("10.0.0.5", 9100, 50).await.unwrap());
    }

    #[tokio::test]
    async fn eighteen_byte_payload_reports_eighteen_bytes() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Accept { reply: None });
        let outcome = service(&net)
            .send_raw("10.0.0.5", 9100, vec![0x41; 18], 200)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.bytes_sent, Some(18));
    }

    #[tokio::test]
    async fn missing_listener_is_refused() {
        let net = FakeConnector::new();
        let outcome = service(&net)
            .send_raw("10.0.0.5", 9100, vec![0x41; 18], 200)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(DispatchFailure::Refused));
        assert!(outcome.error.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_print_sends_the_ticket() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Accept { reply: None });
        let outcome = service(&net).send_test_print("10.0.0.5", 9100, 200).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.bytes_sent.unwrap() > 0);
    }

    #[tokio::test]
    async fn tcp_test_reports_status() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Accept { reply: None });
        let svc = service(&net);
        let online = svc.test_tcp_connection("10.0.0.5", 9100, 100).await.unwrap();
        let refused = svc.test_tcp_connection("10.0.0.6", 9100, 100).await.unwrap();
        assert_eq!(online.status, ProbeStatus::Online);
        assert!(online.error.is_none());
        assert_eq!(refused.status, ProbeStatus::Refused);
        assert!(refused.error.is_some());
    }

    #[tokio::test]
    async fn public_or_malformed_input_never_connects() {
        let net = FakeConnector::new();
        let svc = service(&net);

        let err = svc.test_tcp_connection("8.8.8.8", 9100, 100).await.unwrap_err();
        assert!(matches!(err, BonwerkError::PublicAddress(_)));
        assert!(svc.test_printer_port("203.0.113.9", 9100, 100).await.is_err());
        assert!(svc.send_test_print("printer", 9100, 100).await.is_err());
        assert!(svc.scan_range("1.2.3.", &[9100], 100, 4).await.is_err());
        assert!(matches!(
            svc.test_tcp_connection("10.0.0.5", 9100, 0).await,
            Err(BonwerkError::InvalidTimeout)
        ));
        assert_eq!(net.attempts(), 0);
    }

    #[tokio::test]
    async fn scan_report_lists_printers() {
        let net = FakeConnector::new().with(
            "192.168.1.50:9100",
            Behaviour::Accept { reply: Some(vec![0x16]) },
        );
        let report = service(&net)
            .scan_range("192.168.1.", &[9100], 100, 20)
            .await
            .unwrap();
        assert_eq!(report.total_found, 1);
        assert_eq!(report.devices[0].protocol_guess, ProtocolGuess::EscPos);
        assert_eq!(report.probes_run, 254);
    }
}
