// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single TCP connection probe.
//
// Three outcomes race: the connection completes, the OS reports an error, or
// the timeout fires first.  Whichever wins becomes the one terminal
// `ProbeResult`; the socket is dropped (closed) before the result is returned.

use std::time::{Duration, Instant};

use tracing::debug;

use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{ProbeResult, ScanTarget};

use crate::transport::Connector;

/// Probe `target` once.  Errors only on a zero timeout; every network
/// outcome is reported through the returned `ProbeResult`.
pub async fn probe<C>(connector: &C, target: ScanTarget, timeout: Duration) -> Result<ProbeResult>
where
    C: Connector + ?Sized,
{
    if timeout.is_zero() {
        return Err(BonwerkError::InvalidTimeout);
    }
    Ok(probe_unchecked(connector, target, timeout).await)
}

/// Probe without re-validating the timeout.  Callers inside the crate have
/// already rejected a zero value.
pub(crate) async fn probe_unchecked<C>(
    connector: &C,
    target: ScanTarget,
    timeout: Duration,
) -> ProbeResult
where
    C: Connector + ?Sized,
{
    let addr = target.socket_addr();
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, connector.connect(addr)).await {
        Ok(Ok(stream)) => {
            let elapsed = elapsed_ms(started);
            drop(stream);
            ProbeResult::online(target, elapsed)
        }
        Ok(Err(e)) => ProbeResult::from_io_error(target, &e, elapsed_ms(started)),
        Err(_) => ProbeResult::timed_out(
            target,
            elapsed_ms(started),
            Some(format!("no answer within {}ms", timeout.as_millis())),
        ),
    };

    debug!(
        addr = %addr,
        status = %result.status(),
        elapsed_ms = result.response_time_ms(),
        "tcp probe finished"
    );
    result
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TcpConnector;
    use crate::transport::testing::{Behaviour, FakeConnector};
    use bonwerk_core::types::ProbeStatus;

    fn target(host: &str, port: u16) -> ScanTarget {
        ScanTarget::parse(host, port).unwrap()
    }

    #[tokio::test]
    async fn listening_port_is_online() {
        let net = FakeConnector::new().with("10.0.0.5:9100", Behaviour::Accept { reply: None });
        let result = probe(&net, target("10.0.0.5", 9100), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(result.status(), ProbeStatus::Online);
        assert!(result.error_detail().is_none());
    }

    #[tokio::test]
    async fn silent_ports_never_report_online() {
        let net = FakeConnector::new()
            .with("10.0.0.6:9100", Behaviour::Hang)
            .with("10.0.0.7:9100", Behaviour::Unreachable);
        let timeout = Duration::from_millis(50);

        let refused = probe(&net, target("10.0.0.5", 9100), timeout).await.unwrap();
        let hung = probe(&net, target("10.0.0.6", 9100), timeout).await.unwrap();
        let unreachable = probe(&net, target("10.0.0.7", 9100), timeout).await.unwrap();

        assert_eq!(refused.status(), ProbeStatus::Refused);
        assert_eq!(hung.status(), ProbeStatus::Timeout);
        assert_eq!(unreachable.status(), ProbeStatus::Unreachable);
        assert!(refused.error_detail().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn timeout_resolves_within_bound_and_closes_socket() {
        let net = FakeConnector::new().with("10.0.0.6:9100", Behaviour::Hang);
        let started = Instant::now();
        let result = probe(&net, target("10.0.0.6", 9100), Duration::from_millis(80))
            .await
            .unwrap();
        assert_eq!(result.status(), ProbeStatus::Timeout);
        assert!(started.elapsed() < Duration::from_millis(80 + 500));
        assert_eq!(net.open_now(), 0);
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected_without_connecting() {
        let net = FakeConnector::new();
        let err = probe(&net, target("10.0.0.5", 9100), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BonwerkError::InvalidTimeout));
        assert_eq!(net.attempts(), 0);
    }

    #[tokio::test]
    async fn loopback_listener_is_online_then_refused_after_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let online = probe(&TcpConnector, target("127.0.0.1", port), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(online.status(), ProbeStatus::Online);

        drop(listener);
        let closed = probe(&TcpConnector, target("127.0.0.1", port), Duration::from_secs(2))
            .await
            .unwrap();
        assert_ne!(closed.status(), ProbeStatus::Online);
    }
}
