// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Range scanner: probe every host of a /24 prefix on a set of ports.
//
// Each (host, port) pair becomes one task.  A per-scan semaphore caps the
// number of sockets open at once; a new task is not spawned until a permit is
// free, so the cap applies to dispatch rather than just to execution.  The
// permit is held across both the TCP probe and the ESC/POS follow-up, which
// never overlap, so the cap is a hard ceiling on open sockets.
//
// Each task hands its TCP result to the collector over a channel as soon as
// the connect finishes, before the ESC/POS follow-up starts.  Results are
// appended by the collector only, in completion order.  An outer deadline
// bounds the whole scan: when it fires, in-flight tasks are aborted and every
// target without a result is recorded as a timeout.  A target whose connect
// already finished keeps its real status; only its printer check is lost.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use bonwerk_core::address::{self, ScanPrefix};
use bonwerk_core::config::BonwerkConfig;
use bonwerk_core::error::{BonwerkError, Result};
use bonwerk_core::types::{PrinterCandidate, ProbeResult, ScanSession, ScanTarget};

use crate::escpos;
use crate::probe::{self, elapsed_ms};
use crate::transport::Connector;

/// Detail attached to probes cut short by the scan deadline.
pub const DEADLINE_DETAIL: &str = "cancelled: scan deadline exceeded";

/// Knobs for a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Per-operation timeout (connect, and each step of the ESC/POS query).
    pub per_probe_timeout: Duration,
    /// Maximum number of sockets open at the same time.
    pub max_concurrency: usize,
    /// Ceiling on the whole scan, independent of the per-probe timeout.
    pub deadline: Duration,
    /// Report silent peers as `TCP` printer candidates.
    pub accept_silent_peers: bool,
}

impl ScanOptions {
    pub fn from_config(config: &BonwerkConfig) -> Self {
        Self {
            per_probe_timeout: config.probe_timeout(),
            max_concurrency: config.max_concurrency,
            deadline: config.scan_deadline(),
            accept_silent_peers: config.accept_silent_peers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.per_probe_timeout.is_zero() || self.deadline.is_zero() {
            return Err(BonwerkError::InvalidTimeout);
        }
        if self.max_concurrency == 0 || self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(BonwerkError::InvalidConcurrency);
        }
        Ok(())
    }
}

type TaskOutput = Option<PrinterCandidate>;

/// Scans private /24 ranges for receipt printers.
pub struct RangeScanner<C> {
    connector: Arc<C>,
    options: ScanOptions,
}

impl<C> RangeScanner<C>
where
    C: Connector + 'static,
{
    pub fn new(connector: Arc<C>, options: ScanOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { connector, options })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `prefix` (e.g. `"192.168.1."`) on `ports`.
    ///
    /// Input is validated before any socket is opened; after that the call
    /// never fails, and per-target failures are recorded in the session.
    #[instrument(skip_all, fields(prefix = %prefix))]
    pub async fn scan(&self, prefix: &str, ports: &[u16]) -> Result<ScanSession> {
        let prefix = ScanPrefix::parse(prefix)?;
        let ports = address::normalize_ports(ports)?;
        let targets: Vec<ScanTarget> = prefix
            .hosts()
            .flat_map(|host| ports.iter().map(move |&port| ScanTarget::new(host, port)))
            .collect::<Result<_>>()?;

        let mut session = ScanSession::new(
            prefix,
            ports,
            u64::try_from(self.options.per_probe_timeout.as_millis()).unwrap_or(u64::MAX),
            self.options.max_concurrency,
        );

        info!(
            session = %session.id,
            targets = targets.len(),
            max_concurrency = self.options.max_concurrency,
            "range scan started"
        );

        let started = Instant::now();
        let mut run = ScanRun::new();
        let finished_in_time = tokio::time::timeout_at(
            started + self.options.deadline,
            run.drive(&targets, &self.connector, &self.options, &mut session),
        )
        .await
        .is_ok();

        if finished_in_time {
            run.record_missing(&targets, &mut session, |target| {
                ProbeResult::errored(target, elapsed_ms(started.into_std()), "probe task failed")
            });
        } else {
            warn!(
                deadline_ms = self.options.deadline.as_millis(),
                "scan deadline exceeded, cancelling remaining probes"
            );
            run.cancel(&mut session).await;
            run.record_missing(&targets, &mut session, |target| {
                ProbeResult::timed_out(target, elapsed_ms(started.into_std()), Some(DEADLINE_DETAIL.into()))
            });
        }

        info!(
            session = %session.id,
            probes = session.results().len(),
            printers = session.devices().len(),
            elapsed_ms = elapsed_ms(started.into_std()),
            "range scan finished"
        );
        Ok(session)
    }
}

/// Bookkeeping for one scan: the task set, the result channel, and which
/// targets have a result.
struct ScanRun {
    tasks: JoinSet<TaskOutput>,
    results_tx: mpsc::UnboundedSender<ProbeResult>,
    results_rx: mpsc::UnboundedReceiver<ProbeResult>,
    finished: HashSet<ScanTarget>,
}

impl ScanRun {
    fn new() -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            tasks: JoinSet::new(),
            results_tx,
            results_rx,
            finished: HashSet::new(),
        }
    }

    async fn drive<C>(
        &mut self,
        targets: &[ScanTarget],
        connector: &Arc<C>,
        options: &ScanOptions,
        session: &mut ScanSession,
    ) where
        C: Connector + 'static,
    {
        let limiter = Arc::new(Semaphore::new(options.max_concurrency));

        for &target in targets {
            // Back-pressure: wait for a free slot before dispatching.
            let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
                break;
            };
            let connector = Arc::clone(connector);
            let options = options.clone();
            let results = self.results_tx.clone();
            self.tasks.spawn(async move {
                let _permit = permit;
                probe_target(&*connector, target, &options, &results).await
            });
            self.drain_results(session);
        }

        // A task sends its result before it finishes, so draining first keeps
        // every result ahead of its device.
        while let Some(joined) = self.tasks.join_next().await {
            self.drain_results(session);
            self.collect(joined, session);
        }
        self.drain_results(session);
    }

    /// Abort everything still running and keep whatever already finished.
    async fn cancel(&mut self, session: &mut ScanSession) {
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            self.collect(joined, session);
        }
        self.drain_results(session);
    }

    /// Record every TCP result that has arrived so far.
    fn drain_results(&mut self, session: &mut ScanSession) {
        while let Ok(result) = self.results_rx.try_recv() {
            if !self.finished.insert(result.target()) {
                continue;
            }
            debug!(addr = %result.target(), status = %result.status(), "probe recorded");
            session.record(result);
        }
    }

    fn collect(&mut self, joined: std::result::Result<TaskOutput, JoinError>, session: &mut ScanSession) {
        match joined {
            Ok(Some(candidate)) => {
                info!(
                    addr = %candidate.target,
                    protocol = candidate.protocol_guess.as_str(),
                    "printer found"
                );
                session.record_device(candidate);
            }
            Ok(None) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "probe task failed"),
        }
    }

    /// Give every target that never produced a result a synthetic one.
    fn record_missing(
        &mut self,
        targets: &[ScanTarget],
        session: &mut ScanSession,
        make: impl Fn(ScanTarget) -> ProbeResult,
    ) {
        for &target in targets {
            if self.finished.insert(target) {
                session.record(make(target));
            }
        }
    }
}

/// TCP probe, then the ESC/POS check if the port is open.
async fn probe_target<C>(
    connector: &C,
    target: ScanTarget,
    options: &ScanOptions,
    results: &mpsc::UnboundedSender<ProbeResult>,
) -> TaskOutput
where
    C: Connector + ?Sized,
{
    let result = probe::probe_unchecked(connector, target, options.per_probe_timeout).await;
    let online = result.status().is_online();
    // The receiver lives as long as the scan; a closed channel means it's over.
    if results.send(result).is_err() || !online {
        return None;
    }
    escpos::detect_printer(
        connector,
        target,
        options.per_probe_timeout,
        options.accept_silent_peers,
    )
    .await
}
