// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Step-by-step check of one receipt printer.
//
// Runs: address valid → TCP reachable → answers ESC/POS → test print.
// Stops at the first failure and explains what to do next.

use std::fmt::Write as _;

use bonwerk_core::human_errors::{humanize_dispatch, humanize_error, humanize_probe};
use bonwerk_core::types::ScanTarget;

use crate::service::PrinterService;
use crate::transport::Connector;

/// Result of a single diagnostic step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Step name shown to the user.
    pub name: String,
    /// Whether the step passed.
    pub passed: bool,
    /// Human-readable detail of what was tested.
    pub detail: String,
    /// What to do if the step failed.
    pub fix: Option<String>,
}

impl StepResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
            fix: None,
        }
    }

    fn fail(name: &str, detail: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
            fix: Some(fix.into()),
        }
    }
}

/// Full diagnostic report.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    /// The printer that was checked, as entered.
    pub printer: String,
    pub steps: Vec<StepResult>,
    /// Index of the step that failed, if any.
    pub failed_step: Option<usize>,
    pub summary: String,
}

impl DiagnosticReport {
    fn new(printer: String) -> Self {
        Self {
            printer,
            steps: Vec::new(),
            failed_step: None,
            summary: String::new(),
        }
    }

    /// Push a step; returns `false` (and records the failure) if it failed.
    fn push(&mut self, step: StepResult, summary_on_failure: &str) -> bool {
        let passed = step.passed;
        self.steps.push(step);
        if !passed {
            self.failed_step = Some(self.steps.len() - 1);
            self.summary = summary_on_failure.into();
        }
        passed
    }
}

/// Check the printer at `ip:port`.  With `print_test_page` set the final step
/// prints the test ticket.
pub async fn run_diagnostics<C>(
    service: &PrinterService<C>,
    ip: &str,
    port: u16,
    print_test_page: bool,
) -> DiagnosticReport
where
    C: Connector + 'static,
{
    let mut report = DiagnosticReport::new(format!("{ip}:{port}"));
    let timeout_ms = service.config().probe_timeout_ms;

    // Step 1: Address
    let target = match ScanTarget::parse(ip, port) {
        Ok(target) => target,
        Err(e) => {
            let human = humanize_error(&e);
            report.push(
                StepResult::fail("Printer Address", human.message, human.suggestion),
                "The printer address can't be used.",
            );
            return report;
        }
    };
    report.push(
        StepResult::pass("Printer Address", format!("{target} is on your local network.")),
        "",
    );

    // Step 2: Reachable
    let reachable = match service.probe(ip, port, timeout_ms).await {
        Ok(result) => match humanize_probe(&result) {
            None => StepResult::pass(
                "Printer Reachable",
                format!("Printer answered in {}ms.", result.response_time_ms()),
            ),
            Some(human) => StepResult::fail("Printer Reachable", human.message, human.suggestion),
        },
        Err(e) => {
            let human = humanize_error(&e);
            StepResult::fail("Printer Reachable", human.message, human.suggestion)
        }
    };
    if !report.push(reachable, "Printer is not responding.") {
        return report;
    }

    // Step 3: Speaks ESC/POS
    let speaks = match service.test_printer_port(ip, port, timeout_ms).await {
        Ok(true) => StepResult::pass("Receipt Printer", "Printer answered an ESC/POS status request."),
        Ok(false) => StepResult::fail(
            "Receipt Printer",
            "Something is listening here, but it didn't answer like a receipt printer.",
            "Check the printer's IP address on its self-test slip (hold the feed button while switching it on).",
        ),
        Err(e) => {
            let human = humanize_error(&e);
            StepResult::fail("Receipt Printer", human.message, human.suggestion)
        }
    };
    if !report.push(speaks, "The device at this address doesn't look like a receipt printer.") {
        return report;
    }

    // Step 4: Test Print
    if print_test_page {
        let dispatch_timeout = service.config().dispatch_timeout_ms;
        let step = match service.send_test_print(ip, port, dispatch_timeout).await {
            Ok(outcome) if outcome.success => StepResult::pass(
                "Test Print",
                format!(
                    "Test ticket sent ({} bytes). A slip should be coming out now.",
                    outcome.bytes_sent.unwrap_or_default()
                ),
            ),
            Ok(outcome) => match outcome.failure {
                Some(failure) => {
                    let human = humanize_dispatch(failure);
                    StepResult::fail("Test Print", human.message, human.suggestion)
                }
                None => StepResult::fail(
                    "Test Print",
                    outcome.error.unwrap_or_else(|| "The test ticket wasn't sent.".into()),
                    "Try again.",
                ),
            },
            Err(e) => {
                let human = humanize_error(&e);
                StepResult::fail("Test Print", human.message, human.suggestion)
            }
        };
        if !report.push(step, "The test ticket couldn't be sent.") {
            return report;
        }
    }

    report.summary = "Everything looks good! The printer is ready.".into();
    report
}

/// Plain-text summary for sending to whoever looks after the network.
pub fn generate_help_summary(report: &DiagnosticReport) -> String {
    let now = chrono::Local::now().format("%d %b %Y, %H:%M");
    let mut text = format!("Printer Check Report\nDate: {now}\nPrinter: {}\n\n", report.printer);

    for (i, step) in report.steps.iter().enumerate() {
        let mark = if step.passed { "OK  " } else { "FAIL" };
        let _ = writeln!(text, "[{mark}] {}. {}: {}", i + 1, step.name, step.detail);
    }
    text.push('\n');

    match report.failed_step.and_then(|idx| report.steps.get(idx)) {
        Some(step) => {
            let _ = writeln!(text, "Stopped at: {}", step.name);
            if let Some(ref fix) = step.fix {
                let _ = writeln!(text, "What to do: {fix}");
            }
        }
        None => text.push_str("All checks passed. Printer is working.\n"),
    }

    text
}
