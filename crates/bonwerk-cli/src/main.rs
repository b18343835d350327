// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonwerk: receipt printer discovery and raw dispatch.
//
// Entry point. Initialises logging, loads settings, and runs one subcommand
// against the printer service.  Results go to stdout as JSON; logs go to
// stderr.

mod cmd;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use serde::Serialize;

use bonwerk_core::config::BonwerkConfig;
use bonwerk_core::error::BonwerkError;
use bonwerk_core::human_errors::humanize_error;
use bonwerk_print::PrinterService;
use bonwerk_print::diagnostics::{generate_help_summary, run_diagnostics};

use cmd::{CommandLine, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = CommandLine::parse_args();
    let config = load_config(cli.config.as_deref())?;
    let service = PrinterService::new(config).map_err(explain)?;
    tracing::debug!(config = ?service.config(), "settings loaded");

    run(&service, cli.command, cli.timeout_ms).await
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BonwerkConfig> {
    match path {
        Some(path) => BonwerkConfig::load(path)
            .map_err(explain)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(BonwerkConfig::default()),
    }
}

async fn run(service: &PrinterService, command: Commands, timeout_ms: Option<u64>) -> anyhow::Result<ExitCode> {
    let probe_timeout = timeout_ms.unwrap_or(service.config().probe_timeout_ms);
    let dispatch_timeout = timeout_ms.unwrap_or(service.config().dispatch_timeout_ms);

    match command {
        Commands::Probe { ip, port } => {
            let report = service
                .test_tcp_connection(&ip, port, probe_timeout)
                .await
                .map_err(explain)?;
            print_json(&report)?;
            Ok(exit_code(report.error.is_none()))
        }
        Commands::Check { ip, port } => {
            let is_printer = service
                .test_printer_port(&ip, port, probe_timeout)
                .await
                .map_err(explain)?;
            print_json(&serde_json::json!({
                "ip": ip,
                "port": port,
                "isPrinter": is_printer,
            }))?;
            Ok(exit_code(is_printer))
        }
        Commands::Scan { prefix, ports, concurrency } => {
            let config = service.config();
            let ports = if ports.is_empty() { config.default_ports.clone() } else { ports };
            let report = service
                .scan_range(
                    &prefix,
                    &ports,
                    probe_timeout,
                    concurrency.unwrap_or(config.max_concurrency),
                )
                .await
                .map_err(explain)?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::TestPrint { ip, port } => {
            let outcome = service
                .send_test_print(&ip, port, dispatch_timeout)
                .await
                .map_err(explain)?;
            print_json(&outcome)?;
            Ok(exit_code(outcome.success))
        }
        Commands::Send { ip, file, port } => {
            let payload = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let outcome = service
                .send_raw(&ip, port, payload, dispatch_timeout)
                .await
                .map_err(explain)?;
            print_json(&outcome)?;
            Ok(exit_code(outcome.success))
        }
        Commands::Doctor { ip, port, print } => {
            let report = run_diagnostics(service, &ip, port, print).await;
            println!("{}", report.summary);
            println!();
            print!("{}", generate_help_summary(&report));
            Ok(exit_code(report.failed_step.is_none()))
        }
    }
}

/// Attach the plain-language explanation to a rejected input.
fn explain(err: BonwerkError) -> anyhow::Error {
    let human = humanize_error(&err);
    anyhow::Error::new(err).context(format!("{} {}", human.message, human.suggestion))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
