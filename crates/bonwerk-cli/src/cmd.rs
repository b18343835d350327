// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface of the `bonwerk` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bonwerk_print::raw_client::RAW_PORT;

#[derive(Debug, Parser)]
#[command(name = "bonwerk")]
#[command(about = "Find receipt printers on the local network and send them raw jobs.")]
pub struct CommandLine {
    /// JSON settings file; missing fields take their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the timeout for this command, in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Try one TCP connection to a printer
    Probe {
        ip: String,
        #[arg(long, default_value_t = RAW_PORT)]
        port: u16,
    },
    /// Ask a device whether it answers like an ESC/POS printer
    Check {
        ip: String,
        #[arg(long, default_value_t = RAW_PORT)]
        port: u16,
    },
    /// Search a /24 network (e.g. `192.168.1.`) for receipt printers
    Scan {
        prefix: String,
        /// Ports to try on every host, comma separated
        #[arg(long, value_delimiter = ',')]
        ports: Vec<u16>,
        /// Maximum probes in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the built-in test ticket
    TestPrint {
        ip: String,
        #[arg(long, default_value_t = RAW_PORT)]
        port: u16,
    },
    /// Send a file of raw printer bytes as-is
    Send {
        ip: String,
        file: PathBuf,
        #[arg(long, default_value_t = RAW_PORT)]
        port: u16,
    },
    /// Step-by-step check of one printer, with a shareable summary
    Doctor {
        ip: String,
        #[arg(long, default_value_t = RAW_PORT)]
        port: u16,
        /// Finish by printing the test ticket
        #[arg(long)]
        print: bool,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
