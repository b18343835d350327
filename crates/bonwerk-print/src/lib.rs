// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bonwerk Print: TCP probing, ESC/POS printer detection, bounded-concurrency
// range scanning, and raw print dispatch.  Builds on the domain types in
// `bonwerk-core`; all socket access goes through the `Connector` seam.

pub mod diagnostics;
pub mod escpos;
pub mod probe;
pub mod raw_client;
pub mod scanner;
pub mod service;
pub mod transport;

pub use raw_client::PrintDispatcher;
pub use scanner::{RangeScanner, ScanOptions};
pub use service::PrinterService;
pub use transport::{Connector, TcpConnector};
