// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable messages for kitchen and counter staff.
//
// Every failure class maps to plain English with a concrete next step, so a
// caller can show "the printer is off" rather than an OS error string.

use crate::error::BonwerkError;
use crate::types::{DispatchFailure, ProbeResult, ProbeStatus};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or busy printer; trying again may help.
    Transient,
    /// Somebody must do something (switch the printer on, fix the address).
    ActionRequired,
    /// Input that can never work as given.
    Permanent,
}

/// A human-readable error with a plain English message and a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }
}

/// Convert a `BonwerkError` into a message for the person at the counter.
pub fn humanize_error(err: &BonwerkError) -> HumanError {
    match err {
        BonwerkError::InvalidAddress(input) => HumanError::new(
            "The printer address doesn't look right.",
            format!("Enter the address as four numbers separated by dots, like 192.168.1.100. (You entered: {input})"),
            Severity::ActionRequired,
        ),
        BonwerkError::PublicAddress(ip) => HumanError::new(
            "That address is outside your local network.",
            format!("Printers must be on your own network, e.g. 192.168.x.x or 10.x.x.x. ({ip} was refused before connecting.)"),
            Severity::Permanent,
        ),
        BonwerkError::InvalidPrefix(input) => HumanError::new(
            "The network to search doesn't look right.",
            format!("Use the first three parts of your network address followed by a dot, like 192.168.1. (You entered: {input})"),
            Severity::ActionRequired,
        ),
        BonwerkError::InvalidPort(port) => HumanError::new(
            "The printer port isn't valid.",
            format!("Receipt printers usually listen on port 9100. ({port} is not a usable port.)"),
            Severity::ActionRequired,
        ),
        BonwerkError::EmptyPortSet => HumanError::new(
            "No ports were chosen for the search.",
            "Pick at least one port to search. Most receipt printers use 9100.",
            Severity::ActionRequired,
        ),
        BonwerkError::InvalidTimeout | BonwerkError::InvalidConcurrency => HumanError::new(
            "The search settings aren't valid.",
            "Timeouts and the number of parallel checks must be greater than zero.",
            Severity::ActionRequired,
        ),
        BonwerkError::Config(detail) => HumanError::new(
            "The printer settings file has a problem.",
            format!("Fix the setting and try again. ({detail})"),
            Severity::ActionRequired,
        ),
        BonwerkError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => HumanError::new(
            "The settings file couldn't be found.",
            "Check the path, or run without a settings file to use the defaults.",
            Severity::ActionRequired,
        ),
        BonwerkError::Io(_) => HumanError::new(
            "There was a problem reading or writing a file.",
            "Try again. If this keeps happening, check the file permissions.",
            Severity::Transient,
        ),
        BonwerkError::Serialization(_) => HumanError::new(
            "The printer settings file couldn't be read.",
            "The file isn't valid JSON. Fix it or delete it to go back to the defaults.",
            Severity::ActionRequired,
        ),
    }
}

/// Explain a probe outcome.  Returns `None` for `Online`.
pub fn humanize_probe(result: &ProbeResult) -> Option<HumanError> {
    let target = result.target();
    let human = match result.status() {
        ProbeStatus::Online => return None,
        ProbeStatus::Refused => HumanError::new(
            "The printer refused our connection.",
            format!("Nothing is accepting print jobs at {target}. Check the printer is switched on and that the address and port are right."),
            Severity::ActionRequired,
        ),
        ProbeStatus::Timeout => HumanError::new(
            "The printer didn't respond in time.",
            format!("Nothing answered at {target}. The address may be wrong, or the printer may be busy or asleep. Try again in a moment."),
            Severity::Transient,
        ),
        ProbeStatus::Unreachable => HumanError::new(
            "The printer's network can't be reached.",
            format!("There is no route to {target}. Make sure this device and the printer are on the same network."),
            Severity::Transient,
        ),
        ProbeStatus::Error => HumanError::new(
            "Connecting to the printer failed.",
            format!(
                "Try again. If this keeps happening, restart the printer. (Detail: {})",
                result.error_detail().unwrap_or("unknown error")
            ),
            Severity::Transient,
        ),
    };
    Some(human)
}

/// Explain a failed print dispatch.
pub fn humanize_dispatch(failure: DispatchFailure) -> HumanError {
    match failure {
        DispatchFailure::Refused => HumanError::new(
            "The printer refused the print job.",
            "The printer is probably switched off, or the address points at a different device. Switch it on and check the address.",
            Severity::ActionRequired,
        ),
        DispatchFailure::Unreachable => HumanError::new(
            "The printer couldn't be reached.",
            "This is usually a network problem. Check the cable or Wi-Fi, then print again.",
            Severity::Transient,
        ),
        DispatchFailure::Transport => HumanError::new(
            "The print job was interrupted.",
            "The connection dropped while sending. Check the printer has paper and its lid is closed, then reprint.",
            Severity::Transient,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanTarget;
    use std::io;

    fn target() -> ScanTarget {
        ScanTarget::parse("192.168.1.50", 9100).unwrap()
    }

    #[test]
    fn public_address_is_permanent() {
        let human = humanize_error(&BonwerkError::PublicAddress("8.8.8.8".into()));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.suggestion.contains("8.8.8.8"));
    }

    #[test]
    fn malformed_input_needs_action() {
        let human = humanize_error(&BonwerkError::InvalidPrefix("192.168".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn online_needs_no_explanation() {
        assert!(humanize_probe(&ProbeResult::online(target(), 3)).is_none());
    }

    #[test]
    fn each_failure_status_has_its_own_message() {
        let results = [
            ProbeResult::from_io_error(target(), &io::Error::from(io::ErrorKind::ConnectionRefused), 1),
            ProbeResult::timed_out(target(), 1000, None),
            ProbeResult::from_io_error(target(), &io::Error::from(io::ErrorKind::HostUnreachable), 1),
            ProbeResult::errored(target(), 1, "boom"),
        ];
        let messages: Vec<String> = results
            .iter()
            .map(|r| humanize_probe(r).unwrap().message)
            .collect();
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn dispatch_classes_give_distinct_hints() {
        let refused = humanize_dispatch(DispatchFailure::Refused);
        let unreachable = humanize_dispatch(DispatchFailure::Unreachable);
        let transport = humanize_dispatch(DispatchFailure::Transport);
        assert_ne!(refused.suggestion, unreachable.suggestion);
        assert_ne!(unreachable.suggestion, transport.suggestion);
        assert_eq!(refused.severity, Severity::ActionRequired);
    }
}
