//! Fault / ProbeResult / internal DriverError — spec.md §7, §3.
//!
//! `Fault` and `ProbeResult` are the only error-shaped values that cross the
//! public API: everything else (checksum failures, request timeouts) is
//! policy-dropped per spec.md §7 rather than surfaced as an `Err`.

use thiserror::Error;

/// Terminal fault reported to `Handler::on_fault` when the driver loop exits.
///
/// Any fault ends the `Session`; the caller must start a new one to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// The transport could not be opened at the provided path.
    #[error("interface could not be opened")]
    Inaccessible,
    /// The transport failed to read or write after a successful open.
    #[error("I/O error communicating with the interface")]
    IoError,
    /// Any other unexpected failure in the driver loop.
    #[error("unhandled exception in driver loop")]
    Exception,
}

/// Outcome of a one-shot `probe()` call — spec.md §4.7/§6, scenario E6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProbeResult {
    /// The device was present and responsive.
    #[error("device responded")]
    Ok,
    /// The interface could not be opened at the provided path.
    #[error("interface could not be opened")]
    Inaccessible,
    /// An error occurred while communicating with the interface.
    #[error("I/O error communicating with the interface")]
    IoError,
    /// The interface did not respond to requests before the idle timeout.
    #[error("interface did not respond")]
    Unresponsive,
    /// An unhandled exception occurred.
    #[error("unhandled exception")]
    Exception,
}

impl From<Fault> for ProbeResult {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Inaccessible => ProbeResult::Inaccessible,
            Fault::IoError => ProbeResult::IoError,
            Fault::Exception => ProbeResult::Exception,
        }
    }
}

/// Internal error used by the driver loop to classify a failure into the
/// `Fault` it reports. Never leaves the crate's public API.
#[derive(Debug, Error)]
pub(crate) enum DriverError {
    #[error("failed to open transport: {0}")]
    Open(#[source] std::io::Error),
    #[error("transport I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("unexpected driver failure: {0}")]
    Exception(anyhow::Error),
}

impl DriverError {
    pub(crate) fn fault(&self) -> Fault {
        match self {
            DriverError::Open(_) => Fault::Inaccessible,
            DriverError::Io(_) => Fault::IoError,
            DriverError::Exception(_) => Fault::Exception,
        }
    }
}
