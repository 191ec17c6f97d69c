//! Session configuration — timeouts with defaults per spec.md §4.2/§4.6/§4.7.

use std::time::Duration;

/// Tunable timeouts for a `Session`. Defaults match the values spec.md
/// prescribes; override only if the transport or device genuinely needs it
/// (e.g. a higher-latency USB-to-serial adapter).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Read-side idle timeout (spec.md §4.7: "5 s recommended, 2 s acceptable").
    pub idle_timeout: Duration,
    /// Deadline before a variable-info bootstrap request is re-issued (spec.md §4.2).
    pub variable_info_timeout: Duration,
    /// Per-request timeout for Version/Interface/LED/DC/AC/State (spec.md §4.6).
    pub request_timeout: Duration,
    /// Per-request timeout for Config (spec.md §4.6).
    pub config_request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5),
            variable_info_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_millis(500),
            config_request_timeout: Duration::from_secs(1),
        }
    }
}
