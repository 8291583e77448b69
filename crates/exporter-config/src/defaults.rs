use std::time::Duration;

use crate::logging::LogFormat;

/// Network kind used when none is configured.
pub const DEFAULT_NETWORK: &str = "tcp";

/// Bind address used when none is configured.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:9090";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Longest audit line accepted from a connection, excluding the newline.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// First delay applied after a transient accept error.
pub const DEFAULT_ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(5);

/// Upper bound for the accept backoff.
pub const DEFAULT_ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Time allowed for open connections to finish before they are force-closed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default network kind.
pub fn default_network() -> String {
    DEFAULT_NETWORK.to_owned()
}

/// Default bind address.
pub fn default_address() -> String {
    DEFAULT_ADDRESS.to_owned()
}

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default maximum line length.
pub fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

/// Default initial accept backoff in milliseconds.
pub fn default_accept_backoff_initial_ms() -> u64 {
    duration_millis(DEFAULT_ACCEPT_BACKOFF_INITIAL)
}

/// Default accept backoff cap in milliseconds.
pub fn default_accept_backoff_max_ms() -> u64 {
    duration_millis(DEFAULT_ACCEPT_BACKOFF_MAX)
}

/// Default shutdown grace period in milliseconds.
pub fn default_shutdown_grace_ms() -> u64 {
    duration_millis(DEFAULT_SHUTDOWN_GRACE)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
