//! Shared configuration for the audit exporter.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a TOML file
//! (`--config-path` or `AUDIT_EXPORTER_CONFIG_PATH`), then
//! `AUDIT_EXPORTER_*` environment variables, then command-line flags.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACCEPT_BACKOFF_INITIAL, DEFAULT_ACCEPT_BACKOFF_MAX, DEFAULT_ADDRESS,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_LINE_BYTES, DEFAULT_NETWORK, DEFAULT_SHUTDOWN_GRACE,
    default_accept_backoff_initial_ms, default_accept_backoff_max_ms, default_address,
    default_log_filter, default_log_filter_string, default_log_format, default_max_line_bytes,
    default_network, default_shutdown_grace_ms,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError, TcpFamily};

/// Resolved exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "AUDIT_EXPORTER")]
pub struct Config {
    /// Network kind to listen on (`tcp`, `tcp4`, `tcp6` or `unix`).
    #[ortho_config(default = defaults::default_network())]
    #[serde(default = "defaults::default_network")]
    pub network: String,
    /// Address to listen on, `host:port` for TCP or a socket path for Unix.
    #[ortho_config(default = defaults::default_address())]
    #[serde(default = "defaults::default_address")]
    pub address: String,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Diagnostic output format.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Longest audit line accepted before the connection is dropped.
    #[ortho_config(default = defaults::default_max_line_bytes())]
    #[serde(default = "defaults::default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// First delay after a transient accept error, in milliseconds.
    #[ortho_config(default = defaults::default_accept_backoff_initial_ms())]
    #[serde(default = "defaults::default_accept_backoff_initial_ms")]
    pub accept_backoff_initial_ms: u64,
    /// Cap for the accept backoff, in milliseconds.
    #[ortho_config(default = defaults::default_accept_backoff_max_ms())]
    #[serde(default = "defaults::default_accept_backoff_max_ms")]
    pub accept_backoff_max_ms: u64,
    /// Time allowed for open connections to drain at shutdown, in milliseconds.
    #[ortho_config(default = defaults::default_shutdown_grace_ms())]
    #[serde(default = "defaults::default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: default_network(),
            address: default_address(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_line_bytes: default_max_line_bytes(),
            accept_backoff_initial_ms: default_accept_backoff_initial_ms(),
            accept_backoff_max_ms: default_accept_backoff_max_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Config {
    /// Endpoint described by the configured network and address.
    ///
    /// An address in URL form (`tcp://host:port` or `unix:///path`) names the
    /// endpoint on its own and takes precedence over `network`.
    pub fn listen_endpoint(&self) -> Result<SocketEndpoint, SocketParseError> {
        if self.address.contains("://") {
            return self.address.parse();
        }
        SocketEndpoint::from_network(&self.network, &self.address)
    }

    /// Filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for the tracing subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Longest accepted audit line in bytes.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Initial delay and cap for the accept backoff.
    #[must_use]
    pub const fn accept_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.accept_backoff_initial_ms),
            Duration::from_millis(self.accept_backoff_max_ms),
        )
    }

    /// Grace period granted to open connections during shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_endpoint_is_loopback_tcp() {
        let endpoint = Config::default().listen_endpoint().expect("default endpoint");
        assert_eq!(endpoint, SocketEndpoint::tcp("127.0.0.1", 9090));
    }

    #[test]
    fn default_backoff_bounds() {
        let (initial, max) = Config::default().accept_backoff();
        assert_eq!(initial, Duration::from_millis(5));
        assert_eq!(max, Duration::from_secs(1));
    }

    #[rstest]
    #[case("tcp", "unix:///run/audit/exporter.sock", SocketEndpoint::unix("/run/audit/exporter.sock"))]
    #[case("unix", "tcp://127.0.0.1:8200", SocketEndpoint::tcp("127.0.0.1", 8200))]
    #[case("tcp", "tcp://[::1]:9090", SocketEndpoint::tcp("::1", 9090))]
    fn url_addresses_take_precedence_over_network(
        #[case] network: &str,
        #[case] address: &str,
        #[case] expected: SocketEndpoint,
    ) {
        let config = Config {
            network: network.to_owned(),
            address: address.to_owned(),
            ..Config::default()
        };
        assert_eq!(config.listen_endpoint().expect("url endpoint"), expected);
    }

    #[test]
    fn unknown_url_schemes_are_rejected() {
        let config = Config {
            address: "udp://127.0.0.1:9090".to_owned(),
            ..Config::default()
        };
        assert!(matches!(
            config.listen_endpoint(),
            Err(SocketParseError::UnsupportedScheme(scheme)) if scheme == "udp"
        ));
    }

    #[test]
    fn invalid_network_surfaces_parse_error() {
        let config = Config {
            network: "sctp".to_owned(),
            ..Config::default()
        };
        assert!(config.listen_endpoint().is_err());
    }
}
