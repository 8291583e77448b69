//! Structured reporting of exporter lifecycle events.

use std::sync::Arc;

use exporter_config::{Config, SocketEndpoint};

use crate::consumer::DrainSummary;
use crate::process::LaunchError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn starting(&self);

    /// Invoked once configuration has loaded and telemetry is installed.
    fn configured(&self, config: &Config);

    /// Invoked when the listener is accepting connections.
    fn listening(&self, endpoint: &SocketEndpoint);

    /// Invoked when the ordered shutdown begins.
    fn stopping(&self);

    /// Invoked after the consumer has been joined.
    fn stopped(&self, summary: &DrainSummary);

    /// Invoked when the run ends with an error.
    fn failed(&self, error: &LaunchError);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn starting(&self) {
        (**self).starting();
    }

    fn configured(&self, config: &Config) {
        (**self).configured(config);
    }

    fn listening(&self, endpoint: &SocketEndpoint) {
        (**self).listening(endpoint);
    }

    fn stopping(&self) {
        (**self).stopping();
    }

    fn stopped(&self, summary: &DrainSummary) {
        (**self).stopped(summary);
    }

    fn failed(&self, error: &LaunchError) {
        (**self).failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "starting",
            "starting audit exporter"
        );
    }

    fn configured(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "configured",
            network = %config.network,
            address = %config.address,
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            max_line_bytes = config.max_line_bytes(),
            "configuration loaded"
        );
    }

    fn listening(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listening",
            endpoint = %endpoint,
            "accepting audit connections"
        );
    }

    fn stopping(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stopping",
            "shutdown sequence started"
        );
    }

    fn stopped(&self, summary: &DrainSummary) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stopped",
            requests = summary.requests,
            responses = summary.responses,
            "shutdown sequence completed"
        );
    }

    fn failed(&self, error: &LaunchError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "failed",
            error = %error,
            "audit exporter failed"
        );
    }
}
