//! Test double for [`LifecycleReporter`] that records structured events for
//! assertions.

use std::sync::Mutex;

use exporter_config::{Config, SocketEndpoint};

use crate::consumer::DrainSummary;
use crate::health::LifecycleReporter;
use crate::process::LaunchError;

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Starting,
    Configured,
    Listening(SocketEndpoint),
    Stopping,
    Stopped(DrainSummary),
    Failed(String),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Configured => "configured",
            Self::Listening(_) => "listening",
            Self::Stopping => "stopping",
            Self::Stopped(_) => "stopped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events().iter().any(|event| event.name() == name)
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn starting(&self) {
        self.record(LifecycleEvent::Starting);
    }

    fn configured(&self, _config: &Config) {
        self.record(LifecycleEvent::Configured);
    }

    fn listening(&self, endpoint: &SocketEndpoint) {
        self.record(LifecycleEvent::Listening(endpoint.clone()));
    }

    fn stopping(&self) {
        self.record(LifecycleEvent::Stopping);
    }

    fn stopped(&self, summary: &DrainSummary) {
        self.record(LifecycleEvent::Stopped(*summary));
    }

    fn failed(&self, error: &LaunchError) {
        self.record(LifecycleEvent::Failed(error.to_string()));
    }
}
