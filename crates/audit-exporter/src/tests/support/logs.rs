//! Captures formatted `tracing` output for assertions.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use exporter_config::{Config, LogFormat};

use crate::telemetry::build_subscriber;

#[derive(Clone, Default)]
struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("output mutex").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `action` under the exporter's subscriber with `filter` and returns
/// everything it logged on the calling thread.
pub fn capture_logs(filter: &str, format: LogFormat, action: impl FnOnce()) -> String {
    let config = Config {
        log_filter: filter.to_owned(),
        log_format: format,
        ..Config::default()
    };
    let output = CapturedOutput::default();
    let writer = output.clone();
    let subscriber =
        build_subscriber(&config, move || writer.clone(), false).expect("valid log filter");

    tracing::subscriber::with_default(subscriber, action);
    let bytes = output.0.lock().expect("output mutex").clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
