//! Process supervision: launch sequencing, signal handling and the ordered
//! shutdown of listener, connections, queue and consumer.

use std::time::Duration;

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{LaunchPlan, run_exporter, run_exporter_with};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::process");
/// Extra wait for handlers after their connections have been force-closed.
pub(crate) const FORCE_CLOSE_WAIT: Duration = Duration::from_secs(1);
/// How often the supervisor checks whether the listener stopped on its own.
pub(crate) const SUPERVISE_POLL: Duration = Duration::from_millis(50);
