//! Ingestion pipeline for audit-log streams.
//!
//! A secrets-management daemon writes one JSON object per line to a socket.
//! The exporter accepts those connections, classifies each line as a request
//! record, a response record or something it does not recognise, and hands
//! decoded records to a consumer through a synchronous [`DispatchQueue`].
//!
//! ```text
//! socket ─▶ EntryConnectionHandler ─▶ classify ─▶ DispatchQueue ─▶ EntrySink
//! ```
//!
//! Every connection runs on its own thread and preserves the order of its
//! lines. Unrecognised record types are skipped; a line that is not JSON, or
//! that claims a known type but does not decode as one, ends the connection.
//! The queue has no buffer, so a slow consumer stalls readers instead of
//! growing memory.
//!
//! [`listen_and_serve`] and [`serve`] run the accept loop on the calling
//! thread and leave the consumer side to the caller. [`run_exporter`] is the
//! full process: configuration, telemetry, listener, consumer, and an ordered
//! shutdown on SIGTERM, SIGINT, SIGQUIT or SIGHUP.

mod bootstrap;
pub mod classify;
pub mod consumer;
pub mod entry;
mod health;
mod process;
pub mod queue;
mod server;
pub mod telemetry;
pub mod transport;
mod version;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use classify::{Classification, ClassifyError, classify};
pub use consumer::{DrainSummary, EntrySink, TracingSink, drain, spawn_consumer};
pub use entry::{AuditEntry, AuditRequest, RequestEntry, ResponseEntry};
pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use process::{
    LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_exporter,
    run_exporter_with,
};
pub use queue::{DispatchQueue, QueueClosed};
pub use server::{ServeOptions, listen_and_serve, serve, spawn_server};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ListenerError, ListenerHandle, SocketListener};
pub use version::{VERSION_LINE, version_requested};

#[cfg(test)]
mod tests;
