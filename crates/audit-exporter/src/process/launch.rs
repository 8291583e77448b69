//! Supervises exporter launch sequencing and the ordered shutdown.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};
use tracing::{info, warn};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader};
use crate::consumer::{EntrySink, TracingSink, spawn_consumer};
use crate::health::{LifecycleReporter, StructuredLifecycleReporter};
use crate::queue::DispatchQueue;
use crate::server::{ServeOptions, spawn_server};
use crate::telemetry;
use crate::transport::{ConnectionRegistry, ListenerHandle, SocketListener};

use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use super::{FORCE_CLOSE_WAIT, PROCESS_TARGET, SUPERVISE_POLL};

/// Collaborators required to run the exporter.
pub struct LaunchPlan<L, S, K> {
    /// Source of the resolved configuration.
    pub loader: L,
    /// Blocks until shutdown should begin.
    pub shutdown: S,
    /// Receives every decoded entry.
    pub sink: K,
    /// Observer for lifecycle events.
    pub reporter: Arc<dyn LifecycleReporter>,
}

/// Runs the exporter using the production collaborators.
pub fn run_exporter() -> Result<(), LaunchError> {
    run_exporter_with(LaunchPlan {
        loader: SystemConfigLoader,
        shutdown: SystemShutdownSignal,
        sink: TracingSink,
        reporter: Arc::new(StructuredLifecycleReporter::new()),
    })
}

/// Runs the exporter with injected collaborators.
///
/// Blocks until the shutdown signal fires or the listener stops on a fatal
/// error, then stops accepting, gives open connections the configured grace
/// period, force-closes whatever remains, closes the dispatch queue and joins
/// the consumer.
pub fn run_exporter_with<L, S, K>(plan: LaunchPlan<L, S, K>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    K: EntrySink + 'static,
{
    let LaunchPlan {
        loader,
        shutdown,
        sink,
        reporter,
    } = plan;

    reporter.starting();
    let result = supervise(&loader, shutdown, sink, reporter.as_ref());
    if let Err(error) = &result {
        reporter.failed(error);
    }
    result
}

fn supervise<L, S, K>(
    loader: &L,
    shutdown: S,
    sink: K,
    reporter: &dyn LifecycleReporter,
) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    K: EntrySink + 'static,
{
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    reporter.configured(&config);

    let endpoint = config.listen_endpoint()?;
    endpoint.prepare_filesystem()?;
    let listener = SocketListener::bind(&endpoint)?;
    let options = ServeOptions::from_config(&config);

    let queue = Arc::new(DispatchQueue::new());
    let consumer = spawn_consumer(Arc::clone(&queue), sink);
    let listener = match spawn_server(listener, Arc::clone(&queue), &options) {
        Ok(handle) => handle,
        Err(error) => {
            queue.close();
            let _ = consumer.join();
            return Err(error.into());
        }
    };
    reporter.listening(&endpoint);

    let signalled = wait_for_stop(shutdown, &listener);
    reporter.stopping();

    listener.shutdown();
    let connections = listener.connections().clone();
    let listened = listener.join();
    drain_connections(&connections, config.shutdown_grace());
    queue.close();
    let summary = consumer.join().map_err(|_| LaunchError::ConsumerPanic)?;

    listened?;
    signalled?;
    reporter.stopped(&summary);
    Ok(())
}

fn wait_for_stop<S>(shutdown: S, listener: &ListenerHandle) -> Result<(), ShutdownError>
where
    S: ShutdownSignal,
{
    let (signalled_tx, signalled) = bounded(1);
    thread::spawn(move || {
        let _ = signalled_tx.send(shutdown.wait());
    });

    loop {
        match signalled.recv_timeout(SUPERVISE_POLL) {
            Ok(outcome) => return outcome,
            Err(RecvTimeoutError::Timeout) if listener.is_finished() => {
                warn!(
                    target: PROCESS_TARGET,
                    "listener stopped before a shutdown signal"
                );
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

fn drain_connections(connections: &ConnectionRegistry, grace: Duration) {
    if connections.wait_for_drain(grace) {
        return;
    }
    warn!(
        target: PROCESS_TARGET,
        active = connections.active(),
        grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        "connections still open after the grace period; closing them"
    );
    connections.close_all();
    if connections.wait_for_drain(FORCE_CLOSE_WAIT) {
        info!(target: PROCESS_TARGET, "open connections closed");
    } else {
        warn!(
            target: PROCESS_TARGET,
            active = connections.active(),
            "connection handlers still running after force-close"
        );
    }
}
