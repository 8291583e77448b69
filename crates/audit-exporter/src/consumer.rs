//! Consumer side of the dispatch queue.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::select;
use tracing::{debug, info};

use crate::entry::{RequestEntry, ResponseEntry};
use crate::queue::DispatchQueue;

pub(crate) const CONSUMER_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::consumer");

/// Receives decoded audit entries.
///
/// Correlating a response with its request is left to implementations; both
/// carry the same `request.id`.
pub trait EntrySink: Send {
    /// Called for every request entry, in hand-off order.
    fn handle_request(&mut self, entry: &RequestEntry);

    /// Called for every response entry, in hand-off order.
    fn handle_response(&mut self, entry: &ResponseEntry);
}

/// Counts of entries passed to a sink by [`drain`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    /// Request entries handled.
    pub requests: u64,
    /// Response entries handled.
    pub responses: u64,
}

/// Feeds entries from `queue` into `sink` until the queue shuts down.
///
/// The two entry channels are selected without priority, so requests and
/// responses from different connections interleave arbitrarily.
pub fn drain<S>(queue: &DispatchQueue, sink: &mut S) -> DrainSummary
where
    S: EntrySink + ?Sized,
{
    let mut summary = DrainSummary::default();
    loop {
        select! {
            recv(queue.receive_request()) -> entry => match entry {
                Ok(entry) => {
                    sink.handle_request(&entry);
                    summary.requests += 1;
                }
                Err(_) => break,
            },
            recv(queue.receive_response()) -> entry => match entry {
                Ok(entry) => {
                    sink.handle_response(&entry);
                    summary.responses += 1;
                }
                Err(_) => break,
            },
            recv(queue.shutdown_signal()) -> _ => break,
        }
    }
    debug!(
        target: CONSUMER_TARGET,
        requests = summary.requests,
        responses = summary.responses,
        "consumer stopped"
    );
    summary
}

/// Runs [`drain`] on a dedicated thread.
pub fn spawn_consumer<S>(queue: Arc<DispatchQueue>, mut sink: S) -> thread::JoinHandle<DrainSummary>
where
    S: EntrySink + 'static,
{
    thread::spawn(move || drain(&queue, &mut sink))
}

/// Sink that records each entry as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EntrySink for TracingSink {
    fn handle_request(&mut self, entry: &RequestEntry) {
        info!(
            target: CONSUMER_TARGET,
            kind = "request",
            request_id = entry.request_id(),
            operation = entry.request.operation.as_deref(),
            path = entry.request.path.as_deref(),
            time = entry.time.as_deref(),
            "audit request"
        );
    }

    fn handle_response(&mut self, entry: &ResponseEntry) {
        info!(
            target: CONSUMER_TARGET,
            kind = "response",
            request_id = entry.request_id(),
            operation = entry.request.operation.as_deref(),
            path = entry.request.path.as_deref(),
            error = entry.error.as_deref(),
            time = entry.time.as_deref(),
            "audit response"
        );
    }
}
