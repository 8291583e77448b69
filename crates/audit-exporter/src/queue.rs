//! Synchronous hand-off between connection handlers and entry consumers.
//!
//! Both entry channels have zero capacity: a send completes only when a
//! consumer takes the entry, so a slow consumer stalls the producing
//! connection instead of growing a buffer.
//!
//! Closing is split in two. [`DispatchQueue::close`] first disconnects the
//! shutdown channel, which every producer selects on, and then releases the
//! queue's own entry senders. A producer that is mid-send keeps its sender
//! clone alive until its `select!` returns, so an entry channel only reports
//! disconnection to consumers once no send can still be in flight.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use thiserror::Error;
use tracing::debug;

use crate::entry::{RequestEntry, ResponseEntry};

pub(crate) const QUEUE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::queue");

/// Returned when an entry could not be handed off because the queue closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dispatch queue is closed")]
pub struct QueueClosed;

struct HandOff<T> {
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
}

impl<T> HandOff<T> {
    fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    fn sender(&self) -> Option<Sender<T>> {
        lock(&self.sender).clone()
    }

    fn release(&self) {
        lock(&self.sender).take();
    }
}

/// Typed rendezvous queue shared by every connection and the consumer.
pub struct DispatchQueue {
    requests: HandOff<RequestEntry>,
    responses: HandOff<ResponseEntry>,
    shutdown_sender: Mutex<Option<Sender<()>>>,
    shutdown: Receiver<()>,
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchQueue {
    /// Creates an open queue.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_sender, shutdown) = bounded(0);
        Self {
            requests: HandOff::new(),
            responses: HandOff::new(),
            shutdown_sender: Mutex::new(Some(shutdown_sender)),
            shutdown,
        }
    }

    /// Hands a request entry to a consumer, blocking until one takes it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] when the queue closes before the hand-off
    /// completes. The entry is discarded in that case.
    pub fn send_request(&self, entry: RequestEntry) -> Result<(), QueueClosed> {
        self.send(&self.requests, entry)
    }

    /// Hands a response entry to a consumer, blocking until one takes it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] when the queue closes before the hand-off
    /// completes. The entry is discarded in that case.
    pub fn send_response(&self, entry: ResponseEntry) -> Result<(), QueueClosed> {
        self.send(&self.responses, entry)
    }

    fn send<T>(&self, hand_off: &HandOff<T>, entry: T) -> Result<(), QueueClosed> {
        if self.is_closed() {
            return Err(QueueClosed);
        }
        let Some(sender) = hand_off.sender() else {
            return Err(QueueClosed);
        };

        select! {
            send(sender, entry) -> sent => sent.map_err(|_| QueueClosed),
            recv(self.shutdown) -> _ => Err(QueueClosed),
        }
    }

    /// Receiver yielding request entries in hand-off order.
    #[must_use]
    pub fn receive_request(&self) -> &Receiver<RequestEntry> {
        &self.requests.receiver
    }

    /// Receiver yielding response entries in hand-off order.
    #[must_use]
    pub fn receive_response(&self) -> &Receiver<ResponseEntry> {
        &self.responses.receiver
    }

    /// One-shot shutdown notification.
    ///
    /// Nothing is ever sent on this channel; it disconnects when the queue
    /// closes, which makes every pending and future `recv` return at once.
    #[must_use]
    pub fn shutdown_signal(&self) -> &Receiver<()> {
        &self.shutdown
    }

    /// Returns true once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.shutdown_sender).is_none()
    }

    /// Signals shutdown, then releases the entry channels.
    ///
    /// Safe to call from any thread, any number of times, including while
    /// producers are blocked in a send: they return [`QueueClosed`].
    pub fn close(&self) {
        let Some(shutdown_sender) = lock(&self.shutdown_sender).take() else {
            return;
        };
        drop(shutdown_sender);
        self.requests.release();
        self.responses.release();
        debug!(target: QUEUE_TARGET, "dispatch queue closed");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
