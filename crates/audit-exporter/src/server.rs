//! Entry points wiring a listener, the entry handler and the dispatch queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use exporter_config::{Config, DEFAULT_MAX_LINE_BYTES, SocketEndpoint};

use crate::queue::DispatchQueue;
use crate::transport::{
    AcceptBackoff, ConnectionRegistry, EntryConnectionHandler, ListenerError, ListenerHandle,
    SocketListener,
};

/// Settings shared by [`serve`], [`listen_and_serve`] and [`spawn_server`].
///
/// Clones share the same connection registry and shutdown flag.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Longest audit line accepted before a connection is dropped.
    pub max_line_bytes: usize,
    /// Delay schedule for transient accept errors.
    pub backoff: AcceptBackoff,
    /// Registry receiving every accepted connection.
    pub connections: ConnectionRegistry,
    shutdown: Arc<AtomicBool>,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            backoff: AcceptBackoff::default(),
            connections: ConnectionRegistry::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ServeOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let (initial, max) = config.accept_backoff();
        Self {
            max_line_bytes: config.max_line_bytes(),
            backoff: AcceptBackoff::new(initial, max),
            ..Self::default()
        }
    }

    /// Makes a running [`serve`] call return `Ok(())` at its next poll.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn prepare(&self, listener: SocketListener) -> SocketListener {
        listener
            .with_backoff(self.backoff)
            .with_registry(self.connections.clone())
    }

    fn handler(&self, queue: Arc<DispatchQueue>) -> Arc<EntryConnectionHandler> {
        Arc::new(EntryConnectionHandler::new(queue, self.max_line_bytes))
    }
}

/// Resolves `network` and `address`, binds, and serves on the calling thread.
///
/// # Errors
///
/// Returns [`ListenerError::Endpoint`] for an unusable network or address,
/// a bind error when the socket cannot be opened, or
/// [`ListenerError::Accept`] when accepting fails for a non-transient reason.
pub fn listen_and_serve(
    network: &str,
    address: &str,
    queue: Arc<DispatchQueue>,
    options: &ServeOptions,
) -> Result<(), ListenerError> {
    let endpoint = SocketEndpoint::from_network(network, address)
        .map_err(|source| ListenerError::Endpoint { source })?;
    endpoint
        .prepare_filesystem()
        .map_err(|source| ListenerError::Prepare { source })?;
    let listener = SocketListener::bind(&endpoint)?;
    serve(listener, queue, options)
}

/// Accepts connections from `listener` on the calling thread, feeding decoded
/// entries into `queue`, until [`ServeOptions::request_shutdown`] is called or
/// a non-transient accept error occurs.
pub fn serve(
    listener: SocketListener,
    queue: Arc<DispatchQueue>,
    options: &ServeOptions,
) -> Result<(), ListenerError> {
    let handler = options.handler(queue);
    options.prepare(listener).run(handler, &options.shutdown)
}

/// Like [`serve`], but runs the accept loop on a background thread.
pub fn spawn_server(
    listener: SocketListener,
    queue: Arc<DispatchQueue>,
    options: &ServeOptions,
) -> Result<ListenerHandle, ListenerError> {
    let handler = options.handler(queue);
    options.prepare(listener).start(handler)
}
