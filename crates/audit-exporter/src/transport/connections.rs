//! Registry of live connections, used to drain or force-close them at
//! shutdown.

use std::collections::HashMap;
use std::io;
use std::net::Shutdown;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use super::{ConnectionStream, LISTENER_TARGET};

#[derive(Debug, Default)]
struct Tracked {
    next_id: u64,
    // `None` when the handle could not be duplicated; such connections still
    // count as active but cannot be force-closed.
    open: HashMap<u64, Option<ConnectionStream>>,
}

#[derive(Debug, Default)]
struct RegistryState {
    tracked: Mutex<Tracked>,
    drained: Condvar,
}

impl RegistryState {
    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle onto the set of connections whose handlers are running.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    state: Arc<RegistryState>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `stream` as active until the returned ticket drops.
    pub fn register(&self, stream: &ConnectionStream) -> ConnectionTicket {
        let handle = match stream.try_clone() {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "failed to duplicate connection handle; it cannot be force-closed"
                );
                None
            }
        };
        let mut tracked = self.state.lock();
        let id = tracked.next_id;
        tracked.next_id += 1;
        tracked.open.insert(id, handle);
        ConnectionTicket {
            id,
            state: Arc::clone(&self.state),
        }
    }

    /// Number of connections still being handled.
    #[must_use]
    pub fn active(&self) -> usize {
        self.state.lock().open.len()
    }

    /// Blocks until no connection is active or `timeout` elapses.
    ///
    /// Returns true when every connection finished.
    pub fn wait_for_drain(&self, timeout: Duration) -> bool {
        let tracked = self.state.lock();
        let (tracked, _) = self
            .state
            .drained
            .wait_timeout_while(tracked, timeout, |tracked| !tracked.open.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        tracked.open.is_empty()
    }

    /// Shuts down every active connection so blocked reads return.
    ///
    /// Returns the number of connections that were shut down.
    pub fn close_all(&self) -> usize {
        let tracked = self.state.lock();
        let mut closed = 0;
        for stream in tracked.open.values().flatten() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => closed += 1,
                Err(error) if error.kind() == io::ErrorKind::NotConnected => {}
                Err(error) => warn!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "failed to force-close connection"
                ),
            }
        }
        debug!(target: LISTENER_TARGET, closed, "force-closed connections");
        closed
    }
}

/// Keeps a connection registered while its handler runs.
pub struct ConnectionTicket {
    id: u64,
    state: Arc<RegistryState>,
}

impl Drop for ConnectionTicket {
    fn drop(&mut self) {
        let mut tracked = self.state.lock();
        tracked.open.remove(&self.id);
        if tracked.open.is_empty() {
            self.state.drained.notify_all();
        }
    }
}
