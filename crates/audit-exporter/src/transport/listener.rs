//! Listener implementation for ingestion sockets.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use exporter_config::{SocketEndpoint, TcpFamily};

use super::backoff::is_transient;
use super::{
    AcceptBackoff, ConnectionHandler, ConnectionRegistry, ConnectionStream, LISTENER_TARGET,
    ListenerError,
};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

const IDLE_POLL: Duration = Duration::from_millis(25);

/// Listener that binds to a socket endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
    backoff: AcceptBackoff,
    registry: ConnectionRegistry,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Source of accepted connections.
///
/// `Ok(None)` means no connection is pending.
pub(crate) trait Accept {
    fn accept_connection(&mut self) -> io::Result<Option<ConnectionStream>>;
}

impl Accept for ListenerKind {
    fn accept_connection(&mut self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(tcp) => tcp.accept().map(|(stream, _)| ConnectionStream::Tcp(stream)),
            #[cfg(unix)]
            Self::Unix(unix) => unix
                .accept()
                .map(|(stream, _)| ConnectionStream::Unix(stream)),
        };
        let stream = match accepted {
            Ok(stream) => stream,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(error) => return Err(error),
        };
        if let Err(error) = stream.set_nonblocking(false) {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                "dropping connection that could not be made blocking"
            );
            return Ok(None);
        }
        Ok(Some(stream))
    }
}

impl SocketListener {
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let listener = match endpoint {
            SocketEndpoint::Tcp { host, port, family } => {
                ListenerKind::Tcp(bind_tcp(host, *port, *family)?)
            }
            SocketEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    ListenerKind::Unix(bind_unix(path.as_std_path())?)
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    return Err(ListenerError::UnsupportedUnix {
                        endpoint: endpoint.to_string(),
                    });
                }
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
            backoff: AcceptBackoff::default(),
            registry: ConnectionRegistry::new(),
        })
    }

    /// Replaces the delay schedule used after transient accept errors.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: AcceptBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Tracks accepted connections in `registry` instead of a private one.
    #[must_use]
    pub fn with_registry(mut self, registry: ConnectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Bound TCP address; `None` for Unix sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// Runs the accept loop on a background thread.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.enable_nonblocking()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = self.registry.clone();
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || self.accept_until(&handler, &shutdown_flag));
        Ok(ListenerHandle {
            shutdown,
            connections,
            handle: Some(handle),
        })
    }

    /// Runs the accept loop on the calling thread until `shutdown` is set or
    /// a non-transient accept error occurs.
    pub fn run(
        self,
        handler: Arc<dyn ConnectionHandler>,
        shutdown: &AtomicBool,
    ) -> Result<(), ListenerError> {
        self.enable_nonblocking()?;
        self.accept_until(&handler, shutdown)
    }

    fn enable_nonblocking(&self) -> Result<(), ListenerError> {
        let result = match &self.listener {
            ListenerKind::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            ListenerKind::Unix(listener) => listener.set_nonblocking(true),
        };
        result.map_err(|source| {
            #[cfg(unix)]
            cleanup_unix_socket(&self.endpoint);
            ListenerError::NonBlocking { source }
        })
    }

    // Consumes the listener so the socket is closed exactly once, when the
    // loop ends for any reason.
    fn accept_until(
        mut self,
        handler: &Arc<dyn ConnectionHandler>,
        shutdown: &AtomicBool,
    ) -> Result<(), ListenerError> {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "socket listener active"
        );
        let result = accept_loop(
            &mut self.listener,
            handler,
            &self.registry,
            &mut self.backoff,
            shutdown,
            thread::sleep,
        );

        #[cfg(unix)]
        cleanup_unix_socket(&self.endpoint);
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "socket listener stopped"
        );
        result
    }
}

/// Handle to the background listener thread.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    connections: ConnectionRegistry,
    handle: Option<thread::JoinHandle<Result<(), ListenerError>>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop. Open connections are unaffected.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Connections accepted by this listener that are still being handled.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Returns true once the accept loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .is_none_or(thread::JoinHandle::is_finished)
    }

    /// Waits for the accept loop and returns how it ended.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(ListenerError::ThreadPanic)),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

pub(crate) fn accept_loop<A, S>(
    acceptor: &mut A,
    handler: &Arc<dyn ConnectionHandler>,
    registry: &ConnectionRegistry,
    backoff: &mut AcceptBackoff,
    shutdown: &AtomicBool,
    mut sleep: S,
) -> Result<(), ListenerError>
where
    A: Accept + ?Sized,
    S: FnMut(Duration),
{
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match acceptor.accept_connection() {
            Ok(Some(stream)) => {
                last_error = None;
                backoff.reset();
                dispatch(stream, handler, registry);
            }
            Ok(None) => sleep(IDLE_POLL),
            Err(source) if is_transient(&source) => {
                let delay = backoff.next_delay();
                let kind = source.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %source,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient accept error"
                    );
                }
                last_error = Some(kind);
                sleep(delay);
            }
            Err(source) => {
                error!(
                    target: LISTENER_TARGET,
                    error = %source,
                    "fatal accept error; listener stopping"
                );
                return Err(ListenerError::Accept { source });
            }
        }
    }
    Ok(())
}

fn dispatch(
    stream: ConnectionStream,
    handler: &Arc<dyn ConnectionHandler>,
    registry: &ConnectionRegistry,
) {
    let ticket = registry.register(&stream);
    let handler = Arc::clone(handler);
    let spawned = thread::Builder::new()
        .name("audit-connection".to_owned())
        .spawn(move || {
            let _ticket = ticket;
            handler.handle(stream);
        });
    if let Err(error) = spawned {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            "failed to spawn connection handler; connection dropped"
        );
    }
}

fn bind_tcp(host: &str, port: u16, family: TcpFamily) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| family.admits(addr))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_string(),
            port,
            family,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::UnixInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(error) => {
                return Err(ListenerError::UnixConnect {
                    path: path.display().to_string(),
                    source: error,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let SocketEndpoint::Unix { path } = endpoint else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
