//! Socket listener and per-connection ingestion.
//!
//! The transport module binds the configured endpoint, accepts connections
//! on a single loop, and runs one handler thread per connection.

mod backoff;
mod connections;
mod errors;
mod handler;
mod listener;
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::backoff::AcceptBackoff;
pub use self::connections::{ConnectionRegistry, ConnectionTicket};
pub use self::errors::{LineError, ListenerError};
pub use self::handler::{ConnectionHandler, ConnectionStream, EntryConnectionHandler};
pub use self::listener::{ListenerHandle, SocketListener};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::transport");
