//! Test helpers for the transport module.

use std::collections::VecDeque;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::listener::Accept;
use super::{ConnectionHandler, ConnectionStream};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns the server and client ends of a loopback TCP connection.
pub(crate) fn loopback_pair() -> (ConnectionStream, TcpStream) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback listener");
    let addr = listener.local_addr().expect("loopback address");
    let client = TcpStream::connect(addr).expect("connect loopback client");
    let (server, _) = listener.accept().expect("accept loopback client");
    (ConnectionStream::Tcp(server), client)
}

/// Scripted accept outcomes, replayed in order.
pub(crate) enum Scripted {
    Connection,
    Idle,
    Fail(io::Error),
}

pub(crate) struct ScriptedAcceptor {
    script: VecDeque<Scripted>,
    // Client ends are held so accepted connections stay open.
    clients: Vec<TcpStream>,
}

impl ScriptedAcceptor {
    pub(crate) fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: script.into_iter().collect(),
            clients: Vec::new(),
        }
    }
}

impl Accept for ScriptedAcceptor {
    fn accept_connection(&mut self) -> io::Result<Option<ConnectionStream>> {
        match self.script.pop_front() {
            Some(Scripted::Connection) => {
                let (server, client) = loopback_pair();
                self.clients.push(client);
                Ok(Some(server))
            }
            Some(Scripted::Idle) => Ok(None),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "accept script exhausted",
            )),
        }
    }
}
