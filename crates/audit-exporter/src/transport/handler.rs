//! Connection handling for the ingestion listener.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{LISTENER_TARGET, LineError};
use crate::classify::{Classification, classify};
use crate::queue::{DispatchQueue, QueueClosed};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Stream types accepted by the listener.
#[derive(Debug)]
pub enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Duplicates the underlying socket handle.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Shuts down one or both halves of the connection.
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(how),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(how),
        }
    }

    /// Human-readable remote identity used in log events.
    #[must_use]
    pub fn peer(&self) -> String {
        match self {
            Self::Tcp(stream) => stream
                .peer_addr()
                .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string()),
            #[cfg(unix)]
            Self::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string()))
                .unwrap_or_else(|| "unix".to_owned()),
        }
    }

    pub(crate) fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_nonblocking(nonblocking),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection until it ends. Implementations should
    /// avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Why a connection stopped being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionEnd {
    /// The peer closed its side of the stream.
    Eof,
    /// A line failed classification.
    Malformed,
    /// Reading failed or a line was oversized.
    ReadFailed,
    /// The dispatch queue closed while an entry was pending.
    QueueClosed,
}

impl ConnectionEnd {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eof => "eof",
            Self::Malformed => "malformed_line",
            Self::ReadFailed => "read_failed",
            Self::QueueClosed => "queue_closed",
        }
    }
}

/// Reads audit lines from a connection and forwards decoded entries to the
/// dispatch queue.
#[derive(Clone)]
pub struct EntryConnectionHandler {
    queue: Arc<DispatchQueue>,
    max_line_bytes: usize,
}

impl EntryConnectionHandler {
    /// Builds a handler feeding `queue`, rejecting lines longer than
    /// `max_line_bytes`.
    #[must_use]
    pub fn new(queue: Arc<DispatchQueue>, max_line_bytes: usize) -> Self {
        Self {
            queue,
            max_line_bytes,
        }
    }

    pub(crate) fn pump<R: BufRead>(&self, reader: &mut R, peer: &str) -> ConnectionEnd {
        let mut line = Vec::new();
        let mut line_number = 0_u64;
        loop {
            match read_line(reader, &mut line, self.max_line_bytes) {
                Ok(0) => return ConnectionEnd::Eof,
                Ok(_) => line_number += 1,
                Err(error) => {
                    warn!(
                        target: LISTENER_TARGET,
                        peer,
                        line = line_number + 1,
                        error = %error,
                        "failed to read audit line"
                    );
                    return ConnectionEnd::ReadFailed;
                }
            }

            let forwarded = match classify(&line) {
                Ok(Classification::Request(entry)) => self.queue.send_request(entry),
                Ok(Classification::Response(entry)) => self.queue.send_response(entry),
                Ok(Classification::Unrecognized { entry_type }) => {
                    debug!(
                        target: LISTENER_TARGET,
                        peer,
                        line = line_number,
                        entry_type = entry_type.as_deref(),
                        "skipping audit entry with unrecognised type"
                    );
                    continue;
                }
                Err(error) => {
                    warn!(
                        target: LISTENER_TARGET,
                        peer,
                        line = line_number,
                        reason = error.label(),
                        error = %error,
                        "malformed audit entry"
                    );
                    return ConnectionEnd::Malformed;
                }
            };

            if let Err(QueueClosed) = forwarded {
                debug!(
                    target: LISTENER_TARGET,
                    peer,
                    line = line_number,
                    "dispatch queue closed; abandoning entry"
                );
                return ConnectionEnd::QueueClosed;
            }
        }
    }
}

impl ConnectionHandler for EntryConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        let mut connection = OpenConnection::new(stream, &peer);
        let end = self.pump(&mut connection.reader, &peer);
        connection.end = Some(end);
    }
}

/// Owns a connection for the handler's lifetime and closes it on drop.
struct OpenConnection<'a> {
    reader: BufReader<ConnectionStream>,
    peer: &'a str,
    end: Option<ConnectionEnd>,
}

impl<'a> OpenConnection<'a> {
    fn new(stream: ConnectionStream, peer: &'a str) -> Self {
        info!(target: LISTENER_TARGET, peer, "connection accepted");
        Self {
            reader: BufReader::new(stream),
            peer,
            end: None,
        }
    }
}

impl Drop for OpenConnection<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.reader.get_ref().shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: LISTENER_TARGET,
                peer = self.peer,
                error = %error,
                "failed to shut down connection"
            );
        }
        info!(
            target: LISTENER_TARGET,
            peer = self.peer,
            reason = self.end.map_or("aborted", ConnectionEnd::as_str),
            "connection closed"
        );
    }
}

/// Reads one `\n`-terminated line into `buffer`, replacing its contents.
///
/// Returns the number of bytes read, zero at end of stream. A final line
/// without a terminator is returned as-is. Lines whose content exceeds
/// `limit` bytes are rejected.
pub(crate) fn read_line<R: BufRead>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
    limit: usize,
) -> Result<usize, LineError> {
    buffer.clear();
    let budget = u64::try_from(limit).map_or(u64::MAX, |limit| limit.saturating_add(1));
    let read = reader
        .take(budget)
        .read_until(b'\n', buffer)
        .map_err(|source| LineError::Io { source })?;

    let content = buffer.strip_suffix(b"\n").map_or(buffer.len(), <[u8]>::len);
    if content > limit {
        return Err(LineError::TooLong { limit });
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::thread;

    use rstest::rstest;

    use exporter_config::LogFormat;

    use super::*;
    use crate::entry::AuditEntry;
    use crate::tests::support::capture_logs;

    fn collect_entries(queue: &Arc<DispatchQueue>) -> thread::JoinHandle<Vec<AuditEntry>> {
        let queue = Arc::clone(queue);
        thread::spawn(move || {
            let mut entries = Vec::new();
            loop {
                crossbeam_channel::select! {
                    recv(queue.receive_request()) -> entry => match entry {
                        Ok(entry) => entries.push(AuditEntry::from(entry)),
                        Err(_) => break,
                    },
                    recv(queue.receive_response()) -> entry => match entry {
                        Ok(entry) => entries.push(AuditEntry::from(entry)),
                        Err(_) => break,
                    },
                    recv(queue.shutdown_signal()) -> _ => break,
                }
            }
            entries
        })
    }

    fn pump_input(input: &str, limit: usize) -> (ConnectionEnd, Vec<AuditEntry>) {
        let queue = Arc::new(DispatchQueue::new());
        let consumer = collect_entries(&queue);
        let handler = EntryConnectionHandler::new(Arc::clone(&queue), limit);

        let end = handler.pump(&mut Cursor::new(input.as_bytes().to_vec()), "test");
        queue.close();
        (end, consumer.join().expect("consumer thread"))
    }

    #[rstest]
    #[case("audit_exporter=debug", true)]
    #[case("audit_exporter=info", false)]
    fn unrecognised_types_are_logged_at_debug(#[case] filter: &str, #[case] logged: bool) {
        let output = capture_logs(filter, LogFormat::Compact, || {
            let (end, entries) = pump_input("{\"type\":\"foo\"}\n", 1024);
            assert_eq!(end, ConnectionEnd::Eof);
            assert!(entries.is_empty());
        });

        assert_eq!(
            output.contains("skipping audit entry with unrecognised type"),
            logged,
            "filter {filter} produced {output:?}"
        );
    }

    fn ids(entries: &[AuditEntry]) -> Vec<(&'static str, &str)> {
        entries
            .iter()
            .map(|entry| (entry.kind(), entry.request_id()))
            .collect()
    }

    #[test]
    fn forwards_entries_in_read_order() {
        let input = concat!(
            "{\"type\":\"request\",\"request\":{\"id\":\"a\"}}\n",
            "{\"type\":\"request\",\"request\":{\"id\":\"b\"}}\n",
            "{\"type\":\"response\",\"request\":{\"id\":\"a\"}}\n",
            "{\"type\":\"response\",\"request\":{\"id\":\"b\"}}",
        );

        let (end, entries) = pump_input(input, 1024);

        assert_eq!(end, ConnectionEnd::Eof);
        assert_eq!(
            ids(&entries),
            [
                ("request", "a"),
                ("request", "b"),
                ("response", "a"),
                ("response", "b"),
            ]
        );
    }

    #[test]
    fn unrecognised_lines_are_skipped() {
        let input = concat!(
            "{\"type\":\"foo\"}\n",
            "{\"type\":\"request\",\"request\":{\"id\":\"kept\"}}\n",
        );

        let (end, entries) = pump_input(input, 1024);

        assert_eq!(end, ConnectionEnd::Eof);
        assert_eq!(ids(&entries), [("request", "kept")]);
    }

    #[rstest]
    #[case("{\"type\":\"request\",\"time\":false}\n")]
    #[case("baz\n")]
    #[case("\n")]
    fn malformed_lines_stop_the_connection(#[case] bad_line: &str) {
        let input = format!("{bad_line}{{\"type\":\"request\",\"request\":{{\"id\":\"late\"}}}}\n");

        let (end, entries) = pump_input(&input, 1024);

        assert_eq!(end, ConnectionEnd::Malformed);
        assert!(entries.is_empty(), "nothing after a malformed line: {entries:?}");
    }

    #[test]
    fn oversized_lines_stop_the_connection() {
        let input = format!(
            "{{\"type\":\"request\",\"request\":{{\"id\":\"{}\"}}}}\n",
            "x".repeat(64)
        );

        let (end, entries) = pump_input(&input, 32);

        assert_eq!(end, ConnectionEnd::ReadFailed);
        assert!(entries.is_empty());
    }

    #[test]
    fn closed_queue_stops_the_connection() {
        let queue = Arc::new(DispatchQueue::new());
        queue.close();
        let handler = EntryConnectionHandler::new(Arc::clone(&queue), 1024);
        let mut input = Cursor::new(b"{\"type\":\"request\",\"request\":{\"id\":\"a\"}}\n".to_vec());

        assert_eq!(handler.pump(&mut input, "test"), ConnectionEnd::QueueClosed);
    }

    #[rstest]
    #[case(b"abcd\n".as_slice(), 4, Some(b"abcd\n".as_slice()))]
    #[case(b"abcd".as_slice(), 4, Some(b"abcd".as_slice()))]
    #[case(b"abcde\n".as_slice(), 4, None)]
    #[case(b"abcde".as_slice(), 4, None)]
    fn read_line_enforces_the_limit(
        #[case] input: &[u8],
        #[case] limit: usize,
        #[case] expected: Option<&[u8]>,
    ) {
        let mut reader = Cursor::new(input.to_vec());
        let mut buffer = Vec::new();

        let outcome = read_line(&mut reader, &mut buffer, limit);

        match expected {
            Some(line) => {
                assert_eq!(outcome.expect("line within limit"), line.len());
                assert_eq!(buffer, line);
            }
            None => assert!(matches!(outcome, Err(LineError::TooLong { limit: 4 }))),
        }
    }

    #[test]
    fn read_line_reports_end_of_stream() {
        let mut reader = Cursor::new(b"one\n".to_vec());
        let mut buffer = Vec::new();

        assert_eq!(read_line(&mut reader, &mut buffer, 16).expect("first line"), 4);
        assert_eq!(read_line(&mut reader, &mut buffer, 16).expect("eof"), 0);
        assert!(buffer.is_empty());
    }
}
