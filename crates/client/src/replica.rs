use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call I/O deadline on a replica connection. The quorum engine adds
/// no deadlines of its own.
const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// A single-node storage endpoint the quorum engine can read and write.
///
/// Failure is part of the signature: a dead or misbehaving node answers
/// `get` with `None` and `set` with `false`, and the quorum decision
/// absorbs it.
pub trait ReplicaStore {
    /// Fetches a value, `None` on miss *or* on any transport failure.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stores a value, `false` on rejection or transport failure.
    fn set(&self, key: &[u8], value: &[u8]) -> bool;

    /// The endpoint identifier, for ordering and diagnostics.
    fn endpoint(&self) -> &str;
}

/// Memcached text-protocol adapter over one TCP endpoint.
///
/// The connection is dialed at construction; failure to connect is logged
/// and the descriptor stays registered with a dead connection that is
/// re-dialed lazily on the next call. Any I/O or framing error drops the
/// connection and reports the call as failed. The stream sits behind a
/// `Mutex` so calls take `&self` and interleave safely across threads.
pub struct Replica {
    addr: String,
    conn: Mutex<Option<BufReader<TcpStream>>>,
}

impl Replica {
    /// Dials `addr`, keeping the descriptor alive even when the dial
    /// fails.
    pub fn connect(addr: &str) -> Self {
        let conn = match Self::dial(addr) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(addr, error = %e, "replica unreachable at startup");
                None
            }
        };
        Self {
            addr: addr.to_string(),
            conn: Mutex::new(conn),
        }
    }

    fn dial(addr: &str) -> std::io::Result<BufReader<TcpStream>> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(RPC_TIMEOUT))?;
        stream.set_write_timeout(Some(RPC_TIMEOUT))?;
        Ok(BufReader::new(stream))
    }

    /// Runs `op` against a live connection, re-dialing once if the slot is
    /// empty. On any error the connection is dropped so the next call
    /// starts from a fresh dial.
    fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut BufReader<TcpStream>) -> std::io::Result<T>,
    ) -> Option<T> {
        let mut guard = match self.conn.lock() {
            Ok(g) => g,
            Err(_) => return None,
        };
        if guard.is_none() {
            match Self::dial(&self.addr) {
                Ok(stream) => *guard = Some(stream),
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "redial failed");
                    return None;
                }
            }
        }
        let Some(conn) = guard.as_mut() else {
            return None;
        };
        match op(conn) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(addr = %self.addr, error = %e, "replica rpc failed");
                *guard = None;
                None
            }
        }
    }
}

/// Reads one CRLF-terminated protocol line, without the terminator.
fn read_line(conn: &mut BufReader<TcpStream>) -> std::io::Result<String> {
    let mut line = String::new();
    let n = conn.read_line(&mut line)?;
    if n == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed",
        ));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn protocol_error(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, what.to_string())
}

impl ReplicaStore for Replica {
    /// `get <key>\r\n` → `VALUE <key> <flags> <bytes>\r\n<data>\r\nEND\r\n`
    /// on a hit, bare `END\r\n` on a miss.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.with_conn(|conn| {
            let stream = conn.get_mut();
            stream.write_all(b"get ")?;
            stream.write_all(key)?;
            stream.write_all(b"\r\n")?;
            stream.flush()?;

            let header = read_line(conn)?;
            if header == "END" {
                return Ok(None);
            }
            let mut parts = header.split_whitespace();
            if parts.next() != Some("VALUE") {
                return Err(protocol_error("expected VALUE or END"));
            }
            let _key = parts.next().ok_or_else(|| protocol_error("missing key"))?;
            let _flags = parts.next().ok_or_else(|| protocol_error("missing flags"))?;
            let bytes: usize = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| protocol_error("bad byte count"))?;

            let mut value = vec![0u8; bytes];
            conn.read_exact(&mut value)?;
            let mut crlf = [0u8; 2];
            conn.read_exact(&mut crlf)?;
            if &crlf != b"\r\n" {
                return Err(protocol_error("value not CRLF-terminated"));
            }
            if read_line(conn)? != "END" {
                return Err(protocol_error("missing END"));
            }
            Ok(Some(value))
        })
        .flatten()
    }

    /// `set <key> 0 0 <bytes>\r\n<data>\r\n` → `STORED\r\n`.
    fn set(&self, key: &[u8], value: &[u8]) -> bool {
        self.with_conn(|conn| {
            let stream = conn.get_mut();
            stream.write_all(b"set ")?;
            stream.write_all(key)?;
            write!(stream, " 0 0 {}\r\n", value.len())?;
            stream.write_all(value)?;
            stream.write_all(b"\r\n")?;
            stream.flush()?;

            Ok(read_line(conn)? == "STORED")
        })
        .unwrap_or(false)
    }

    fn endpoint(&self) -> &str {
        &self.addr
    }
}
