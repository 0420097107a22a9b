use std::io::{self, BufRead, BufReader, Read, Write};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ElectrumError;
use crate::protocol::{
    decode_line, encode_request, Balance, Incoming, UnspentOutput, METHOD_BROADCAST,
    METHOD_GET_BALANCE, METHOD_LIST_UNSPENT,
};
use crate::transport::{self, ElectrumStream};

/// Longest response line accepted, newline included.
pub const MAX_LINE_BYTES: u64 = 8 * 1024 * 1024;

/// An open session. Reads go through one persistent buffer so bytes past the
/// end of a response line are kept for the next one.
struct Connection {
    reader: BufReader<Box<dyn ElectrumStream>>,
}

impl Connection {
    fn round_trip(&mut self, line: &[u8], id: u64) -> Result<Value, ElectrumError> {
        let stream = self.reader.get_mut();
        stream.write_all(line)?;
        stream.flush()?;

        loop {
            let raw = self.read_line()?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match decode_line(&raw, id)? {
                Incoming::Notification(method) => {
                    debug!(%method, "skipping server notification");
                }
                Incoming::Unmatched(other) => {
                    debug!(expected = id, got = %other, "skipping response to another request");
                }
                Incoming::Response(result) => return result,
            }
        }
    }

    /// Read up to and including the next `\n`, however many socket reads
    /// that takes. A line longer than [`MAX_LINE_BYTES`] is a transport
    /// error: the rest of it is still unread, so the stream cannot be reused.
    fn read_line(&mut self) -> Result<Vec<u8>, ElectrumError> {
        let mut line = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_LINE_BYTES + 1)
            .read_until(b'\n', &mut line)?;
        if line.len() as u64 > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("response line exceeds {MAX_LINE_BYTES} bytes"),
            )
            .into());
        }
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )
            .into());
        }
        if line.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed in the middle of a response",
            )
            .into());
        }
        debug!(bytes = line.len(), "electrum response line");
        Ok(line)
    }
}

/// Blocking Electrum JSON-RPC client over a single persistent connection.
///
/// One request is in flight at a time: each call writes one line and blocks
/// until the matching response line arrives or the socket times out.
/// Nothing is retried.
#[derive(Default)]
pub struct ElectrumClient {
    conn: Option<Connection>,
    next_id: u64,
}

impl ElectrumClient {
    /// A client in the disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A client already connected over `stream`.
    pub fn from_stream(stream: impl ElectrumStream + 'static) -> Self {
        let mut client = Self::new();
        client.attach(Box::new(stream));
        client
    }

    /// Connect to `server`, replacing any existing connection.
    pub fn connect(&mut self, server: &ServerConfig) -> Result<(), ElectrumError> {
        self.disconnect();
        let stream = transport::open(server)?;
        self.attach(stream);
        info!(server = %server, "connected to electrum server");
        Ok(())
    }

    /// Use an already-established stream as the connection.
    pub fn attach(&mut self, stream: Box<dyn ElectrumStream>) {
        self.disconnect();
        self.conn = Some(Connection {
            reader: BufReader::new(stream),
        });
    }

    /// Close the connection. Does nothing when not connected.
    pub fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.reader.get_mut().close();
            info!("disconnected from electrum server");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Send one JSON-RPC request and return its `result`.
    ///
    /// On a transport failure the connection is dropped and the client is
    /// left disconnected. Protocol and response errors leave it open.
    pub fn request(&mut self, method: &str, params: Vec<Value>) -> Result<Value, ElectrumError> {
        let conn = self.conn.as_mut().ok_or(ElectrumError::NotConnected)?;

        self.next_id += 1;
        let id = self.next_id;
        let line = encode_request(id, method, &params);
        debug!(id, method, bytes = line.len(), "electrum request");

        let result = conn.round_trip(&line, id);
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(method, error = %e, "electrum connection lost");
                self.conn = None;
            }
        }
        result
    }

    fn request_typed<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ElectrumError> {
        let value = self.request(method, params)?;
        serde_json::from_value(value)
            .map_err(|e| ElectrumError::Protocol(format!("unexpected {method} result: {e}")))
    }

    /// `blockchain.scripthash.get_balance`
    pub fn get_balance(&mut self, scripthash: &str) -> Result<Balance, ElectrumError> {
        self.request_typed(METHOD_GET_BALANCE, vec![json!(scripthash)])
    }

    /// `blockchain.scripthash.listunspent`, in server order.
    pub fn list_unspent(&mut self, scripthash: &str) -> Result<Vec<UnspentOutput>, ElectrumError> {
        self.request_typed(METHOD_LIST_UNSPENT, vec![json!(scripthash)])
    }

    /// `blockchain.transaction.broadcast`; returns the txid the server reports.
    pub fn broadcast(&mut self, raw_tx_hex: &str) -> Result<String, ElectrumError> {
        self.request_typed(METHOD_BROADCAST, vec![json!(raw_tx_hex)])
    }
}

impl Drop for ElectrumClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
