use thiserror::Error;

/// Electrum client errors.
///
/// `Transport` and `Tls` mean the socket is gone; the client drops it and
/// must be reconnected. `Protocol` and `Response` leave the connection open.
#[derive(Debug, Error)]
pub enum ElectrumError {
    #[error("not connected to Electrum server")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Response(serde_json::Value),

    #[error("invalid server address: {0}")]
    InvalidServer(String),
}

impl ElectrumError {
    /// Whether the connection that produced this error is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ElectrumError::Transport(_) | ElectrumError::Tls(_))
    }
}
