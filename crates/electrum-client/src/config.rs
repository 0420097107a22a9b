use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ElectrumError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// How the TCP stream to the server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// TLS with the certificate chain checked against the webpki roots.
    #[default]
    Verified,
    /// TLS without certificate or hostname validation.
    ///
    /// Public Electrum servers commonly present self-signed or mismatched
    /// certificates. Selecting this mode is a conscious trust-on-first-use
    /// decision: the channel is encrypted but the peer is not authenticated.
    AcceptInvalidCerts,
    /// Raw TCP, for `tcp://` servers and local testing.
    Plaintext,
}

/// Where and how to reach an Electrum server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default = "default_connect_timeout", with = "secs")]
    pub connect_timeout: Duration,
    #[serde(default = "default_read_timeout", with = "secs")]
    pub read_timeout: Duration,
    #[serde(default = "default_write_timeout", with = "secs")]
    pub write_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

fn default_write_timeout() -> Duration {
    DEFAULT_WRITE_TIMEOUT
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: TlsMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Use `timeout` for connect, read and write alike.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.read_timeout = timeout;
        self.write_timeout = timeout;
        self
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.tls {
            TlsMode::Plaintext => "tcp",
            TlsMode::Verified | TlsMode::AcceptInvalidCerts => "ssl",
        };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// Parses `host:port`, optionally prefixed with `ssl://` or `tcp://`.
///
/// `tcp://` selects [`TlsMode::Plaintext`]; otherwise the default TLS mode is
/// used and callers opt into [`TlsMode::AcceptInvalidCerts`] explicitly.
impl FromStr for ServerConfig {
    type Err = ElectrumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (tls, rest) = if let Some(rest) = s.strip_prefix("tcp://") {
            (TlsMode::Plaintext, rest)
        } else if let Some(rest) = s.strip_prefix("ssl://") {
            (TlsMode::default(), rest)
        } else {
            (TlsMode::default(), s)
        };

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| ElectrumError::InvalidServer(format!("{s}: expected host:port")))?;
        if host.is_empty() {
            return Err(ElectrumError::InvalidServer(format!("{s}: empty host")));
        }
        let port: u16 = port
            .parse()
            .map_err(|e| ElectrumError::InvalidServer(format!("{s}: bad port: {e}")))?;

        Ok(ServerConfig::new(host, port).with_tls(tls))
    }
}
