//! The byte-transport abstraction.
//!
//! Every connection runs over an injected bidirectional byte stream, so
//! tests (and exotic deployments) can substitute the dialer. The default
//! is plain TCP.

use std::{io, time::Duration};

use async_trait::async_trait;
use msnp_types::core::Endpoint;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// A bidirectional reliable byte stream.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Creates transports. One `connect` call per NS hop or switchboard.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>>;
}

/// The default TCP dialer.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Dial timeout. Connects that exceed it fail with `TimedOut`.
    pub timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        let address = (endpoint.host.as_str(), endpoint.port);

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        // Interactive traffic; latency beats throughput here.
        stream.set_nodelay(true)?;

        Ok(Box::new(stream))
    }
}
