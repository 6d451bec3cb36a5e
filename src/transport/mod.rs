// MIT License - Copyright (c) 2026 Peter Wright
// Transport layer: endpoints, connectors and the socket session

pub mod session;

use std::fmt;
use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::error::{RelayError, Result};

/// Host/port pair identifying the board's TCP listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Session state as seen from outside the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Opens byte streams to an endpoint.
///
/// [`TcpConnector`] is the production implementation; tests plug in
/// in-memory streams to script device behaviour and count attempts.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open one connection, giving up after `connect_timeout`.
    fn connect(
        &self,
        endpoint: &Endpoint,
        connect_timeout: Duration,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Plain TCP, no TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &Endpoint, connect_timeout: Duration) -> Result<TcpStream> {
        let stream = timeout(
            connect_timeout,
            TcpStream::connect((endpoint.host(), endpoint.port())),
        )
        .await
        .map_err(|_| RelayError::ConnectTimeout)??;

        // Commands are a few bytes each; don't let Nagle hold them back.
        stream.set_nodelay(true)?;
        debug!("TCP socket connected to {}", endpoint);
        Ok(stream)
    }
}
