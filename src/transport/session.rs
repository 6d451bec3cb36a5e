// MIT License - Copyright (c) 2026 Peter Wright
// Socket session state

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::error::{RelayError, Result};
use crate::event::{DeviceEvent, EventSender};
use crate::transport::{ConnectionState, Connector, Endpoint};

enum SessionState<S> {
    Disconnected,
    Connecting,
    Connected(S),
}

/// The one socket a client may have open.
///
/// Lives behind the client's mutex, so holding `&mut Session` is the right
/// to talk to the device. The stream is owned by the state value: leaving
/// `Connected` drops it, which closes the socket on every exit path.
pub(crate) struct Session<S> {
    state: SessionState<S>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: EventSender,
    /// Emit Connected/Disconnected events. Off for per-command connections,
    /// which would otherwise announce every poll.
    announce: bool,
}

impl<S> Session<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(
        state_tx: watch::Sender<ConnectionState>,
        event_tx: EventSender,
        announce: bool,
    ) -> Self {
        Self {
            state: SessionState::Disconnected,
            state_tx,
            event_tx,
            announce,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Open a connection. Disconnected → Connecting → Connected, or back to
    /// Disconnected if the connect fails.
    pub(crate) async fn open<C>(
        &mut self,
        connector: &C,
        endpoint: &Endpoint,
        connect_timeout: Duration,
    ) -> Result<()>
    where
        C: Connector<Stream = S>,
    {
        if self.is_connected() {
            return Ok(());
        }

        self.state = SessionState::Connecting;
        self.publish(ConnectionState::Connecting);

        match connector.connect(endpoint, connect_timeout).await {
            Ok(stream) => {
                self.state = SessionState::Connected(stream);
                self.publish(ConnectionState::Connected);
                if self.announce {
                    let _ = self.event_tx.send(DeviceEvent::Connected);
                }
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                self.publish(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Drop the connection without ceremony.
    pub(crate) fn close(&mut self) {
        let was_connected = self.is_connected();
        self.state = SessionState::Disconnected;
        self.publish(ConnectionState::Disconnected);
        if was_connected && self.announce {
            let _ = self.event_tx.send(DeviceEvent::Disconnected);
        }
    }

    /// Close the connection with a TCP shutdown first. Shutdown failures are
    /// logged, the session ends up Disconnected regardless.
    pub(crate) async fn shutdown(&mut self, endpoint: &Endpoint) {
        if let SessionState::Connected(stream) = &mut self.state
            && let Err(e) = stream.shutdown().await
        {
            warn!("Failed to shut down connection to {}: {}", endpoint, e);
        }
        self.close();
    }

    /// Write one command and read one response.
    ///
    /// A single read of up to `buffer_size` bytes is the whole message. Any
    /// failure closes the session so the next attempt starts clean.
    pub(crate) async fn exchange(
        &mut self,
        payload: &[u8],
        buffer_size: usize,
        io_timeout: Duration,
    ) -> Result<Vec<u8>> {
        let result = match &mut self.state {
            SessionState::Connected(stream) => {
                exchange_on(stream, payload, buffer_size, io_timeout).await
            }
            _ => Err(RelayError::Disconnected),
        };

        if result.is_err() {
            self.close();
        }
        result
    }
}

async fn exchange_on<S>(
    stream: &mut S,
    payload: &[u8],
    buffer_size: usize,
    io_timeout: Duration,
) -> Result<Vec<u8>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    timeout(io_timeout, async {
        stream.write_all(payload).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| RelayError::WriteTimeout)??;

    let mut buf = vec![0u8; buffer_size];
    let n = timeout(io_timeout, stream.read(&mut buf))
        .await
        .map_err(|_| RelayError::ReadTimeout)??;

    if n == 0 {
        return Err(RelayError::EmptyResponse);
    }
    buf.truncate(n);
    debug!("Received {} bytes", n);
    Ok(buf)
}
