// MIT License - Copyright (c) 2026 Peter Wright
// Relay board client

use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::{ConnectionMode, DeviceConfig};
use crate::constants::MAX_RETRIES;
use crate::error::{RelayError, Result};
use crate::event::{event_channel, Diagnostic, DeviceEvent, EventReceiver, EventSender};
use crate::protocol::{Command, StatusSnapshot};
use crate::transport::session::Session;
use crate::transport::{ConnectionState, Connector, Endpoint, TcpConnector};

/// Client for one relay board.
///
/// All traffic goes through a single session lock, so at most one command
/// is on the wire at a time no matter how many tasks share the client.
/// Status polling and switch commands are therefore mutually exclusive,
/// and a momentary switch holds the lock for its whole pulse.
///
/// # Example
///
/// ```no_run
/// use tcp_switch::{DeviceClient, DeviceConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = DeviceConfig::builder()
///         .name("Garage")
///         .host("192.168.1.50")
///         .channel_count(2)
///         .build();
///
///     let client = DeviceClient::new(config)?;
///     client.turn_on(0).await;
///     println!("CH1 on: {}", client.get_status(0).await);
///     Ok(())
/// }
/// ```
pub struct DeviceClient<C: Connector = TcpConnector> {
    config: DeviceConfig,
    endpoint: Endpoint,
    channel_count: usize,
    connector: C,
    session: Mutex<Session<C::Stream>>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: EventSender,
    last_snapshot: RwLock<Option<StatusSnapshot>>,
}

impl DeviceClient<TcpConnector> {
    /// Create a TCP client. Validates the configuration, does no I/O.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> DeviceClient<C> {
    /// Create a client that opens its connections through `connector`.
    pub fn with_connector(config: DeviceConfig, connector: C) -> Result<Self> {
        config.validate()?;

        let endpoint = config.endpoint();
        let channel_count = config.channels.channel_count() as usize;
        let (event_tx, _event_rx) = event_channel(256);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let announce = config.connection_mode == ConnectionMode::Persistent;

        info!(
            "Initializing {} - TCP Switch {} with {} channels",
            config.name, endpoint, channel_count
        );

        Ok(Self {
            session: Mutex::new(Session::new(state_tx, event_tx.clone(), announce)),
            config,
            endpoint,
            channel_count,
            connector,
            state_rx,
            event_tx,
            last_snapshot: RwLock::new(None),
        })
    }

    // --- Accessors ---

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of addressable channels.
    pub fn channels(&self) -> usize {
        self.channel_count
    }

    pub fn switch_name(&self) -> &str {
        &self.config.name
    }

    /// Pulse length of a switch command, zero on a latching board.
    pub fn momentary_delay(&self) -> Duration {
        self.config.momentary_delay()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch session state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to device events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> EventSender {
        self.event_tx.clone()
    }

    /// Last status read from the device, if any.
    pub async fn last_snapshot(&self) -> Option<StatusSnapshot> {
        self.last_snapshot.read().await.clone()
    }

    // --- Lifecycle ---

    /// Open the persistent connection. A no-op when already connected, or
    /// when connections are opened per command.
    pub async fn connect(&self) {
        if let Err(e) = self.try_connect().await {
            error!("Failed to connect {}, Error: {}", self.endpoint, e);
        }
    }

    /// [`connect`](Self::connect), returning the failure instead of logging it.
    pub async fn try_connect(&self) -> Result<()> {
        if self.config.connection_mode == ConnectionMode::Ephemeral {
            debug!("{} uses per-command connections, nothing to open", self.endpoint);
            return Ok(());
        }

        let mut session = self.session.lock().await;
        if session.is_connected() {
            return Ok(());
        }

        info!("Connecting to {}", self.endpoint);
        session
            .open(&self.connector, &self.endpoint, self.config.connect_timeout())
            .await?;
        info!("{} connected", self.endpoint);
        Ok(())
    }

    /// Close the connection if one is open. Safe to call at any time;
    /// shutdown errors are logged.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if !session.is_connected() {
            debug!("{} already disconnected", self.endpoint);
            return;
        }

        info!("Disconnecting from {}", self.endpoint);
        session.shutdown(&self.endpoint).await;
        info!("{} connection terminated", self.endpoint);
    }

    /// Drop any open connection and open a fresh one.
    pub async fn reconnect(&self) {
        self.disconnect().await;
        self.connect().await;
    }

    // --- Commands ---

    /// Send a raw command and return the response text.
    ///
    /// Retries on fresh connections up to `MAX_RETRIES` times after the
    /// first attempt; the only per-attempt check is that the device
    /// answered at all.
    pub async fn send_command(&self, payload: &str) -> Result<String> {
        self.execute(payload, |raw| Ok(String::from_utf8_lossy(raw).into_owned()))
            .await
    }

    /// Read one channel (0-based).
    pub async fn try_get_status(&self, channel: usize) -> Result<bool> {
        self.check_channel(channel)?;

        let snapshot = self
            .execute(&Command::Status.to_wire(), |raw| {
                let snapshot = StatusSnapshot::new(raw);
                snapshot.require(channel + 1)?;
                Ok(snapshot)
            })
            .await?;

        let on = snapshot.is_on(channel)?;
        self.store_snapshot(snapshot).await;
        Ok(on)
    }

    /// Read one channel (0-based). Any failure reads as off and is
    /// reported on the event channel.
    pub async fn get_status(&self, channel: usize) -> bool {
        match self.try_get_status(channel).await {
            Ok(on) => on,
            Err(e) => {
                self.report(&Command::Status.to_wire(), &e);
                false
            }
        }
    }

    /// Read every channel in one exchange.
    pub async fn try_refresh(&self) -> Result<StatusSnapshot> {
        let required = self.channel_count;
        let snapshot = self
            .execute(&Command::Status.to_wire(), |raw| {
                let snapshot = StatusSnapshot::new(raw);
                snapshot.require(required)?;
                Ok(snapshot)
            })
            .await?;

        self.store_snapshot(snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Read every channel in one exchange, `None` (and a report) on failure.
    pub async fn refresh(&self) -> Option<StatusSnapshot> {
        match self.try_refresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                self.report(&Command::Status.to_wire(), &e);
                None
            }
        }
    }

    /// Switch a channel (0-based) and return its resulting state.
    ///
    /// On a momentary board this waits out the pulse before returning, so a
    /// status read right after sees the settled relay. The result is the
    /// device's echoed state when it sends one, the requested state
    /// otherwise.
    pub async fn try_set_channel(&self, channel: usize, turn_on: bool) -> Result<bool> {
        self.check_channel(channel)?;

        let command = Command::switch(channel, turn_on, self.config.momentary_delay);
        let wire = command.to_wire();

        let response = {
            let mut session = self.session.lock().await;
            let response = self
                .execute_locked(&mut session, &wire, |raw| Ok(StatusSnapshot::new(raw)))
                .await?;

            let delay = self.momentary_delay();
            if !delay.is_zero() {
                debug!("Waiting {:?} for momentary pulse on {}", delay, self.endpoint);
                sleep(delay).await;
            }
            response
        };

        match response.is_on(channel) {
            Ok(on) if response.is_status_echo() => {
                self.store_snapshot(response).await;
                Ok(on)
            }
            _ => Ok(turn_on),
        }
    }

    /// Switch a channel (0-based). On failure the last known state is
    /// returned unchanged (off if unknown) and the failure is reported.
    pub async fn set_channel(&self, channel: usize, turn_on: bool) -> bool {
        match self.try_set_channel(channel, turn_on).await {
            Ok(on) => on,
            Err(e) => {
                let wire = Command::switch(channel, turn_on, self.config.momentary_delay).to_wire();
                self.report(&wire, &e);
                self.last_known(channel).await
            }
        }
    }

    pub async fn turn_on(&self, channel: usize) -> bool {
        self.set_channel(channel, true).await
    }

    pub async fn turn_off(&self, channel: usize) -> bool {
        self.set_channel(channel, false).await
    }

    // --- Internals ---

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= self.channel_count {
            return Err(RelayError::InvalidChannel {
                channel,
                max: self.channel_count,
            });
        }
        Ok(())
    }

    async fn execute<T>(&self, command: &str, decode: impl Fn(&[u8]) -> Result<T>) -> Result<T> {
        let mut session = self.session.lock().await;
        self.execute_locked(&mut session, command, decode).await
    }

    /// Bounded retry loop. Every failed attempt, transport or decode, drops
    /// the connection so the next one starts from a fresh connect.
    async fn execute_locked<T>(
        &self,
        session: &mut Session<C::Stream>,
        command: &str,
        decode: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        let max_attempts = MAX_RETRIES + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!("Sending {} to {} (attempt {})", command, self.endpoint, attempt);

            let result = self
                .attempt(session, command)
                .await
                .and_then(|raw| decode(&raw));

            match result {
                Ok(value) => {
                    if self.config.connection_mode == ConnectionMode::Ephemeral {
                        session.close();
                    }
                    return Ok(value);
                }
                Err(e) => {
                    session.close();
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(
                        "Cannot send {} message {:?} (attempt {}/{}): {}",
                        self.endpoint, command, attempt, max_attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }

        let source = last_error.unwrap_or(RelayError::Disconnected);
        error!(
            "Giving up on {} message {:?} after {} attempts: {}",
            self.endpoint, command, max_attempts, source
        );
        Err(RelayError::RetriesExhausted {
            endpoint: self.endpoint.clone(),
            command: command.to_string(),
            attempts: max_attempts,
            source: Box::new(source),
        })
    }

    async fn attempt(&self, session: &mut Session<C::Stream>, command: &str) -> Result<Vec<u8>> {
        if !session.is_connected() {
            session
                .open(&self.connector, &self.endpoint, self.config.connect_timeout())
                .await?;
        }
        session
            .exchange(
                command.as_bytes(),
                self.config.buffer_size,
                self.config.read_timeout(),
            )
            .await
    }

    async fn store_snapshot(&self, snapshot: StatusSnapshot) {
        debug!("{} status: {}", self.endpoint, snapshot);
        *self.last_snapshot.write().await = Some(snapshot.clone());
        let _ = self.event_tx.send(DeviceEvent::StatusUpdated(snapshot));
    }

    async fn last_known(&self, channel: usize) -> bool {
        self.last_snapshot
            .read()
            .await
            .as_ref()
            .and_then(|snapshot| snapshot.is_on(channel).ok())
            .unwrap_or(false)
    }

    fn report(&self, command: &str, err: &RelayError) {
        let diagnostic = Diagnostic {
            endpoint: self.endpoint.clone(),
            command: command.to_string(),
            attempts: err.attempts().unwrap_or(0),
            kind: err.kind(),
            message: err.to_string(),
        };
        warn!(
            endpoint = %diagnostic.endpoint,
            command = %diagnostic.command,
            attempts = diagnostic.attempts,
            kind = %diagnostic.kind,
            "{} command failed: {}", self.config.name, err
        );
        let _ = self.event_tx.send(DeviceEvent::CommandFailed(diagnostic));
    }
}
