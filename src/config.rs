// MIT License - Copyright (c) 2026 Peter Wright
// Device configuration

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    BUFFER_SIZE, DEFAULT_CHANNELS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MOMENTARY_DELAY,
    DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SCAN_INTERVAL_SECS,
};
use crate::error::{RelayError, Result};
use crate::transport::Endpoint;

/// Socket connection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Connect, send, read and close for every attempt (default)
    #[default]
    Ephemeral,
    /// Keep one connection open across commands, reopen lazily after a failure
    Persistent,
}

/// Which channels of the board are exposed.
///
/// Either a plain count (`channels = 4` exposes CH1..CH4) or an explicit
/// list of 1-based wire channel numbers (`channels = [1, 3]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChannelSelection {
    Count(u8),
    List(Vec<u8>),
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self::Count(DEFAULT_CHANNELS)
    }
}

impl ChannelSelection {
    /// Number of channels the client must be able to address.
    ///
    /// For a list this is the highest listed channel, since the status
    /// snapshot has to cover it.
    pub fn channel_count(&self) -> u8 {
        match self {
            Self::Count(n) => *n,
            Self::List(list) => list.iter().copied().max().unwrap_or(0),
        }
    }

    /// 0-based channel indices to expose, sorted and deduplicated.
    /// A `0` in a list has no wire channel and is skipped.
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            Self::Count(n) => (0..*n as usize).collect(),
            Self::List(list) => list
                .iter()
                .filter(|&&ch| ch > 0)
                .map(|&ch| ch as usize - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Configuration for one relay board.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Display name; channel entities are named "<name> CH<n>"
    pub name: String,
    /// Board hostname or IP address
    pub host: String,
    /// Board TCP port (default: 6722)
    pub port: u16,
    /// Exposed channels
    pub channels: ChannelSelection,
    /// Momentary pulse length in seconds, 0 = latching
    pub momentary_delay: u8,
    /// Status poll interval in seconds (default: 60)
    pub scan_interval_secs: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Size of the single response read
    pub buffer_size: usize,
    /// Connection mode
    pub connection_mode: ConnectionMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "TCP Switch".to_string(),
            host: String::new(),
            port: DEFAULT_PORT,
            channels: ChannelSelection::default(),
            momentary_delay: DEFAULT_MOMENTARY_DELAY,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            buffer_size: BUFFER_SIZE,
            connection_mode: ConnectionMode::Ephemeral,
        }
    }
}

impl DeviceConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::default()
    }

    /// Check the values a client cannot work without.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(invalid("host must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port must be in 1-65535"));
        }
        if self.channels.channel_count() == 0 {
            return Err(invalid("at least one channel is required"));
        }
        if self.buffer_size == 0 {
            return Err(invalid("buffer size must be positive"));
        }
        if self.scan_interval_secs == 0 {
            return Err(invalid("scan interval must be at least 1 second"));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn momentary_delay(&self) -> Duration {
        Duration::from_secs(self.momentary_delay as u64)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Poll interval actually used by the scheduler.
    ///
    /// A momentary delay shorter than the scan interval replaces it, so the
    /// relay's return to rest is picked up promptly.
    pub fn effective_poll_interval(&self) -> Duration {
        let scan = self.scan_interval();
        let delay = self.momentary_delay();
        if !delay.is_zero() && delay < scan {
            delay
        } else {
            scan
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn invalid(details: &str) -> RelayError {
    RelayError::InvalidConfig {
        details: details.to_string(),
    }
}

/// Builder for DeviceConfig.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn channel_count(mut self, count: u8) -> Self {
        self.config.channels = ChannelSelection::Count(count);
        self
    }

    pub fn channel_list(mut self, channels: impl Into<Vec<u8>>) -> Self {
        self.config.channels = ChannelSelection::List(channels.into());
        self
    }

    pub fn channels(mut self, channels: ChannelSelection) -> Self {
        self.config.channels = channels;
        self
    }

    pub fn momentary_delay(mut self, secs: u8) -> Self {
        self.config.momentary_delay = secs;
        self
    }

    pub fn scan_interval_secs(mut self, secs: u64) -> Self {
        self.config.scan_interval_secs = secs;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.config.connection_mode = mode;
        self
    }

    pub fn build(self) -> DeviceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DeviceConfig::builder()
            .name("Garage")
            .host("10.0.0.1")
            .port(7000)
            .channel_count(4)
            .momentary_delay(3)
            .build();

        assert_eq!(config.name, "Garage");
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 7000);
        assert_eq!(config.channels.channel_count(), 4);
        assert_eq!(config.momentary_delay(), Duration::from_secs(3));
        assert_eq!(config.endpoint().to_string(), "10.0.0.1:7000");
    }

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::builder().host("relay.local").build();
        assert_eq!(config.port, 6722);
        assert_eq!(config.channels, ChannelSelection::Count(2));
        assert_eq!(config.momentary_delay, 0);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.connection_mode, ConnectionMode::Ephemeral);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let empty_host = DeviceConfig::builder().host("  ").build();
        assert!(matches!(
            empty_host.validate(),
            Err(RelayError::InvalidConfig { .. })
        ));

        let zero_port = DeviceConfig::builder().host("10.0.0.1").port(0).build();
        assert!(zero_port.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_channels() {
        let none = DeviceConfig::builder().host("10.0.0.1").channel_count(0).build();
        assert!(none.validate().is_err());

        let empty_list = DeviceConfig::builder()
            .host("10.0.0.1")
            .channel_list(Vec::<u8>::new())
            .build();
        assert!(empty_list.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_scan_interval() {
        let config = DeviceConfig::builder()
            .host("10.0.0.1")
            .scan_interval_secs(0)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_list_indices() {
        let list = ChannelSelection::List(vec![3, 1, 3, 0]);
        assert_eq!(list.indices(), vec![0, 2]);
        assert_eq!(list.channel_count(), 3);

        let count = ChannelSelection::Count(3);
        assert_eq!(count.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_effective_poll_interval() {
        let latching = DeviceConfig::builder().scan_interval_secs(60).build();
        assert_eq!(latching.effective_poll_interval(), Duration::from_secs(60));

        let momentary = DeviceConfig::builder()
            .scan_interval_secs(60)
            .momentary_delay(5)
            .build();
        assert_eq!(momentary.effective_poll_interval(), Duration::from_secs(5));

        let long_pulse = DeviceConfig::builder()
            .scan_interval_secs(10)
            .momentary_delay(30)
            .build();
        assert_eq!(long_pulse.effective_poll_interval(), Duration::from_secs(10));
    }
}
