// MIT License - Copyright (c) 2026 Peter Wright
//
//! # tcp-switch
//!
//! Client for multi-channel relay boards driven over a small ASCII TCP
//! protocol: `00` reads every channel, `1<n>` / `2<n>` switches channel `n`
//! on or off (with a `:<secs>` suffix on momentary boards), and the board
//! answers with one character per channel, `'1'` meaning on.
//!
//! The [`DeviceClient`] owns the socket, serializes all commands and retries
//! transient failures on fresh connections. [`Poller`] runs the periodic
//! status refresh on a dedicated task and tracks per-channel
//! [`RelaySwitch`] entities; the `tcpswitch2mqtt` binary bridges both to
//! MQTT.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tcp_switch::{DeviceClient, DeviceConfig, DeviceEvent, Poller};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeviceConfig::builder()
//!         .name("Garage")
//!         .host("192.168.1.50")
//!         .channel_count(2)
//!         .momentary_delay(1)
//!         .build();
//!
//!     let client = Arc::new(DeviceClient::new(config)?);
//!     let mut events = client.subscribe();
//!     let _poller = Poller::spawn(Arc::clone(&client));
//!
//!     client.turn_on(0).await;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::ChannelChanged { channel, on } = event {
//!             println!("CH{} is now {}", channel + 1, if on { "on" } else { "off" });
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod devices;
pub mod error;
pub mod event;
pub mod mqtt;
pub mod poller;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use client::DeviceClient;
pub use config::{ChannelSelection, ConnectionMode, DeviceConfig, DeviceConfigBuilder};
pub use devices::switch::{RelaySwitch, SwitchEvent};
pub use error::{ErrorKind, RelayError, Result};
pub use event::{Diagnostic, DeviceEvent, EventReceiver};
pub use poller::Poller;
pub use protocol::{Command, StatusSnapshot};
pub use transport::{ConnectionState, Connector, Endpoint, TcpConnector};
