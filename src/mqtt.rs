// MIT License - Copyright (c) 2026 Peter Wright
// MQTT wire format for the bridge

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::devices::switch::RelaySwitch;
use crate::event::Diagnostic;

// Published messages share a flat {now, op, ...} structure.
// Channel numbers on MQTT are 1-based, matching the "<name> CH<n>" labels.

#[derive(Debug, Serialize)]
pub struct MqttSnapshot {
    pub now: u64,
    pub op: String,
    pub state: MqttSnapshotState,
}

#[derive(Debug, Serialize)]
pub struct MqttSnapshotState {
    pub devices: Vec<MqttDeviceState>,
}

#[derive(Debug, Serialize)]
pub struct MqttDeviceState {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub available: bool,
    pub channels: Vec<MqttChannelState>,
}

#[derive(Debug, Serialize)]
pub struct MqttChannelState {
    pub channel: usize,
    pub name: String,
    pub on: bool,
}

impl From<&RelaySwitch> for MqttChannelState {
    fn from(switch: &RelaySwitch) -> Self {
        Self {
            channel: switch.number(),
            name: switch.name.clone(),
            on: switch.on,
        }
    }
}

impl MqttDeviceState {
    pub fn new(name: &str, host: &str, port: u16, switches: &[RelaySwitch]) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            available: !switches.is_empty() && switches.iter().all(|s| s.available),
            channels: switches.iter().map(MqttChannelState::from).collect(),
        }
    }
}

impl MqttSnapshot {
    pub fn new(devices: Vec<MqttDeviceState>) -> Self {
        Self {
            now: now_epoch_ms(),
            op: "SNAPSHOT".to_string(),
            state: MqttSnapshotState { devices },
        }
    }
}

// Channel events: {now, op, device, channel}
#[derive(Debug, Serialize)]
pub struct MqttChannelEvent {
    pub now: u64,
    pub op: String,
    pub device: String,
    pub channel: usize,
}

impl MqttChannelEvent {
    /// `channel` is the 0-based index; it is published 1-based.
    pub fn new(device: &str, channel: usize, on: bool) -> Self {
        Self {
            now: now_epoch_ms(),
            op: if on { "CHANNEL_ON" } else { "CHANNEL_OFF" }.to_string(),
            device: device.to_string(),
            channel: channel + 1,
        }
    }
}

// Device events: {now, op, device}
#[derive(Debug, Serialize)]
pub struct MqttDeviceEvent {
    pub now: u64,
    pub op: String,
    pub device: String,
}

impl MqttDeviceEvent {
    pub fn new(op: &str, device: &str) -> Self {
        Self {
            now: now_epoch_ms(),
            op: op.to_string(),
            device: device.to_string(),
        }
    }
}

// DEVICE_ERROR: a command failed and fell back to a safe default
#[derive(Debug, Serialize)]
pub struct MqttDeviceError {
    pub now: u64,
    pub op: String,
    pub device: String,
    pub endpoint: String,
    pub command: String,
    pub attempts: u32,
    pub kind: String,
    pub message: String,
}

impl MqttDeviceError {
    pub fn new(device: &str, diagnostic: &Diagnostic) -> Self {
        Self {
            now: now_epoch_ms(),
            op: "DEVICE_ERROR".to_string(),
            device: device.to_string(),
            endpoint: diagnostic.endpoint.to_string(),
            command: diagnostic.command.clone(),
            attempts: diagnostic.attempts,
            kind: diagnostic.kind.as_str().to_string(),
            message: diagnostic.message.clone(),
        }
    }
}

// CMD_ACK response
#[derive(Debug, Serialize)]
pub struct MqttCmdAck {
    pub now: u64,
    pub op: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl MqttCmdAck {
    pub fn new(
        success: bool,
        src: Option<serde_json::Value>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            now: now_epoch_ms(),
            op: "CMD_ACK".to_string(),
            success,
            src,
            data,
        }
    }
}

// Inbound command (subscribed)
#[derive(Debug, Deserialize)]
pub struct MqttCommand {
    pub op: String,
    #[serde(default)]
    pub device: Option<String>,
    /// 1-based channel number
    #[serde(default)]
    pub channel: Option<usize>,
}

impl MqttCommand {
    /// The 0-based channel index, if a valid 1-based number was given.
    pub fn channel_index(&self) -> Option<usize> {
        self.channel.and_then(|n| n.checked_sub(1))
    }
}

pub fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
