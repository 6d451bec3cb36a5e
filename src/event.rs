// MIT License - Copyright (c) 2026 Peter Wright
// Device events

use crate::error::ErrorKind;
use crate::protocol::StatusSnapshot;
use crate::transport::Endpoint;

/// Report of a failure that was absorbed into a safe default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub endpoint: Endpoint,
    /// Wire command that was attempted
    pub command: String,
    /// Connection attempts made, 0 when the call failed before any I/O
    pub attempts: u32,
    pub kind: ErrorKind,
    pub message: String,
}

/// All events that can be emitted by a device client.
///
/// Users subscribe via `client.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<DeviceEvent>`.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// Persistent connection established
    Connected,
    /// Persistent connection closed or lost
    Disconnected,
    /// Fresh status read from the device
    StatusUpdated(StatusSnapshot),
    /// A channel entity changed state (emitted by the poller)
    ChannelChanged { channel: usize, on: bool },
    /// A command failed and the caller got a safe default
    CommandFailed(Diagnostic),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<DeviceEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<DeviceEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
