// MIT License - Copyright (c) 2026 Peter Wright
// Error types for the relay client

use std::fmt;

use crate::transport::Endpoint;

/// Broad failure category of a [`RelayError`].
///
/// The absorbing client calls (`get_status`, `set_channel`) report this in
/// their diagnostics so a listener can tell a bad configuration apart from
/// a flaky network or a device speaking garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid host/port/channel count, or a channel index out of range
    Configuration,
    /// Connect, write or read failed, timed out, or the socket was reset
    Transport,
    /// The device answered with something that cannot be decoded
    Protocol,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can occur in the tcp-switch library.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Invalid channel: {channel} (device has {max} channels)")]
    InvalidChannel { channel: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection timeout")]
    ConnectTimeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Empty response")]
    EmptyResponse,

    #[error("Socket disconnected")]
    Disconnected,

    #[error("Response too short: got {len} bytes, need at least {required}")]
    ShortResponse { len: usize, required: usize },

    #[error("Command {command:?} to {endpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: Endpoint,
        command: String,
        attempts: u32,
        #[source]
        source: Box<RelayError>,
    },
}

impl RelayError {
    /// The failure category. A terminal retry error reports the category of
    /// the last attempt's failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::InvalidConfig { .. } | RelayError::InvalidChannel { .. } => {
                ErrorKind::Configuration
            }
            RelayError::Io(_)
            | RelayError::ConnectTimeout
            | RelayError::WriteTimeout
            | RelayError::ReadTimeout
            | RelayError::EmptyResponse
            | RelayError::Disconnected => ErrorKind::Transport,
            RelayError::ShortResponse { .. } => ErrorKind::Protocol,
            RelayError::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    /// Whether this error is transient and the command should be retried on
    /// a fresh connection.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::RetriesExhausted { .. } => false,
            other => matches!(other.kind(), ErrorKind::Transport | ErrorKind::Protocol),
        }
    }

    /// Number of connection attempts consumed, when known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RelayError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
