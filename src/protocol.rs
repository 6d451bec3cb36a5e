// MIT License - Copyright (c) 2026 Peter Wright
// Relay board wire protocol

use std::fmt;

use crate::constants::{ACTION_OFF, ACTION_ON, CHANNEL_ON, STATUS_COMMAND};
use crate::error::{RelayError, Result};

/// Commands understood by the relay board.
///
/// Requests are plain ASCII with no terminator; the board answers with a
/// single unframed message.
///
/// # Channel numbering
///
/// Channels are 0-based everywhere in this crate and 1-based on the wire:
/// index `0` is sent as channel `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `00`: query all channel states.
    Status,
    /// `<1|2><channel>[:<delay>]`: switch a channel on (`1`) or off (`2`).
    /// The `:<delay>` suffix is only present for momentary boards and tells
    /// the board how many seconds to hold the pulse.
    Switch { channel: usize, on: bool, delay: u8 },
}

impl Command {
    pub fn switch(channel: usize, on: bool, delay: u8) -> Self {
        Self::Switch { channel, on, delay }
    }

    /// Encode to the wire string.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Status => STATUS_COMMAND.to_string(),
            Self::Switch { channel, on, delay } => {
                let action = if *on { ACTION_ON } else { ACTION_OFF };
                if *delay > 0 {
                    format!("{}{}:{}", action, channel + 1, delay)
                } else {
                    format!("{}{}", action, channel + 1)
                }
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Fixed-width status response: one byte per channel, `'1'` = on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    raw: Vec<u8>,
}

impl StatusSnapshot {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self { raw: raw.into() }
    }

    /// Fails with a protocol error unless the snapshot has `required` bytes.
    pub fn require(&self, required: usize) -> Result<()> {
        if self.raw.len() < required {
            return Err(RelayError::ShortResponse {
                len: self.raw.len(),
                required,
            });
        }
        Ok(())
    }

    /// State of a 0-based channel.
    pub fn is_on(&self, channel: usize) -> Result<bool> {
        self.require(channel + 1)?;
        Ok(self.raw[channel] == CHANNEL_ON)
    }

    /// States of the first `count` channels.
    pub fn states(&self, count: usize) -> Result<Vec<bool>> {
        self.require(count)?;
        Ok(self.raw[..count].iter().map(|&b| b == CHANNEL_ON).collect())
    }

    /// Whether the message looks like a status string (only `0`/`1`,
    /// trailing whitespace allowed). Used to tell a state echo after a
    /// switch command from a bare acknowledgement.
    pub fn is_status_echo(&self) -> bool {
        let trimmed = self.raw.trim_ascii_end();
        !trimmed.is_empty() && trimmed.iter().all(|b| matches!(b, b'0' | b'1'))
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.raw))
    }
}
