// MIT License - Copyright (c) 2026 Peter Wright
// Protocol and configuration constants

/// TCP port relay boards listen on out of the box.
pub const DEFAULT_PORT: u16 = 6722;

/// Number of channels assumed when the configuration does not say.
pub const DEFAULT_CHANNELS: u8 = 2;

/// Latching mode (no momentary pulse).
pub const DEFAULT_MOMENTARY_DELAY: u8 = 0;

/// Default status poll interval in seconds.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Default TCP connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default read (and write) timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

/// Single read buffer. One read is one message.
pub const BUFFER_SIZE: usize = 4096;

/// Retries after the first attempt, each on a fresh connection.
pub const MAX_RETRIES: u32 = 3;

/// Query all channel states.
pub const STATUS_COMMAND: &str = "00";

/// Action code prefix for switching a channel on.
pub const ACTION_ON: char = '1';

/// Action code prefix for switching a channel off.
pub const ACTION_OFF: char = '2';

/// Status character meaning "channel on". Anything else reads as off.
pub const CHANNEL_ON: u8 = b'1';
