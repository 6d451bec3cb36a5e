// MIT License - Copyright (c) 2026 Peter Wright
// Relay channel entity

/// Events emitted when a channel's state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEvent {
    TurnedOn,
    TurnedOff,
}

/// One relay channel as exposed to the outside world.
#[derive(Debug, Clone)]
pub struct RelaySwitch {
    /// 0-based channel index
    pub channel: usize,
    pub name: String,
    pub on: bool,
    /// Whether the last poll reached the device
    pub available: bool,
    pub first_status: bool,
}

impl RelaySwitch {
    pub fn new(channel: usize, switch_name: &str) -> Self {
        Self {
            channel,
            name: format!("{} CH{}", switch_name, channel + 1),
            on: false,
            available: false,
            first_status: true,
        }
    }

    /// 1-based channel number, as printed on the board and used on the wire.
    pub fn number(&self) -> usize {
        self.channel + 1
    }

    /// Record a new state.
    /// Returns an event if the state changed (and it's not the first status).
    pub fn update(&mut self, on: bool) -> Option<SwitchEvent> {
        let prev = self.on;
        self.on = on;

        if self.first_status {
            self.first_status = false;
            return None;
        }

        match (prev, on) {
            (false, true) => Some(SwitchEvent::TurnedOn),
            (true, false) => Some(SwitchEvent::TurnedOff),
            _ => None,
        }
    }
}
