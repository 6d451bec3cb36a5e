// MIT License - Copyright (c) 2026 Peter Wright

pub mod switch;

pub use switch::{RelaySwitch, SwitchEvent};
