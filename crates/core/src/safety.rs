//! Safety layer: validates every value against the firmware's closed sets
//! before anything is sent to the device.
//!
//! # Performance modes
//! - **Supported values**: `0x01` competitive / motion sync off,
//!   `0x02` standard / off, `0x03` competitive / on, `0x04` standard / on
//! - Sent as byte 5 of a command `0x08` feature report
//!
//! # Polling rate
//! - **Supported values**: 1000 Hz, 2000 Hz, 4000 Hz
//! - **Encoding**: 1000 → `0x02`, 2000 → `0x03`, 4000 → `0x04`
//! - Sent as byte 5 of a command `0x07` feature report
//!
//! # Commands
//! Only `0x07` (polling rate) and `0x08` (performance mode) are ever emitted.
//! Any other command byte is rejected.
//!
//! # Invariant
//! All validation happens BEFORE any HID communication. A config or CLI value
//! outside these sets never produces a partially applied device state.

use crate::device::{PerfMode, PollingRate};
use crate::error::{Error, Result};
use crate::report::Command;

/// Validate a polling rate given in Hz.
pub fn validate_polling_rate(hz: u32) -> Result<PollingRate> {
    u16::try_from(hz)
        .ok()
        .and_then(PollingRate::from_hz)
        .ok_or(Error::UnsupportedRate(hz))
}

/// Validate a raw performance mode byte.
pub fn validate_perf_mode(byte: u8) -> Result<PerfMode> {
    PerfMode::from_byte(byte).ok_or_else(|| Error::UnsupportedMode(format!("0x{byte:02X}")))
}

/// Validate a performance mode by config name.
pub fn validate_perf_mode_name(name: &str) -> Result<PerfMode> {
    PerfMode::from_name(name).ok_or_else(|| {
        Error::UnsupportedMode(format!(
            "{name:?} (expected one of {})",
            PerfMode::ALL
                .iter()
                .map(PerfMode::name)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Validate a raw command byte against the whitelist.
pub fn validate_command(byte: u8) -> Result<Command> {
    Command::from_byte(byte).ok_or(Error::UnsupportedCommand(byte))
}
