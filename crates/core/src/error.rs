//! Error types for perfswitch-core.

use crate::device::PerfMode;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The OS device-class query itself failed (HID class lookup, interface list).
    #[error("HID enumeration failed: {0}")]
    Enumeration(String),

    /// A device path could not be opened in any access mode tried.
    #[error("cannot open {path}: {reason}")]
    DeviceOpen { path: String, reason: String },

    /// Enumeration returned zero vendor-matching collections.
    #[error("no {0} HID device found")]
    NoDeviceFound(&'static str),

    /// Vendor collections exist but none answered the control probe.
    #[error("no top-level collection accepts feature report 0x{report_id:02X} ({candidates} probed)")]
    NoControlChannel { report_id: u8, candidates: usize },

    /// A feature report send or query failed at the OS/device layer.
    #[error("{op} failed: {reason}")]
    Report { op: &'static str, reason: String },

    /// The performance mode report went out but the polling rate report did not.
    ///
    /// The device is left running `mode` with its previous polling rate.
    #[error("partial apply: mode {mode} was sent, polling rate was not: {source}")]
    PartialApply {
        mode: PerfMode,
        #[source]
        source: Box<Error>,
    },

    /// Polling rate outside the device's closed set.
    #[error("unsupported polling rate: {0} Hz (allowed 1000, 2000, 4000)")]
    UnsupportedRate(u32),

    /// Performance mode value outside the device's closed set.
    #[error("unsupported performance mode: {0}")]
    UnsupportedMode(String),

    /// Command byte not in the vendor protocol whitelist.
    #[error("unsupported command byte: 0x{0:02X}")]
    UnsupportedCommand(u8),

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem error while reading or writing the configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform query outside the HID layer failed.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
