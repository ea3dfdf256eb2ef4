//! Device model and HID collection enumeration.

use crate::caps::{probe_capabilities, Capabilities};
use crate::error::Result;
use crate::transport::{Access, HidBackend, InterfaceError};
use crate::{KEYBOARD_PATH_SUFFIX, VENDOR_NAME};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Firmware performance profiles. "Ms" is the motion sync option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PerfMode {
    CompetitiveMsOff = 0x01,
    StandardMsOff = 0x02,
    CompetitiveMsOn = 0x03,
    StandardMsOn = 0x04,
}

impl PerfMode {
    /// All supported modes.
    pub const ALL: &'static [PerfMode] = &[
        PerfMode::CompetitiveMsOff,
        PerfMode::StandardMsOff,
        PerfMode::CompetitiveMsOn,
        PerfMode::StandardMsOn,
    ];

    /// Payload byte sent with the "set performance mode" command.
    pub fn protocol_byte(&self) -> u8 {
        *self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::CompetitiveMsOff),
            0x02 => Some(Self::StandardMsOff),
            0x03 => Some(Self::CompetitiveMsOn),
            0x04 => Some(Self::StandardMsOn),
            _ => None,
        }
    }

    /// Config-file name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompetitiveMsOff => "competitive_ms_off",
            Self::StandardMsOff => "standard_ms_off",
            Self::CompetitiveMsOn => "competitive_ms_on",
            Self::StandardMsOn => "standard_ms_on",
        }
    }

    /// Parse a config-file name (case-insensitive, `-` accepted for `_`).
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.name() == normalized)
    }
}

impl std::fmt::Display for PerfMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Polling rates the firmware accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PollingRate {
    Hz1000 = 1000,
    Hz2000 = 2000,
    Hz4000 = 4000,
}

impl PollingRate {
    /// Convert from raw Hz value.
    pub fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            1000 => Some(Self::Hz1000),
            2000 => Some(Self::Hz2000),
            4000 => Some(Self::Hz4000),
            _ => None,
        }
    }

    /// Get the Hz value.
    pub fn as_hz(&self) -> u16 {
        *self as u16
    }

    /// All supported rates.
    pub const ALL: &'static [PollingRate] = &[
        PollingRate::Hz1000,
        PollingRate::Hz2000,
        PollingRate::Hz4000,
    ];
}

impl std::fmt::Display for PollingRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.as_hz())
    }
}

/// One HID top-level collection as seen during a single enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    pub usage_page: u16,
    pub usage: u16,
    pub feature_report_length: u16,
}

impl DeviceDescriptor {
    /// Keyboard-emulation collection of a composite device.
    pub fn is_keyboard_collection(&self) -> bool {
        self.path.to_lowercase().ends_with(KEYBOARD_PATH_SUFFIX)
    }

    /// Case-insensitive substring match on manufacturer or product.
    pub fn matches(&self, filter: &str) -> bool {
        let needle = filter.to_lowercase();
        self.manufacturer.to_lowercase().contains(&needle)
            || self.product.to_lowercase().contains(&needle)
    }

    /// Capabilities recorded at enumeration time.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            usage_page: self.usage_page,
            usage: self.usage,
            feature_report_length: self.feature_report_length,
        }
    }

    /// Feature report buffer length for this collection.
    pub fn report_len(&self) -> usize {
        self.capabilities().report_len()
    }
}

/// Result of walking the interface list.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub devices: Vec<DeviceDescriptor>,
    /// Interfaces dropped because their path, open or attributes failed.
    pub skipped: usize,
    /// OS error code that ended the walk before "no more items", if any.
    pub interrupted: Option<u32>,
}

/// Walk every present HID interface and build descriptors.
///
/// With a `filter`, only descriptors whose manufacturer or product contains it
/// (case-insensitive) are kept. An OS error other than "no more items" ends
/// the walk like the end of the list; it is logged and recorded in
/// [`Enumeration::interrupted`] and the descriptors gathered so far are kept.
pub fn enumerate_detailed(backend: &dyn HidBackend, filter: Option<&str>) -> Result<Enumeration> {
    debug!(filter, "Starting HID interface enumeration");
    let mut interfaces = backend.interfaces()?;
    let mut result = Enumeration::default();

    for index in 0u32.. {
        let path = match interfaces.path_at(index) {
            Ok(Some(path)) => path,
            Ok(None) => {
                debug!(index, "Interface path unresolved, skipping");
                result.skipped += 1;
                continue;
            }
            Err(InterfaceError::NoMoreItems) => break,
            Err(InterfaceError::Os(code)) => {
                warn!(
                    index,
                    code, "Interface enumeration stopped by OS error; treating as end of list"
                );
                result.interrupted = Some(code);
                break;
            }
        };

        let Some(descriptor) = describe(backend, &path) else {
            result.skipped += 1;
            continue;
        };

        if let Some(filter) = filter {
            if !descriptor.matches(filter) {
                continue;
            }
        }

        debug!(
            vid = format_args!("0x{:04X}", descriptor.vendor_id),
            pid = format_args!("0x{:04X}", descriptor.product_id),
            usage_page = format_args!("0x{:04X}", descriptor.usage_page),
            usage = format_args!("0x{:04X}", descriptor.usage),
            feature_len = descriptor.feature_report_length,
            path = %descriptor.path,
            "Found HID collection"
        );
        result.devices.push(descriptor);
    }

    debug!(
        count = result.devices.len(),
        skipped = result.skipped,
        "HID enumeration complete"
    );
    Ok(result)
}

/// Enumerate collections, optionally filtered by a vendor substring.
pub fn enumerate(backend: &dyn HidBackend, filter: Option<&str>) -> Result<Vec<DeviceDescriptor>> {
    Ok(enumerate_detailed(backend, filter)?.devices)
}

/// Enumerate collections belonging to the supported vendor.
pub fn enumerate_vendor(backend: &dyn HidBackend) -> Result<Vec<DeviceDescriptor>> {
    enumerate(backend, Some(VENDOR_NAME))
}

/// Enumerate every HID collection on the system (diagnostics).
pub fn enumerate_all(backend: &dyn HidBackend) -> Result<Vec<DeviceDescriptor>> {
    enumerate(backend, None)
}

/// Open `path` query-only and build its descriptor.
///
/// `None` if the path cannot be opened or its attributes cannot be read.
/// String and capability failures degrade the descriptor instead.
fn describe(backend: &dyn HidBackend, path: &str) -> Option<DeviceDescriptor> {
    let handle = match backend.open(path, Access::Query) {
        Ok(handle) => handle,
        Err(e) => {
            debug!(path, error = %e, "Query open failed, skipping");
            return None;
        }
    };

    let attributes = match handle.attributes() {
        Ok(attributes) => attributes,
        Err(e) => {
            debug!(path, error = %e, "Attribute query failed, skipping");
            return None;
        }
    };

    let manufacturer = handle.manufacturer().unwrap_or_default();
    let product = handle.product().unwrap_or_default();
    let caps = probe_capabilities(handle.as_ref()).unwrap_or_else(|e| {
        debug!(path, error = %e, "Capability query failed, using zero caps");
        Capabilities::default()
    });

    Some(DeviceDescriptor {
        path: path.to_string(),
        vendor_id: attributes.vendor_id,
        product_id: attributes.product_id,
        manufacturer,
        product,
        usage_page: caps.usage_page,
        usage: caps.usage,
        feature_report_length: caps.feature_report_length,
    })
}
