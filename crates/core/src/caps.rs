//! Capability probing: usage and feature report length of an open collection.

use crate::error::Result;
use crate::report::FALLBACK_REPORT_LEN;
use crate::transport::HidHandle;
use tracing::trace;

/// The subset of `HIDP_CAPS` the control protocol depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub usage_page: u16,
    pub usage: u16,
    /// Declared feature report length, report ID byte included. 0 = none.
    pub feature_report_length: u16,
}

impl Capabilities {
    /// Report buffer length to use for this collection.
    pub fn report_len(&self) -> usize {
        feature_length(self.feature_report_length)
    }

    /// Vendor-defined usage page (0xFF00..=0xFFFF).
    pub fn is_vendor_defined(&self) -> bool {
        self.usage_page & 0xFF00 == 0xFF00
    }
}

/// Query the parsed capabilities of an open collection.
pub fn probe_capabilities(handle: &dyn HidHandle) -> Result<Capabilities> {
    let caps = handle.capabilities()?;
    trace!(
        usage_page = format_args!("0x{:04X}", caps.usage_page),
        usage = format_args!("0x{:04X}", caps.usage),
        feature_len = caps.feature_report_byte_length,
        input_len = caps.input_report_byte_length,
        "HIDP caps"
    );
    Ok(Capabilities {
        usage_page: caps.usage_page,
        usage: caps.usage,
        feature_report_length: caps.feature_report_byte_length,
    })
}

/// Declared length, or [`FALLBACK_REPORT_LEN`] when the collection declared none.
pub fn feature_length(declared: u16) -> usize {
    if declared == 0 {
        FALLBACK_REPORT_LEN
    } else {
        declared as usize
    }
}
