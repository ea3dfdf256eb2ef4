//! Fixed-layout records returned by the native HID enumeration APIs.
//!
//! Each type mirrors the byte layout the OS writes, so a backend can hand the
//! OS a pointer to one of these and the core reads named fields instead of
//! computing offsets.
//!
//! # HIDP_CAPS (64 bytes, every field a `u16`)
//!
//! | Offset | Field                        |
//! |--------|------------------------------|
//! | 0      | Usage                        |
//! | 2      | UsagePage                    |
//! | 4      | InputReportByteLength        |
//! | 6      | OutputReportByteLength       |
//! | 8      | FeatureReportByteLength      |
//! | 10..44 | Reserved[17]                 |
//! | 44..64 | Number* counters (10 fields) |
//!
//! # HIDD_ATTRIBUTES (12 bytes)
//!
//! | Offset | Field         |
//! |--------|---------------|
//! | 0      | Size (`u32`)  |
//! | 4      | VendorID      |
//! | 6      | ProductID     |
//! | 8      | VersionNumber |
//!
//! # SP_DEVICE_INTERFACE_DETAIL_DATA_W (variable)
//!
//! `cbSize` (`u32`) at offset 0, then the NUL-terminated UTF-16LE device path
//! starting at offset 4. `cbSize` must be set to the size of the fixed part,
//! which is 8 on 64-bit targets and 6 on 32-bit ones.

/// Size of `HIDP_CAPS` in bytes.
pub const HIDP_CAPS_LEN: usize = 64;
/// Size of `HIDD_ATTRIBUTES` in bytes.
pub const HIDD_ATTRIBUTES_LEN: usize = 12;
/// Byte offset of `DevicePath` inside the interface detail record.
pub const DETAIL_DEVICE_PATH_OFFSET: usize = 4;

/// Parsed HID capabilities block (`HIDP_CAPS`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HidpCaps {
    pub usage: u16,
    pub usage_page: u16,
    pub input_report_byte_length: u16,
    pub output_report_byte_length: u16,
    pub feature_report_byte_length: u16,
    pub reserved: [u16; 17],
    pub number_link_collection_nodes: u16,
    pub number_input_button_caps: u16,
    pub number_input_value_caps: u16,
    pub number_input_data_indices: u16,
    pub number_output_button_caps: u16,
    pub number_output_value_caps: u16,
    pub number_output_data_indices: u16,
    pub number_feature_button_caps: u16,
    pub number_feature_value_caps: u16,
    pub number_feature_data_indices: u16,
}

const _: () = assert!(std::mem::size_of::<HidpCaps>() == HIDP_CAPS_LEN);

impl HidpCaps {
    /// Caps for a collection with the given usage and feature report length.
    pub fn with_usage(usage_page: u16, usage: u16, feature_report_byte_length: u16) -> Self {
        Self {
            usage,
            usage_page,
            feature_report_byte_length,
            ..Self::default()
        }
    }
}

/// Vendor/product block (`HIDD_ATTRIBUTES`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiddAttributes {
    /// Must be set to [`HIDD_ATTRIBUTES_LEN`] before the OS fills the record.
    pub size: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version_number: u16,
}

const _: () = assert!(std::mem::size_of::<HiddAttributes>() == HIDD_ATTRIBUTES_LEN);

impl Default for HiddAttributes {
    fn default() -> Self {
        Self {
            size: HIDD_ATTRIBUTES_LEN as u32,
            vendor_id: 0,
            product_id: 0,
            version_number: 0,
        }
    }
}

impl HiddAttributes {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            ..Self::default()
        }
    }
}

/// `cbSize` value the OS expects in an interface detail record.
pub fn detail_cb_size() -> u32 {
    if std::mem::size_of::<usize>() == 8 {
        8
    } else {
        6
    }
}

/// Storage for one interface detail record.
///
/// Backed by `u32` words so the record handed to the OS is 4-byte aligned,
/// as `SP_DEVICE_INTERFACE_DETAIL_DATA_W` requires. `cbSize` is pre-filled.
#[derive(Debug, Clone)]
pub struct DetailBuffer {
    words: Vec<u32>,
    len: usize,
}

impl DetailBuffer {
    /// A buffer of at least `required` bytes.
    pub fn new(required: usize) -> Self {
        let len = required.max(DETAIL_DEVICE_PATH_OFFSET + 2);
        let mut words = vec![0u32; len.div_ceil(4)];
        words[0] = detail_cb_size();
        Self { words, len }
    }

    /// Size in bytes to report to the OS.
    pub fn byte_len(&self) -> usize {
        self.len
    }

    pub fn as_mut_ptr(&mut self) -> *mut u32 {
        self.words.as_mut_ptr()
    }

    /// The device path the OS wrote, or `None` if it is empty.
    pub fn device_path(&self) -> Option<String> {
        let bytes: Vec<u8> = self
            .words
            .iter()
            .flat_map(|word| word.to_ne_bytes())
            .take(self.len)
            .collect();
        let units: Vec<u16> = bytes[DETAIL_DEVICE_PATH_OFFSET..]
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        if units.is_empty() {
            return None;
        }
        Some(String::from_utf16_lossy(&units))
    }
}

/// Decode a NUL-terminated UTF-16 string buffer (HID string descriptors).
pub fn utf16_until_nul(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}
