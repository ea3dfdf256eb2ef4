//! Vendor feature report encoding and decoding.
//!
//! Every control message is a single feature report:
//!
//! | Byte | Value                                   |
//! |------|-----------------------------------------|
//! | 0    | report ID `0x0E`                        |
//! | 1    | magic `0xA5`                            |
//! | 2    | command (`0x08` mode, `0x07` rate)      |
//! | 3, 4 | `0x02 0x01`                             |
//! | 5    | payload (mode value or rate code)       |
//! | 6..  | zero padding up to the declared length  |
//!
//! The buffer must be exactly as long as the collection's declared feature
//! report length (which already counts the report ID byte). When the length
//! is unknown, 64 bytes is used.

use crate::device::{PerfMode, PollingRate};
use crate::error::{Error, Result};
use crate::safety::validate_polling_rate;

/// Feature report ID used by every vendor command.
pub const REPORT_ID: u8 = 0x0E;
/// First header byte after the report ID.
pub const HEADER_MAGIC: u8 = 0xA5;
/// Header bytes 3 and 4.
pub const HEADER_TAIL: [u8; 2] = [0x02, 0x01];
/// Report ID + 4 header bytes + payload.
pub const MIN_REPORT_LEN: usize = 6;
/// Length used when the collection did not declare one.
pub const FALLBACK_REPORT_LEN: usize = 64;

/// Vendor command bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    SetPollingRate = 0x07,
    SetPerfMode = 0x08,
}

impl Command {
    pub const ALL: &'static [Command] = &[Command::SetPollingRate, Command::SetPerfMode];

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x07 => Some(Self::SetPollingRate),
            0x08 => Some(Self::SetPerfMode),
            _ => None,
        }
    }
}

/// An encoded outbound feature report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureReport(pub(crate) Vec<u8>);

impl FeatureReport {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn command(&self) -> Option<Command> {
        self.0.get(2).copied().and_then(Command::from_byte)
    }

    pub fn value(&self) -> u8 {
        self.0[5]
    }
}

/// Build a feature report of `total_len` bytes (at least [`MIN_REPORT_LEN`]).
pub fn build_report(total_len: usize, command: Command, value: u8) -> FeatureReport {
    let mut buf = vec![0u8; total_len.max(MIN_REPORT_LEN)];
    buf[0] = REPORT_ID;
    buf[1] = HEADER_MAGIC;
    buf[2] = command.byte();
    buf[3] = HEADER_TAIL[0];
    buf[4] = HEADER_TAIL[1];
    buf[5] = value;
    FeatureReport(buf)
}

/// "Set performance mode" report.
pub fn mode_report(total_len: usize, mode: PerfMode) -> FeatureReport {
    build_report(total_len, Command::SetPerfMode, mode.protocol_byte())
}

/// "Set polling rate" report.
pub fn rate_report(total_len: usize, rate: PollingRate) -> FeatureReport {
    build_report(total_len, Command::SetPollingRate, rate_code(rate))
}

/// Protocol byte for a polling rate.
pub fn rate_code(rate: PollingRate) -> u8 {
    match rate {
        PollingRate::Hz1000 => 0x02,
        PollingRate::Hz2000 => 0x03,
        PollingRate::Hz4000 => 0x04,
    }
}

/// Map a raw Hz value to its protocol byte.
pub fn polling_rate_to_protocol_byte(hz: u32) -> Result<u8> {
    validate_polling_rate(hz).map(rate_code)
}

/// A decoded "get feature" response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureResponse {
    pub report_id: u8,
    pub header: [u8; 4],
    pub value: u8,
    /// Bytes after the payload byte.
    pub trailing: Vec<u8>,
}

impl FeatureResponse {
    /// Decode a response buffer, checking length and report ID.
    pub fn parse(data: &[u8], expected_report_id: u8) -> Result<Self> {
        if data.len() < MIN_REPORT_LEN {
            return Err(Error::Report {
                op: "get feature",
                reason: format!(
                    "response too short: {} bytes (need {MIN_REPORT_LEN})",
                    data.len()
                ),
            });
        }
        if data[0] != expected_report_id {
            return Err(Error::Report {
                op: "get feature",
                reason: format!(
                    "report ID mismatch: got 0x{:02X}, expected 0x{expected_report_id:02X}",
                    data[0]
                ),
            });
        }

        Ok(Self {
            report_id: data[0],
            header: [data[1], data[2], data[3], data[4]],
            value: data[5],
            trailing: data[MIN_REPORT_LEN..].to_vec(),
        })
    }

    /// Whether the header carries the vendor magic byte.
    pub fn has_vendor_header(&self) -> bool {
        self.header[0] == HEADER_MAGIC
    }

    /// Command echoed in the header, if recognised.
    pub fn command(&self) -> Option<Command> {
        Command::from_byte(self.header[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_report_layout() {
        let report = build_report(20, Command::SetPerfMode, 0x01);
        let bytes = report.as_bytes();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..6], &[0x0E, 0xA5, 0x08, 0x02, 0x01, 0x01]);
        assert!(bytes[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn build_report_clamps_to_minimum() {
        for len in [0, 1, 5, 6] {
            let report = build_report(len, Command::SetPollingRate, 0x04);
            assert_eq!(report.len(), MIN_REPORT_LEN);
            assert_eq!(report.value(), 0x04);
        }
    }

    #[test]
    fn build_report_holds_for_all_lengths_and_values() {
        for len in [0usize, 6, 7, 20, 64, 65, 256] {
            for command in Command::ALL {
                for value in [0x00, 0x01, 0x7F, 0xFF] {
                    let report = build_report(len, *command, value);
                    let b = report.as_bytes();
                    assert_eq!(b.len(), len.max(6));
                    assert_eq!(b[0], REPORT_ID);
                    assert_eq!(&b[1..5], &[HEADER_MAGIC, command.byte(), 0x02, 0x01]);
                    assert_eq!(b[5], value);
                    assert!(b[6..].iter().all(|&x| x == 0));
                }
            }
        }
    }

    #[test]
    fn mode_and_rate_reports() {
        let mode = mode_report(64, PerfMode::StandardMsOn);
        assert_eq!(mode.command(), Some(Command::SetPerfMode));
        assert_eq!(mode.value(), 0x04);

        let rate = rate_report(64, PollingRate::Hz2000);
        assert_eq!(rate.command(), Some(Command::SetPollingRate));
        assert_eq!(rate.value(), 0x03);
    }

    #[test]
    fn polling_rate_protocol_bytes() {
        assert_eq!(polling_rate_to_protocol_byte(1000).unwrap(), 0x02);
        assert_eq!(polling_rate_to_protocol_byte(2000).unwrap(), 0x03);
        assert_eq!(polling_rate_to_protocol_byte(4000).unwrap(), 0x04);
    }

    #[test]
    fn polling_rate_rejects_unsupported() {
        for hz in [0, 125, 500, 999, 8000, 70_000] {
            assert!(matches!(
                polling_rate_to_protocol_byte(hz),
                Err(Error::UnsupportedRate(v)) if v == hz
            ));
        }
    }

    #[test]
    fn command_from_byte() {
        assert_eq!(Command::from_byte(0x07), Some(Command::SetPollingRate));
        assert_eq!(Command::from_byte(0x08), Some(Command::SetPerfMode));
        assert_eq!(Command::from_byte(0x09), None);
    }

    #[test]
    fn response_parse_ok() {
        let raw = [0x0E, 0xA5, 0x07, 0x02, 0x01, 0x03, 0x00, 0x00];
        let resp = FeatureResponse::parse(&raw, REPORT_ID).unwrap();
        assert!(resp.has_vendor_header());
        assert_eq!(resp.command(), Some(Command::SetPollingRate));
        assert_eq!(resp.value, 0x03);
        assert_eq!(resp.trailing, vec![0x00, 0x00]);
    }

    #[test]
    fn response_parse_rejects_short_and_wrong_id() {
        assert!(FeatureResponse::parse(&[0x0E, 0xA5], REPORT_ID).is_err());
        assert!(FeatureResponse::parse(&[0x01, 0, 0, 0, 0, 0], REPORT_ID).is_err());
    }

    #[test]
    fn response_without_magic() {
        let resp = FeatureResponse::parse(&[0x0E, 0, 0, 0, 0, 0], REPORT_ID).unwrap();
        assert!(!resp.has_vendor_header());
        assert_eq!(resp.command(), None);
    }
}
