//! Setting application: performance mode followed by polling rate.
//!
//! The two reports are separate writes and are not transactional. If the
//! mode report goes out and the rate report fails, the device keeps the new
//! mode with its old polling rate; that case is reported as
//! [`Error::PartialApply`] and nothing is rolled back or retried here.

use crate::control::select_control_path;
use crate::device::{DeviceDescriptor, PerfMode, PollingRate};
use crate::error::{Error, Result};
use crate::report::{mode_report, rate_report};
use crate::safety::{validate_perf_mode, validate_polling_rate};
use crate::transport::{send_feature_report, HidBackend};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gap between the mode report and the rate report.
pub const SETTLE_DELAY: Duration = Duration::from_millis(25);

/// What was written, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSettings {
    pub device: DeviceDescriptor,
    pub mode: PerfMode,
    pub rate: PollingRate,
    /// Length of each report sent.
    pub report_len: usize,
}

/// Re-resolve the control path and apply `mode` then `rate`.
pub fn apply(backend: &dyn HidBackend, mode: PerfMode, rate: PollingRate) -> Result<AppliedSettings> {
    let device = select_control_path(backend)?;
    apply_to(backend, device, mode, rate)
}

/// Validate raw values, then [`apply`]. Nothing is sent if either is invalid.
pub fn apply_raw(backend: &dyn HidBackend, mode_byte: u8, rate_hz: u32) -> Result<AppliedSettings> {
    let mode = validate_perf_mode(mode_byte)?;
    let rate = validate_polling_rate(rate_hz)?;
    apply(backend, mode, rate)
}

/// Apply to an already-resolved control path.
pub fn apply_to(
    backend: &dyn HidBackend,
    device: DeviceDescriptor,
    mode: PerfMode,
    rate: PollingRate,
) -> Result<AppliedSettings> {
    let len = device.report_len();
    debug!(path = %device.path, %mode, %rate, len, "Applying settings");

    send_feature_report(backend, &device.path, &mode_report(len, mode)).map_err(|e| {
        warn!(path = %device.path, %mode, error = %e, "Performance mode report failed");
        e
    })?;

    thread::sleep(SETTLE_DELAY);

    send_feature_report(backend, &device.path, &rate_report(len, rate)).map_err(|e| {
        warn!(path = %device.path, %mode, %rate, error = %e, "Polling rate report failed after mode was applied");
        Error::PartialApply {
            mode,
            source: Box::new(e),
        }
    })?;

    info!(path = %device.path, %mode, %rate, "Settings applied");
    Ok(AppliedSettings {
        device,
        mode,
        rate,
        report_len: len,
    })
}
