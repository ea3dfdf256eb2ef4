//! Control-path selection.
//!
//! A single mouse exposes several top-level collections and only one of them
//! accepts the vendor feature report. Which one varies with firmware and
//! driver version, so instead of matching a usage page/usage pair the
//! selector asks each candidate for feature report [`REPORT_ID`] and takes the
//! first one that answers.
//!
//! Keyboard-emulation collections (path ending in `\kbd`) are probed last:
//! they answer feature requests differently and probing them first has
//! produced false negatives and device-side side effects.

use crate::device::{enumerate_vendor, DeviceDescriptor};
use crate::error::{Error, Result};
use crate::report::{FeatureResponse, REPORT_ID};
use crate::transport::{get_feature_report, HidBackend};
use crate::VENDOR_NAME;
use tracing::{debug, info};

/// Order candidates for probing: non-keyboard collections first, each group
/// in enumeration order.
pub fn probe_order(candidates: Vec<DeviceDescriptor>) -> Vec<DeviceDescriptor> {
    let (keyboards, others): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(DeviceDescriptor::is_keyboard_collection);
    others.into_iter().chain(keyboards).collect()
}

/// Ask one collection for the vendor feature report.
pub fn probe(backend: &dyn HidBackend, candidate: &DeviceDescriptor) -> Result<()> {
    let len = candidate.report_len();
    let response = get_feature_report(backend, &candidate.path, REPORT_ID, len)?;

    if let Ok(parsed) = FeatureResponse::parse(&response, REPORT_ID) {
        debug!(
            path = %candidate.path,
            vendor_header = parsed.has_vendor_header(),
            value = format_args!("0x{:02X}", parsed.value),
            "Probe response"
        );
    }
    Ok(())
}

/// Pick the first candidate, in [`probe_order`], that answers the probe.
pub fn select_from(
    backend: &dyn HidBackend,
    candidates: Vec<DeviceDescriptor>,
) -> Result<DeviceDescriptor> {
    if candidates.is_empty() {
        return Err(Error::NoDeviceFound(VENDOR_NAME));
    }

    let ordered = probe_order(candidates);
    let total = ordered.len();
    for candidate in ordered {
        match probe(backend, &candidate) {
            Ok(()) => {
                debug!(
                    path = %candidate.path,
                    usage_page = format_args!("0x{:04X}", candidate.usage_page),
                    usage = format_args!("0x{:04X}", candidate.usage),
                    feature_len = candidate.report_len(),
                    "Control path selected"
                );
                return Ok(candidate);
            }
            Err(e) => {
                debug!(path = %candidate.path, error = %e, "Probe failed, trying next collection");
            }
        }
    }

    info!(candidates = total, "No collection answered the control probe");
    Err(Error::NoControlChannel {
        report_id: REPORT_ID,
        candidates: total,
    })
}

/// Enumerate vendor collections and select the control path.
pub fn select_control_path(backend: &dyn HidBackend) -> Result<DeviceDescriptor> {
    let candidates = enumerate_vendor(backend)?;
    select_from(backend, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBackend, MockCollection, MockEvent};

    const KBD: &str = r"\\?\hid#vid_3057&pid_0001&mi_00#7&1&0&0000#{884b96c3}\kbd";
    const MOUSE: &str = r"\\?\hid#vid_3057&pid_0001&mi_00#7&1&0&0000#{378de44c}";
    const VENDOR: &str = r"\\?\hid#vid_3057&pid_0001&mi_01&col02#8&2&0&0001#{4d1e55b2}";

    #[test]
    fn keyboard_collections_go_last() {
        let vendor_kbd = format!("{VENDOR}\\KBD");
        let mock = MockBackend::new()
            .with(MockCollection::new(KBD, "VAXEE", "XE"))
            .with(MockCollection::new(MOUSE, "VAXEE", "XE"))
            .with(MockCollection::new(&vendor_kbd, "VAXEE", "XE"))
            .with(MockCollection::new(VENDOR, "VAXEE", "XE"));
        let ordered = probe_order(enumerate_vendor(&mock).unwrap());
        let paths: Vec<&str> = ordered.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec![MOUSE, VENDOR, KBD, vendor_kbd.as_str()]);
    }

    #[test]
    fn keyboard_is_probed_only_after_others_fail() {
        let mock = MockBackend::new()
            .with(MockCollection::new(KBD, "VAXEE", "XE"))
            .with(MockCollection::new(MOUSE, "VAXEE", "XE").silent())
            .with(MockCollection::new(VENDOR, "VAXEE", "XE").silent());
        let selected = select_control_path(&mock).unwrap();
        assert_eq!(selected.path, KBD);
        assert_eq!(mock.probed_paths(), vec![MOUSE, VENDOR, KBD]);
    }

    #[test]
    fn selection_short_circuits() {
        let mock = MockBackend::new()
            .with(MockCollection::new("A", "VAXEE", "XE").silent())
            .with(MockCollection::new("B", "VAXEE", "XE"))
            .with(MockCollection::new("C", "VAXEE", "XE"));
        let selected = select_control_path(&mock).unwrap();
        assert_eq!(selected.path, "B");
        assert_eq!(mock.probed_paths(), vec!["A", "B"]);
    }

    #[test]
    fn probe_uses_declared_length_or_fallback() {
        let mock = MockBackend::new()
            .with(MockCollection::new("A", "VAXEE", "XE").no_caps().silent())
            .with(MockCollection::new("B", "VAXEE", "XE").feature_len(20));
        select_control_path(&mock).unwrap();
        let lens: Vec<(String, u8, usize)> = mock
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::GetFeature {
                    path,
                    report_id,
                    len,
                } => Some((path, report_id, len)),
                _ => None,
            })
            .collect();
        assert_eq!(
            lens,
            vec![("A".to_string(), 0x0E, 64), ("B".to_string(), 0x0E, 20)]
        );
    }

    #[test]
    fn unopenable_candidate_is_skipped() {
        let mock = MockBackend::new()
            .with(MockCollection::new("A", "VAXEE", "XE").unopenable())
            .with(MockCollection::new("B", "VAXEE", "XE"));
        assert_eq!(select_control_path(&mock).unwrap().path, "B");
    }

    #[test]
    fn no_vendor_device() {
        let mock = MockBackend::new().with(MockCollection::new("A", "ACME", "Mouse"));
        assert!(matches!(
            select_control_path(&mock),
            Err(Error::NoDeviceFound(_))
        ));
        assert!(mock.probed_paths().is_empty());
    }

    #[test]
    fn no_control_channel() {
        let mock = MockBackend::new()
            .with(MockCollection::new("A", "VAXEE", "XE").silent())
            .with(MockCollection::new(KBD, "VAXEE", "XE").silent());
        match select_control_path(&mock) {
            Err(Error::NoControlChannel {
                report_id,
                candidates,
            }) => {
                assert_eq!(report_id, 0x0E);
                assert_eq!(candidates, 2);
            }
            other => panic!("expected NoControlChannel, got {other:?}"),
        }
    }

    #[test]
    fn enumeration_error_propagates() {
        let mock = MockBackend::new().failing_class_query("class GUID lookup failed");
        assert!(matches!(
            select_control_path(&mock),
            Err(Error::Enumeration(_))
        ));
    }
}
