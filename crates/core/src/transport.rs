//! OS service boundary for HID enumeration and feature-report exchange.
//!
//! The core never calls the OS directly. It goes through [`HidBackend`], so
//! real backends (`crate::backend`) and the recording fake in [`mock`] share
//! the same interface and the selection/apply algorithms run without hardware.

use crate::error::{Error, Result};
use crate::layout::{HidpCaps, HiddAttributes};
use crate::report::{FeatureReport, MIN_REPORT_LEN};
use crate::safety::validate_command;
use tracing::{debug, trace};

/// Access mode requested when opening a device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No read/write access; enough for attributes, strings and caps.
    Query,
    ReadWrite,
    WriteOnly,
}

/// Why an interface index could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceError {
    /// The OS reported the end of the interface list.
    NoMoreItems,
    /// Any other OS error code.
    Os(u32),
}

/// One enumeration session over the present HID device interfaces.
pub trait InterfaceSet {
    /// Resolve the interface at `index` to a device path.
    ///
    /// `Ok(None)` means the interface exists but its path could not be read.
    fn path_at(&mut self, index: u32) -> std::result::Result<Option<String>, InterfaceError>;
}

/// An open device path. Closed when dropped.
pub trait HidHandle {
    fn attributes(&self) -> Result<HiddAttributes>;
    fn manufacturer(&self) -> Result<String>;
    fn product(&self) -> Result<String>;
    fn capabilities(&self) -> Result<HidpCaps>;
    /// Read a feature report. `buf[0]` must hold the report ID on entry.
    fn get_feature(&self, buf: &mut [u8]) -> Result<()>;
    fn set_feature(&self, data: &[u8]) -> Result<()>;
}

/// Native HID API surface used by the core.
pub trait HidBackend {
    /// Start a fresh enumeration of all present HID interfaces.
    ///
    /// Fails with [`Error::Enumeration`] if the class query itself fails.
    fn interfaces(&self) -> Result<Box<dyn InterfaceSet + '_>>;

    /// Open `path` with the requested access.
    fn open(&self, path: &str, access: Access) -> Result<Box<dyn HidHandle + '_>>;
}

/// Open a path for control traffic: read-write first, then write-only.
pub fn open_for_control<'a>(
    backend: &'a dyn HidBackend,
    path: &str,
) -> Result<Box<dyn HidHandle + 'a>> {
    match backend.open(path, Access::ReadWrite) {
        Ok(handle) => Ok(handle),
        Err(rw_err) => {
            debug!(path, error = %rw_err, "Read-write open failed, retrying write-only");
            backend
                .open(path, Access::WriteOnly)
                .map_err(|wo_err| Error::DeviceOpen {
                    path: path.to_string(),
                    reason: format!("read-write: {rw_err}; write-only: {wo_err}"),
                })
        }
    }
}

/// Open `path` and read one feature report of `len` bytes with `report_id`.
pub fn get_feature_report(
    backend: &dyn HidBackend,
    path: &str,
    report_id: u8,
    len: usize,
) -> Result<Vec<u8>> {
    if len == 0 {
        return Err(Error::Report {
            op: "get feature",
            reason: "zero-length buffer".into(),
        });
    }
    let handle = open_for_control(backend, path)?;

    let mut buf = vec![0u8; len];
    buf[0] = report_id;
    handle.get_feature(&mut buf)?;

    trace!(
        path,
        report_id = format_args!("0x{:02X}", report_id),
        report_hex = format_args!("{:02X?}", buf),
        "Feature RX"
    );
    Ok(buf)
}

/// Open `path` and send one feature report.
///
/// The report must carry a full header and a whitelisted command byte;
/// anything else is rejected before the device is opened.
pub fn send_feature_report(backend: &dyn HidBackend, path: &str, report: &FeatureReport) -> Result<()> {
    if report.len() < MIN_REPORT_LEN {
        return Err(Error::Report {
            op: "set feature",
            reason: format!("report too short: {} bytes (need {MIN_REPORT_LEN})", report.len()),
        });
    }
    let command = validate_command(report.as_bytes()[2])?;
    let handle = open_for_control(backend, path)?;

    trace!(
        path,
        ?command,
        len = report.len(),
        report_hex = format_args!("{:02X?}", report.as_bytes()),
        "Feature TX"
    );
    handle.set_feature(report.as_bytes())
}

/// A fake HID layer for testing.
///
/// Holds a list of simulated collections and records every operation.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    /// One simulated top-level collection.
    #[derive(Debug, Clone)]
    pub struct MockCollection {
        pub path: String,
        /// `None` makes the attribute query fail.
        pub attributes: Option<HiddAttributes>,
        pub manufacturer: Option<String>,
        pub product: Option<String>,
        /// `None` makes the capability query fail.
        pub caps: Option<HidpCaps>,
        /// Whether a query-only open succeeds.
        pub queryable: bool,
        /// Whether a read-write open succeeds.
        pub read_write: bool,
        /// Whether a write-only open succeeds.
        pub write_only: bool,
        /// Whether `get_feature` succeeds.
        pub answers_probe: bool,
        /// Command bytes (report byte 2) whose `set_feature` fails.
        pub reject_commands: Vec<u8>,
    }

    impl MockCollection {
        /// A collection that answers everything.
        pub fn new(path: &str, manufacturer: &str, product: &str) -> Self {
            Self {
                path: path.to_string(),
                attributes: Some(HiddAttributes::new(0x3057, 0x0001)),
                manufacturer: Some(manufacturer.to_string()),
                product: Some(product.to_string()),
                caps: Some(HidpCaps::with_usage(0xFF00, 0x0001, 64)),
                queryable: true,
                read_write: true,
                write_only: true,
                answers_probe: true,
                reject_commands: Vec::new(),
            }
        }

        pub fn feature_len(mut self, len: u16) -> Self {
            let mut caps = self.caps.unwrap_or_default();
            caps.feature_report_byte_length = len;
            self.caps = Some(caps);
            self
        }

        pub fn usage(mut self, usage_page: u16, usage: u16) -> Self {
            let mut caps = self.caps.unwrap_or_default();
            caps.usage_page = usage_page;
            caps.usage = usage;
            self.caps = Some(caps);
            self
        }

        pub fn ids(mut self, vid: u16, pid: u16) -> Self {
            self.attributes = Some(HiddAttributes::new(vid, pid));
            self
        }

        pub fn no_caps(mut self) -> Self {
            self.caps = None;
            self
        }

        pub fn no_strings(mut self) -> Self {
            self.manufacturer = None;
            self.product = None;
            self
        }

        pub fn no_attributes(mut self) -> Self {
            self.attributes = None;
            self
        }

        pub fn unqueryable(mut self) -> Self {
            self.queryable = false;
            self
        }

        pub fn silent(mut self) -> Self {
            self.answers_probe = false;
            self
        }

        pub fn write_only(mut self) -> Self {
            self.read_write = false;
            self
        }

        pub fn unopenable(mut self) -> Self {
            self.read_write = false;
            self.write_only = false;
            self
        }

        pub fn rejects(mut self, command: u8) -> Self {
            self.reject_commands.push(command);
            self
        }
    }

    /// Recorded backend operation.
    #[derive(Debug, Clone, PartialEq)]
    pub enum MockEvent {
        Open { path: String, access: Access },
        GetFeature { path: String, report_id: u8, len: usize },
        SetFeature { path: String, data: Vec<u8>, at: Instant },
    }

    /// Backend slot at one interface index.
    #[derive(Debug, Clone)]
    enum Slot {
        Collection(usize),
        Unresolved,
        Fail(u32),
    }

    /// Fake backend that serves [`MockCollection`]s and records operations.
    #[derive(Default)]
    pub struct MockBackend {
        collections: Vec<MockCollection>,
        slots: Vec<Slot>,
        class_query_error: Option<String>,
        events: Mutex<Vec<MockEvent>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a collection at the next interface index.
        pub fn with(mut self, collection: MockCollection) -> Self {
            self.slots.push(Slot::Collection(self.collections.len()));
            self.collections.push(collection);
            self
        }

        /// Add an interface whose path cannot be resolved.
        pub fn with_unresolved(mut self) -> Self {
            self.slots.push(Slot::Unresolved);
            self
        }

        /// Make the walk fail with an OS error at the next interface index.
        pub fn with_interface_error(mut self, code: u32) -> Self {
            self.slots.push(Slot::Fail(code));
            self
        }

        /// Make the HID class query itself fail.
        pub fn failing_class_query(mut self, reason: &str) -> Self {
            self.class_query_error = Some(reason.to_string());
            self
        }

        pub fn events(&self) -> Vec<MockEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Paths passed to `get_feature`, in order.
        pub fn probed_paths(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    MockEvent::GetFeature { path, .. } => Some(path),
                    _ => None,
                })
                .collect()
        }

        /// `(path, data, at)` for every successful `set_feature`, in order.
        pub fn sent_reports(&self) -> Vec<(String, Vec<u8>, Instant)> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    MockEvent::SetFeature { path, data, at } => Some((path, data, at)),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, event: MockEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn find(&self, path: &str) -> Option<&MockCollection> {
            self.collections.iter().find(|c| c.path == path)
        }
    }

    struct MockInterfaces<'a> {
        backend: &'a MockBackend,
    }

    impl InterfaceSet for MockInterfaces<'_> {
        fn path_at(&mut self, index: u32) -> std::result::Result<Option<String>, InterfaceError> {
            match self.backend.slots.get(index as usize) {
                None => Err(InterfaceError::NoMoreItems),
                Some(Slot::Fail(code)) => Err(InterfaceError::Os(*code)),
                Some(Slot::Unresolved) => Ok(None),
                Some(Slot::Collection(i)) => Ok(Some(self.backend.collections[*i].path.clone())),
            }
        }
    }

    struct MockHandle<'a> {
        backend: &'a MockBackend,
        collection: MockCollection,
    }

    impl HidHandle for MockHandle<'_> {
        fn attributes(&self) -> Result<HiddAttributes> {
            self.collection
                .attributes
                .ok_or_else(|| Error::Platform("mock: attributes unavailable".into()))
        }

        fn manufacturer(&self) -> Result<String> {
            self.collection
                .manufacturer
                .clone()
                .ok_or_else(|| Error::Platform("mock: no manufacturer string".into()))
        }

        fn product(&self) -> Result<String> {
            self.collection
                .product
                .clone()
                .ok_or_else(|| Error::Platform("mock: no product string".into()))
        }

        fn capabilities(&self) -> Result<HidpCaps> {
            self.collection
                .caps
                .ok_or_else(|| Error::Platform("mock: preparsed data unavailable".into()))
        }

        fn get_feature(&self, buf: &mut [u8]) -> Result<()> {
            self.backend.record(MockEvent::GetFeature {
                path: self.collection.path.clone(),
                report_id: buf[0],
                len: buf.len(),
            });
            if !self.collection.answers_probe {
                return Err(Error::Report {
                    op: "get feature",
                    reason: "mock: incorrect function".into(),
                });
            }
            Ok(())
        }

        fn set_feature(&self, data: &[u8]) -> Result<()> {
            let command = data.get(2).copied().unwrap_or(0);
            if self.collection.reject_commands.contains(&command) {
                return Err(Error::Report {
                    op: "set feature",
                    reason: format!("mock: command 0x{command:02X} rejected"),
                });
            }
            self.backend.record(MockEvent::SetFeature {
                path: self.collection.path.clone(),
                data: data.to_vec(),
                at: Instant::now(),
            });
            Ok(())
        }
    }

    impl HidBackend for MockBackend {
        fn interfaces(&self) -> Result<Box<dyn InterfaceSet + '_>> {
            if let Some(reason) = &self.class_query_error {
                return Err(Error::Enumeration(reason.clone()));
            }
            Ok(Box::new(MockInterfaces { backend: self }))
        }

        fn open(&self, path: &str, access: Access) -> Result<Box<dyn HidHandle + '_>> {
            self.record(MockEvent::Open {
                path: path.to_string(),
                access,
            });
            let collection = self
                .find(path)
                .ok_or_else(|| Error::Platform(format!("mock: no such path {path}")))?;
            let allowed = match access {
                Access::Query => collection.queryable,
                Access::ReadWrite => collection.read_write,
                Access::WriteOnly => collection.write_only,
            };
            if !allowed {
                return Err(Error::Platform(format!("mock: {access:?} open denied")));
            }
            Ok(Box::new(MockHandle {
                backend: self,
                collection: collection.clone(),
            }))
        }
    }
}
