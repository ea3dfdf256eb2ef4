//! `hidapi` backend for platforms without the native Windows path.
//!
//! Query-only opens never touch the device: they are served from the
//! `device_list()` entry captured by the last enumeration. Only read-write
//! and write-only opens call `open_path`.
//!
//! hidapi reports usage page and usage per collection but not the declared
//! feature report length, so capabilities carry a length of 0 and reports
//! use the 64-byte fallback.

use crate::error::{Error, Result};
use crate::layout::{HiddAttributes, HidpCaps};
use crate::transport::{Access, HidBackend, HidHandle, InterfaceError, InterfaceSet};
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CString;
use tracing::trace;

/// What enumeration learned about one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CollectionInfo {
    vendor_id: u16,
    product_id: u16,
    manufacturer: String,
    product: String,
    usage_page: u16,
    usage: u16,
}

impl From<&DeviceInfo> for CollectionInfo {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            manufacturer: info.manufacturer_string().unwrap_or_default().to_string(),
            product: info.product_string().unwrap_or_default().to_string(),
            usage_page: info.usage_page(),
            usage: info.usage(),
        }
    }
}

/// Collections seen by the last enumeration, keyed by path.
#[derive(Debug, Default)]
struct Catalog {
    collections: HashMap<String, CollectionInfo>,
}

impl Catalog {
    fn query(&self, path: &str) -> Result<QueryHandle> {
        self.collections
            .get(path)
            .cloned()
            .map(|info| QueryHandle { info })
            .ok_or_else(|| Error::DeviceOpen {
                path: path.to_string(),
                reason: "not present in the last enumeration".into(),
            })
    }
}

/// Backend over the system hidapi library.
pub struct HidapiBackend {
    api: HidApi,
    catalog: RefCell<Catalog>,
}

impl HidapiBackend {
    pub fn new() -> Result<Self> {
        let api = HidApi::new_without_enumerate()
            .map_err(|e| Error::Enumeration(format!("hidapi init: {e}")))?;
        Ok(Self {
            api,
            catalog: RefCell::new(Catalog::default()),
        })
    }
}

/// Paths captured at the start of one enumeration.
struct Snapshot {
    paths: Vec<Option<String>>,
}

impl InterfaceSet for Snapshot {
    fn path_at(&mut self, index: u32) -> std::result::Result<Option<String>, InterfaceError> {
        self.paths
            .get(index as usize)
            .cloned()
            .ok_or(InterfaceError::NoMoreItems)
    }
}

impl HidBackend for HidapiBackend {
    fn interfaces(&self) -> Result<Box<dyn InterfaceSet + '_>> {
        let api = HidApi::new().map_err(|e| Error::Enumeration(format!("hidapi init: {e}")))?;

        let mut catalog = Catalog::default();
        let mut paths = Vec::new();
        for info in api.device_list() {
            let path = info.path().to_str().ok().map(str::to_string);
            if let Some(path) = &path {
                catalog
                    .collections
                    .insert(path.clone(), CollectionInfo::from(info));
            }
            paths.push(path);
        }

        *self.catalog.borrow_mut() = catalog;
        Ok(Box::new(Snapshot { paths }))
    }

    fn open(&self, path: &str, access: Access) -> Result<Box<dyn HidHandle + '_>> {
        if access == Access::Query {
            return Ok(Box::new(self.catalog.borrow().query(path)?));
        }

        let device_open = |reason: String| Error::DeviceOpen {
            path: path.to_string(),
            reason,
        };
        let c_path = CString::new(path).map_err(|e| device_open(e.to_string()))?;
        let device = self
            .api
            .open_path(&c_path)
            .map_err(|e| device_open(e.to_string()))?;
        trace!(path, ?access, "Opened device path");
        Ok(Box::new(Device { device }))
    }
}

/// A query-only handle: answers from enumeration data, refuses report I/O.
#[derive(Debug)]
struct QueryHandle {
    info: CollectionInfo,
}

fn query_only(op: &'static str) -> Error {
    Error::Report {
        op,
        reason: "handle was opened query-only".into(),
    }
}

impl HidHandle for QueryHandle {
    fn attributes(&self) -> Result<HiddAttributes> {
        Ok(HiddAttributes::new(self.info.vendor_id, self.info.product_id))
    }

    fn manufacturer(&self) -> Result<String> {
        Ok(self.info.manufacturer.clone())
    }

    fn product(&self) -> Result<String> {
        Ok(self.info.product.clone())
    }

    fn capabilities(&self) -> Result<HidpCaps> {
        Ok(HidpCaps::with_usage(self.info.usage_page, self.info.usage, 0))
    }

    fn get_feature(&self, _buf: &mut [u8]) -> Result<()> {
        Err(query_only("get feature"))
    }

    fn set_feature(&self, _data: &[u8]) -> Result<()> {
        Err(query_only("set feature"))
    }
}

struct Device {
    device: HidDevice,
}

fn platform(what: &str, e: hidapi::HidError) -> Error {
    Error::Platform(format!("{what}: {e}"))
}

impl HidHandle for Device {
    fn attributes(&self) -> Result<HiddAttributes> {
        let info = self
            .device
            .get_device_info()
            .map_err(|e| platform("device info", e))?;
        Ok(HiddAttributes::new(info.vendor_id(), info.product_id()))
    }

    fn manufacturer(&self) -> Result<String> {
        self.device
            .get_manufacturer_string()
            .map(Option::unwrap_or_default)
            .map_err(|e| platform("manufacturer string", e))
    }

    fn product(&self) -> Result<String> {
        self.device
            .get_product_string()
            .map(Option::unwrap_or_default)
            .map_err(|e| platform("product string", e))
    }

    fn capabilities(&self) -> Result<HidpCaps> {
        let info = self
            .device
            .get_device_info()
            .map_err(|e| platform("device info", e))?;
        Ok(HidpCaps::with_usage(info.usage_page(), info.usage(), 0))
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<()> {
        self.device
            .get_feature_report(buf)
            .map(|_| ())
            .map_err(|e| Error::Report {
                op: "get feature",
                reason: e.to_string(),
            })
    }

    fn set_feature(&self, data: &[u8]) -> Result<()> {
        self.device
            .send_feature_report(data)
            .map_err(|e| Error::Report {
                op: "set feature",
                reason: e.to_string(),
            })
    }
}
