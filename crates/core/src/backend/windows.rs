//! Native Windows backend: SetupAPI interface enumeration and hid.dll.
//!
//! Every record the OS fills is one of the fixed-layout types in
//! [`crate::layout`]; this module only passes pointers to them.

use crate::error::{Error, Result};
use crate::layout::{utf16_until_nul, DetailBuffer, HiddAttributes, HidpCaps};
use crate::transport::{Access, HidBackend, HidHandle, InterfaceError, InterfaceSet};
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr::{null, null_mut};
use tracing::trace;
use windows_sys::core::GUID;
use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
    SetupDiGetDeviceInterfaceDetailW, DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO,
    SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W,
};
use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidD_FreePreparsedData, HidD_GetAttributes, HidD_GetFeature, HidD_GetHidGuid,
    HidD_GetManufacturerString, HidD_GetPreparsedData, HidD_GetProductString, HidD_SetFeature,
    HidP_GetCaps, HIDD_ATTRIBUTES, HIDP_CAPS, HIDP_STATUS_SUCCESS, PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_NO_MORE_ITEMS, GENERIC_READ, GENERIC_WRITE, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};

/// HID string descriptors are at most 126 UTF-16 units plus NUL.
const STRING_UNITS: usize = 128;

fn last_error() -> u32 {
    // SAFETY: reads the calling thread's last-error value; no arguments.
    unsafe { GetLastError() }
}

fn wide(path: &str) -> Vec<u16> {
    OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// SetupAPI + hid.dll backend.
#[derive(Debug, Default)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl HidBackend for WindowsBackend {
    fn interfaces(&self) -> Result<Box<dyn InterfaceSet + '_>> {
        let mut guid = GUID::from_u128(0);
        // SAFETY: `guid` is a valid, writable GUID.
        unsafe { HidD_GetHidGuid(&mut guid) };

        // SAFETY: `guid` outlives the call; null enumerator and parent window are allowed.
        let info = unsafe {
            SetupDiGetClassDevsW(
                &guid,
                null(),
                null_mut(),
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        };
        if info as isize == -1 || info as isize == 0 {
            return Err(Error::Enumeration(format!(
                "SetupDiGetClassDevsW failed (error {})",
                last_error()
            )));
        }

        Ok(Box::new(DeviceInterfaces { info, guid }))
    }

    fn open(&self, path: &str, access: Access) -> Result<Box<dyn HidHandle + '_>> {
        let desired = match access {
            Access::Query => 0,
            Access::ReadWrite => GENERIC_READ | GENERIC_WRITE,
            Access::WriteOnly => GENERIC_WRITE,
        };
        let name = wide(path);
        // SAFETY: `name` is NUL-terminated UTF-16 and outlives the call.
        let handle = unsafe {
            CreateFileW(
                name.as_ptr(),
                desired,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(Error::DeviceOpen {
                path: path.to_string(),
                reason: format!("CreateFileW({access:?}) failed (error {})", last_error()),
            });
        }
        trace!(path, ?access, "Opened device path");
        Ok(Box::new(DeviceHandle { handle }))
    }
}

/// A SetupAPI device information set, destroyed on drop.
struct DeviceInterfaces {
    info: HDEVINFO,
    guid: GUID,
}

impl Drop for DeviceInterfaces {
    fn drop(&mut self) {
        // SAFETY: `info` came from a successful SetupDiGetClassDevsW and is destroyed once.
        unsafe { SetupDiDestroyDeviceInfoList(self.info) };
    }
}

impl InterfaceSet for DeviceInterfaces {
    fn path_at(&mut self, index: u32) -> std::result::Result<Option<String>, InterfaceError> {
        // SAFETY: SP_DEVICE_INTERFACE_DATA is plain data; all-zero is a valid value.
        let mut data: SP_DEVICE_INTERFACE_DATA = unsafe { std::mem::zeroed() };
        data.cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;

        // SAFETY: `info` is a live device information set; `data` has cbSize set.
        let ok = unsafe {
            SetupDiEnumDeviceInterfaces(self.info, null(), &self.guid, index, &mut data)
        };
        if ok == 0 {
            return match last_error() {
                ERROR_NO_MORE_ITEMS => Err(InterfaceError::NoMoreItems),
                code => Err(InterfaceError::Os(code)),
            };
        }

        // Size query; expected to fail with ERROR_INSUFFICIENT_BUFFER.
        let mut required = 0u32;
        // SAFETY: null detail buffer with size 0 is the documented size query.
        unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.info,
                &data,
                null_mut(),
                0,
                &mut required,
                null_mut(),
            )
        };
        if required == 0 {
            return Ok(None);
        }

        let mut detail = DetailBuffer::new(required as usize);
        // SAFETY: `detail` is 4-byte aligned, `byte_len()` bytes long and has cbSize set.
        let ok = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.info,
                &data,
                detail.as_mut_ptr().cast::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>(),
                detail.byte_len() as u32,
                null_mut(),
                null_mut(),
            )
        };
        if ok == 0 {
            return Ok(None);
        }
        Ok(detail.device_path())
    }
}

/// An open device path, closed on drop.
struct DeviceHandle {
    handle: HANDLE,
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        // SAFETY: `handle` came from a successful CreateFileW and is closed once.
        unsafe { CloseHandle(self.handle) };
    }
}

impl DeviceHandle {
    fn string(
        &self,
        what: &str,
        query: unsafe extern "system" fn(HANDLE, *mut core::ffi::c_void, u32) -> u8,
    ) -> Result<String> {
        let mut buf = [0u16; STRING_UNITS];
        // SAFETY: the buffer length passed is the byte size of `buf`.
        let ok = unsafe {
            query(
                self.handle,
                buf.as_mut_ptr().cast(),
                (buf.len() * std::mem::size_of::<u16>()) as u32,
            )
        };
        if ok == 0 {
            return Err(Error::Platform(format!(
                "{what} string query failed (error {})",
                last_error()
            )));
        }
        Ok(utf16_until_nul(&buf))
    }
}

impl HidHandle for DeviceHandle {
    fn attributes(&self) -> Result<HiddAttributes> {
        let mut attributes = HiddAttributes::default();
        // SAFETY: HiddAttributes is #[repr(C)] with the HIDD_ATTRIBUTES layout and Size set.
        let ok = unsafe {
            HidD_GetAttributes(
                self.handle,
                &mut attributes as *mut HiddAttributes as *mut HIDD_ATTRIBUTES,
            )
        };
        if ok == 0 {
            return Err(Error::Platform(format!(
                "HidD_GetAttributes failed (error {})",
                last_error()
            )));
        }
        Ok(attributes)
    }

    fn manufacturer(&self) -> Result<String> {
        self.string("manufacturer", HidD_GetManufacturerString)
    }

    fn product(&self) -> Result<String> {
        self.string("product", HidD_GetProductString)
    }

    fn capabilities(&self) -> Result<HidpCaps> {
        let mut preparsed: PHIDP_PREPARSED_DATA = 0;
        // SAFETY: `preparsed` is a writable out-parameter.
        let ok = unsafe { HidD_GetPreparsedData(self.handle, &mut preparsed) };
        if ok == 0 || preparsed == 0 {
            return Err(Error::Platform(format!(
                "HidD_GetPreparsedData failed (error {})",
                last_error()
            )));
        }

        let mut caps = HidpCaps::default();
        // SAFETY: `preparsed` is valid until freed below; HidpCaps is #[repr(C)] HIDP_CAPS.
        let status = unsafe { HidP_GetCaps(preparsed, &mut caps as *mut HidpCaps as *mut HIDP_CAPS) };
        // SAFETY: freed exactly once, after its last use.
        unsafe { HidD_FreePreparsedData(preparsed) };

        if status != HIDP_STATUS_SUCCESS {
            return Err(Error::Platform(format!(
                "HidP_GetCaps failed (status 0x{status:08X})"
            )));
        }
        Ok(caps)
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<()> {
        // SAFETY: the length passed is the length of `buf`.
        let ok = unsafe { HidD_GetFeature(self.handle, buf.as_mut_ptr().cast(), buf.len() as u32) };
        if ok == 0 {
            return Err(Error::Report {
                op: "get feature",
                reason: format!("HidD_GetFeature failed (error {})", last_error()),
            });
        }
        Ok(())
    }

    fn set_feature(&self, data: &[u8]) -> Result<()> {
        // SAFETY: the length passed is the length of `data`.
        let ok = unsafe { HidD_SetFeature(self.handle, data.as_ptr().cast(), data.len() as u32) };
        if ok == 0 {
            return Err(Error::Report {
                op: "set feature",
                reason: format!("HidD_SetFeature failed (error {})", last_error()),
            });
        }
        Ok(())
    }
}
