//! Foreground window → executable name.

use anyhow::Result;

/// Lower-cased file name of the process owning the foreground window.
#[cfg(windows)]
pub fn foreground_process_name() -> Result<String> {
    use anyhow::{anyhow, bail};
    use perfswitch_core::config::process_basename;
    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError};
    use windows_sys::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowThreadProcessId,
    };

    // SAFETY: no arguments; a null result is handled below.
    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.is_null() {
        bail!("no foreground window");
    }

    let mut pid = 0u32;
    // SAFETY: `hwnd` is non-null and `pid` is a writable out-parameter.
    unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
    if pid == 0 {
        bail!("foreground window has no owning process");
    }

    // SAFETY: plain value arguments; a null handle is handled below.
    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
    if process.is_null() {
        // SAFETY: reads the calling thread's last-error value.
        bail!("OpenProcess({pid}) failed (error {})", unsafe { GetLastError() });
    }

    let mut buf = vec![0u16; 4096];
    let mut len = buf.len() as u32;
    // SAFETY: `len` holds the capacity of `buf` in UTF-16 units.
    let ok = unsafe {
        QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, buf.as_mut_ptr(), &mut len)
    };
    // SAFETY: reads the calling thread's last-error value.
    let error = unsafe { GetLastError() };
    // SAFETY: `process` came from a successful OpenProcess and is closed once.
    unsafe { CloseHandle(process) };
    if ok == 0 {
        return Err(anyhow!(
            "QueryFullProcessImageNameW({pid}) failed (error {error})"
        ));
    }

    let full = String::from_utf16_lossy(&buf[..len as usize]);
    Ok(process_basename(&full))
}

#[cfg(not(windows))]
pub fn foreground_process_name() -> Result<String> {
    anyhow::bail!("foreground process lookup is only supported on Windows")
}
