//! Background scheduling for the switcher loop.
//!
//! Failures are logged and otherwise ignored.

/// Lower process and thread priority; optionally enter background mode and
/// opt into EcoQoS execution-speed throttling.
#[cfg(windows)]
pub fn lower_priority(background_mode: bool, eco_qos: bool) {
    use tracing::{info, warn};
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::Threading::{
        GetCurrentProcess, GetCurrentThread, SetPriorityClass, SetThreadPriority,
        BELOW_NORMAL_PRIORITY_CLASS, PROCESS_MODE_BACKGROUND_BEGIN, THREAD_MODE_BACKGROUND_BEGIN,
        THREAD_PRIORITY_LOWEST,
    };

    // SAFETY: pseudo-handles for the current process and thread; never closed.
    let process = unsafe { GetCurrentProcess() };
    // SAFETY: as above.
    let thread = unsafe { GetCurrentThread() };
    // SAFETY: reads the calling thread's last-error value.
    let last_error = || unsafe { GetLastError() };

    // SAFETY: `process` is the current-process pseudo-handle.
    if unsafe { SetPriorityClass(process, BELOW_NORMAL_PRIORITY_CLASS) } == 0 {
        warn!(error = last_error(), "SetPriorityClass(BELOW_NORMAL) failed");
    } else {
        info!("Process priority set to BELOW_NORMAL");
    }

    // SAFETY: `thread` is the current-thread pseudo-handle.
    if unsafe { SetThreadPriority(thread, THREAD_PRIORITY_LOWEST) } == 0 {
        warn!(error = last_error(), "SetThreadPriority(LOWEST) failed");
    } else {
        info!("Thread priority set to LOWEST");
    }

    if background_mode {
        // SAFETY: `process` is the current-process pseudo-handle.
        if unsafe { SetPriorityClass(process, PROCESS_MODE_BACKGROUND_BEGIN) } == 0 {
            warn!(error = last_error(), "PROCESS_MODE_BACKGROUND_BEGIN failed");
        } else {
            info!("Process background mode enabled");
        }

        // SAFETY: `thread` is the current-thread pseudo-handle.
        if unsafe { SetThreadPriority(thread, THREAD_MODE_BACKGROUND_BEGIN) } == 0 {
            warn!(error = last_error(), "THREAD_MODE_BACKGROUND_BEGIN failed");
        } else {
            info!("Thread background mode enabled");
        }
    }

    if eco_qos {
        enable_eco_qos(process, thread);
    }
}

/// Turn on execution-speed power throttling for the process and thread.
///
/// Requires Windows 10 1709 (process) / Windows 11 (thread); older systems
/// reject the call and only a warning is logged.
#[cfg(windows)]
fn enable_eco_qos(
    process: windows_sys::Win32::Foundation::HANDLE,
    thread: windows_sys::Win32::Foundation::HANDLE,
) {
    use std::mem::size_of;
    use tracing::{info, warn};
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::Threading::{
        ProcessPowerThrottling, SetProcessInformation, SetThreadInformation,
        ThreadPowerThrottling, PROCESS_POWER_THROTTLING_CURRENT_VERSION,
        PROCESS_POWER_THROTTLING_EXECUTION_SPEED, PROCESS_POWER_THROTTLING_STATE,
        THREAD_POWER_THROTTLING_CURRENT_VERSION, THREAD_POWER_THROTTLING_EXECUTION_SPEED,
        THREAD_POWER_THROTTLING_STATE,
    };

    // SAFETY: reads the calling thread's last-error value.
    let last_error = || unsafe { GetLastError() };

    let process_state = PROCESS_POWER_THROTTLING_STATE {
        Version: PROCESS_POWER_THROTTLING_CURRENT_VERSION,
        ControlMask: PROCESS_POWER_THROTTLING_EXECUTION_SPEED,
        StateMask: PROCESS_POWER_THROTTLING_EXECUTION_SPEED,
    };
    // SAFETY: `process_state` is a live PROCESS_POWER_THROTTLING_STATE and the
    // size passed is its size.
    let ok = unsafe {
        SetProcessInformation(
            process,
            ProcessPowerThrottling,
            (&process_state as *const PROCESS_POWER_THROTTLING_STATE).cast(),
            size_of::<PROCESS_POWER_THROTTLING_STATE>() as u32,
        )
    };
    if ok == 0 {
        warn!(error = last_error(), "Process EcoQoS throttling failed");
    } else {
        info!("Process EcoQoS throttling enabled");
    }

    let thread_state = THREAD_POWER_THROTTLING_STATE {
        Version: THREAD_POWER_THROTTLING_CURRENT_VERSION,
        ControlMask: THREAD_POWER_THROTTLING_EXECUTION_SPEED,
        StateMask: THREAD_POWER_THROTTLING_EXECUTION_SPEED,
    };
    // SAFETY: `thread_state` is a live THREAD_POWER_THROTTLING_STATE and the
    // size passed is its size.
    let ok = unsafe {
        SetThreadInformation(
            thread,
            ThreadPowerThrottling,
            (&thread_state as *const THREAD_POWER_THROTTLING_STATE).cast(),
            size_of::<THREAD_POWER_THROTTLING_STATE>() as u32,
        )
    };
    if ok == 0 {
        warn!(error = last_error(), "Thread EcoQoS throttling failed");
    } else {
        info!("Thread EcoQoS throttling enabled");
    }
}

#[cfg(not(windows))]
pub fn lower_priority(background_mode: bool, eco_qos: bool) {
    tracing::debug!(
        background_mode,
        eco_qos,
        "Priority tuning is only implemented on Windows"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // Thread-level changes stay on the spawned thread.
    #[test]
    fn lower_priority_with_every_option_returns() {
        std::thread::spawn(|| lower_priority(true, true))
            .join()
            .unwrap();
    }
}
