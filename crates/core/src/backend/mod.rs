//! Platform implementations of [`HidBackend`].

use crate::error::Result;
use crate::transport::HidBackend;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::WindowsBackend;

#[cfg(not(windows))]
mod hidapi_backend;
#[cfg(not(windows))]
pub use self::hidapi_backend::HidapiBackend;

/// The backend for the current platform.
pub fn default_backend() -> Result<Box<dyn HidBackend>> {
    #[cfg(windows)]
    {
        Ok(Box::new(WindowsBackend::new()))
    }

    #[cfg(not(windows))]
    {
        Ok(Box::new(HidapiBackend::new()?))
    }
}
