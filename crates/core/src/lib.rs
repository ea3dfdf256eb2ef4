//! perfswitch-core: HID discovery and vendor feature-report control.
//!
//! This crate finds a VAXEE mouse among the HID top-level collections the OS
//! exposes, works out which collection accepts the vendor control protocol,
//! and sends the feature reports that change its performance mode and polling
//! rate. The switcher policy and its configuration file also live here; the
//! foreground-window lookup is in the CLI crate.

pub mod apply;
pub mod backend;
pub mod caps;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod layout;
pub mod report;
pub mod safety;
pub mod switcher;
pub mod transport;

/// Substring matched (case-insensitively) against manufacturer and product.
pub const VENDOR_NAME: &str = "vaxee";

/// Device path suffix of keyboard-emulation collections (compared lower-cased).
pub const KEYBOARD_PATH_SUFFIX: &str = r"\kbd";
