//! perfswitch CLI: foreground-driven mouse mode switcher and HID diagnostics.

mod foreground;
mod priority;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use perfswitch_core::backend::default_backend;
use perfswitch_core::config::{default_config_path, ensure_config_exists, Config, ConfigWatcher};
use perfswitch_core::device::{enumerate_all, enumerate_vendor, DeviceDescriptor};
use perfswitch_core::safety::{validate_perf_mode_name, validate_polling_rate};
use perfswitch_core::switcher::{ErrorLatch, Switcher};
use perfswitch_core::transport::HidBackend;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "perfswitch",
    version,
    about = "Switch a VAXEE mouse's performance mode and polling rate by foreground application"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List VAXEE HID collections.
    ListDevices {
        /// List every HID collection instead.
        #[arg(long)]
        all: bool,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show which collection accepts the control protocol.
    Select,
    /// Apply a performance mode and polling rate once.
    Apply {
        /// standard_ms_off, competitive_ms_off, competitive_ms_on or standard_ms_on.
        #[arg(long)]
        mode: String,
        /// Polling rate in Hz (1000, 2000 or 4000).
        #[arg(long)]
        rate: u32,
    },
    /// Watch the foreground application and switch settings.
    Run {
        /// Configuration file (default: perfswitch.conf next to the executable).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Run a single tick and exit.
        #[arg(long)]
        once: bool,
        /// Also opt into EcoQoS (execution-speed power throttling).
        #[arg(long)]
        eco_qos: bool,
    },
    /// Write the default configuration file if it does not exist.
    InitConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices { all, json } => {
            let backend = default_backend()?;
            let devices = if all {
                enumerate_all(backend.as_ref())?
            } else {
                enumerate_vendor(backend.as_ref())?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No matching HID collections found.");
                if !all {
                    println!("Run with --all to list every HID collection.");
                }
            } else {
                for (i, dev) in devices.iter().enumerate() {
                    println!("#{} {}", i + 1, describe(dev));
                }
            }
        }
        Commands::Select => {
            let backend = default_backend()?;
            let dev = perfswitch_core::control::select_control_path(backend.as_ref())?;
            println!("Control path: {}", dev.path);
            println!(
                "  usage 0x{:04X}:0x{:04X}, report length {} bytes",
                dev.usage_page,
                dev.usage,
                dev.report_len()
            );
        }
        Commands::Apply { mode, rate } => {
            let mode = validate_perf_mode_name(&mode)?;
            let rate = validate_polling_rate(rate)?;
            let backend = default_backend()?;
            let applied = perfswitch_core::apply::apply(backend.as_ref(), mode, rate)?;
            println!(
                "Applied {} + {} via {}",
                applied.mode, applied.rate, applied.device.path
            );
        }
        Commands::Run {
            config,
            once,
            eco_qos,
        } => {
            let path = config.unwrap_or_else(default_config_path);
            run(path, once, eco_qos)?;
        }
        Commands::InitConfig { config } => {
            let path = config.unwrap_or_else(default_config_path);
            if ensure_config_exists(&path)? {
                println!("Wrote default configuration to {}", path.display());
            } else {
                println!("{} already exists", path.display());
            }
        }
    }

    Ok(())
}

fn describe(dev: &DeviceDescriptor) -> String {
    format!(
        "Manufacturer={:?} Product={:?} VID=0x{:04X} PID=0x{:04X} Usage=0x{:04X}:0x{:04X} FeatureLen={}{}{} Path={}",
        dev.manufacturer,
        dev.product,
        dev.vendor_id,
        dev.product_id,
        dev.usage_page,
        dev.usage,
        dev.feature_report_length,
        if dev.capabilities().is_vendor_defined() { " [vendor]" } else { "" },
        if dev.is_keyboard_collection() { " [kbd]" } else { "" },
        dev.path
    )
}

fn log_config(config: &Config) {
    info!(interval = ?config.interval, "Check interval");
    info!(mode = %config.hit_mode, rate = %config.hit_rate, "Whitelisted");
    info!(mode = %config.default_mode, rate = %config.default_rate, "Default");
    info!(
        count = config.whitelist.len(),
        processes = %config.whitelist.join(", "),
        "Whitelist"
    );
}

/// Log vendor collections, or every named HID collection when none match.
fn dump_devices(backend: &dyn HidBackend) {
    let vendor = match enumerate_vendor(backend) {
        Ok(vendor) => vendor,
        Err(e) => {
            warn!(error = %e, "HID enumeration failed");
            return;
        }
    };

    if !vendor.is_empty() {
        info!(count = vendor.len(), "Found VAXEE HID collections");
        for (i, dev) in vendor.iter().enumerate() {
            info!("  #{} {}", i + 1, describe(dev));
        }
        return;
    }

    info!("No VAXEE device found; will look again on every switch");
    match enumerate_all(backend) {
        Ok(all) => {
            info!(count = all.len(), "HID collections on this system");
            for (i, dev) in all.iter().enumerate() {
                if dev.manufacturer.is_empty() && dev.product.is_empty() {
                    continue;
                }
                info!("  [HID #{}] {}", i + 1, describe(dev));
            }
        }
        Err(e) => warn!(error = %e, "Enumerating all HID collections failed"),
    }
}

fn run(path: PathBuf, once: bool, eco_qos: bool) -> Result<()> {
    ensure_config_exists(&path)
        .with_context(|| format!("creating default configuration at {}", path.display()))?;
    let mut watcher = ConfigWatcher::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    info!(config = %path.display(), "perfswitch starting");
    log_config(watcher.config());

    let backend = default_backend()?;
    dump_devices(backend.as_ref());

    priority::lower_priority(true, eco_qos);
    info!(interval = ?watcher.config().interval, "Watching the foreground application");

    let mut switcher = Switcher::new();
    let mut latch = ErrorLatch::new();

    loop {
        if watcher.poll() {
            log_config(watcher.config());
        }

        run_tick(
            backend.as_ref(),
            &mut switcher,
            &mut latch,
            foreground::foreground_process_name(),
            watcher.config(),
        );

        if once {
            return Ok(());
        }
        thread::sleep(watcher.config().interval);
    }
}

/// One switcher step for an already-resolved foreground lookup.
///
/// A failed lookup skips the device and clears the error latch, so an error
/// that persists across the gap is reported again.
fn run_tick(
    backend: &dyn HidBackend,
    switcher: &mut Switcher,
    latch: &mut ErrorLatch,
    foreground: Result<String>,
    config: &Config,
) {
    match foreground {
        Ok(process) => {
            let result = switcher.tick(backend, &process, config);
            latch.observe(&result);
        }
        Err(e) => {
            debug!(error = %e, "Foreground lookup failed, skipping tick");
            latch.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfswitch_core::error::{Error as CoreError, Result as CoreResult};
    use perfswitch_core::transport::{Access, HidHandle, InterfaceError, InterfaceSet};

    /// A system with no HID collections at all.
    struct NoDevices;

    struct EmptySet;

    impl InterfaceSet for EmptySet {
        fn path_at(&mut self, _index: u32) -> std::result::Result<Option<String>, InterfaceError> {
            Err(InterfaceError::NoMoreItems)
        }
    }

    impl HidBackend for NoDevices {
        fn interfaces(&self) -> CoreResult<Box<dyn InterfaceSet + '_>> {
            Ok(Box::new(EmptySet))
        }

        fn open(&self, path: &str, _access: Access) -> CoreResult<Box<dyn HidHandle + '_>> {
            Err(CoreError::DeviceOpen {
                path: path.to_string(),
                reason: "no such device".into(),
            })
        }
    }

    fn no_device_message(config: &Config) -> String {
        Switcher::new()
            .tick(&NoDevices, "cs2.exe", config)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn failed_tick_is_latched() {
        let config = Config::default();
        let mut switcher = Switcher::new();
        let mut latch = ErrorLatch::new();

        run_tick(&NoDevices, &mut switcher, &mut latch, Ok("cs2.exe".into()), &config);
        assert!(!latch.report(&no_device_message(&config)));
    }

    #[test]
    fn foreground_failure_clears_latch() {
        let config = Config::default();
        let mut switcher = Switcher::new();
        let mut latch = ErrorLatch::new();

        run_tick(&NoDevices, &mut switcher, &mut latch, Ok("cs2.exe".into()), &config);
        run_tick(
            &NoDevices,
            &mut switcher,
            &mut latch,
            Err(anyhow::anyhow!("no foreground window")),
            &config,
        );
        assert!(latch.report(&no_device_message(&config)));
    }

    fn descriptor(path: &str, usage_page: u16) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.into(),
            vendor_id: 0x3057,
            product_id: 0x0001,
            manufacturer: "VAXEE".into(),
            product: "XE".into(),
            usage_page,
            usage: 0x0001,
            feature_report_length: 20,
        }
    }

    #[test]
    fn describe_tags_vendor_and_keyboard_collections() {
        let control = describe(&descriptor(r"\\?\hid#vid_3057&pid_0001&mi_02&col02", 0xFF00));
        assert!(control.contains("Usage=0xFF00:0x0001 FeatureLen=20 [vendor] Path="));
        assert!(!control.contains("[kbd]"));

        let keyboard = describe(&descriptor(r"\\?\hid#vid_3057&pid_0001&mi_00\kbd", 0x0001));
        assert!(keyboard.contains("FeatureLen=20 [kbd] Path="));
        assert!(!keyboard.contains("[vendor]"));
    }
}
