//! Switcher configuration: a plain-text file next to the executable.
//!
//! ```text
//! # comment
//! interval_seconds=60
//! hit_mode=competitive_ms_off
//! hit_poll=1000
//! default_mode=standard_ms_off
//! default_poll=1000
//! cs2.exe
//! C:\Games\valorant.exe
//! ```
//!
//! `key=value` lines set options (keys are case-insensitive, unknown keys are
//! ignored). Every other non-blank, non-`#` line is a whitelist entry, reduced
//! to its lower-cased file name.

use crate::device::{PerfMode, PollingRate};
use crate::error::{Error, Result};
use crate::safety::{validate_perf_mode_name, validate_polling_rate};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// File name looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "perfswitch.conf";

/// Default check interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_CONFIG_TEXT: &str = "\
# perfswitch configuration
# --------------------------------------------
# key=value lines set the switching policy.
# Any other non-empty line not starting with # is a whitelisted
# process name, one per line (for example cs2.exe).
#
# interval_seconds=60                # foreground check interval in seconds
# hit_mode=competitive_ms_off        # mode while a whitelisted process is in front:
#                                    #   standard_ms_off / competitive_ms_off /
#                                    #   competitive_ms_on / standard_ms_on
# hit_poll=1000                      # polling rate while whitelisted: 1000 / 2000 / 4000
# default_mode=standard_ms_off       # mode otherwise
# default_poll=1000                  # polling rate otherwise
# --------------------------------------------
interval_seconds=60
hit_mode=competitive_ms_off
hit_poll=1000
default_mode=standard_ms_off
default_poll=1000

# Whitelist examples (one process per line):
# cs2.exe
# valorant.exe
";

/// Parsed switcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub interval: Duration,
    pub hit_mode: PerfMode,
    pub hit_rate: PollingRate,
    pub default_mode: PerfMode,
    pub default_rate: PollingRate,
    /// Whitelisted process names in file order.
    pub whitelist: Vec<String>,
    whitelist_set: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            hit_mode: PerfMode::CompetitiveMsOff,
            hit_rate: PollingRate::Hz1000,
            default_mode: PerfMode::StandardMsOff,
            default_rate: PollingRate::Hz1000,
            whitelist: Vec::new(),
            whitelist_set: HashSet::new(),
        }
    }
}

impl Config {
    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Config::default();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.find('=') {
                Some(eq) if eq > 0 => {
                    let key = line[..eq].trim().to_lowercase();
                    let value = line[eq + 1..].trim();
                    config
                        .set(&key, value)
                        .map_err(|e| Error::Config(format!("line {}: {e}", index + 1)))?;
                }
                _ => config.add_process(line),
            }
        }

        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Whether `process` (any path form, any case) is whitelisted.
    pub fn is_whitelisted(&self, process: &str) -> bool {
        self.whitelist_set.contains(&process_basename(process))
    }

    /// Add one whitelist entry.
    pub fn add_process(&mut self, entry: &str) {
        let name = process_basename(entry);
        if name.is_empty() {
            return;
        }
        self.whitelist_set.insert(name.clone());
        self.whitelist.push(name);
    }

    fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "interval_seconds" => {
                let secs = parse_uint(value)
                    .filter(|&s| s > 0)
                    .ok_or_else(|| format!("invalid interval_seconds: {value:?}"))?;
                self.interval = Duration::from_secs(secs);
            }
            "hit_mode" => self.hit_mode = parse_mode(key, value)?,
            "hit_poll" => self.hit_rate = parse_rate(key, value)?,
            "default_mode" => self.default_mode = parse_mode(key, value)?,
            "default_poll" => self.default_rate = parse_rate(key, value)?,
            _ => debug!(key, "Ignoring unknown config key"),
        }
        Ok(())
    }
}

fn parse_uint(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn parse_mode(key: &str, value: &str) -> std::result::Result<PerfMode, String> {
    validate_perf_mode_name(value).map_err(|e| format!("{key}: {e}"))
}

fn parse_rate(key: &str, value: &str) -> std::result::Result<PollingRate, String> {
    let hz = parse_uint(value)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("{key}: not a number: {value:?}"))?;
    validate_polling_rate(hz).map_err(|e| format!("{key}: {e}"))
}

/// Lower-cased last path component, splitting on both `/` and `\`.
pub fn process_basename(name: &str) -> String {
    name.trim()
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// The commented default configuration.
pub fn default_config_text() -> &'static str {
    DEFAULT_CONFIG_TEXT
}

/// `perfswitch.conf` in the executable's directory (or the working directory).
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

/// Write the default configuration if `path` does not exist.
///
/// Returns `true` when a new file was created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::write(path, DEFAULT_CONFIG_TEXT)?;
            info!(path = %path.display(), "Created default configuration");
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(fs::metadata(path)?.modified()?)
}

/// A loaded configuration that reloads itself when the file's mtime advances.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    config: Config,
    modified: SystemTime,
}

impl ConfigWatcher {
    /// Load `path`. Fails if the file is missing or invalid.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let modified = modified(&path)?;
        let config = Config::load(&path)?;
        Ok(Self {
            path,
            config,
            modified,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload if the file changed since the last load attempt.
    ///
    /// Returns `true` when a new configuration was installed. A file that
    /// changed but fails to parse keeps the previous configuration; the
    /// failure is logged once per modification.
    pub fn poll(&mut self) -> bool {
        let Ok(current) = modified(&self.path) else {
            return false;
        };
        if current <= self.modified {
            return false;
        }
        self.modified = current;

        match Config::load(&self.path) {
            Ok(config) => {
                info!(path = %self.path.display(), "Configuration changed, reloaded");
                self.config = config;
                true
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Configuration changed but failed to load; keeping previous"
                );
                false
            }
        }
    }
}
