//! Switch policy: which settings the foreground process wants, and when to
//! actually touch the device.

use crate::apply::apply;
use crate::config::{process_basename, Config};
use crate::device::{PerfMode, PollingRate};
use crate::error::Result;
use crate::transport::HidBackend;
use tracing::{debug, error, info};

/// Settings requested for one foreground process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desired {
    pub mode: PerfMode,
    pub rate: PollingRate,
    /// The process is on the whitelist.
    pub hit: bool,
}

/// Outcome of one [`Switcher::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The desired settings were already applied.
    Unchanged,
    /// New settings were applied.
    Switched { process: String, desired: Desired },
}

/// Remembers the last successfully applied settings.
#[derive(Debug, Default)]
pub struct Switcher {
    last: Option<(PerfMode, PollingRate)>,
}

impl Switcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for `process` under `config`.
    pub fn desired(process: &str, config: &Config) -> Desired {
        if config.is_whitelisted(process) {
            Desired {
                mode: config.hit_mode,
                rate: config.hit_rate,
                hit: true,
            }
        } else {
            Desired {
                mode: config.default_mode,
                rate: config.default_rate,
                hit: false,
            }
        }
    }

    /// Last applied `(mode, rate)`, if any.
    pub fn last_applied(&self) -> Option<(PerfMode, PollingRate)> {
        self.last
    }

    /// Apply the settings `process` wants unless they are already in place.
    ///
    /// A failed apply leaves the record untouched, so the next tick retries.
    pub fn tick(
        &mut self,
        backend: &dyn HidBackend,
        process: &str,
        config: &Config,
    ) -> Result<TickOutcome> {
        let process = process_basename(process);
        let desired = Self::desired(&process, config);

        if self.last == Some((desired.mode, desired.rate)) {
            debug!(%process, mode = %desired.mode, rate = %desired.rate, "Settings already applied");
            return Ok(TickOutcome::Unchanged);
        }

        apply(backend, desired.mode, desired.rate)?;
        self.last = Some((desired.mode, desired.rate));
        Ok(TickOutcome::Switched { process, desired })
    }
}

/// Suppresses repeats of the same error message.
#[derive(Debug, Default)]
pub struct ErrorLatch {
    last: Option<String>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; returns `true` if it differs from the previous one.
    pub fn report(&mut self, message: &str) -> bool {
        if self.last.as_deref() == Some(message) {
            return false;
        }
        self.last = Some(message.to_string());
        true
    }

    /// Record a success; the next error is reported again.
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Log a tick result: switches at INFO, new errors at ERROR.
    pub fn observe(&mut self, result: &Result<TickOutcome>) {
        match result {
            Ok(TickOutcome::Switched { process, desired }) => {
                self.clear();
                info!(
                    %process,
                    whitelisted = desired.hit,
                    mode = %desired.mode,
                    rate = %desired.rate,
                    "Switched"
                );
            }
            Ok(TickOutcome::Unchanged) => self.clear(),
            Err(e) => {
                let message = e.to_string();
                if self.report(&message) {
                    error!(error = %message, "Switch failed");
                }
            }
        }
    }
}
