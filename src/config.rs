//! Construction-time defaults.
//!
//! Every default can be overridden per value at construction time. The
//! environment only changes what "default" means, which is handy for
//! turning on passthrough while debugging a failing test.
//!
//! ## Environment Variables
//!
//! - `LOGSIFT_CAPACITY`: Hook buffer capacity in entries (default 1000)
//! - `LOGSIFT_TIMEOUT_MS`: `HaveLogs` wait per entry in milliseconds (default 2000)
//! - `LOGSIFT_DISPLAY`: Comma-separated levels new hooks mirror to their visible stream
//! - `LOGSIFT_LEVEL`: Maximum level of new loggers (default info)
//! - `LOGSIFT_FORMAT`: Output format of new loggers (`human`, `json` or `compact`)
//!
//! Values that fail to parse are ignored and reported at target `logsift`.

use std::time::Duration;

use tracing::Level;

use crate::core::logging::{INTERNAL_TARGET, LogFormat, LogLevel, parse_level_list};
use crate::error::Error;

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable for the hook buffer capacity.
pub const ENV_CAPACITY: &str = "LOGSIFT_CAPACITY";
/// Environment variable for the `HaveLogs` timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "LOGSIFT_TIMEOUT_MS";
/// Environment variable for levels displayed by default.
pub const ENV_DISPLAY: &str = "LOGSIFT_DISPLAY";
/// Environment variable for the default logger level.
pub const ENV_LEVEL: &str = "LOGSIFT_LEVEL";
/// Environment variable for the default logger output format.
pub const ENV_FORMAT: &str = "LOGSIFT_FORMAT";

// =============================================================================
// Built-in Defaults
// =============================================================================

/// Entries a hook buffers before `fire` starts failing.
pub const DEFAULT_CAPACITY: usize = 1000;
/// How long `HaveLogs` waits for each new entry.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Maximum level of a new logger.
pub const DEFAULT_LEVEL: LogLevel = LogLevel::Info;

/// Resolved defaults (built-ins overlaid with the environment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub capacity: usize,
    pub timeout: Duration,
    pub display: Vec<Level>,
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            timeout: DEFAULT_TIMEOUT,
            display: Vec::new(),
            level: DEFAULT_LEVEL,
            format: LogFormat::Human,
        }
    }
}

impl Defaults {
    /// Built-ins overlaid with whatever the environment sets.
    #[must_use]
    pub fn from_env() -> Self {
        let mut defaults = Self::default();
        defaults.apply(|key| std::env::var(key).ok());
        defaults
    }

    /// Overlay values from `lookup`, skipping the ones that do not parse.
    pub fn apply(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(raw) = value(ENV_CAPACITY) {
            match parse_capacity(&raw) {
                Ok(capacity) => self.capacity = capacity,
                Err(err) => report(&err),
            }
        }
        if let Some(raw) = value(ENV_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => self.timeout = Duration::from_millis(ms),
                Err(e) => report(&invalid(ENV_TIMEOUT_MS, &raw, &e.to_string())),
            }
        }
        if let Some(raw) = value(ENV_DISPLAY) {
            match parse_level_list(&raw) {
                Ok(levels) => self.display = levels,
                Err(name) => report(&invalid(ENV_DISPLAY, &raw, &format!("unknown level {name:?}"))),
            }
        }
        if let Some(raw) = value(ENV_LEVEL) {
            match LogLevel::from_arg(&raw) {
                Some(level) => self.level = level,
                None => report(&invalid(ENV_LEVEL, &raw, "unknown level")),
            }
        }
        if let Some(raw) = value(ENV_FORMAT) {
            match LogFormat::from_arg(&raw) {
                Some(format) => self.format = format,
                None => report(&invalid(ENV_FORMAT, &raw, "expected human, json or compact")),
            }
        }
    }
}

fn parse_capacity(raw: &str) -> Result<usize, Error> {
    match raw.parse::<usize>() {
        Ok(0) => Err(invalid(ENV_CAPACITY, raw, "capacity must be at least 1")),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(invalid(ENV_CAPACITY, raw, &e.to_string())),
    }
}

fn invalid(key: &str, value: &str, message: &str) -> Error {
    Error::Config {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn report(err: &Error) {
    tracing::warn!(target: INTERNAL_TARGET, code = %err.error_code(), "ignoring {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_keeps_builtins() {
        let mut defaults = Defaults::default();
        defaults.apply(lookup(&[]));
        assert_eq!(defaults, Defaults::default());
        assert_eq!(defaults.capacity, 1000);
        assert_eq!(defaults.timeout, Duration::from_secs(2));
    }

    #[test]
    fn environment_overrides_apply() {
        let mut defaults = Defaults::default();
        defaults.apply(lookup(&[
            (ENV_CAPACITY, "50"),
            (ENV_TIMEOUT_MS, " 250 "),
            (ENV_DISPLAY, "debug,error"),
            (ENV_LEVEL, "trace"),
            (ENV_FORMAT, "JSON"),
        ]));
        assert_eq!(defaults.capacity, 50);
        assert_eq!(defaults.timeout, Duration::from_millis(250));
        assert_eq!(defaults.display, vec![Level::DEBUG, Level::ERROR]);
        assert_eq!(defaults.level, LogLevel::Trace);
        assert_eq!(defaults.format, LogFormat::Json);
    }

    #[test]
    #[traced_test]
    fn invalid_values_are_ignored() {
        let mut defaults = Defaults::default();
        defaults.apply(lookup(&[
            (ENV_CAPACITY, "0"),
            (ENV_TIMEOUT_MS, "soon"),
            (ENV_DISPLAY, "debug,loud"),
            (ENV_LEVEL, "everything"),
            (ENV_FORMAT, "xml"),
        ]));
        assert_eq!(defaults, Defaults::default());
        assert!(logs_contain("invalid config value for 'LOGSIFT_CAPACITY'"));
        assert!(logs_contain("LOGSIFT_DISPLAY"));
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[allow(unsafe_code)]
    fn with_env_var(key: &str, value: &str, f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().unwrap();
        let prior = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        f();
        match prior {
            Some(val) => unsafe {
                std::env::set_var(key, val);
            },
            None => unsafe {
                std::env::remove_var(key);
            },
        }
    }

    #[test]
    fn from_env_reads_process_environment() {
        with_env_var(ENV_CAPACITY, "75", || {
            assert_eq!(Defaults::from_env().capacity, 75);
        });
    }
}
