//! Configuration loading from environment variables.
//!
//! Every value has a default; malformed values fall back to the default with
//! a warning rather than aborting startup. CLI flags are applied on top by
//! the binary.

use std::time::Duration;

use chrono::Weekday;
use serde_json::{json, Value};

use score_preview::{
    DiscoveryConfig, Retention, RetryPolicy, DEFAULT_CONCURRENCY, DEFAULT_ORIGIN, MAX_CONCURRENCY,
};

pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
const DEFAULT_CLEAR_WEEKDAY: Weekday = Weekday::Sun;
const DEFAULT_CLEAR_HOUR: u32 = 0;

/// Weekly slot (UTC) at which the whole cache is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearSchedule {
    pub weekday: Weekday,
    pub hour: u32,
}

impl Default for ClearSchedule {
    fn default() -> Self {
        Self {
            weekday: DEFAULT_CLEAR_WEEKDAY,
            hour: DEFAULT_CLEAR_HOUR,
        }
    }
}

/// Effective server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub origin: String,
    pub discovery: DiscoveryConfig,
    pub fetch_timeout: Option<Duration>,
    pub retention: Retention,
    /// `None` disables scheduled clearing.
    pub clear_schedule: Option<ClearSchedule>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            origin: DEFAULT_ORIGIN.to_string(),
            discovery: DiscoveryConfig::default(),
            fetch_timeout: None,
            retention: Retention::default(),
            clear_schedule: Some(ClearSchedule::default()),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its raw value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let retry = RetryPolicy::new(
            env.u32("PREVIEW_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS),
            Duration::from_millis(env.u64("PREVIEW_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)),
        );

        let discovery = DiscoveryConfig {
            concurrency: env
                .usize("PREVIEW_CONCURRENCY", DEFAULT_CONCURRENCY)
                .clamp(1, MAX_CONCURRENCY),
            retry,
            max_pages: env.optional_usize("PREVIEW_MAX_PAGES"),
        };

        let retention = match env.string("PREVIEW_RETENTION") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{e}; using {}", Retention::default());
                Retention::default()
            }),
            None => Retention::default(),
        };

        let clear_schedule = if env.bool("PREVIEW_CLEAR_DISABLED", false) {
            None
        } else {
            Some(ClearSchedule {
                weekday: env.weekday("PREVIEW_CLEAR_WEEKDAY", DEFAULT_CLEAR_WEEKDAY),
                hour: env.hour("PREVIEW_CLEAR_HOUR", DEFAULT_CLEAR_HOUR),
            })
        };

        Self {
            port: env.u16("PORT", DEFAULT_PORT),
            origin: env
                .string("PREVIEW_ORIGIN")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            discovery,
            fetch_timeout: env
                .optional_u64("PREVIEW_FETCH_TIMEOUT_SECS")
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            retention,
            clear_schedule,
        }
    }

    /// Configuration as JSON, for `info`.
    pub fn to_json(&self) -> Value {
        json!({
            "port": self.port,
            "origin": self.origin,
            "concurrency": self.discovery.concurrency,
            "retry_attempts": self.discovery.retry.max_attempts,
            "retry_delay_ms": self.discovery.retry.delay.as_millis() as u64,
            "max_pages": self.discovery.max_pages,
            "fetch_timeout_secs": self.fetch_timeout.map(|t| t.as_secs()),
            "retention": self.retention.as_str(),
            "clear_schedule": self.clear_schedule.map(|s| json!({
                "weekday": s.weekday.to_string(),
                "hour_utc": s.hour,
            })),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).map(|v| v.trim().to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.string(name)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid {name}={raw}");
                None
            }
        }
    }

    fn u16(&self, name: &str, default_value: u16) -> u16 {
        self.parsed(name).unwrap_or(default_value)
    }

    fn u32(&self, name: &str, default_value: u32) -> u32 {
        self.parsed(name).unwrap_or(default_value)
    }

    fn u64(&self, name: &str, default_value: u64) -> u64 {
        self.parsed(name).unwrap_or(default_value)
    }

    fn usize(&self, name: &str, default_value: usize) -> usize {
        self.parsed(name).unwrap_or(default_value)
    }

    fn optional_u64(&self, name: &str) -> Option<u64> {
        self.parsed(name)
    }

    fn optional_usize(&self, name: &str) -> Option<usize> {
        self.parsed(name)
    }

    fn bool(&self, name: &str, default_value: bool) -> bool {
        match self.string(name).map(|v| v.to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            _ => default_value,
        }
    }

    fn weekday(&self, name: &str, default_value: Weekday) -> Weekday {
        self.parsed(name).unwrap_or(default_value)
    }

    fn hour(&self, name: &str, default_value: u32) -> u32 {
        match self.parsed::<u32>(name) {
            Some(h) if h < 24 => h,
            Some(h) => {
                tracing::warn!("Ignoring out-of-range {name}={h}");
                default_value
            }
            None => default_value,
        }
    }
}
