use std::path::PathBuf;
use std::str::FromStr;

use crate::calendar::Calendar;
use crate::limits::MAX_UTC_OFFSET_MINUTES;

/// Startup settings, all from `LEARNSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Team timezone as a fixed offset from UTC, in minutes.
    pub utc_offset_minutes: i32,
    pub compact_threshold: u64,
    /// Write the reference team and courses into an empty store.
    pub seed: bool,
    pub metrics_port: Option<u16>,
    /// Another instance to use as the primary store; the local WAL becomes the fallback.
    pub upstream_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3001,
            data_dir: PathBuf::from("./data"),
            utc_offset_minutes: 0,
            compact_threshold: 1000,
            seed: true,
            metrics_port: None,
            upstream_url: None,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("{key}={raw:?} is not valid, using default");
                default
            }
        },
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Malformed values fall back to defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();

        let mut utc_offset_minutes = parse_or(&lookup, "LEARNSLOT_UTC_OFFSET_MINUTES", d.utc_offset_minutes);
        if utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            tracing::warn!("LEARNSLOT_UTC_OFFSET_MINUTES={utc_offset_minutes} out of range, using UTC");
            utc_offset_minutes = 0;
        }

        let seed = match lookup("LEARNSLOT_SEED") {
            None => d.seed,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!("LEARNSLOT_SEED={raw:?} is not a boolean, using default");
                d.seed
            }),
        };

        let metrics_port = lookup("LEARNSLOT_METRICS_PORT").and_then(|raw| match raw.trim().parse() {
            Ok(p) => Some(p),
            Err(_) => {
                tracing::warn!("LEARNSLOT_METRICS_PORT={raw:?} is not a port, metrics disabled");
                None
            }
        });

        Self {
            bind: lookup("LEARNSLOT_BIND").unwrap_or(d.bind),
            port: parse_or(&lookup, "LEARNSLOT_PORT", d.port),
            data_dir: lookup("LEARNSLOT_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            utc_offset_minutes,
            compact_threshold: parse_or(&lookup, "LEARNSLOT_COMPACT_THRESHOLD", d.compact_threshold),
            seed,
            metrics_port,
            upstream_url: lookup("LEARNSLOT_UPSTREAM_URL").filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn calendar(&self) -> Calendar {
        Calendar::from_offset_minutes(self.utc_offset_minutes).unwrap_or_default()
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("learnslot.wal")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
