//! Session configuration.
//!
//! Everything has a default that reproduces the stock PowerMate setup, so an
//! empty JSON object (or no file at all) is a valid configuration.
//!
//! # Bounds
//! - `queue_capacity`: 1 – 4096 slots (default 100)
//! - `poll_interval_ms`: 1 – 1000 ms per run-loop turn (default 100)
//!
//! All validation happens before any host call.

use crate::classify::ClassifyStrategy;
use crate::device::{DeviceIdentity, SelectionPolicy};
use crate::error::{Error, Result};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const QUEUE_CAPACITY_MIN: usize = 1;
pub const QUEUE_CAPACITY_MAX: usize = 4096;
pub const POLL_INTERVAL_MIN_MS: u64 = 1;
pub const POLL_INTERVAL_MAX_MS: u64 = 1000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Settings for one probe or watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub identity: DeviceIdentity,
    pub queue_capacity: usize,
    pub selection: SelectionPolicy,
    pub classification: ClassifyStrategy,
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            selection: SelectionPolicy::default(),
            classification: ClassifyStrategy::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SessionConfig {
    /// Check every bounded field.
    pub fn validate(&self) -> Result<()> {
        validate_queue_capacity(self.queue_capacity)?;
        validate_poll_interval(self.poll_interval_ms)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn validate_queue_capacity(capacity: usize) -> Result<usize> {
    if !(QUEUE_CAPACITY_MIN..=QUEUE_CAPACITY_MAX).contains(&capacity) {
        return Err(Error::OutOfRange {
            field: "queue_capacity",
            value: capacity as u64,
            min: QUEUE_CAPACITY_MIN as u64,
            max: QUEUE_CAPACITY_MAX as u64,
        });
    }
    Ok(capacity)
}

pub fn validate_poll_interval(ms: u64) -> Result<u64> {
    if !(POLL_INTERVAL_MIN_MS..=POLL_INTERVAL_MAX_MS).contains(&ms) {
        return Err(Error::OutOfRange {
            field: "poll_interval_ms",
            value: ms,
            min: POLL_INTERVAL_MIN_MS,
            max: POLL_INTERVAL_MAX_MS,
        });
    }
    Ok(ms)
}

/// Parse and validate a JSON configuration.
pub fn parse_config(json: &str) -> Result<SessionConfig> {
    let config: SessionConfig =
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a JSON configuration file.
pub fn load_config(path: &Path) -> Result<SessionConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    parse_config(&text)
}

/// Parse a USB id given as `0x`-prefixed hex or plain decimal.
pub fn parse_usb_id(text: &str) -> Result<u16> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => trimmed.parse::<u16>(),
    };
    parsed.map_err(|e| Error::Config(format!("invalid USB id '{text}': {e}")))
}
