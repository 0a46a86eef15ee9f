//! Error types for powermate-core.

use thiserror::Error;

/// Core library error type.
///
/// Every setup-phase variant is fatal for the binary. Events on elements
/// that are neither the button nor the dial are not errors and never show
/// up here.
#[derive(Debug, Error)]
pub enum Error {
    /// HID host communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// The match filter could not be built or installed on the host.
    #[error("failed to create match filter: {0}")]
    ResourceCreation(String),

    /// The host manager refused to open.
    #[error("failed to open HID manager: {0}")]
    HostOpen(String),

    /// Enumeration returned no device for the requested identity.
    #[error("no device found (VID=0x{vendor_id:04X} PID=0x{product_id:04X})")]
    NoDevicesFound { vendor_id: u16, product_id: u16 },

    /// More than one device matched and the selection policy demands one.
    #[error("{count} matching devices attached, refusing to pick one")]
    AmbiguousDevices { count: usize },

    /// The device exposes fewer elements than the known layout needs.
    #[error("too few elements: found {found}, need at least {required}")]
    ElementCountTooLow { found: usize, required: usize },

    /// Queue operation issued in the wrong lifecycle state.
    #[error("queue {queue}: cannot {operation} while {state}")]
    QueueState {
        queue: u32,
        operation: &'static str,
        state: &'static str,
    },

    /// Value out of the accepted range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// Configuration file read or parse failure.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
