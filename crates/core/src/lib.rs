//! powermate-core: device matching, element classification and event dispatch.
//!
//! This crate provides the host-independent logic for locating a Griffin
//! PowerMate among attached HID devices, identifying its button, dial and LED
//! elements, and draining the value events the HID host queues for them.

pub mod classify;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod host;
#[cfg(test)]
mod integration_tests;
pub mod layout;
pub mod property;
pub mod queue;
pub mod session;

/// Griffin Technology USB Vendor ID.
pub const GRIFFIN_VID: u16 = 0x077D;

/// Known Griffin product IDs.
pub mod pids {
    /// PowerMate USB.
    pub const POWERMATE: u16 = 0x0410;
}
