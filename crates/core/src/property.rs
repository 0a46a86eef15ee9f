//! Typed device properties.

use crate::host::{DeviceHandle, HidHost};

/// Named properties a host can report for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    VendorId,
    ProductId,
    VersionNumber,
    PrimaryUsagePage,
    PrimaryUsage,
    LocationId,
    Product,
    Manufacturer,
    SerialNumber,
}

/// Raw property value as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Number(i64),
    Text(String),
}

/// Read a numeric property that fits in 32 signed bits.
///
/// Returns `None` when the property is absent, is not a number, or does not
/// fit. Absence is a normal outcome.
pub fn get_long_property<H: HidHost + ?Sized>(
    host: &H,
    device: &DeviceHandle,
    key: PropertyKey,
) -> Option<i32> {
    match host.get_property(device, key)? {
        PropertyValue::Number(n) => i32::try_from(n).ok(),
        PropertyValue::Text(_) => None,
    }
}

/// Read a string property.
pub fn get_string_property<H: HidHost + ?Sized>(
    host: &H,
    device: &DeviceHandle,
    key: PropertyKey,
) -> Option<String> {
    match host.get_property(device, key)? {
        PropertyValue::Text(s) => Some(s),
        PropertyValue::Number(_) => None,
    }
}
