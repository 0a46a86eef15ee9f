//! Device model: identity, matching and selection.

use crate::error::{Error, Result};
use crate::host::{DeviceHandle, HidHost};
use crate::property::{get_long_property, get_string_property, PropertyKey};
use crate::{pids, GRIFFIN_VID};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Supported device models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    PowerMate,
}

impl DeviceModel {
    /// Look up model from USB vendor and product ID.
    pub fn from_ids(vid: u16, pid: u16) -> Option<Self> {
        match (vid, pid) {
            (GRIFFIN_VID, pids::POWERMATE) => Some(Self::PowerMate),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerMate => "Griffin PowerMate",
        }
    }

    /// Identity used to match this model.
    pub fn identity(&self) -> DeviceIdentity {
        match self {
            Self::PowerMate => DeviceIdentity {
                vendor_id: GRIFFIN_VID,
                product_id: pids::POWERMATE,
            },
        }
    }
}

/// Vendor/product pair that selects a device during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        DeviceModel::PowerMate.identity()
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VID=0x{:04X} PID=0x{:04X}",
            self.vendor_id, self.product_id
        )
    }
}

/// Match predicate handed to the host. Both IDs are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchFilter {
    identity: DeviceIdentity,
}

impl MatchFilter {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.identity.vendor_id == vendor_id && self.identity.product_id == product_id
    }
}

/// What to do when several devices match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Take the first device in enumeration order.
    #[default]
    First,
    /// Fail unless exactly one device matched.
    Unique,
}

/// Install the match filter, open the host and enumerate matching devices.
///
/// An empty result is not an error here; callers decide whether it is fatal.
pub fn find_devices<H: HidHost + ?Sized>(
    host: &mut H,
    identity: DeviceIdentity,
) -> Result<Vec<DeviceHandle>> {
    let filter = MatchFilter::new(identity);
    debug!(%identity, "Installing match filter");
    host.set_match_filter(&filter)?;
    host.open()?;

    let mut devices = Vec::new();
    for device in host.enumerate()? {
        // The host already filtered; re-check where it reports the IDs.
        let vid = get_long_property(&*host, &device, PropertyKey::VendorId);
        let pid = get_long_property(&*host, &device, PropertyKey::ProductId);
        if let (Some(vid), Some(pid)) = (vid, pid) {
            let matches = u16::try_from(vid)
                .ok()
                .zip(u16::try_from(pid).ok())
                .is_some_and(|(v, p)| filter.matches(v, p));
            if !matches {
                debug!(path = %device.path, vid, pid, "Host returned a non-matching device, skipping");
                continue;
            }
        }
        info!(%identity, path = %device.path, "Found matching device");
        devices.push(device);
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Pick the device to work with.
pub fn select_device(
    devices: &[DeviceHandle],
    identity: DeviceIdentity,
    policy: SelectionPolicy,
) -> Result<DeviceHandle> {
    match (devices, policy) {
        ([], _) => Err(Error::NoDevicesFound {
            vendor_id: identity.vendor_id,
            product_id: identity.product_id,
        }),
        ([only], _) => Ok(only.clone()),
        ([first, ..], SelectionPolicy::First) => {
            warn!(
                count = devices.len(),
                path = %first.path,
                "Several matching devices attached, using the first"
            );
            Ok(first.clone())
        }
        (_, SelectionPolicy::Unique) => Err(Error::AmbiguousDevices {
            count: devices.len(),
        }),
    }
}

/// Property summary of a matched device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: Option<DeviceModel>,
    pub vendor_id: Option<i32>,
    pub product_id: Option<i32>,
    pub version: Option<i32>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub path: String,
}

/// Collect the properties worth showing for a device.
pub fn describe_device<H: HidHost + ?Sized>(host: &H, device: &DeviceHandle) -> DeviceInfo {
    let vendor_id = get_long_property(host, device, PropertyKey::VendorId);
    let product_id = get_long_property(host, device, PropertyKey::ProductId);
    let model = vendor_id
        .zip(product_id)
        .and_then(|(v, p)| Some((u16::try_from(v).ok()?, u16::try_from(p).ok()?)))
        .and_then(|(v, p)| DeviceModel::from_ids(v, p));
    DeviceInfo {
        model,
        vendor_id,
        product_id,
        version: get_long_property(host, device, PropertyKey::VersionNumber),
        product: get_string_property(host, device, PropertyKey::Product),
        serial: get_string_property(host, device, PropertyKey::SerialNumber),
        path: device.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    const POWERMATE: DeviceIdentity = DeviceIdentity {
        vendor_id: 0x077D,
        product_id: 0x0410,
    };

    #[test]
    fn model_from_known_ids() {
        assert_eq!(
            DeviceModel::from_ids(0x077D, 0x0410),
            Some(DeviceModel::PowerMate)
        );
        assert_eq!(DeviceModel::PowerMate.identity(), POWERMATE);
    }

    #[test]
    fn model_from_unknown_ids() {
        assert_eq!(DeviceModel::from_ids(0x077D, 0x1234), None);
        assert_eq!(DeviceModel::from_ids(0x046D, 0x0410), None);
    }

    #[test]
    fn default_identity_is_powermate() {
        assert_eq!(DeviceIdentity::default(), POWERMATE);
        assert_eq!(POWERMATE.to_string(), "VID=0x077D PID=0x0410");
    }

    #[test]
    fn filter_requires_both_ids() {
        let filter = MatchFilter::new(POWERMATE);
        assert!(filter.matches(0x077D, 0x0410));
        assert!(!filter.matches(0x077D, 0x0411));
        assert!(!filter.matches(0x077E, 0x0410));
    }

    #[test]
    fn find_devices_returns_only_matches() {
        let mut host = MockHost::new();
        let wanted = host.add_device(0x077D, 0x0410, Vec::new());
        host.add_device(0x046D, 0xC08B, Vec::new());

        let devices = find_devices(&mut host, POWERMATE).unwrap();
        assert_eq!(devices, vec![wanted]);
    }

    #[test]
    fn find_devices_empty_is_not_an_error() {
        let mut host = MockHost::new();
        host.add_device(0x046D, 0xC08B, Vec::new());

        let devices = find_devices(&mut host, POWERMATE).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn find_devices_propagates_filter_failure() {
        let mut host = MockHost::new();
        host.fail_filter();
        assert!(matches!(
            find_devices(&mut host, POWERMATE),
            Err(Error::ResourceCreation(_))
        ));
    }

    #[test]
    fn find_devices_propagates_open_failure() {
        let mut host = MockHost::new();
        host.add_device(0x077D, 0x0410, Vec::new());
        host.fail_open();
        assert!(matches!(
            find_devices(&mut host, POWERMATE),
            Err(Error::HostOpen(_))
        ));
    }

    #[test]
    fn select_device_empty_is_no_devices_found() {
        let err = select_device(&[], POWERMATE, SelectionPolicy::First).unwrap_err();
        assert!(matches!(
            err,
            Error::NoDevicesFound {
                vendor_id: 0x077D,
                product_id: 0x0410
            }
        ));
    }

    #[test]
    fn select_device_first_takes_index_zero() {
        let a = DeviceHandle { id: 1, path: "a".into() };
        let b = DeviceHandle { id: 2, path: "b".into() };
        let picked = select_device(&[a.clone(), b], POWERMATE, SelectionPolicy::First).unwrap();
        assert_eq!(picked, a);
    }

    #[test]
    fn select_device_unique_rejects_ambiguity() {
        let a = DeviceHandle { id: 1, path: "a".into() };
        let b = DeviceHandle { id: 2, path: "b".into() };
        assert!(matches!(
            select_device(&[a.clone(), b], POWERMATE, SelectionPolicy::Unique),
            Err(Error::AmbiguousDevices { count: 2 })
        ));
        assert_eq!(
            select_device(&[a.clone()], POWERMATE, SelectionPolicy::Unique).unwrap(),
            a
        );
    }

    #[test]
    fn describe_device_reads_properties() {
        let mut host = MockHost::new();
        let device = host.add_device(0x077D, 0x0410, Vec::new());
        let info = describe_device(&host, &device);
        assert_eq!(info.model, Some(DeviceModel::PowerMate));
        assert_eq!(info.vendor_id, Some(0x077D));
        assert_eq!(info.serial, None);
    }
}
