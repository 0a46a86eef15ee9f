//! `HidHost` backed by hidapi.
//!
//! hidapi has no element or queue concept, so this host builds them: the
//! element list comes from the known layout table, and input reports are
//! decoded into per-element values pushed onto each started queue's ring.
//! Everything runs on the caller's thread; `wait_signal` is the loop turn.

use hidapi::{HidApi, HidDevice};
use powermate_core::device::{DeviceModel, MatchFilter};
use powermate_core::element::{Element, ElementId};
use powermate_core::error::{Error, Result};
use powermate_core::host::{DeviceHandle, HidHost, HostSignal, LoopSource, QueueId};
use powermate_core::layout::{self, ReportDecoder};
use powermate_core::property::{PropertyKey, PropertyValue};
use powermate_core::queue::{EventRing, ValueEvent};
use std::collections::{HashSet, VecDeque};
use std::ffi::CString;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How often the device list is re-read for hot-plug detection.
const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

struct OpenDevice {
    handle: DeviceHandle,
    path: CString,
    vendor_id: u16,
    product_id: u16,
    release: u16,
    usage_page: u16,
    usage: u16,
    manufacturer: Option<String>,
    product: Option<String>,
    serial: Option<String>,
    device: HidDevice,
    decoder: ReportDecoder,
}

struct HostQueue {
    device_id: u64,
    ring: EventRing,
    elements: HashSet<ElementId>,
    scheduled: bool,
    started: bool,
}

impl HostQueue {
    fn new(device_id: u64, capacity: usize) -> Self {
        Self {
            device_id,
            ring: EventRing::with_capacity(capacity),
            elements: HashSet::new(),
            scheduled: false,
            started: false,
        }
    }
}

/// Push decoded changes from one device into every started queue that
/// registered the element. Returns the scheduled queues that took a value.
fn route_changes(
    queues: &mut [HostQueue],
    device_id: u64,
    changes: &[(ElementId, i64)],
    now: Instant,
) -> Vec<QueueId> {
    let mut ready = Vec::new();
    for (index, queue) in queues.iter_mut().enumerate() {
        if !queue.started || queue.device_id != device_id {
            continue;
        }
        let mut pushed = false;
        for &(element, value) in changes {
            if queue.elements.contains(&element) {
                queue.ring.push(ValueEvent {
                    element,
                    value,
                    timestamp: now,
                });
                pushed = true;
            }
        }
        if pushed && queue.scheduled {
            ready.push(QueueId(index as u32));
        }
    }
    ready
}

pub struct HidapiHost {
    api: HidApi,
    filter: Option<MatchFilter>,
    devices: Vec<OpenDevice>,
    queues: Vec<HostQueue>,
    manager_scheduled: bool,
    pending: VecDeque<HostSignal>,
    next_id: u64,
    last_scan: Instant,
}

impl HidapiHost {
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(|e| Error::Hid(format!("hidapi init: {e}")))?;
        Ok(Self {
            api,
            filter: None,
            devices: Vec::new(),
            queues: Vec::new(),
            manager_scheduled: false,
            pending: VecDeque::new(),
            next_id: 1,
            last_scan: Instant::now(),
        })
    }

    /// Open newly matching devices and forget vanished ones.
    fn scan(&mut self, announce: bool) -> Result<()> {
        let filter = self
            .filter
            .ok_or_else(|| Error::ResourceCreation("no match filter installed".into()))?;

        let mut seen = HashSet::new();
        for info in self.api.device_list() {
            if !filter.matches(info.vendor_id(), info.product_id()) {
                continue;
            }
            let path = info.path().to_owned();
            seen.insert(path.clone());
            if self.devices.iter().any(|d| d.path == path) {
                continue;
            }

            let device = match info.open_device(&self.api) {
                Ok(device) => device,
                Err(e) => {
                    warn!(path = %path.to_string_lossy(), "Cannot open matching device: {e}");
                    continue;
                }
            };
            let handle = DeviceHandle {
                id: self.next_id,
                path: path.to_string_lossy().into_owned(),
            };
            self.next_id += 1;
            debug!(path = %handle.path, id = handle.id, "Opened HID device");
            if announce {
                self.pending
                    .push_back(HostSignal::DeviceMatched(handle.clone()));
            }
            self.devices.push(OpenDevice {
                handle,
                path,
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                release: info.release_number(),
                usage_page: info.usage_page(),
                usage: info.usage(),
                manufacturer: info.manufacturer_string().map(str::to_owned),
                product: info.product_string().map(str::to_owned),
                serial: info.serial_number().map(str::to_owned),
                device,
                decoder: ReportDecoder::new(),
            });
        }

        let gone: Vec<u64> = self
            .devices
            .iter()
            .filter(|d| !seen.contains(&d.path))
            .map(|d| d.handle.id)
            .collect();
        for id in gone {
            self.forget(id, announce);
        }
        Ok(())
    }

    fn forget(&mut self, id: u64, announce: bool) {
        let Some(index) = self.devices.iter().position(|d| d.handle.id == id) else {
            return;
        };
        let removed = self.devices.remove(index);
        debug!(path = %removed.handle.path, "Closed HID device");
        if announce {
            self.pending
                .push_back(HostSignal::DeviceRemoved(removed.handle));
        }
    }

    fn device(&self, handle: &DeviceHandle) -> Result<&OpenDevice> {
        self.devices
            .iter()
            .find(|d| d.handle.id == handle.id)
            .ok_or_else(|| Error::Hid(format!("device {} is not open", handle.path)))
    }

    fn queue_mut(&mut self, queue: QueueId) -> Result<&mut HostQueue> {
        self.queues
            .get_mut(queue.0 as usize)
            .ok_or_else(|| Error::Hid(format!("unknown queue {}", queue.0)))
    }

    /// Read input reports for up to `timeout` and feed the rings.
    fn pump(&mut self, timeout: Duration) {
        let active: Vec<u64> = self
            .devices
            .iter()
            .filter(|d| {
                self.queues
                    .iter()
                    .any(|q| q.started && q.device_id == d.handle.id)
            })
            .map(|d| d.handle.id)
            .collect();

        if active.is_empty() {
            std::thread::sleep(timeout);
            return;
        }

        let slice_ms = (timeout.as_millis() / active.len() as u128).clamp(1, i32::MAX as u128) as i32;
        for id in active {
            let Some(dev) = self.devices.iter_mut().find(|d| d.handle.id == id) else {
                continue;
            };
            let mut buf = [0u8; 64];
            let changes = match dev.device.read_timeout(&mut buf, slice_ms) {
                Ok(0) => continue,
                Ok(n) => {
                    trace!(path = %dev.handle.path, report_hex = format_args!("{:02X?}", &buf[..n]), "Input report");
                    dev.decoder.decode(&buf[..n])
                }
                Err(e) => {
                    warn!(path = %dev.handle.path, "Read failed, treating device as removed: {e}");
                    let announce = self.manager_scheduled;
                    self.forget(id, announce);
                    continue;
                }
            };

            let ready = route_changes(&mut self.queues, id, &changes, Instant::now());
            self.pending
                .extend(ready.into_iter().map(HostSignal::QueueReady));
        }
    }
}

impl HidHost for HidapiHost {
    fn set_match_filter(&mut self, filter: &MatchFilter) -> Result<()> {
        self.filter = Some(*filter);
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        self.api
            .refresh_devices()
            .map_err(|e| Error::HostOpen(format!("refresh devices: {e}")))?;
        self.scan(false)?;
        self.last_scan = Instant::now();
        Ok(())
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceHandle>> {
        Ok(self.devices.iter().map(|d| d.handle.clone()).collect())
    }

    fn list_elements(&self, device: &DeviceHandle) -> Result<Vec<Element>> {
        let dev = self.device(device)?;
        match DeviceModel::from_ids(dev.vendor_id, dev.product_id) {
            Some(DeviceModel::PowerMate) => Ok(layout::powermate_elements()),
            None => Err(Error::Hid(format!(
                "no element layout known for VID=0x{:04X} PID=0x{:04X}",
                dev.vendor_id, dev.product_id
            ))),
        }
    }

    fn get_property(&self, device: &DeviceHandle, key: PropertyKey) -> Option<PropertyValue> {
        let dev = self.device(device).ok()?;
        let number = |n: u16| Some(PropertyValue::Number(i64::from(n)));
        let text = |s: &Option<String>| s.clone().map(PropertyValue::Text);
        match key {
            PropertyKey::VendorId => number(dev.vendor_id),
            PropertyKey::ProductId => number(dev.product_id),
            PropertyKey::VersionNumber => number(dev.release),
            PropertyKey::PrimaryUsagePage => number(dev.usage_page),
            PropertyKey::PrimaryUsage => number(dev.usage),
            PropertyKey::LocationId => None,
            PropertyKey::Product => text(&dev.product),
            PropertyKey::Manufacturer => text(&dev.manufacturer),
            PropertyKey::SerialNumber => text(&dev.serial),
        }
    }

    fn create_queue(&mut self, device: &DeviceHandle, capacity: usize) -> Result<QueueId> {
        let device_id = self.device(device)?.handle.id;
        self.queues.push(HostQueue::new(device_id, capacity));
        Ok(QueueId(self.queues.len() as u32 - 1))
    }

    fn add_to_queue(&mut self, queue: QueueId, element: &Element) -> Result<()> {
        if !element.element_type.is_input() {
            warn!(element = %element.id, "Queued element produces no input values");
        }
        self.queue_mut(queue)?.elements.insert(element.id);
        Ok(())
    }

    fn schedule(&mut self, source: LoopSource) -> Result<()> {
        match source {
            LoopSource::Manager => self.manager_scheduled = true,
            LoopSource::Queue(id) => self.queue_mut(id)?.scheduled = true,
        }
        Ok(())
    }

    fn unschedule(&mut self, source: LoopSource) -> Result<()> {
        match source {
            LoopSource::Manager => self.manager_scheduled = false,
            LoopSource::Queue(id) => self.queue_mut(id)?.scheduled = false,
        }
        Ok(())
    }

    fn start_queue(&mut self, queue: QueueId) -> Result<()> {
        self.queue_mut(queue)?.started = true;
        Ok(())
    }

    fn stop_queue(&mut self, queue: QueueId) -> Result<()> {
        self.queue_mut(queue)?.started = false;
        Ok(())
    }

    fn read_next_value(&mut self, queue: QueueId, timeout: Duration) -> Option<ValueEvent> {
        let empty = self.queues.get(queue.0 as usize)?.ring.is_empty();
        if empty && !timeout.is_zero() {
            self.pump(timeout);
        }
        self.queues.get_mut(queue.0 as usize)?.ring.pop()
    }

    fn dropped_events(&self, queue: QueueId) -> u64 {
        self.queues
            .get(queue.0 as usize)
            .map_or(0, |q| q.ring.dropped())
    }

    fn write_value(&mut self, device: &DeviceHandle, element: &Element, value: i64) -> Result<()> {
        if element.id != layout::ids::LED {
            return Err(Error::Hid(format!("element {} is not writable", element.id)));
        }
        let report = layout::led_feature_report(value)?;
        let dev = self.device(device)?;
        dev.device
            .send_feature_report(&report)
            .map_err(|e| Error::Hid(format!("send_feature_report: {e}")))?;
        debug!(path = %dev.handle.path, value, "LED brightness written");
        Ok(())
    }

    fn wait_signal(&mut self, timeout: Duration) -> Result<Option<HostSignal>> {
        if let Some(signal) = self.pending.pop_front() {
            return Ok(Some(signal));
        }

        if self.manager_scheduled && self.last_scan.elapsed() >= RESCAN_INTERVAL {
            self.last_scan = Instant::now();
            match self.api.refresh_devices() {
                Ok(()) => self.scan(true)?,
                Err(e) => warn!("Device rescan failed: {e}"),
            }
            if let Some(signal) = self.pending.pop_front() {
                return Ok(Some(signal));
            }
        }

        self.pump(timeout);
        Ok(self.pending.pop_front())
    }
}
