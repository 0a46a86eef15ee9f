//! Session setup: the two ways the tool talks to a device.
//!
//! [`probe`] is the one-shot variant: enumerate, list elements, switch the
//! LED off and return. [`Session`] is the queue variant: match one device,
//! classify it and build the event queue the dispatch loop drains.

use crate::classify::{classify_with, find_first_of_type, ClassifiedElements};
use crate::config::SessionConfig;
use crate::device::{describe_device, find_devices, select_device, DeviceIdentity, DeviceInfo};
use crate::dispatch::DispatchLoop;
use crate::element::{Element, ElementId, ElementType};
use crate::error::Result;
use crate::host::{DeviceHandle, HidHost};
use crate::queue::EventQueue;
use tracing::{debug, info, warn};

/// What `probe` saw on one device.
#[derive(Debug, Clone)]
pub struct ProbedDevice {
    pub info: DeviceInfo,
    /// Total elements the device exposes.
    pub element_count: usize,
    /// Elements visited, up to and including the LED if one was found.
    pub scanned: Vec<Element>,
    /// LED element that was switched off.
    pub led_reset: Option<ElementId>,
    /// Why switching the LED off failed, if it did.
    pub led_error: Option<String>,
}

/// Result of a probe run.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    pub devices: Vec<ProbedDevice>,
}

/// Enumerate matching devices, list their elements and write 0 to the
/// first feature element of each.
///
/// Zero matching devices is a normal outcome here. The LED write is
/// fire-and-forget: a failure is logged and recorded, never returned.
pub fn probe<H: HidHost + ?Sized>(host: &mut H, identity: DeviceIdentity) -> Result<ProbeReport> {
    let devices = find_devices(host, identity)?;
    if devices.is_empty() {
        info!(%identity, "No matching device attached");
    }

    let mut report = ProbeReport::default();
    for device in devices {
        let elements = host.list_elements(&device)?;
        let (scanned, led) = match find_first_of_type(&elements, ElementType::Feature) {
            Some((index, led)) => (elements[..=index].to_vec(), Some(led.clone())),
            None => (elements.clone(), None),
        };

        let mut led_reset = None;
        let mut led_error = None;
        if let Some(led) = &led {
            match host.write_value(&device, led, 0) {
                Ok(()) => {
                    debug!(path = %device.path, element = %led.id, "LED switched off");
                    led_reset = Some(led.id);
                }
                Err(e) => {
                    warn!(path = %device.path, element = %led.id, "Could not switch LED off: {e}");
                    led_error = Some(e.to_string());
                }
            }
        }

        report.devices.push(ProbedDevice {
            info: describe_device(&*host, &device),
            element_count: elements.len(),
            scanned,
            led_reset,
            led_error,
        });
    }
    Ok(report)
}

/// A matched, classified device with its event queue ready to schedule.
#[derive(Debug)]
pub struct Session {
    pub device: DeviceHandle,
    pub info: DeviceInfo,
    pub elements: ClassifiedElements,
    pub queue: EventQueue,
}

impl Session {
    /// Match, classify and build the queue over the button and the dial.
    pub fn open<H: HidHost + ?Sized>(host: &mut H, config: &SessionConfig) -> Result<Self> {
        config.validate()?;

        let devices = find_devices(host, config.identity)?;
        let device = select_device(&devices, config.identity, config.selection)?;
        let all = host.list_elements(&device)?;
        debug!(path = %device.path, count = all.len(), "Listed device elements");
        let elements = classify_with(&all, config.classification)?;

        let mut queue = EventQueue::create(host, &device, config.queue_capacity)?;
        queue.add_element(host, &elements.button)?;
        queue.add_element(host, &elements.scroll)?;

        info!(
            path = %device.path,
            button = %elements.button.id,
            scroll = %elements.scroll.id,
            led = %elements.led.id,
            capacity = config.queue_capacity,
            "Session ready"
        );
        Ok(Self {
            info: describe_device(&*host, &device),
            device,
            elements,
            queue,
        })
    }

    /// Hand the queue to a dispatch loop on `host`.
    pub fn into_loop<'h, H: HidHost + ?Sized>(
        self,
        host: &'h mut H,
        config: &SessionConfig,
    ) -> DispatchLoop<'h, H> {
        DispatchLoop::new(host, self.queue, self.elements).with_turn(config.poll_interval())
    }
}
