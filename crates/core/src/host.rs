//! HID host abstraction.
//!
//! The host owns enumeration, device I/O and the run-loop primitive. Real
//! HID stacks and the mock used in tests share this interface.

use crate::device::MatchFilter;
use crate::element::Element;
use crate::error::Result;
use crate::property::{PropertyKey, PropertyValue};
use crate::queue::ValueEvent;
use std::time::Duration;

/// Non-owning reference to one attached device.
///
/// Valid only while the host that produced it is alive and the device stays
/// attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    /// Host-assigned id, unique for the host's lifetime.
    pub id: u64,
    /// Platform path, for display.
    pub path: String,
}

/// Host-side queue handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u32);

/// Something that can be scheduled on the host's run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSource {
    /// The manager: delivers attach and removal signals.
    Manager,
    /// A queue: delivers readiness signals.
    Queue(QueueId),
}

/// One run-loop turn's worth of news from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    /// A device matching the filter appeared.
    DeviceMatched(DeviceHandle),
    /// A matched device went away.
    DeviceRemoved(DeviceHandle),
    /// The queue holds at least one value to drain.
    QueueReady(QueueId),
}

/// Operations the core needs from a HID stack.
///
/// Creating the host is the equivalent of creating the manager. All calls
/// happen on the thread that runs the loop.
pub trait HidHost {
    /// Install the predicate used by [`enumerate`](Self::enumerate).
    fn set_match_filter(&mut self, filter: &MatchFilter) -> Result<()>;

    /// Open the manager and the devices it matches.
    fn open(&mut self) -> Result<()>;

    /// All currently matched devices, possibly none.
    fn enumerate(&mut self) -> Result<Vec<DeviceHandle>>;

    /// Ordered element list of a device.
    fn list_elements(&self, device: &DeviceHandle) -> Result<Vec<Element>>;

    /// Raw property lookup. `None` when absent.
    fn get_property(&self, device: &DeviceHandle, key: PropertyKey) -> Option<PropertyValue>;

    /// Create a bounded value queue on a device.
    fn create_queue(&mut self, device: &DeviceHandle, capacity: usize) -> Result<QueueId>;

    /// Register an element whose value changes the queue should collect.
    fn add_to_queue(&mut self, queue: QueueId, element: &Element) -> Result<()>;

    /// Let the run loop deliver signals for `source`.
    fn schedule(&mut self, source: LoopSource) -> Result<()>;

    /// Stop delivering signals for `source`.
    fn unschedule(&mut self, source: LoopSource) -> Result<()>;

    /// Start collecting values.
    fn start_queue(&mut self, queue: QueueId) -> Result<()>;

    /// Stop collecting values. Already queued values stay readable.
    fn stop_queue(&mut self, queue: QueueId) -> Result<()>;

    /// Pop the oldest queued value, waiting at most `timeout`.
    fn read_next_value(&mut self, queue: QueueId, timeout: Duration) -> Option<ValueEvent>;

    /// Values the queue discarded because it was full.
    fn dropped_events(&self, _queue: QueueId) -> u64 {
        0
    }

    /// Fire-and-forget write of an output or feature element.
    fn write_value(&mut self, device: &DeviceHandle, element: &Element, value: i64) -> Result<()>;

    /// Run one loop turn, waiting at most `timeout` for something to happen.
    fn wait_signal(&mut self, timeout: Duration) -> Result<Option<HostSignal>>;
}
