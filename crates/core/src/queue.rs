//! Bounded value-change queue.
//!
//! A queue collects value events for a fixed set of elements on one device.
//! Lifecycle: create → add elements → schedule → start → (drain)* → stop.
//! Draining never blocks: it pulls with a zero timeout until the host has
//! nothing left.

use crate::element::{Element, ElementId};
use crate::error::{Error, Result};
use crate::host::{DeviceHandle, HidHost, LoopSource, QueueId};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A timestamped integer reading of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEvent {
    pub element: ElementId,
    pub value: i64,
    pub timestamp: Instant,
}

/// Fixed-capacity FIFO of value events.
///
/// When full, pushing discards the oldest event and counts it as dropped.
#[derive(Debug)]
pub struct EventRing {
    events: VecDeque<ValueEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventRing {
    /// `capacity` is clamped to at least one slot.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event, returning the one evicted to make room.
    pub fn push(&mut self, event: ValueEvent) -> Option<ValueEvent> {
        let evicted = if self.events.len() == self.capacity {
            self.dropped += 1;
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    pub fn pop(&mut self) -> Option<ValueEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events discarded on overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Where a queue is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Created,
    Scheduled,
    Started,
    Stopped,
}

impl QueueState {
    fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Scheduled => "scheduled",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

/// Core-side view of a host queue.
#[derive(Debug)]
pub struct EventQueue {
    id: QueueId,
    device: DeviceHandle,
    capacity: usize,
    elements: Vec<ElementId>,
    state: QueueState,
}

impl EventQueue {
    /// Create a queue of `capacity` slots on `device`.
    pub fn create<H: HidHost + ?Sized>(
        host: &mut H,
        device: &DeviceHandle,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::OutOfRange {
                field: "queue_capacity",
                value: 0,
                min: 1,
                max: u64::MAX,
            });
        }
        let id = host.create_queue(device, capacity)?;
        debug!(queue = id.0, capacity, path = %device.path, "Created event queue");
        Ok(Self {
            id,
            device: device.clone(),
            capacity,
            elements: Vec::new(),
            state: QueueState::Created,
        })
    }

    /// Register an element. Only allowed before scheduling.
    pub fn add_element<H: HidHost + ?Sized>(&mut self, host: &mut H, element: &Element) -> Result<()> {
        self.expect(QueueState::Created, "add an element")?;
        if self.elements.contains(&element.id) {
            return Ok(());
        }
        host.add_to_queue(self.id, element)?;
        self.elements.push(element.id);
        Ok(())
    }

    /// Attach the queue to the host run loop.
    pub fn schedule<H: HidHost + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        self.expect(QueueState::Created, "schedule")?;
        host.schedule(LoopSource::Queue(self.id))?;
        self.state = QueueState::Scheduled;
        Ok(())
    }

    /// Begin collecting values.
    pub fn start<H: HidHost + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        self.expect(QueueState::Scheduled, "start")?;
        host.start_queue(self.id)?;
        self.state = QueueState::Started;
        debug!(queue = self.id.0, elements = self.elements.len(), "Event queue started");
        Ok(())
    }

    /// Stop collecting and detach from the run loop. Idempotent.
    pub fn stop<H: HidHost + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        match self.state {
            QueueState::Stopped => Ok(()),
            QueueState::Created => {
                self.state = QueueState::Stopped;
                Ok(())
            }
            QueueState::Scheduled | QueueState::Started => {
                if self.state == QueueState::Started {
                    host.stop_queue(self.id)?;
                }
                host.unschedule(LoopSource::Queue(self.id))?;
                self.state = QueueState::Stopped;
                debug!(queue = self.id.0, "Event queue stopped");
                Ok(())
            }
        }
    }

    /// Pull every event currently available, without waiting.
    pub fn drain<'h, H: HidHost + ?Sized>(&self, host: &'h mut H) -> Drain<'h, H> {
        Drain {
            host,
            queue: self.id,
            done: false,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    fn expect(&self, state: QueueState, operation: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::QueueState {
                queue: self.id.0,
                operation,
                state: self.state.name(),
            })
        }
    }
}

/// Iterator returned by [`EventQueue::drain`].
///
/// Finite: it ends at the first empty read and stays ended.
pub struct Drain<'h, H: HidHost + ?Sized> {
    host: &'h mut H,
    queue: QueueId,
    done: bool,
}

impl<H: HidHost + ?Sized> Iterator for Drain<'_, H> {
    type Item = ValueEvent;

    fn next(&mut self) -> Option<ValueEvent> {
        if self.done {
            return None;
        }
        match self.host.read_next_value(self.queue, Duration::ZERO) {
            Some(event) => {
                trace!(queue = self.queue.0, element = %event.element, value = event.value, "Drained value");
                Some(event)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl<H: HidHost + ?Sized> std::iter::FusedIterator for Drain<'_, H> {}
