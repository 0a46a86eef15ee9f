//! Dispatch loop: turns queue readiness into per-element callbacks.
//!
//! Single-threaded and cooperative. Every signal is handled on the thread
//! that calls [`DispatchLoop::run`], one at a time, so handlers must not
//! block. Draining uses zero-timeout reads and never does.

use crate::classify::{ClassifiedElements, Role};
use crate::element::ElementId;
use crate::error::Result;
use crate::host::{DeviceHandle, HidHost, HostSignal, LoopSource};
use crate::queue::{EventQueue, QueueState, ValueEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time the loop waits for the host per turn.
pub const DEFAULT_TURN: Duration = Duration::from_millis(100);

/// Outcome of dispatching one value event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Button(i64),
    Scroll(i64),
    Unknown { element: ElementId, value: i64 },
}

impl std::fmt::Display for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Button(value) => write!(f, "Button press: {value}"),
            Self::Scroll(value) => write!(f, "Scroll: {value}"),
            Self::Unknown { element, value } => write!(f, "Unknown element {element}: {value}"),
        }
    }
}

/// Attribute an event to the button, the dial, or neither.
pub fn dispatch(event: &ValueEvent, elements: &ClassifiedElements) -> Dispatched {
    match elements.role_of(event.element) {
        Role::Button => Dispatched::Button(event.value),
        Role::Scroll => Dispatched::Scroll(event.value),
        Role::Led | Role::Unknown => Dispatched::Unknown {
            element: event.element,
            value: event.value,
        },
    }
}

/// Receives what the loop observes.
pub trait DispatchSink {
    /// A matching device was attached. Informational only.
    fn device_matched(&mut self, _device: &DeviceHandle) {}

    /// A matching device was removed. Informational only.
    fn device_removed(&mut self, _device: &DeviceHandle) {}

    /// One drained value event.
    fn dispatched(&mut self, event: &ValueEvent, outcome: &Dispatched);
}

/// Cooperative cancellation flag shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Scheduled,
    Running,
    Stopped,
}

/// Counters reported when the loop returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub turns: u64,
    pub buttons: u64,
    pub scrolls: u64,
    pub unknown: u64,
    pub dropped: u64,
}

/// Drives one queue on one host until stopped.
pub struct DispatchLoop<'h, H: HidHost + ?Sized> {
    host: &'h mut H,
    queue: EventQueue,
    elements: ClassifiedElements,
    state: LoopState,
    turn: Duration,
    device_present: bool,
    summary: RunSummary,
}

impl<'h, H: HidHost + ?Sized> DispatchLoop<'h, H> {
    pub fn new(host: &'h mut H, queue: EventQueue, elements: ClassifiedElements) -> Self {
        Self {
            host,
            queue,
            elements,
            state: LoopState::Idle,
            turn: DEFAULT_TURN,
            device_present: true,
            summary: RunSummary::default(),
        }
    }

    /// Set how long each turn waits for the host.
    pub fn with_turn(mut self, turn: Duration) -> Self {
        self.turn = turn;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Whether the queue's device is still attached.
    pub fn device_present(&self) -> bool {
        self.device_present
    }

    /// Schedule the manager (attach/removal) and the queue (readiness).
    ///
    /// A queue the caller already scheduled or started is left as is.
    pub fn register(&mut self) -> Result<()> {
        if self.state != LoopState::Idle {
            return Ok(());
        }
        self.host.schedule(LoopSource::Manager)?;
        if self.queue.state() == QueueState::Created {
            self.queue.schedule(&mut *self.host)?;
        }
        self.state = LoopState::Scheduled;
        debug!(queue = self.queue.id().0, "Dispatch callbacks registered");
        Ok(())
    }

    /// Start the queue.
    pub fn start(&mut self) -> Result<()> {
        if self.state == LoopState::Idle {
            self.register()?;
        }
        if self.state != LoopState::Scheduled {
            return Ok(());
        }
        if self.queue.state() == QueueState::Scheduled {
            self.queue.start(&mut *self.host)?;
        }
        self.state = LoopState::Running;
        Ok(())
    }

    /// Run until `stop` is triggered, then stop the queue and drain what is
    /// left.
    pub fn run(&mut self, sink: &mut dyn DispatchSink, stop: &StopToken) -> Result<RunSummary> {
        if self.state == LoopState::Stopped {
            return Ok(self.summary);
        }
        self.start()?;
        info!(
            queue = self.queue.id().0,
            path = %self.queue.device().path,
            "Dispatch loop running"
        );

        let mut failure = None;
        while !stop.is_stopped() {
            self.summary.turns += 1;
            let signal = match self.host.wait_signal(self.turn) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Run loop turn failed, stopping: {e}");
                    failure = Some(e);
                    break;
                }
            };
            match signal {
                Some(HostSignal::QueueReady(id)) if id == self.queue.id() => self.drain_into(sink),
                Some(HostSignal::QueueReady(id)) => {
                    debug!(queue = id.0, "Readiness for a foreign queue, ignoring");
                }
                Some(HostSignal::DeviceMatched(device)) => {
                    info!(path = %device.path, "Device attached");
                    sink.device_matched(&device);
                }
                Some(HostSignal::DeviceRemoved(device)) => {
                    if device == *self.queue.device() {
                        warn!(
                            path = %device.path,
                            "Watched device removed, no further events will arrive"
                        );
                        self.device_present = false;
                    } else {
                        info!(path = %device.path, "Device removed");
                    }
                    sink.device_removed(&device);
                }
                None => {}
            }
        }

        let stopped = self.shutdown(sink);
        match failure {
            Some(e) => Err(e),
            None => stopped.map(|()| self.summary),
        }
    }

    fn shutdown(&mut self, sink: &mut dyn DispatchSink) -> Result<()> {
        self.queue.stop(&mut *self.host)?;
        self.host.unschedule(LoopSource::Manager)?;
        self.drain_into(sink);
        self.state = LoopState::Stopped;
        info!(
            buttons = self.summary.buttons,
            scrolls = self.summary.scrolls,
            unknown = self.summary.unknown,
            dropped = self.summary.dropped,
            "Dispatch loop stopped"
        );
        Ok(())
    }

    fn drain_into(&mut self, sink: &mut dyn DispatchSink) {
        for event in self.queue.drain(&mut *self.host) {
            let outcome = dispatch(&event, &self.elements);
            match outcome {
                Dispatched::Button(_) => self.summary.buttons += 1,
                Dispatched::Scroll(_) => self.summary.scrolls += 1,
                Dispatched::Unknown { element, .. } => {
                    debug!(%element, "Event for an unclassified element");
                    self.summary.unknown += 1;
                }
            }
            sink.dispatched(&event, &outcome);
        }

        let dropped = self.host.dropped_events(self.queue.id());
        if dropped > self.summary.dropped {
            warn!(
                lost = dropped - self.summary.dropped,
                total = dropped,
                capacity = self.queue.capacity(),
                "Event queue overflowed, oldest events were discarded"
            );
            self.summary.dropped = dropped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::error::Error;
    use crate::host::mock::MockHost;
    use crate::layout::{ids, powermate_elements};
    use std::time::Instant;

    #[derive(Default)]
    struct Transcript {
        lines: Vec<String>,
    }

    impl DispatchSink for Transcript {
        fn device_matched(&mut self, device: &DeviceHandle) {
            self.lines.push(format!("attached {}", device.path));
        }

        fn device_removed(&mut self, device: &DeviceHandle) {
            self.lines.push(format!("removed {}", device.path));
        }

        fn dispatched(&mut self, _event: &ValueEvent, outcome: &Dispatched) {
            self.lines.push(outcome.to_string());
        }
    }

    fn setup(host: &mut MockHost, capacity: usize) -> (DeviceHandle, EventQueue, ClassifiedElements) {
        let layout = powermate_elements();
        let device = host.add_device(0x077D, 0x0410, layout.clone());
        let elements = classify(&layout).unwrap();
        let mut queue = EventQueue::create(host, &device, capacity).unwrap();
        queue.add_element(host, &elements.button).unwrap();
        queue.add_element(host, &elements.scroll).unwrap();
        (device, queue, elements)
    }

    fn value(element: ElementId, value: i64) -> ValueEvent {
        ValueEvent {
            element,
            value,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn dispatch_attributes_by_identity() {
        let elements = classify(&powermate_elements()).unwrap();
        assert_eq!(dispatch(&value(ids::BUTTON, 1), &elements), Dispatched::Button(1));
        assert_eq!(dispatch(&value(ids::DIAL, -2), &elements), Dispatched::Scroll(-2));
        assert_eq!(
            dispatch(&value(ids::RESERVED, 4), &elements),
            Dispatched::Unknown {
                element: ids::RESERVED,
                value: 4
            }
        );
        assert!(matches!(
            dispatch(&value(ids::LED, 0), &elements),
            Dispatched::Unknown { .. }
        ));
    }

    #[test]
    fn dispatched_display_format() {
        assert_eq!(Dispatched::Button(1).to_string(), "Button press: 1");
        assert_eq!(Dispatched::Scroll(-1).to_string(), "Scroll: -1");
        assert_eq!(
            Dispatched::Unknown {
                element: ElementId(4),
                value: 9
            }
            .to_string(),
            "Unknown element #4: 9"
        );
    }

    #[test]
    fn stop_token_is_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!token.is_stopped());
        clone.stop();
        assert!(token.is_stopped());
    }

    #[test]
    fn loop_walks_through_states() {
        let mut host = MockHost::new();
        let (_, queue, elements) = setup(&mut host, 16);
        let queue_id = queue.id();
        let stop = StopToken::new();
        host.stop_when_idle(stop.clone());

        let mut dispatch_loop = DispatchLoop::new(&mut host, queue, elements);
        assert_eq!(dispatch_loop.state(), LoopState::Idle);
        dispatch_loop.register().unwrap();
        assert_eq!(dispatch_loop.state(), LoopState::Scheduled);
        dispatch_loop.start().unwrap();
        assert_eq!(dispatch_loop.state(), LoopState::Running);

        let mut sink = Transcript::default();
        dispatch_loop.run(&mut sink, &stop).unwrap();
        assert_eq!(dispatch_loop.state(), LoopState::Stopped);
        assert!(sink.lines.is_empty());
        assert!(!host.queue_started(queue_id));
        assert!(!host.manager_scheduled());
    }

    #[test]
    fn run_with_stop_already_set_does_not_wait() {
        let mut host = MockHost::new();
        let (_, queue, elements) = setup(&mut host, 16);
        let stop = StopToken::new();
        stop.stop();

        let mut sink = Transcript::default();
        let summary = DispatchLoop::new(&mut host, queue, elements)
            .run(&mut sink, &stop)
            .unwrap();
        assert_eq!(summary.turns, 0);
        assert_eq!(host.turns(), 0);
    }

    #[test]
    fn host_failure_still_stops_queue_and_manager() {
        let mut host = MockHost::new();
        let (_, queue, elements) = setup(&mut host, 16);
        let queue_id = queue.id();
        host.fail_wait();

        let stop = StopToken::new();
        let mut sink = Transcript::default();
        let mut dispatch_loop = DispatchLoop::new(&mut host, queue, elements);
        let result = dispatch_loop.run(&mut sink, &stop);

        assert!(matches!(result, Err(Error::Hid(_))));
        assert_eq!(dispatch_loop.state(), LoopState::Stopped);
        assert!(!host.queue_started(queue_id));
        assert!(!host.manager_scheduled());
        assert_eq!(host.turns(), 1);
    }

    #[test]
    fn removal_of_watched_device_degrades_without_error() {
        let mut host = MockHost::new();
        let (device, mut queue, elements) = setup(&mut host, 16);
        host.schedule(LoopSource::Manager).unwrap();
        queue.schedule(&mut host).unwrap();
        queue.start(&mut host).unwrap();
        host.push_value(&device, ids::DIAL, 1);
        host.detach(&device);

        let stop = StopToken::new();
        host.stop_when_idle(stop.clone());
        let mut sink = Transcript::default();
        let mut dispatch_loop = DispatchLoop::new(&mut host, queue, elements);
        let summary = dispatch_loop.run(&mut sink, &stop).unwrap();

        assert!(!dispatch_loop.device_present());
        assert_eq!(sink.lines, vec!["Scroll: 1".to_string(), "removed mock:1".to_string()]);
        assert_eq!(summary.scrolls, 1);
    }

    #[test]
    fn attach_is_informational() {
        let mut host = MockHost::new();
        let (_, queue, elements) = setup(&mut host, 16);
        host.schedule(LoopSource::Manager).unwrap();
        host.attach(0x077D, 0x0410, powermate_elements());

        let stop = StopToken::new();
        host.stop_when_idle(stop.clone());
        let mut sink = Transcript::default();
        let mut dispatch_loop = DispatchLoop::new(&mut host, queue, elements);
        dispatch_loop.run(&mut sink, &stop).unwrap();

        assert_eq!(sink.lines, vec!["attached mock:2".to_string()]);
        assert!(dispatch_loop.device_present());
    }
}
