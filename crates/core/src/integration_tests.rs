//! Integration tests: exercise the full flow against a simulated PowerMate.
//!
//! These tests attach a mock PowerMate to a scripted host, then run the
//! match → classify → queue → dispatch pipeline end to end.

#[cfg(test)]
mod tests {
    use crate::classify::ClassifyStrategy;
    use crate::config::SessionConfig;
    use crate::device::{DeviceIdentity, SelectionPolicy};
    use crate::dispatch::{DispatchSink, Dispatched, RunSummary, StopToken};
    use crate::element::ElementId;
    use crate::error::Error;
    use crate::host::mock::MockHost;
    use crate::host::{DeviceHandle, HidHost, LoopSource};
    use crate::layout::{ids, powermate_elements};
    use crate::queue::ValueEvent;
    use crate::session::{probe, Session};

    const VID: u16 = 0x077D;
    const PID: u16 = 0x0410;

    #[derive(Default)]
    struct Collect {
        lines: Vec<String>,
        elements: Vec<ElementId>,
    }

    impl DispatchSink for Collect {
        fn device_matched(&mut self, device: &DeviceHandle) {
            self.lines.push(format!("Device attached: {}", device.path));
        }

        fn device_removed(&mut self, device: &DeviceHandle) {
            self.lines.push(format!("Device removed: {}", device.path));
        }

        fn dispatched(&mut self, event: &ValueEvent, outcome: &Dispatched) {
            self.elements.push(event.element);
            self.lines.push(outcome.to_string());
        }
    }

    /// Host with one PowerMate attached.
    fn create_mock_powermate() -> (MockHost, DeviceHandle) {
        let mut host = MockHost::new();
        let device = host.add_device(VID, PID, powermate_elements());
        (host, device)
    }

    fn run_session(host: &mut MockHost, config: &SessionConfig) -> (Collect, RunSummary) {
        let session = Session::open(host, config).unwrap();
        let stop = StopToken::new();
        host.stop_when_idle(stop.clone());
        let mut sink = Collect::default();
        let summary = session
            .into_loop(host, config)
            .run(&mut sink, &stop)
            .unwrap();
        (sink, summary)
    }

    /// Test: button press and two dial steps come out in order.
    #[test]
    fn powermate_scenario_dispatches_in_order() {
        let (mut host, device) = create_mock_powermate();
        host.script_value(&device, ids::BUTTON, 1);
        host.script_value(&device, ids::DIAL, -1);
        host.script_value(&device, ids::DIAL, 1);

        let (sink, summary) = run_session(&mut host, &SessionConfig::default());

        assert_eq!(sink.lines, vec!["Button press: 1", "Scroll: -1", "Scroll: 1"]);
        assert_eq!(summary.buttons, 1);
        assert_eq!(summary.scrolls, 2);
        assert_eq!(summary.unknown, 0);
    }

    /// Test: long mixed sequence keeps FIFO order and exact attribution.
    #[test]
    fn mixed_sequence_keeps_submission_order() {
        let (mut host, device) = create_mock_powermate();
        let script: Vec<(ElementId, i64)> = (0..40)
            .map(|i| {
                if i % 3 == 0 {
                    (ids::BUTTON, i64::from(i % 2))
                } else {
                    (ids::DIAL, i64::from(i) - 20)
                }
            })
            .collect();
        for (element, value) in &script {
            host.script_value(&device, *element, *value);
        }

        let (sink, summary) = run_session(&mut host, &SessionConfig::default());

        let expected: Vec<ElementId> = script.iter().map(|(e, _)| *e).collect();
        assert_eq!(sink.elements, expected);
        assert_eq!(summary.buttons + summary.scrolls, 40);
        assert_eq!(summary.unknown, 0);
    }

    /// Test: nothing queued means nothing dispatched, and the loop still ends.
    #[test]
    fn idle_session_dispatches_nothing() {
        let (mut host, _) = create_mock_powermate();
        let (sink, summary) = run_session(&mut host, &SessionConfig::default());
        assert!(sink.lines.is_empty());
        assert_eq!(summary.turns, 1);
    }

    /// Test: writing the LED never feeds the input queue.
    #[test]
    fn led_write_does_not_produce_events() {
        let (mut host, device) = create_mock_powermate();
        let session = Session::open(&mut host, &SessionConfig::default()).unwrap();
        host.write_value(&device, &session.elements.led, 0).unwrap();

        let config = SessionConfig::default();
        let stop = StopToken::new();
        host.stop_when_idle(stop.clone());
        let mut sink = Collect::default();
        session
            .into_loop(&mut host, &config)
            .run(&mut sink, &stop)
            .unwrap();

        assert!(sink.lines.is_empty());
        assert_eq!(host.writes(), vec![(device.id, ids::LED, 0)]);
    }

    /// Test: overflow keeps the newest events and reports the loss.
    #[test]
    fn overflow_drops_oldest_and_is_counted() {
        let (mut host, device) = create_mock_powermate();
        for value in 1..=5 {
            host.script_value(&device, ids::DIAL, value);
        }
        let config = SessionConfig {
            queue_capacity: 2,
            ..SessionConfig::default()
        };

        let (sink, summary) = run_session(&mut host, &config);

        assert_eq!(sink.lines, vec!["Scroll: 4", "Scroll: 5"]);
        assert_eq!(summary.dropped, 3);
    }

    /// Test: hot-plug and unplug are reported but do not rebuild anything.
    #[test]
    fn attach_and_detach_are_informational() {
        let (mut host, device) = create_mock_powermate();
        let config = SessionConfig::default();
        let session = Session::open(&mut host, &config).unwrap();
        host.schedule(LoopSource::Manager).unwrap();
        host.attach(VID, PID, powermate_elements());
        host.detach(&device);

        let stop = StopToken::new();
        host.stop_when_idle(stop.clone());
        let mut sink = Collect::default();
        let mut dispatch_loop = session.into_loop(&mut host, &config);
        dispatch_loop.run(&mut sink, &stop).unwrap();

        assert!(!dispatch_loop.device_present());
        assert_eq!(
            sink.lines,
            vec!["Device attached: mock:2", "Device removed: mock:1"]
        );
    }

    /// Test: the default policy picks the first of several devices, the
    /// strict one refuses.
    #[test]
    fn selection_policy_with_two_devices() {
        let (mut host, first) = create_mock_powermate();
        host.add_device(VID, PID, powermate_elements());
        let session = Session::open(&mut host, &SessionConfig::default()).unwrap();
        assert_eq!(session.device, first);

        let (mut host, _) = create_mock_powermate();
        host.add_device(VID, PID, powermate_elements());
        let strict = SessionConfig {
            selection: SelectionPolicy::Unique,
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::open(&mut host, &strict),
            Err(Error::AmbiguousDevices { count: 2 })
        ));
    }

    /// Test: a different identity finds nothing on a PowerMate-only host.
    #[test]
    fn other_identity_finds_no_device() {
        let (mut host, _) = create_mock_powermate();
        let config = SessionConfig {
            identity: DeviceIdentity {
                vendor_id: 0x046D,
                product_id: 0xC08B,
            },
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::open(&mut host, &config),
            Err(Error::NoDevicesFound {
                vendor_id: 0x046D,
                product_id: 0xC08B
            })
        ));
        assert!(probe(&mut host, config.identity).unwrap().devices.is_empty());
    }

    /// Test: semantic classification copes with a reordered layout.
    #[test]
    fn semantic_session_on_reordered_layout() {
        let mut host = MockHost::new();
        let mut layout = powermate_elements();
        layout.swap(2, 6);
        let device = host.add_device(VID, PID, layout);
        host.script_value(&device, ids::DIAL, 7);

        let config = SessionConfig {
            classification: ClassifyStrategy::Semantic,
            ..SessionConfig::default()
        };
        let (sink, _) = run_session(&mut host, &config);
        assert_eq!(sink.lines, vec!["Scroll: 7"]);
    }

    /// Test: positional classification on the same reordered layout watches
    /// the wrong element, so dial events never reach the queue.
    #[test]
    fn positional_session_on_reordered_layout_misses_dial() {
        let mut host = MockHost::new();
        let mut layout = powermate_elements();
        layout.swap(2, 6);
        let device = host.add_device(VID, PID, layout);
        host.script_value(&device, ids::DIAL, 7);
        host.script_value(&device, ids::LED_PULSE_SPEED, 3);

        let (sink, _) = run_session(&mut host, &SessionConfig::default());
        assert_eq!(sink.lines, vec!["Scroll: 3"]);
    }
}
