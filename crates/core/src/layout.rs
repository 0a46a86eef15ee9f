//! Known element layout and report format of the Griffin PowerMate.
//!
//! The PowerMate sends a 6-byte input report:
//! - byte 0: button state (bit 0)
//! - byte 1: signed rotation delta since the previous report
//! - byte 2: reserved
//! - byte 3: current LED brightness
//! - byte 4: LED pulse status
//! - byte 5: LED pulse speed
//!
//! LED brightness is set through a feature report carrying a single byte.

use crate::element::{usage_pages, usages, Element, ElementId, ElementType};
use crate::error::{Error, Result};

/// Element cookies, in host enumeration order.
pub mod ids {
    use crate::element::ElementId;

    pub const COLLECTION: ElementId = ElementId(1);
    pub const BUTTON: ElementId = ElementId(2);
    pub const DIAL: ElementId = ElementId(3);
    pub const RESERVED: ElementId = ElementId(4);
    pub const LED_BRIGHTNESS: ElementId = ElementId(5);
    pub const LED_PULSE_STATUS: ElementId = ElementId(6);
    pub const LED_PULSE_SPEED: ElementId = ElementId(7);
    pub const LED_PULSE_TABLE: ElementId = ElementId(8);
    pub const LED: ElementId = ElementId(9);
}

fn element(
    id: ElementId,
    usage_page: u32,
    usage: u32,
    element_type: ElementType,
    logical_min: i64,
    logical_max: i64,
) -> Element {
    Element {
        id,
        usage_page,
        usage,
        element_type,
        logical_min,
        logical_max,
    }
}

/// The nine elements the PowerMate exposes, in host order.
pub fn powermate_elements() -> Vec<Element> {
    use usage_pages::{BUTTON, GENERIC_DESKTOP, LED, VENDOR_DEFINED};
    vec![
        element(ids::COLLECTION, GENERIC_DESKTOP, usages::DIAL, ElementType::Collection, 0, 0),
        element(ids::BUTTON, BUTTON, usages::BUTTON_1, ElementType::InputButton, 0, 1),
        element(ids::DIAL, GENERIC_DESKTOP, usages::WHEEL, ElementType::InputMisc, -128, 127),
        element(ids::RESERVED, VENDOR_DEFINED, 0x01, ElementType::InputMisc, 0, 255),
        element(ids::LED_BRIGHTNESS, VENDOR_DEFINED, 0x02, ElementType::InputMisc, 0, 255),
        element(ids::LED_PULSE_STATUS, VENDOR_DEFINED, 0x03, ElementType::InputMisc, 0, 255),
        element(ids::LED_PULSE_SPEED, VENDOR_DEFINED, 0x04, ElementType::InputMisc, 0, 255),
        element(ids::LED_PULSE_TABLE, VENDOR_DEFINED, 0x05, ElementType::Output, 0, 2),
        element(ids::LED, LED, usages::GENERIC_INDICATOR, ElementType::Feature, 0, 255),
    ]
}

/// Turns raw input reports into per-element value changes.
///
/// The button reports its level, so only transitions are emitted. The dial
/// reports a relative delta, so every non-zero delta is emitted.
#[derive(Debug, Default)]
pub struct ReportDecoder {
    button: Option<i64>,
}

impl ReportDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one input report. Short reports yield nothing.
    pub fn decode(&mut self, report: &[u8]) -> Vec<(ElementId, i64)> {
        let mut changes = Vec::new();
        if report.len() < 2 {
            return changes;
        }

        let button = i64::from(report[0] & 0x01);
        if self.button != Some(button) {
            // The first report only establishes the baseline unless pressed.
            if self.button.is_some() || button != 0 {
                changes.push((ids::BUTTON, button));
            }
            self.button = Some(button);
        }

        let delta = i64::from(report[1] as i8);
        if delta != 0 {
            changes.push((ids::DIAL, delta));
        }
        changes
    }
}

/// Feature report that sets the LED brightness.
pub fn led_feature_report(value: i64) -> Result<Vec<u8>> {
    let brightness = u8::try_from(value).map_err(|_| Error::OutOfRange {
        field: "led_brightness",
        value: value.unsigned_abs(),
        min: 0,
        max: u8::MAX as u64,
    })?;
    // Report ID 0: the device does not number its reports.
    Ok(vec![0x00, brightness])
}
