//! Element classification: mapping raw elements to semantic roles.
//!
//! Two strategies are provided. [`classify`] trusts the known element order
//! of the PowerMate (button at 1, dial at 2, LED at 8). [`classify_semantic`]
//! matches on usage page, usage and element type instead, and only falls back
//! to positions when the rules do not pick exactly one element per role.

use crate::element::{usage_pages, usages, Element, ElementId, ElementType};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Position of the push button in the element list.
pub const BUTTON_INDEX: usize = 1;
/// Position of the rotary dial.
pub const SCROLL_INDEX: usize = 2;
/// Position of the LED.
pub const LED_INDEX: usize = 8;
/// Elements a device must expose for positional classification.
pub const MIN_ELEMENT_COUNT: usize = LED_INDEX + 1;

/// Semantic role of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Button,
    Scroll,
    Led,
    Unknown,
}

/// Which classification strategy a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyStrategy {
    #[default]
    Positional,
    Semantic,
}

/// The three elements of interest on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedElements {
    pub button: Element,
    pub scroll: Element,
    pub led: Element,
}

impl ClassifiedElements {
    /// Role of the element with the given id.
    pub fn role_of(&self, id: ElementId) -> Role {
        if id == self.button.id {
            Role::Button
        } else if id == self.scroll.id {
            Role::Scroll
        } else if id == self.led.id {
            Role::Led
        } else {
            Role::Unknown
        }
    }
}

/// Pick button, scroll and LED by fixed position.
pub fn classify(elements: &[Element]) -> Result<ClassifiedElements> {
    if elements.len() < MIN_ELEMENT_COUNT {
        return Err(Error::ElementCountTooLow {
            found: elements.len(),
            required: MIN_ELEMENT_COUNT,
        });
    }
    let classified = ClassifiedElements {
        button: elements[BUTTON_INDEX].clone(),
        scroll: elements[SCROLL_INDEX].clone(),
        led: elements[LED_INDEX].clone(),
    };
    debug!(
        button = %classified.button.id,
        scroll = %classified.scroll.id,
        led = %classified.led.id,
        "Classified elements by position"
    );
    Ok(classified)
}

/// A declarative match for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRule {
    pub role: Role,
    pub usage_page: u32,
    pub usage: u32,
    pub element_type: ElementType,
}

impl RoleRule {
    pub fn matches(&self, element: &Element) -> bool {
        element.usage_page == self.usage_page
            && element.usage == self.usage
            && element.element_type == self.element_type
    }
}

/// Rules for the PowerMate.
pub const POWERMATE_RULES: [RoleRule; 3] = [
    RoleRule {
        role: Role::Button,
        usage_page: usage_pages::BUTTON,
        usage: usages::BUTTON_1,
        element_type: ElementType::InputButton,
    },
    RoleRule {
        role: Role::Scroll,
        usage_page: usage_pages::GENERIC_DESKTOP,
        usage: usages::WHEEL,
        element_type: ElementType::InputMisc,
    },
    RoleRule {
        role: Role::Led,
        usage_page: usage_pages::LED,
        usage: usages::GENERIC_INDICATOR,
        element_type: ElementType::Feature,
    },
];

/// Classify by usage, falling back to [`classify`] when any role is missing
/// or matched more than once.
pub fn classify_semantic(elements: &[Element], rules: &[RoleRule]) -> Result<ClassifiedElements> {
    let pick = |role: Role| {
        let mut hits = elements
            .iter()
            .filter(|e| rules.iter().any(|r| r.role == role && r.matches(e)));
        let first = hits.next()?;
        hits.next().is_none().then_some(first)
    };

    match (pick(Role::Button), pick(Role::Scroll), pick(Role::Led)) {
        (Some(button), Some(scroll), Some(led)) => {
            debug!(
                button = %button.id,
                scroll = %scroll.id,
                led = %led.id,
                "Classified elements by usage"
            );
            Ok(ClassifiedElements {
                button: button.clone(),
                scroll: scroll.clone(),
                led: led.clone(),
            })
        }
        _ => {
            warn!(
                count = elements.len(),
                "Usage rules did not identify every role, falling back to element positions"
            );
            classify(elements)
        }
    }
}

/// Classify with the configured strategy.
pub fn classify_with(
    elements: &[Element],
    strategy: ClassifyStrategy,
) -> Result<ClassifiedElements> {
    match strategy {
        ClassifyStrategy::Positional => classify(elements),
        ClassifyStrategy::Semantic => classify_semantic(elements, &POWERMATE_RULES),
    }
}

/// First element of the given type, with its position.
pub fn find_first_of_type(
    elements: &[Element],
    element_type: ElementType,
) -> Option<(usize, &Element)> {
    elements
        .iter()
        .enumerate()
        .find(|(_, e)| e.element_type == element_type)
}
