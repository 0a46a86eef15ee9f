//! Control elements: the addressable buttons, axes and LEDs of a device.

/// HID usage pages referenced by the known layouts.
pub mod usage_pages {
    /// Generic Desktop (pointers, wheels, dials).
    pub const GENERIC_DESKTOP: u32 = 0x01;
    /// LED indicators.
    pub const LED: u32 = 0x08;
    /// Buttons.
    pub const BUTTON: u32 = 0x09;
    /// Start of the vendor-defined range.
    pub const VENDOR_DEFINED: u32 = 0xFF00;
}

/// Usages within [`usage_pages`] referenced by the known layouts.
pub mod usages {
    /// Generic Desktop: Dial.
    pub const DIAL: u32 = 0x37;
    /// Generic Desktop: Wheel.
    pub const WHEEL: u32 = 0x38;
    /// Button page: primary button.
    pub const BUTTON_1: u32 = 0x01;
    /// LED page: generic indicator.
    pub const GENERIC_INDICATOR: u32 = 0x4B;
}

/// Stable identity of an element on one device (the host's element cookie).
///
/// Value events carry this id; dispatch compares it against the classified
/// roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element kind, with the host's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    InputMisc,
    InputButton,
    InputAxis,
    InputScanCodes,
    InputNull,
    Output,
    Feature,
    Collection,
    /// A code this crate does not know about.
    Other(u32),
}

impl ElementType {
    /// Numeric code of the feature type. The PowerMate exposes its LED
    /// brightness through the first element of this type.
    pub const FEATURE_CODE: u32 = 257;

    /// Look up a type from its host numeric code.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::InputMisc,
            2 => Self::InputButton,
            3 => Self::InputAxis,
            4 => Self::InputScanCodes,
            5 => Self::InputNull,
            129 => Self::Output,
            Self::FEATURE_CODE => Self::Feature,
            513 => Self::Collection,
            other => Self::Other(other),
        }
    }

    /// Host numeric code.
    pub fn code(&self) -> u32 {
        match self {
            Self::InputMisc => 1,
            Self::InputButton => 2,
            Self::InputAxis => 3,
            Self::InputScanCodes => 4,
            Self::InputNull => 5,
            Self::Output => 129,
            Self::Feature => Self::FEATURE_CODE,
            Self::Collection => 513,
            Self::Other(code) => *code,
        }
    }

    /// Whether the host produces input values for this element.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Self::InputMisc
                | Self::InputButton
                | Self::InputAxis
                | Self::InputScanCodes
                | Self::InputNull
        )
    }
}

/// One control surface on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: ElementId,
    pub usage_page: u32,
    pub usage: u32,
    pub element_type: ElementType,
    pub logical_min: i64,
    pub logical_max: i64,
}

impl Element {
    /// Diagnostic line in the probe output format.
    pub fn describe(&self) -> String {
        format!(
            "Usage page: {}, Element type: {}, Min: {}, Max: {}",
            self.usage_page,
            self.element_type.code(),
            self.logical_min,
            self.logical_max
        )
    }
}
