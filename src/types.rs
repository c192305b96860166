use std::fmt::{self, Display};

use crate::error::{Error, Result};

/// Data type of a camera attribute, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    UInt32,
    Int64,
    Double,
    String,
    Enum,
    Boolean,
    Command,
    /// A type this crate does not model (for example blobs).
    Other(i32),
}

impl AttributeType {
    pub(crate) fn raw(self) -> i32 {
        match self {
            AttributeType::UInt32 => 0,
            AttributeType::Int64 => 1,
            AttributeType::Double => 2,
            AttributeType::String => 3,
            AttributeType::Enum => 4,
            AttributeType::Boolean => 5,
            AttributeType::Command => 6,
            AttributeType::Other(raw) => raw,
        }
    }
}

impl From<i32> for AttributeType {
    fn from(raw: i32) -> Self {
        match raw {
            0 => AttributeType::UInt32,
            1 => AttributeType::Int64,
            2 => AttributeType::Double,
            3 => AttributeType::String,
            4 => AttributeType::Enum,
            5 => AttributeType::Boolean,
            6 => AttributeType::Command,
            other => AttributeType::Other(other),
        }
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Other(raw) => write!(f, "Other({})", raw),
            known => write!(f, "{:?}", known),
        }
    }
}

/// Bus a camera is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusType {
    FireWire,
    Ethernet,
    Simulated,
    DirectShow,
    Other(u32),
}

impl BusType {
    pub(crate) fn raw(self) -> u32 {
        match self {
            BusType::FireWire => 0x3133_3934,
            BusType::Ethernet => 0x6970_7634,
            BusType::Simulated => 0x2073_696D,
            BusType::DirectShow => 0x6473_6877,
            BusType::Other(raw) => raw,
        }
    }
}

impl From<u32> for BusType {
    fn from(raw: u32) -> Self {
        match raw {
            0x3133_3934 => BusType::FireWire,
            0x6970_7634 => BusType::Ethernet,
            0x2073_696D => BusType::Simulated,
            0x6473_6877 => BusType::DirectShow,
            other => BusType::Other(other),
        }
    }
}

/// Whether a session controls the camera or only listens to its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraControlMode {
    #[default]
    Controller,
    Listener,
}

impl CameraControlMode {
    pub(crate) fn raw(self) -> u32 {
        match self {
            CameraControlMode::Controller => 0,
            CameraControlMode::Listener => 1,
        }
    }
}

impl std::str::FromStr for CameraControlMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "controller" => Ok(CameraControlMode::Controller),
            "listener" => Ok(CameraControlMode::Listener),
            other => Err(Error::Config(format!(
                "Unknown camera control mode '{}'",
                other
            ))),
        }
    }
}

/// User level an attribute is exposed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeVisibility {
    Simple,
    Intermediate,
    Advanced,
    Other(u32),
}

impl AttributeVisibility {
    pub(crate) fn raw(self) -> u32 {
        match self {
            AttributeVisibility::Simple => 0x0000_1000,
            AttributeVisibility::Intermediate => 0x0000_2000,
            AttributeVisibility::Advanced => 0x0000_4000,
            AttributeVisibility::Other(raw) => raw,
        }
    }
}

impl From<u32> for AttributeVisibility {
    fn from(raw: u32) -> Self {
        match raw {
            0x0000_1000 => AttributeVisibility::Simple,
            0x0000_2000 => AttributeVisibility::Intermediate,
            0x0000_4000 => AttributeVisibility::Advanced,
            other => AttributeVisibility::Other(other),
        }
    }
}

/// Visibility used by the driver for attributes hidden from enumeration.
pub(crate) const PRIVATE_VISIBILITY: AttributeVisibility = AttributeVisibility::Other(0x0800_0000);

/// Low-level acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionType {
    /// Fill the buffers once, then stop.
    SingleShot,
    /// Keep cycling through the buffer ring.
    Continuous,
}

/// How a buffer is selected when pulling image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferNumberMode {
    Next,
    Last,
    BufferNumber,
}

impl BufferNumberMode {
    pub(crate) fn raw(self) -> u32 {
        match self {
            BufferNumberMode::Next => 0,
            BufferNumberMode::Last => 1,
            BufferNumberMode::BufferNumber => 2,
        }
    }
}

/// Plug-and-play notifications the driver can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PnpEvent {
    CameraAttached,
    CameraDetached,
    BusResetCompleted,
}

impl PnpEvent {
    pub(crate) fn raw(self) -> u32 {
        match self {
            PnpEvent::CameraAttached => 0,
            PnpEvent::CameraDetached => 1,
            PnpEvent::BusResetCompleted => 2,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PnpEvent::CameraAttached),
            1 => Some(PnpEvent::CameraDetached),
            2 => Some(PnpEvent::BusResetCompleted),
            _ => None,
        }
    }
}

/// One legal value of an enum attribute.
///
/// Two items are equal when both name and value match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumAttributeItem {
    name: String,
    value: i64,
}

impl EnumAttributeItem {
    /// Create an item from its name and 64-bit value.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        EnumAttributeItem {
            name: name.into(),
            value,
        }
    }

    /// Assemble the value from the driver's low and reserved (high) words.
    pub(crate) fn from_words(name: impl Into<String>, low: u32, high: u32) -> Self {
        let value = ((high as i64) << 32) | low as i64;
        EnumAttributeItem::new(name, value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub(crate) fn low_word(&self) -> u32 {
        self.value as u32
    }

    pub(crate) fn high_word(&self) -> u32 {
        (self.value >> 32) as u32
    }
}

impl Display for EnumAttributeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A typed attribute value as exchanged with the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    UInt32(u32),
    Int64(i64),
    Double(f64),
    String(String),
    Enum(EnumAttributeItem),
    Boolean(bool),
}

impl AttributeValue {
    /// The attribute type this value is marshalled as.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::UInt32(_) => AttributeType::UInt32,
            AttributeValue::Int64(_) => AttributeType::Int64,
            AttributeValue::Double(_) => AttributeType::Double,
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Enum(_) => AttributeType::Enum,
            AttributeValue::Boolean(_) => AttributeType::Boolean,
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::UInt32(v) => write!(f, "{}", v),
            AttributeValue::Int64(v) => write!(f, "{}", v),
            AttributeValue::Double(v) => write!(f, "{}", v),
            AttributeValue::String(v) => write!(f, "{}", v),
            AttributeValue::Enum(v) => write!(f, "{}", v),
            AttributeValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($t:ty),* => $target:ty) => {
        $(
            impl From<$t> for AttributeValue {
                fn from(v: $t) -> Self {
                    AttributeValue::$variant(v as $target)
                }
            }
        )*
    };
}

value_from!(UInt32: u8, u16, u32, i8, i16, i32 => u32);
value_from!(Int64: i64, u64 => i64);
value_from!(Double: f32, f64 => f64);

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<EnumAttributeItem> for AttributeValue {
    fn from(v: EnumAttributeItem) -> Self {
        AttributeValue::Enum(v)
    }
}
