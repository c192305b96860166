use std::{
    fmt,
    marker::PhantomData,
    ops::Deref,
    sync::{Arc, Weak},
};

use crate::driver::{AttributeInfo, Driver, SessionId};
use crate::error::{Error, Result};
use crate::session::SessionInner;
use crate::types::{AttributeType, AttributeValue, AttributeVisibility, EnumAttributeItem};

/// A named, typed camera setting.
///
/// Attributes do not keep their session alive; every call fails with
/// [`Error::SessionClosed`] once it has been closed.
#[derive(Clone)]
pub struct Attribute {
    name: String,
    attribute_type: AttributeType,
    session: Weak<SessionInner>,
}

impl Attribute {
    pub(crate) fn new(session: Weak<SessionInner>, info: &AttributeInfo) -> Self {
        Attribute {
            name: info.name.clone(),
            attribute_type: info.attribute_type,
            session,
        }
    }

    fn call<T>(&self, f: impl FnOnce(&dyn Driver, SessionId, &str) -> Result<T>) -> Result<T> {
        let inner: Arc<SessionInner> = self.session.upgrade().ok_or(Error::SessionClosed)?;
        let id = inner.id()?;
        f(inner.driver(), id, &self.name)
    }

    /// Fully qualified name, e.g. `AcquisitionAttributes::Width`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    pub fn display_name(&self) -> Result<String> {
        self.call(|driver, id, name| driver.attribute_display_name(id, name))
    }

    pub fn description(&self) -> Result<String> {
        self.call(|driver, id, name| driver.attribute_description(id, name))
    }

    pub fn tooltip(&self) -> Result<String> {
        self.call(|driver, id, name| driver.attribute_tooltip(id, name))
    }

    pub fn units(&self) -> Result<String> {
        self.call(|driver, id, name| driver.attribute_units(id, name))
    }

    pub fn visibility(&self) -> Result<AttributeVisibility> {
        self.call(|driver, id, name| driver.attribute_visibility(id, name))
    }

    pub fn is_readable(&self) -> Result<bool> {
        self.call(|driver, id, name| driver.is_attribute_readable(id, name))
    }

    pub fn is_writable(&self) -> Result<bool> {
        self.call(|driver, id, name| driver.is_attribute_writable(id, name))
    }

    /// Current value, read as the attribute's own type.
    pub fn value(&self) -> Result<AttributeValue> {
        let attribute_type = self.attribute_type;
        self.call(|driver, id, name| match attribute_type {
            AttributeType::Command => Err(Error::CommandNotReadable),
            AttributeType::Other(raw) => Err(Error::UnknownDataType(raw)),
            known => driver.get_attribute(id, name, known),
        })
    }

    /// Write a value. The driver converts between numeric types.
    pub fn set_value(&self, value: impl Into<AttributeValue>) -> Result<()> {
        let value = value.into();
        self.call(|driver, id, name| driver.set_attribute(id, name, &value))
    }

    fn mismatch(&self, requested: AttributeType) -> Error {
        Error::TypeMismatch {
            name: self.name.clone(),
            expected: self.attribute_type.to_string(),
            actual: requested.to_string(),
        }
    }

    fn view(&self, requested: AttributeType) -> Result<Attribute> {
        if self.attribute_type == requested {
            Ok(self.clone())
        } else {
            Err(self.mismatch(requested))
        }
    }

    pub fn as_u32(&self) -> Result<NumericAttribute<u32>> {
        NumericAttribute::new(self)
    }

    pub fn as_i64(&self) -> Result<NumericAttribute<i64>> {
        NumericAttribute::new(self)
    }

    pub fn as_f64(&self) -> Result<NumericAttribute<f64>> {
        NumericAttribute::new(self)
    }

    pub fn as_string(&self) -> Result<StringAttribute> {
        self.view(AttributeType::String).map(StringAttribute)
    }

    pub fn as_enum(&self) -> Result<EnumAttribute> {
        self.view(AttributeType::Enum).map(EnumAttribute)
    }

    pub fn as_bool(&self) -> Result<BoolAttribute> {
        self.view(AttributeType::Boolean).map(BoolAttribute)
    }

    pub fn as_command(&self) -> Result<CommandAttribute> {
        self.view(AttributeType::Command).map(CommandAttribute)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute: Name={}, Type={}", self.name, self.attribute_type)
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("attribute_type", &self.attribute_type)
            .finish()
    }
}

/// Rust types numeric attributes are read and written as.
pub trait NumericValue: Copy + Into<AttributeValue> + Send + Sync + 'static {
    const ATTRIBUTE_TYPE: AttributeType;

    fn from_value(value: AttributeValue) -> Option<Self>;
}

impl NumericValue for u32 {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::UInt32;

    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::UInt32(v) => Some(v),
            _ => None,
        }
    }
}

impl NumericValue for i64 {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::Int64;

    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int64(v) => Some(v),
            _ => None,
        }
    }
}

impl NumericValue for f64 {
    const ATTRIBUTE_TYPE: AttributeType = AttributeType::Double;

    fn from_value(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

/// An unsigned 32-bit, signed 64-bit or floating point attribute, with its
/// range.
pub struct NumericAttribute<T> {
    attribute: Attribute,
    _value: PhantomData<T>,
}

impl<T: NumericValue> NumericAttribute<T> {
    fn new(attribute: &Attribute) -> Result<Self> {
        Ok(NumericAttribute {
            attribute: attribute.view(T::ATTRIBUTE_TYPE)?,
            _value: PhantomData,
        })
    }

    fn read(
        &self,
        f: impl FnOnce(&dyn Driver, SessionId, &str, AttributeType) -> Result<AttributeValue>,
    ) -> Result<T> {
        let value = self
            .attribute
            .call(|driver, id, name| f(driver, id, name, T::ATTRIBUTE_TYPE))?;
        let actual = value.attribute_type();
        T::from_value(value).ok_or_else(|| self.attribute.mismatch(actual))
    }

    pub fn value(&self) -> Result<T> {
        self.read(|driver, id, name, t| driver.get_attribute(id, name, t))
    }

    pub fn set_value(&self, value: T) -> Result<()> {
        self.attribute.set_value(value)
    }

    pub fn minimum(&self) -> Result<T> {
        self.read(|driver, id, name, t| driver.attribute_minimum(id, name, t))
    }

    pub fn maximum(&self) -> Result<T> {
        self.read(|driver, id, name, t| driver.attribute_maximum(id, name, t))
    }

    /// Step between legal values.
    pub fn increment(&self) -> Result<T> {
        self.read(|driver, id, name, t| driver.attribute_increment(id, name, t))
    }
}

impl<T> Deref for NumericAttribute<T> {
    type Target = Attribute;

    fn deref(&self) -> &Attribute {
        &self.attribute
    }
}

/// A string attribute.
pub struct StringAttribute(Attribute);

impl StringAttribute {
    pub fn value(&self) -> Result<String> {
        match self.0.value()? {
            AttributeValue::String(v) => Ok(v),
            other => Err(self.0.mismatch(other.attribute_type())),
        }
    }

    pub fn set_value(&self, value: &str) -> Result<()> {
        self.0.set_value(value)
    }
}

impl Deref for StringAttribute {
    type Target = Attribute;

    fn deref(&self) -> &Attribute {
        &self.0
    }
}

/// An attribute taking one of a fixed set of named values.
pub struct EnumAttribute(Attribute);

impl EnumAttribute {
    /// Values the camera currently accepts. Queries the driver on every call.
    pub fn supported_values(&self) -> Result<Vec<EnumAttributeItem>> {
        self.0
            .call(|driver, id, name| driver.enumerate_attribute_values(id, name))
    }

    pub fn value(&self) -> Result<EnumAttributeItem> {
        match self.0.value()? {
            AttributeValue::Enum(v) => Ok(v),
            other => Err(self.0.mismatch(other.attribute_type())),
        }
    }

    pub fn set_value(&self, value: EnumAttributeItem) -> Result<()> {
        self.0.set_value(value)
    }

    /// Select the supported value called `name`.
    pub fn set_by_name(&self, name: &str) -> Result<()> {
        let item = self
            .supported_values()?
            .into_iter()
            .find(|item| item.name() == name)
            .ok_or_else(|| Error::InvalidArgument {
                name: "name",
                reason: format!("'{}' is not a value of {}", name, self.0.name),
            })?;
        self.set_value(item)
    }
}

impl Deref for EnumAttribute {
    type Target = Attribute;

    fn deref(&self) -> &Attribute {
        &self.0
    }
}

/// A boolean attribute.
pub struct BoolAttribute(Attribute);

impl BoolAttribute {
    pub fn value(&self) -> Result<bool> {
        match self.0.value()? {
            AttributeValue::Boolean(v) => Ok(v),
            other => Err(self.0.mismatch(other.attribute_type())),
        }
    }

    pub fn set_value(&self, value: bool) -> Result<()> {
        self.0.set_value(value)
    }
}

impl Deref for BoolAttribute {
    type Target = Attribute;

    fn deref(&self) -> &Attribute {
        &self.0
    }
}

/// An attribute that triggers an action when written.
pub struct CommandAttribute(Attribute);

impl CommandAttribute {
    pub fn execute(&self) -> Result<()> {
        self.0.set_value(true)
    }
}

impl Deref for CommandAttribute {
    type Target = Attribute;

    fn deref(&self) -> &Attribute {
        &self.0
    }
}
