use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{Arc, Weak},
};

use log::debug;
use parking_lot::RwLock;

use crate::attribute::Attribute;
use crate::driver::{Driver, SessionId};
use crate::error::{Error, Result};
use crate::session::SessionInner;
use crate::standard_attribute::StandardAttribute;
use crate::types::{AttributeVisibility, PRIVATE_VISIBILITY};

#[derive(Default)]
struct Entries {
    attributes: Vec<Attribute>,
    index: HashMap<String, usize>,
}

impl Entries {
    fn push(&mut self, attribute: Attribute) {
        self.index.insert(attribute.name().to_string(), self.attributes.len());
        self.attributes.push(attribute);
    }
}

/// The attributes of a session, in driver enumeration order.
///
/// Names are resolved through the driver, so a lookup may use a partial
/// name such as `Width` for `AcquisitionAttributes::Width`.
pub struct AttributeCollection {
    session: Weak<SessionInner>,
    entries: RwLock<Entries>,
}

impl AttributeCollection {
    /// Enumerate every attribute up to advanced visibility.
    pub(crate) fn load(session: &Arc<SessionInner>) -> Result<Self> {
        let id = session.id()?;
        let infos = session
            .driver()
            .enumerate_attributes(id, "", AttributeVisibility::Advanced)?;
        debug!("Enumerated {} attributes on session {}", infos.len(), id);
        let weak = Arc::downgrade(session);
        let mut entries = Entries::default();
        for info in &infos {
            entries.push(Attribute::new(weak.clone(), info));
        }
        Ok(AttributeCollection {
            session: weak,
            entries: RwLock::new(entries),
        })
    }

    fn call<T>(&self, f: impl FnOnce(&dyn Driver, SessionId) -> Result<T>) -> Result<T> {
        let inner = self.session.upgrade().ok_or(Error::SessionClosed)?;
        let id = inner.id()?;
        f(inner.driver(), id)
    }

    fn resolve(&self, name: &str) -> Result<Option<String>> {
        self.call(|driver, id| {
            if name.is_empty() {
                return Err(Error::empty("name"));
            }
            driver.fully_qualified_attribute_name(id, name)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The attribute at `index`.
    pub fn get(&self, index: usize) -> Result<Attribute> {
        let entries = self.entries.read();
        entries
            .attributes
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfRange {
                index,
                len: entries.attributes.len(),
            })
    }

    /// Look up an attribute by full or partial name. `None` when the camera
    /// does not have it.
    pub fn by_name(&self, name: &str) -> Result<Option<Attribute>> {
        Ok(self.index_of(name)?.and_then(|index| self.get(index).ok()))
    }

    pub fn standard(&self, attribute: StandardAttribute) -> Result<Option<Attribute>> {
        self.by_name(attribute.full_name())
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.index_of(name)?.is_some())
    }

    pub fn contains_standard(&self, attribute: StandardAttribute) -> Result<bool> {
        self.contains(attribute.full_name())
    }

    /// Position of an attribute by full or partial name.
    pub fn index_of(&self, name: &str) -> Result<Option<usize>> {
        let Some(full_name) = self.resolve(name)? else {
            return Ok(None);
        };
        Ok(self.entries.read().index.get(&full_name).copied())
    }

    pub fn index_of_standard(&self, attribute: StandardAttribute) -> Result<Option<usize>> {
        self.index_of(attribute.full_name())
    }

    /// A snapshot of the attributes.
    pub fn iter(&self) -> std::vec::IntoIter<Attribute> {
        self.entries.read().attributes.clone().into_iter()
    }

    /// Save the current values to the camera file the driver keeps for this
    /// camera.
    pub fn write_to_camera_file(&self) -> Result<()> {
        self.call(|driver, id| driver.write_attributes(id, None))
    }

    /// Load values from the camera file. The collection itself is unchanged.
    pub fn read_from_camera_file(&self) -> Result<()> {
        self.call(|driver, id| driver.read_attributes(id, None))
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path_str(path.as_ref())?;
        self.call(|driver, id| driver.write_attributes(id, Some(&path)))
    }

    pub fn read_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path_str(path.as_ref())?;
        self.call(|driver, id| driver.read_attributes(id, Some(&path)))
    }

    pub fn write_to_string(&self) -> Result<String> {
        self.call(|driver, id| driver.write_attributes_to_string(id))
    }

    /// Load values from a string produced by
    /// [`write_to_string`](Self::write_to_string).
    pub fn read_from_string(&self, attributes: &str) -> Result<()> {
        self.call(|driver, id| {
            if attributes.is_empty() {
                return Err(Error::empty("attributes"));
            }
            driver.read_attributes_from_string(id, attributes)
        })
    }

    /// Add a hidden attribute by its exact name.
    pub fn add_private_attribute(&self, name: &str) -> Result<Attribute> {
        let infos = self.call(|driver, id| {
            if name.is_empty() {
                return Err(Error::empty("name"));
            }
            driver.enumerate_attributes(id, "", PRIVATE_VISIBILITY)
        })?;
        let info = infos
            .iter()
            .find(|info| info.name == name)
            .ok_or_else(|| Error::NonexistentPrivateAttribute(name.to_string()))?;
        let attribute = Attribute::new(self.session.clone(), info);
        let mut entries = self.entries.write();
        if let Some(&index) = entries.index.get(name) {
            return Ok(entries.attributes[index].clone());
        }
        entries.push(attribute.clone());
        Ok(attribute)
    }
}

fn path_str(path: &Path) -> Result<String> {
    let path = path.to_str().ok_or_else(|| Error::InvalidArgument {
        name: "path",
        reason: "must be valid UTF-8".to_string(),
    })?;
    if path.is_empty() {
        return Err(Error::empty("path"));
    }
    Ok(path.to_string())
}

impl fmt::Display for AttributeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeCollection: Count={}", self.len())
    }
}

impl fmt::Debug for AttributeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeCollection")
            .field("len", &self.len())
            .finish()
    }
}
