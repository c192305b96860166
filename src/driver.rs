//! The seam between the binding and the driver.
//!
//! [`Driver`] lists every driver entry point the binding uses, in safe Rust
//! terms. [`NativeDriver`](crate::NativeDriver) forwards to the vendor library;
//! [`SimulatedDriver`](crate::sim::SimulatedDriver) answers in-process.

use std::sync::Arc;

use crate::camera_info::CameraInformation;
use crate::error::Result;
use crate::types::{
    AttributeType, AttributeValue, AttributeVisibility, BufferNumberMode, CameraControlMode,
    EnumAttributeItem, PnpEvent,
};

/// Native session identifier.
pub type SessionId = u32;

/// Called by the driver when a buffer completes. Return `false` to stop
/// receiving notifications.
pub type FrameDoneHandler = Arc<dyn Fn(u32) -> bool + Send + Sync>;

/// Called by the driver on a plug-and-play event. Return `false` to stop
/// receiving notifications.
pub type PnpHandler = Arc<dyn Fn(PnpEvent) -> bool + Send + Sync>;

/// One entry of an attribute enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub attribute_type: AttributeType,
    pub readable: bool,
    pub writable: bool,
}

/// Driver entry points.
///
/// Implementations report failing native statuses as
/// [`Error::Driver`](crate::Error::Driver).
pub trait Driver: Send + Sync {
    fn open_camera(&self, name: &str, mode: CameraControlMode) -> Result<SessionId>;
    fn close_camera(&self, id: SessionId) -> Result<()>;
    /// Reset one camera by name, or every camera when `reset_all` is set.
    fn reset_camera(&self, name: &str, reset_all: bool) -> Result<()>;
    fn reset_ethernet_camera_address(
        &self,
        name: &str,
        address: &str,
        subnet: &str,
        gateway: &str,
        timeout_ms: i32,
    ) -> Result<()>;
    fn enumerate_cameras(&self, connected_only: bool) -> Result<Vec<CameraInformation>>;
    fn discover_ethernet_cameras(&self, address: &str, timeout_ms: i32) -> Result<()>;

    fn enumerate_attributes(
        &self,
        id: SessionId,
        root: &str,
        visibility: AttributeVisibility,
    ) -> Result<Vec<AttributeInfo>>;
    fn attribute_description(&self, id: SessionId, name: &str) -> Result<String>;
    fn attribute_display_name(&self, id: SessionId, name: &str) -> Result<String>;
    fn attribute_tooltip(&self, id: SessionId, name: &str) -> Result<String>;
    fn attribute_units(&self, id: SessionId, name: &str) -> Result<String>;
    fn attribute_visibility(&self, id: SessionId, name: &str) -> Result<AttributeVisibility>;
    fn is_attribute_readable(&self, id: SessionId, name: &str) -> Result<bool>;
    fn is_attribute_writable(&self, id: SessionId, name: &str) -> Result<bool>;
    /// Read an attribute, marshalled as `value_type`.
    fn get_attribute(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue>;
    fn set_attribute(&self, id: SessionId, name: &str, value: &AttributeValue) -> Result<()>;
    fn attribute_minimum(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue>;
    fn attribute_maximum(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue>;
    fn attribute_increment(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue>;
    fn enumerate_attribute_values(&self, id: SessionId, name: &str)
        -> Result<Vec<EnumAttributeItem>>;
    /// Save attribute values; `None` targets the camera file.
    fn write_attributes(&self, id: SessionId, path: Option<&str>) -> Result<()>;
    /// Load attribute values; `None` reads the camera file.
    fn read_attributes(&self, id: SessionId, path: Option<&str>) -> Result<()>;
    fn write_attributes_to_string(&self, id: SessionId) -> Result<String>;
    fn read_attributes_from_string(&self, id: SessionId, attributes: &str) -> Result<()>;
    /// Resolve a partial attribute name. `None` when the camera does not
    /// support the attribute.
    fn fully_qualified_attribute_name(&self, id: SessionId, partial: &str)
        -> Result<Option<String>>;

    fn configure_grab(&self, id: SessionId) -> Result<()>;
    fn configure_acquisition(&self, id: SessionId, continuous: bool, buffer_count: u32)
        -> Result<()>;
    fn start_acquisition(&self, id: SessionId) -> Result<()>;
    fn stop_acquisition(&self, id: SessionId) -> Result<()>;
    fn unconfigure_acquisition(&self, id: SessionId) -> Result<()>;
    fn raw_buffer_size(&self, id: SessionId) -> Result<u32>;
    /// Copy a buffer into `buffer`, returning the buffer number actually read.
    fn get_image_data(
        &self,
        id: SessionId,
        buffer: &mut [u8],
        mode: BufferNumberMode,
        desired_buffer_number: u32,
    ) -> Result<u32>;

    fn write_register(&self, id: SessionId, offset: u32, value: u32) -> Result<()>;
    fn read_register(&self, id: SessionId, offset: u32) -> Result<u32>;
    fn write_memory(&self, id: SessionId, offset: u32, values: &[u8]) -> Result<()>;
    fn read_memory(&self, id: SessionId, offset: u32, values: &mut [u8]) -> Result<()>;

    fn register_frame_done_event(
        &self,
        id: SessionId,
        buffer_interval: u32,
        handler: FrameDoneHandler,
    ) -> Result<()>;
    fn register_pnp_event(&self, id: SessionId, event: PnpEvent, handler: PnpHandler)
        -> Result<()>;

    /// The driver's text for `status`, or `None` when it has none.
    fn error_string(&self, status: i32) -> Option<String>;
}
