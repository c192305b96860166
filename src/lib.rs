//! Bindings to the NI-IMAQdx driver for GigE Vision, IEEE 1394 and USB3
//! Vision cameras.
//!
//! A [`Session`] is an open connection to one camera. It exposes the camera's
//! [`AttributeCollection`], low-level [`Acquisition`] control, high-level
//! snap, grab and sequence operations, and plug-and-play events. Driver-wide
//! operations live on [`System`].
//!
//! The driver is reached through the [`Driver`] trait. [`NativeDriver`] loads
//! the vendor library at run time; [`sim::SimulatedDriver`] stands in for it
//! when no hardware is present.
//!
//! ```no_run
//! use cameraunit_imaqdx::Session;
//!
//! let session = Session::open("cam0")?;
//! let width = session.attributes()?.by_name("Width")?;
//! let frame = session.snap()?;
//! println!("{} {:?}: {} bytes", session, width, frame.data().len());
//! # Ok::<(), cameraunit_imaqdx::Error>(())
//! ```
mod acquisition;
mod attribute;
mod attributes;
mod camera_info;
mod config;
mod driver;
mod error;
mod events;
mod frame;
mod imaqdx_ffi;
mod imaqdxcamera;
mod native;
mod session;
pub mod sim;
mod standard_attribute;
mod system;
mod types;

pub use acquisition::Acquisition;
pub use attribute::{
    Attribute, BoolAttribute, CommandAttribute, EnumAttribute, NumericAttribute, NumericValue,
    StringAttribute,
};
pub use attributes::AttributeCollection;
pub use camera_info::CameraInformation;
pub use config::{DriverConfig, SessionConfig, DEFAULT_BUFFERS, DEFAULT_CAMERA};
pub use driver::{AttributeInfo, Driver, FrameDoneHandler, PnpHandler, SessionId};
pub use error::{Error, ErrorCode, Result};
pub use events::{
    Callback, DispatchThread, GrabCompletedEvent, HandlerId, ImageAcquiredEvent,
    SequenceCompletedEvent, SnapCompletedEvent, SynchronizationContext, UserState,
};
pub use frame::Frame;
pub use native::{native_driver, NativeDriver, LIBRARY_ENV_VAR};
pub use session::Session;
pub use standard_attribute::StandardAttribute;
pub use system::System;
pub use types::{
    AcquisitionType, AttributeType, AttributeValue, AttributeVisibility, BufferNumberMode,
    BusType, CameraControlMode, EnumAttributeItem, PnpEvent,
};

/// Re-export of [`cameraunit`] crate.
pub use cameraunit;
pub use cameraunit::CameraInfo;

pub use imaqdxcamera::{
    get_camera_ids, num_cameras, open_camera, open_camera_with, open_first_camera,
    CameraInfoIMAQdx,
};
