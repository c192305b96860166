use std::sync::Arc;

use cameraunit::{CameraInfo, Error};
use log::warn;

use crate::driver::Driver;
use crate::error::ErrorCode;
use crate::session::Session;
use crate::standard_attribute::StandardAttribute;
use crate::system::System;
use crate::types::{AttributeValue, CameraControlMode};

/// [`CameraInfo`] view of an open IMAQdx session.
pub struct CameraInfoIMAQdx {
    session: Arc<Session>,
    /// Sensor width in pixels.
    width: u32,
    /// Sensor height in pixels.
    height: u32,
    /// Camera name.
    name: String,
    /// Serial number, as hex.
    serial: String,
}

/// Get a list of connected camera names.
pub fn get_camera_ids() -> Result<Vec<String>, Error> {
    camera_ids(&System::native()?)
}

fn camera_ids(system: &System) -> Result<Vec<String>, Error> {
    Ok(system
        .camera_information(true)?
        .iter()
        .map(|info| info.name().to_string())
        .collect())
}

/// Get the number of cameras connected to the system.
pub fn num_cameras() -> i32 {
    match get_camera_ids() {
        Ok(list) => list.len() as i32,
        Err(_) => 0,
    }
}

/// Open a camera by name.
pub fn open_camera(name: &str) -> Result<CameraInfoIMAQdx, Error> {
    let session = Session::open(name)?;
    CameraInfoIMAQdx::new(Arc::new(session))
}

/// Open a camera by name through `driver`.
pub fn open_camera_with(driver: Arc<dyn Driver>, name: &str) -> Result<CameraInfoIMAQdx, Error> {
    let session = Session::open_with(driver, name, CameraControlMode::Controller)?;
    CameraInfoIMAQdx::new(Arc::new(session))
}

/// Open the first connected camera.
pub fn open_first_camera() -> Result<CameraInfoIMAQdx, Error> {
    let camlist = get_camera_ids()?;
    if camlist.is_empty() {
        return Err(Error::NoCamerasAvailable);
    }
    open_camera(&camlist[0])
}

fn numeric(value: AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::UInt32(v) => Some(v as f64),
        AttributeValue::Int64(v) => Some(v as f64),
        AttributeValue::Double(v) => Some(v),
        _ => None,
    }
}

impl CameraInfoIMAQdx {
    pub fn new(session: Arc<Session>) -> Result<Self, Error> {
        let attributes = session.attributes()?;
        let dimension = |attribute: StandardAttribute| -> Result<u32, Error> {
            let attribute = attributes
                .standard(attribute)?
                .ok_or_else(|| {
                    Error::GeneralError(format!("Camera has no {} attribute", attribute))
                })?
                .as_u32()?;
            Ok(attribute.maximum().or_else(|_| attribute.value())?)
        };
        let width = dimension(StandardAttribute::Width)?;
        let height = dimension(StandardAttribute::Height)?;
        let word = |attribute: StandardAttribute| -> u32 {
            attributes
                .standard(attribute)
                .ok()
                .flatten()
                .and_then(|a| a.as_u32().ok())
                .and_then(|a| a.value().ok())
                .unwrap_or(0)
        };
        let serial = format!(
            "{:08X}{:08X}",
            word(StandardAttribute::SerialNumberHigh),
            word(StandardAttribute::SerialNumberLow)
        );
        Ok(CameraInfoIMAQdx {
            name: session.camera_name().to_string(),
            session,
            width,
            height,
            serial,
        })
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn read(&self, name: &str) -> Option<f64> {
        let attribute = self.session.attributes().ok()?.by_name(name).ok()??;
        numeric(attribute.value().ok()?)
    }
}

impl CameraInfo for CameraInfoIMAQdx {
    fn camera_ready(&self) -> bool {
        self.session.is_open()
    }

    fn camera_name(&self) -> &str {
        &self.name
    }

    fn cancel_capture(&self) -> Result<(), Error> {
        let acquisition = self.session.acquisition()?;
        match acquisition.stop() {
            Err(e) if e.code() == Some(ErrorCode::CameraNotRunning) => {}
            res => res?,
        }
        match acquisition.unconfigure() {
            Err(e) if e.code() == Some(ErrorCode::CameraNotInitialized) => Ok(()),
            res => Ok(res?),
        }
    }

    fn is_capturing(&self) -> bool {
        let in_progress = self
            .session
            .attributes()
            .and_then(|a| a.standard(StandardAttribute::AcquisitionInProgress));
        match in_progress {
            Ok(Some(attribute)) => attribute
                .as_bool()
                .and_then(|a| a.value())
                .unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read acquisition status of {}: {}", self.name, e);
                false
            }
        }
    }

    fn get_ccd_width(&self) -> u32 {
        self.width
    }

    fn get_ccd_height(&self) -> u32 {
        self.height
    }

    fn get_uuid(&self) -> Option<&str> {
        Some(&self.serial)
    }

    fn get_temperature(&self) -> Option<f32> {
        self.read("DeviceTemperature").map(|x| x as f32)
    }

    fn set_temperature(&self, _temp: f32) -> Result<f32, Error> {
        Err(Error::GeneralError(format!(
            "{} does not support temperature control",
            self.name
        )))
    }

    fn get_cooler_power(&self) -> Option<f32> {
        None
    }

    fn get_pixel_size(&self) -> Option<f32> {
        self.read("SensorPixelWidth").map(|x| x as f32)
    }
}
