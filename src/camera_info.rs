use std::fmt::{self, Display};

use crate::types::BusType;

/// Interface flag set on cameras that are currently connected.
pub(crate) const INTERFACE_FLAG_CONNECTED: u32 = 0x1;

/// Description of a camera known to the driver, as returned by
/// [`System::camera_information`](crate::System::camera_information).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInformation {
    serial_number: i64,
    bus_type: BusType,
    name: String,
    vendor: String,
    model: String,
    camera_file: String,
    camera_attribute_url: String,
    is_connected: bool,
}

/// Raw fields of one enumeration record, before conversion.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawCameraInformation {
    pub flags: u32,
    pub serial_number_hi: u32,
    pub serial_number_lo: u32,
    pub bus_type: u32,
    pub interface_name: String,
    pub vendor_name: String,
    pub model_name: String,
    pub camera_file_name: String,
    pub camera_attribute_url: String,
}

impl From<RawCameraInformation> for CameraInformation {
    fn from(raw: RawCameraInformation) -> Self {
        CameraInformation {
            serial_number: ((raw.serial_number_hi as i64) << 32) | raw.serial_number_lo as i64,
            bus_type: BusType::from(raw.bus_type),
            name: raw.interface_name,
            vendor: raw.vendor_name,
            model: raw.model_name,
            camera_file: raw.camera_file_name,
            camera_attribute_url: raw.camera_attribute_url,
            is_connected: raw.flags & INTERFACE_FLAG_CONNECTED != 0,
        }
    }
}

impl CameraInformation {
    /// 64-bit serial number.
    pub fn serial_number(&self) -> i64 {
        self.serial_number
    }

    pub fn bus_type(&self) -> BusType {
        self.bus_type
    }

    /// Interface name, used to open a [`Session`](crate::Session).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn camera_file(&self) -> &str {
        &self.camera_file
    }

    pub fn camera_attribute_url(&self) -> &str {
        &self.camera_attribute_url
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }
}

impl Display for CameraInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CameraInformation: Name={}, Type={:?}",
            self.name, self.bus_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        let info = CameraInformation::from(RawCameraInformation {
            flags: INTERFACE_FLAG_CONNECTED,
            serial_number_hi: 0x0000_0012,
            serial_number_lo: 0x3456_789A,
            bus_type: BusType::Ethernet.raw(),
            interface_name: "cam0".to_string(),
            vendor_name: "Basler".to_string(),
            model_name: "acA640".to_string(),
            ..Default::default()
        });
        assert_eq!(info.serial_number(), 0x12_3456_789A);
        assert_eq!(info.bus_type(), BusType::Ethernet);
        assert!(info.is_connected());
        assert_eq!(info.to_string(), "CameraInformation: Name=cam0, Type=Ethernet");
    }

    #[test]
    fn test_disconnected_flag() {
        let info = CameraInformation::from(RawCameraInformation {
            flags: 0x2,
            ..Default::default()
        });
        assert!(!info.is_connected());
    }
}
