use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use log::info;

use crate::camera_info::CameraInformation;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::native::native_driver;

/// Driver-wide operations that do not need an open session.
#[derive(Clone)]
pub struct System {
    driver: Arc<dyn Driver>,
}

impl System {
    /// System functions of the native driver.
    pub fn native() -> Result<Self> {
        Ok(System::new(native_driver()?))
    }

    pub fn new(driver: Arc<dyn Driver>) -> Self {
        System { driver }
    }

    /// Cameras known to the driver; with `connected_only`, only those
    /// currently attached.
    pub fn camera_information(&self, connected_only: bool) -> Result<Vec<CameraInformation>> {
        self.driver.enumerate_cameras(connected_only)
    }

    /// Reset a camera, stopping any acquisition running on it.
    pub fn reset_camera(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::empty("name"));
        }
        info!("Resetting camera {}", name);
        self.driver.reset_camera(name, false)
    }

    /// Reset every camera.
    pub fn reset_all(&self) -> Result<()> {
        info!("Resetting all cameras");
        self.driver.reset_camera("", true)
    }

    /// Look for GigE Vision cameras on the subnet of `address`.
    pub fn discover_ethernet_cameras(&self, address: Ipv4Addr, timeout: Duration) -> Result<()> {
        let timeout = timeout_ms(timeout)?;
        self.driver
            .discover_ethernet_cameras(&address.to_string(), timeout)
    }

    /// Assign a new IP configuration to a GigE Vision camera.
    pub fn reset_ethernet_camera_address(
        &self,
        name: &str,
        address: Ipv4Addr,
        subnet: Ipv4Addr,
        gateway: Ipv4Addr,
        timeout: Duration,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::empty("name"));
        }
        let timeout = timeout_ms(timeout)?;
        info!("Setting address of {} to {}/{} via {}", name, address, subnet, gateway);
        self.driver.reset_ethernet_camera_address(
            name,
            &address.to_string(),
            &subnet.to_string(),
            &gateway.to_string(),
            timeout,
        )
    }
}

fn timeout_ms(timeout: Duration) -> Result<i32> {
    i32::try_from(timeout.as_millis()).map_err(|_| Error::InvalidArgument {
        name: "timeout",
        reason: format!("{:?} does not fit in milliseconds", timeout),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedDriver;
    use crate::types::BusType;

    #[test]
    fn test_camera_information() {
        let system = System::new(Arc::new(SimulatedDriver::new()));
        let all = system.camera_information(false).unwrap();
        assert_eq!(all.len(), 3);
        let connected = system.camera_information(true).unwrap();
        assert_eq!(connected.len(), 2);
        assert!(connected.iter().all(|c| c.is_connected()));
        assert_eq!(all[1].bus_type(), BusType::Ethernet);
    }

    #[test]
    fn test_reset() {
        let driver = Arc::new(SimulatedDriver::new());
        let system = System::new(driver.clone());
        system.reset_camera("cam0").unwrap();
        system.reset_all().unwrap();
        assert_eq!(driver.resets(), vec!["cam0".to_string(), "*".to_string()]);
        assert!(matches!(system.reset_camera(""), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_ethernet() {
        let driver = Arc::new(SimulatedDriver::new());
        let system = System::new(driver.clone());
        system
            .discover_ethernet_cameras(Ipv4Addr::new(192, 168, 1, 0), Duration::from_secs(1))
            .unwrap();
        assert_eq!(driver.discoveries(), vec!["192.168.1.0".to_string()]);
        system
            .reset_ethernet_camera_address(
                "cam1",
                Ipv4Addr::new(192, 168, 1, 20),
                Ipv4Addr::new(255, 255, 255, 0),
                Ipv4Addr::new(192, 168, 1, 1),
                Duration::from_millis(500),
            )
            .unwrap();
        assert_eq!(driver.ethernet_address("cam1").as_deref(), Some("192.168.1.20"));
        assert!(system
            .discover_ethernet_cameras(Ipv4Addr::LOCALHOST, Duration::from_secs(u64::MAX))
            .is_err());
    }
}
