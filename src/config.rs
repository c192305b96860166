//! INI-file configuration for opening a session.
//!
//! ```ini
//! [camera]
//! name = cam0
//! mode = controller
//!
//! [acquisition]
//! buffers = 5
//! continuous = true
//! synchronize_callbacks = true
//!
//! [driver]
//! library = /usr/local/natinst/lib/libniimaqdx.so
//! ```
//!
//! Every key is optional.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use configparser::ini::Ini;
use log::info;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::native::{native_driver, NativeDriver};
use crate::session::Session;
use crate::types::{AcquisitionType, CameraControlMode};

pub const DEFAULT_CAMERA: &str = "cam0";
pub const DEFAULT_BUFFERS: u32 = 5;

/// Where the native driver library is loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// `None` uses `$IMAQDX_LIBRARY` or the platform default.
    pub library_path: Option<PathBuf>,
}

impl DriverConfig {
    pub fn load_driver(&self) -> Result<Arc<dyn Driver>> {
        match &self.library_path {
            Some(path) => {
                info!("Loading IMAQdx driver from {}", path.display());
                Ok(Arc::new(NativeDriver::load(path.as_os_str())?))
            }
            None => native_driver(),
        }
    }
}

/// Settings for opening and configuring one camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub camera: String,
    pub mode: CameraControlMode,
    pub buffers: u32,
    pub continuous: bool,
    pub synchronize_callbacks: bool,
    pub driver: DriverConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            camera: DEFAULT_CAMERA.to_string(),
            mode: CameraControlMode::Controller,
            buffers: DEFAULT_BUFFERS,
            continuous: true,
            synchronize_callbacks: true,
            driver: DriverConfig::default(),
        }
    }
}

fn config_error(section: &str, key: &str, err: String) -> Error {
    Error::Config(format!("[{}] {}: {}", section, key, err))
}

impl SessionConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let mut config = SessionConfig::default();
        if let Some(name) = ini.get("camera", "name") {
            if name.is_empty() {
                return Err(config_error("camera", "name", "must not be empty".to_string()));
            }
            config.camera = name;
        }
        if let Some(mode) = ini.get("camera", "mode") {
            config.mode = mode.parse()?;
        }
        if let Some(buffers) = ini
            .getuint("acquisition", "buffers")
            .map_err(|e| config_error("acquisition", "buffers", e))?
        {
            config.buffers = u32::try_from(buffers)
                .ok()
                .filter(|b| *b > 0)
                .ok_or_else(|| {
                    config_error("acquisition", "buffers", format!("{} is out of range", buffers))
                })?;
        }
        if let Some(continuous) = ini
            .getbool("acquisition", "continuous")
            .map_err(|e| config_error("acquisition", "continuous", e))?
        {
            config.continuous = continuous;
        }
        if let Some(synchronize) = ini
            .getbool("acquisition", "synchronize_callbacks")
            .map_err(|e| config_error("acquisition", "synchronize_callbacks", e))?
        {
            config.synchronize_callbacks = synchronize;
        }
        config.driver.library_path = ini
            .get("driver", "library")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        Ok(config)
    }

    /// Render the configuration in the format [`from_file`](Self::from_file)
    /// reads.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.set("camera", "name", Some(self.camera.clone()));
        let mode = match self.mode {
            CameraControlMode::Controller => "controller",
            CameraControlMode::Listener => "listener",
        };
        ini.set("camera", "mode", Some(mode.to_string()));
        ini.set("acquisition", "buffers", Some(self.buffers.to_string()));
        ini.set("acquisition", "continuous", Some(self.continuous.to_string()));
        ini.set(
            "acquisition",
            "synchronize_callbacks",
            Some(self.synchronize_callbacks.to_string()),
        );
        if let Some(path) = &self.driver.library_path {
            ini.set("driver", "library", Some(path.display().to_string()));
        }
        ini.writes()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_ini_string())
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn acquisition_type(&self) -> AcquisitionType {
        if self.continuous {
            AcquisitionType::Continuous
        } else {
            AcquisitionType::SingleShot
        }
    }

    /// Open the configured camera through the configured driver.
    pub fn open_session(&self) -> Result<Session> {
        self.open_session_with(self.driver.load_driver()?)
    }

    /// Open the configured camera through `driver`, applying the callback
    /// settings to the session and its acquisition.
    pub fn open_session_with(&self, driver: Arc<dyn Driver>) -> Result<Session> {
        let session = Session::open_with(driver, &self.camera, self.mode)?;
        session.set_synchronize_callbacks(self.synchronize_callbacks)?;
        session
            .acquisition()?
            .set_synchronize_callbacks(self.synchronize_callbacks)?;
        Ok(session)
    }

    /// Configure the session's acquisition with the configured buffer ring.
    pub fn configure_acquisition(&self, session: &Session) -> Result<()> {
        session
            .acquisition()?
            .configure(self.acquisition_type(), self.buffers)
    }
}

impl FromStr for SessionConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut ini = Ini::new();
        ini.read(s.to_string()).map_err(Error::Config)?;
        Self::from_ini(&ini)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_keys() {
        let config: SessionConfig = "[camera]\nname = cam1\n".parse().unwrap();
        assert_eq!(config.camera, "cam1");
        assert_eq!(config.buffers, DEFAULT_BUFFERS);
        assert!(config.continuous);
        assert!(config.synchronize_callbacks);
        assert_eq!(config.driver.library_path, None);
    }

    #[test]
    fn test_full_file() {
        let text = "[camera]
name = cam1
mode = listener

[acquisition]
buffers = 12
continuous = false
synchronize_callbacks = false

[driver]
library = /opt/ni/libniimaqdx.so
";
        let config: SessionConfig = text.parse().unwrap();
        assert_eq!(config.mode, CameraControlMode::Listener);
        assert_eq!(config.buffers, 12);
        assert_eq!(config.acquisition_type(), AcquisitionType::SingleShot);
        assert!(!config.synchronize_callbacks);
        assert_eq!(
            config.driver.library_path,
            Some(PathBuf::from("/opt/ni/libniimaqdx.so"))
        );
    }

    #[test]
    fn test_malformed_values() {
        assert!(matches!(
            "[acquisition]\nbuffers = many\n".parse::<SessionConfig>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "[acquisition]\nbuffers = 0\n".parse::<SessionConfig>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "[camera]\nmode = observer\n".parse::<SessionConfig>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_open_and_configure_session() {
        let text = "[camera]
name = cam1

[acquisition]
buffers = 2
continuous = false
synchronize_callbacks = false
";
        let config: SessionConfig = text.parse().unwrap();
        let driver = Arc::new(crate::sim::SimulatedDriver::new());
        let session = config.open_session_with(driver.clone()).unwrap();
        assert_eq!(session.camera_name(), "cam1");
        assert!(!session.synchronize_callbacks().unwrap());
        let acquisition = session.acquisition().unwrap();
        assert!(!acquisition.synchronize_callbacks().unwrap());

        config.configure_acquisition(&session).unwrap();
        acquisition.start().unwrap();
        assert_eq!(acquisition.next_frame().unwrap().buffer_number(), 0);
        assert_eq!(acquisition.next_frame().unwrap().buffer_number(), 1);
        // A single-shot ring of two buffers is exhausted.
        assert_eq!(
            acquisition.next_frame().unwrap_err().code(),
            Some(crate::ErrorCode::Timeout)
        );
        assert_eq!(
            acquisition.frame_at(2).unwrap_err().code(),
            Some(crate::ErrorCode::BufferNotAvailable)
        );
        acquisition.stop().unwrap();
        acquisition.unconfigure().unwrap();
        session.close().unwrap();
        assert_eq!(driver.open_sessions(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imaqdx.ini");
        let config = SessionConfig {
            camera: "cam1".to_string(),
            buffers: 3,
            continuous: false,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SessionConfig::from_file(&path).unwrap(), config);
    }
}
