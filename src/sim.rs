//! An in-process stand-in for the IMAQdx driver.
//!
//! [`SimulatedDriver`] implements [`Driver`] without any hardware: it keeps a
//! list of cameras, a per-session attribute table, an acquisition state
//! machine that produces deterministic test-pattern buffers, registers and
//! memory, and the callback registrations a real driver would hold. Helper
//! methods let callers simulate frames arriving and plug-and-play events, and
//! inject driver failures.

use std::{
    collections::HashMap,
    fs,
    sync::atomic::{AtomicU64, Ordering},
};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::camera_info::{CameraInformation, RawCameraInformation, INTERFACE_FLAG_CONNECTED};
use crate::driver::{AttributeInfo, Driver, FrameDoneHandler, PnpHandler, SessionId};
use crate::error::{Error, ErrorCode, Result};
use crate::types::{
    AttributeType, AttributeValue, AttributeVisibility, BufferNumberMode, BusType,
    CameraControlMode, EnumAttributeItem, PnpEvent, PRIVATE_VISIBILITY,
};

const MEMORY_SIZE: usize = 4096;
const GRAB_BUFFER_COUNT: u32 = 5;

/// Pixel formats offered by simulated cameras, with their bytes per pixel.
const PIXEL_FORMATS: [(&str, i64, usize); 4] = [
    ("Mono8", 0x0108_0001, 1),
    ("Mono16", 0x0110_0007, 2),
    ("RGB8Packed", 0x0218_0014, 3),
    ("BGRA8Packed", 0x0220_0017, 4),
];

fn driver_error(code: ErrorCode) -> Error {
    Error::from_status(code.status(), describe(code))
}

fn describe(code: ErrorCode) -> String {
    format!("Simulated driver reported {:?}.", code)
}

#[derive(Debug, Clone)]
struct SimAttribute {
    name: String,
    attribute_type: AttributeType,
    visibility: AttributeVisibility,
    writable: bool,
    locked_while_running: bool,
    value: Option<AttributeValue>,
    default: Option<AttributeValue>,
    range: Option<(AttributeValue, AttributeValue, AttributeValue)>,
    items: Vec<EnumAttributeItem>,
    units: &'static str,
}

impl SimAttribute {
    fn new(name: &str, value: AttributeValue, visibility: AttributeVisibility) -> Self {
        SimAttribute {
            name: name.to_string(),
            attribute_type: value.attribute_type(),
            visibility,
            writable: true,
            locked_while_running: false,
            value: Some(value.clone()),
            default: Some(value),
            range: None,
            items: Vec::new(),
            units: "",
        }
    }

    fn valueless(
        name: &str,
        attribute_type: AttributeType,
        visibility: AttributeVisibility,
    ) -> Self {
        SimAttribute {
            name: name.to_string(),
            attribute_type,
            visibility,
            writable: true,
            locked_while_running: false,
            value: None,
            default: None,
            range: None,
            items: Vec::new(),
            units: "",
        }
    }

    fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    fn locked(mut self) -> Self {
        self.locked_while_running = true;
        self
    }

    fn range(mut self, min: AttributeValue, max: AttributeValue, inc: AttributeValue) -> Self {
        self.range = Some((min, max, inc));
        self
    }

    fn units(mut self, units: &'static str) -> Self {
        self.units = units;
        self
    }

    fn items(mut self, items: Vec<EnumAttributeItem>) -> Self {
        self.items = items;
        self
    }

    fn readable(&self) -> bool {
        self.value.is_some()
    }

    fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    fn item_by_value(&self, value: i64) -> Result<EnumAttributeItem> {
        self.items
            .iter()
            .find(|item| item.value() == value)
            .cloned()
            .ok_or_else(|| driver_error(ErrorCode::AttributeOutOfRange))
    }

    fn item_by_name(&self, name: &str) -> Result<EnumAttributeItem> {
        self.items
            .iter()
            .find(|item| item.name() == name)
            .cloned()
            .ok_or_else(|| driver_error(ErrorCode::AttributeOutOfRange))
    }

    /// Convert an incoming value to this attribute's type and validate it.
    fn coerce(&self, value: &AttributeValue) -> Result<AttributeValue> {
        let coerced = match (self.attribute_type, value) {
            (AttributeType::Enum, AttributeValue::Enum(item)) => {
                AttributeValue::Enum(self.item_by_value(item.value())?)
            }
            (AttributeType::Enum, AttributeValue::Int64(v)) => {
                AttributeValue::Enum(self.item_by_value(*v)?)
            }
            (AttributeType::Enum, AttributeValue::UInt32(v)) => {
                AttributeValue::Enum(self.item_by_value(*v as i64)?)
            }
            (AttributeType::Enum, AttributeValue::String(name)) => {
                AttributeValue::Enum(self.item_by_name(name)?)
            }
            (AttributeType::UInt32 | AttributeType::Int64 | AttributeType::Double, v) => {
                let number = numeric(v).ok_or_else(|| driver_error(ErrorCode::InvalidParameter))?;
                from_number(self.attribute_type, number)?
            }
            (ty, v) if ty == v.attribute_type() => v.clone(),
            _ => return Err(driver_error(ErrorCode::InvalidParameter)),
        };

        if let (Some((min, max, inc)), Some(v)) = (&self.range, numeric(&coerced)) {
            let (min, max, inc) = (
                numeric(min).unwrap_or(v),
                numeric(max).unwrap_or(v),
                numeric(inc).unwrap_or(0.0),
            );
            if v < min || v > max {
                return Err(driver_error(ErrorCode::AttributeOutOfRange));
            }
            if self.attribute_type != AttributeType::Double && inc > 0.0 && (v - min) % inc != 0.0 {
                return Err(driver_error(ErrorCode::AttributeOutOfRange));
            }
        }
        Ok(coerced)
    }

    /// The current value marshalled as `value_type`.
    fn value_as(&self, value_type: AttributeType) -> Result<AttributeValue> {
        if value_type == AttributeType::Command {
            return Err(Error::CommandNotReadable);
        }
        let value = self
            .value
            .as_ref()
            .ok_or_else(|| driver_error(ErrorCode::AttributeNotReadable))?;
        marshal(value, value_type)
    }
}

fn numeric(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::UInt32(v) => Some(*v as f64),
        AttributeValue::Int64(v) => Some(*v as f64),
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Enum(item) => Some(item.value() as f64),
        _ => None,
    }
}

fn from_number(ty: AttributeType, number: f64) -> Result<AttributeValue> {
    match ty {
        AttributeType::UInt32 if number >= 0.0 && number <= u32::MAX as f64 => {
            Ok(AttributeValue::UInt32(number as u32))
        }
        AttributeType::Int64 => Ok(AttributeValue::Int64(number as i64)),
        AttributeType::Double => Ok(AttributeValue::Double(number)),
        AttributeType::UInt32 => Err(driver_error(ErrorCode::AttributeOutOfRange)),
        _ => Err(driver_error(ErrorCode::InvalidParameter)),
    }
}

fn marshal(value: &AttributeValue, value_type: AttributeType) -> Result<AttributeValue> {
    if value.attribute_type() == value_type {
        return Ok(value.clone());
    }
    match value_type {
        AttributeType::String => Ok(AttributeValue::String(value.to_string())),
        AttributeType::UInt32 | AttributeType::Int64 | AttributeType::Double => {
            let number = numeric(value).ok_or_else(|| driver_error(ErrorCode::InvalidParameter))?;
            from_number(value_type, number)
        }
        _ => Err(driver_error(ErrorCode::InvalidParameter)),
    }
}

fn default_attributes() -> Vec<SimAttribute> {
    use AttributeValue as V;
    use AttributeVisibility::*;

    let pixel_formats = PIXEL_FORMATS
        .iter()
        .map(|(name, value, _)| EnumAttributeItem::new(*name, *value))
        .collect::<Vec<_>>();
    let mono8 = pixel_formats[0].clone();

    vec![
        SimAttribute::new("CameraInformation::VendorName", V::from("cameraunit"), Simple)
            .read_only(),
        SimAttribute::new("CameraInformation::ModelName", V::from("Simulated Camera"), Simple)
            .read_only(),
        SimAttribute::new("CameraInformation::SerialNumberHigh", V::UInt32(0), Intermediate)
            .read_only(),
        SimAttribute::new(
            "CameraInformation::SerialNumberLow",
            V::UInt32(0x5349_4D00),
            Intermediate,
        )
        .read_only(),
        SimAttribute::new("StatusInformation::AcqInProgress", V::Boolean(false), Advanced)
            .read_only(),
        SimAttribute::new("StatusInformation::LastBufferNumber", V::UInt32(0), Advanced)
            .read_only(),
        SimAttribute::new("StatusInformation::LastBufferCount", V::UInt32(0), Advanced).read_only(),
        SimAttribute::new("AcquisitionAttributes::Width", V::UInt32(64), Simple)
            .range(V::UInt32(8), V::UInt32(4096), V::UInt32(8))
            .units("Pixels")
            .locked(),
        SimAttribute::new("AcquisitionAttributes::Height", V::UInt32(48), Simple)
            .range(V::UInt32(1), V::UInt32(4096), V::UInt32(1))
            .units("Pixels")
            .locked(),
        SimAttribute::new("AcquisitionAttributes::OffsetX", V::UInt32(0), Intermediate)
            .range(V::UInt32(0), V::UInt32(4088), V::UInt32(8))
            .units("Pixels")
            .locked(),
        SimAttribute::new("AcquisitionAttributes::OffsetY", V::UInt32(0), Intermediate)
            .range(V::UInt32(0), V::UInt32(4095), V::UInt32(1))
            .units("Pixels")
            .locked(),
        SimAttribute::new("AcquisitionAttributes::PixelFormat", V::Enum(mono8), Simple)
            .items(pixel_formats)
            .locked(),
        SimAttribute::new("AcquisitionAttributes::Timeout", V::UInt32(5000), Advanced)
            .range(V::UInt32(0), V::UInt32(u32::MAX), V::UInt32(1))
            .units("ms"),
        SimAttribute::new(
            "CameraAttributes::AcquisitionControl::ExposureTime",
            V::Double(10_000.0),
            Simple,
        )
        .range(V::Double(10.0), V::Double(1_000_000.0), V::Double(0.0))
        .units("us"),
        SimAttribute::new("CameraAttributes::AnalogControl::Gain", V::Int64(0), Simple)
            .range(V::Int64(-12), V::Int64(48), V::Int64(1))
            .units("dB"),
        SimAttribute::new(
            "CameraAttributes::DeviceControl::DeviceUserID",
            V::from(""),
            Intermediate,
        ),
        SimAttribute::new(
            "CameraAttributes::ImageFormatControl::ReverseX",
            V::Boolean(false),
            Intermediate,
        ),
        SimAttribute::valueless(
            "CameraAttributes::UserSetControl::UserSetLoad",
            AttributeType::Command,
            Simple,
        ),
        SimAttribute::valueless(
            "CameraAttributes::FileAccessControl::FileData",
            AttributeType::Other(7),
            Advanced,
        ),
        SimAttribute::new(
            "CameraAttributes::Private::DebugLevel",
            V::UInt32(0),
            PRIVATE_VISIBILITY,
        ),
    ]
}

#[derive(Debug, Clone)]
struct SimCamera {
    info: RawCameraInformation,
    /// Saved by `write_attributes(None)` and loaded by `read_attributes(None)`.
    camera_file: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct SimAcquisition {
    continuous: bool,
    buffer_count: u32,
    running: bool,
    acquired: u32,
}

struct SimSession {
    camera: String,
    mode: CameraControlMode,
    attributes: Vec<SimAttribute>,
    acquisition: Option<SimAcquisition>,
    registers: HashMap<u32, u32>,
    memory: Vec<u8>,
    frame_done: Vec<(u64, FrameDoneHandler)>,
    pnp: Vec<(u64, PnpEvent, PnpHandler)>,
}

impl SimSession {
    fn attribute(&self, name: &str) -> Result<&SimAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| driver_error(ErrorCode::AttributeNotSupported))
    }

    fn attribute_mut(&mut self, name: &str) -> Result<&mut SimAttribute> {
        self.attributes
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| driver_error(ErrorCode::AttributeNotSupported))
    }

    fn running(&self) -> bool {
        self.acquisition.map_or(false, |acq| acq.running)
    }

    fn u32_attribute(&self, name: &str) -> u32 {
        match self.attribute(name).ok().and_then(|a| a.value.as_ref()) {
            Some(AttributeValue::UInt32(v)) => *v,
            _ => 0,
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        let format = match self
            .attribute("AcquisitionAttributes::PixelFormat")
            .ok()
            .and_then(|a| a.value.as_ref())
        {
            Some(AttributeValue::Enum(item)) => item.value(),
            _ => PIXEL_FORMATS[0].1,
        };
        PIXEL_FORMATS
            .iter()
            .find(|(_, value, _)| *value == format)
            .map_or(1, |(_, _, bpp)| *bpp)
    }

    fn payload_size(&self) -> usize {
        self.u32_attribute("AcquisitionAttributes::Width") as usize
            * self.u32_attribute("AcquisitionAttributes::Height") as usize
            * self.bytes_per_pixel()
    }

    fn set_status(&mut self, name: &str, value: AttributeValue) {
        if let Ok(attribute) = self.attribute_mut(name) {
            attribute.value = Some(value);
        }
    }

    fn sync_status(&mut self) {
        let acq = self.acquisition;
        self.set_status(
            "StatusInformation::AcqInProgress",
            AttributeValue::Boolean(acq.map_or(false, |a| a.running)),
        );
        let acquired = acq.map_or(0, |a| a.acquired);
        self.set_status("StatusInformation::LastBufferCount", AttributeValue::UInt32(acquired));
        self.set_status(
            "StatusInformation::LastBufferNumber",
            AttributeValue::UInt32(acquired.saturating_sub(1)),
        );
    }

    /// Acquire one buffer, returning its cumulative number.
    fn produce(&mut self) -> Result<u32> {
        let acq = self
            .acquisition
            .as_mut()
            .filter(|acq| acq.running)
            .ok_or_else(|| driver_error(ErrorCode::CameraNotRunning))?;
        if !acq.continuous && acq.acquired >= acq.buffer_count {
            return Err(driver_error(ErrorCode::Timeout));
        }
        let number = acq.acquired;
        acq.acquired += 1;
        self.sync_status();
        Ok(number)
    }

    fn settings_string(&self) -> String {
        self.attributes
            .iter()
            .filter(|a| a.writable && a.visibility != PRIVATE_VISIBILITY)
            .filter_map(|a| a.value.as_ref().map(|v| format!("{} = {}\n", a.name, v)))
            .collect()
    }

    fn apply_settings(&mut self, settings: &str) -> Result<()> {
        let lines = settings
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));
        for line in lines {
            let Some((name, text)) = line.split_once('=') else {
                return Err(driver_error(ErrorCode::InvalidParameter));
            };
            let (name, text) = (name.trim(), text.trim());
            let Ok(attribute) = self.attribute(name) else {
                warn!("Skipping unknown attribute {} in settings", name);
                continue;
            };
            if !attribute.writable {
                continue;
            }
            let parsed = match attribute.attribute_type {
                AttributeType::UInt32 => text.parse().map(AttributeValue::UInt32).ok(),
                AttributeType::Int64 => text.parse().map(AttributeValue::Int64).ok(),
                AttributeType::Double => text.parse().map(AttributeValue::Double).ok(),
                AttributeType::Boolean => text.parse().map(AttributeValue::Boolean).ok(),
                AttributeType::String => Some(AttributeValue::from(text)),
                AttributeType::Enum => Some(AttributeValue::String(text.to_string())),
                _ => None,
            }
            .ok_or_else(|| driver_error(ErrorCode::InvalidParameter))?;
            let value = attribute.coerce(&parsed)?;
            self.attribute_mut(name)?.value = Some(value);
        }
        Ok(())
    }
}

#[derive(Default)]
struct SimState {
    cameras: Vec<SimCamera>,
    sessions: HashMap<SessionId, SimSession>,
    next_id: SessionId,
    failures: HashMap<&'static str, ErrorCode>,
    resets: Vec<String>,
    discoveries: Vec<String>,
    ethernet_addresses: HashMap<String, String>,
}

impl SimState {
    fn session(&self, id: SessionId) -> Result<&SimSession> {
        self.sessions
            .get(&id)
            .ok_or_else(|| driver_error(ErrorCode::InvalidInterface))
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut SimSession> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| driver_error(ErrorCode::InvalidInterface))
    }

    fn camera(&self, name: &str) -> Result<&SimCamera> {
        self.cameras
            .iter()
            .find(|c| c.info.interface_name == name)
            .ok_or_else(|| driver_error(ErrorCode::CameraNotFound))
    }

    fn camera_mut(&mut self, name: &str) -> Result<&mut SimCamera> {
        self.cameras
            .iter_mut()
            .find(|c| c.info.interface_name == name)
            .ok_or_else(|| driver_error(ErrorCode::CameraNotFound))
    }

    fn take_failure(&mut self, op: &'static str) -> Result<()> {
        match self.failures.remove(op) {
            Some(code) => Err(driver_error(code)),
            None => Ok(()),
        }
    }
}

/// A [`Driver`] that simulates cameras in-process.
///
/// A new driver knows three cameras: `cam0` (simulated bus, connected),
/// `cam1` (Ethernet, connected) and `cam2` (FireWire, disconnected).
pub struct SimulatedDriver {
    state: Mutex<SimState>,
    next_handler: AtomicU64,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    pub fn new() -> Self {
        let driver = SimulatedDriver {
            state: Mutex::new(SimState {
                next_id: 1,
                ..Default::default()
            }),
            next_handler: AtomicU64::new(1),
        };
        driver.add_camera("cam0", BusType::Simulated, true);
        driver.add_camera("cam1", BusType::Ethernet, true);
        driver.add_camera("cam2", BusType::FireWire, false);
        driver
    }

    /// Make a camera known to the driver.
    pub fn add_camera(&self, name: &str, bus_type: BusType, connected: bool) {
        let mut state = self.state.lock();
        let serial = state.cameras.len() as u32;
        state.cameras.push(SimCamera {
            info: RawCameraInformation {
                flags: if connected { INTERFACE_FLAG_CONNECTED } else { 0 },
                serial_number_hi: 0x0000_0501,
                serial_number_lo: 0x5349_4D00 | serial,
                bus_type: bus_type.raw(),
                interface_name: name.to_string(),
                vendor_name: "cameraunit".to_string(),
                model_name: "Simulated Camera".to_string(),
                camera_file_name: format!("{}.icd", name),
                camera_attribute_url: String::new(),
            },
            camera_file: None,
        });
    }

    /// Make the next call to the driver operation `op` (a [`Driver`] method
    /// name such as `"start_acquisition"`) fail with `code`.
    pub fn fail_next(&self, op: &'static str, code: ErrorCode) {
        self.state.lock().failures.insert(op, code);
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Active frame-done registrations on a session.
    pub fn frame_done_registrations(&self, id: SessionId) -> usize {
        self.state
            .lock()
            .sessions
            .get(&id)
            .map_or(0, |s| s.frame_done.len())
    }

    /// Active plug-and-play registrations for `event` on a session.
    pub fn pnp_registrations(&self, id: SessionId, event: PnpEvent) -> usize {
        self.state.lock().sessions.get(&id).map_or(0, |s| {
            s.pnp.iter().filter(|(_, e, _)| *e == event).count()
        })
    }

    /// Camera names passed to `reset_camera`, `"*"` for a full reset.
    pub fn resets(&self) -> Vec<String> {
        self.state.lock().resets.clone()
    }

    /// Subnets passed to `discover_ethernet_cameras`.
    pub fn discoveries(&self) -> Vec<String> {
        self.state.lock().discoveries.clone()
    }

    /// Address assigned to an Ethernet camera through
    /// `reset_ethernet_camera_address`.
    pub fn ethernet_address(&self, name: &str) -> Option<String> {
        self.state.lock().ethernet_addresses.get(name).cloned()
    }

    /// Simulate `count` buffers arriving on every running session of
    /// `camera`, notifying frame-done callbacks.
    pub fn acquire_frames(&self, camera: &str, count: u32) -> Result<()> {
        let mut delivered = Vec::new();
        {
            let mut state = self.state.lock();
            let running = state
                .sessions
                .iter_mut()
                .filter(|(_, s)| s.camera == camera && s.running());
            for (id, session) in running {
                for _ in 0..count {
                    delivered.push((*id, session.produce()?));
                }
            }
        }
        for (id, buffer) in delivered {
            self.notify_frame_done(id, buffer);
        }
        Ok(())
    }

    /// Deliver a plug-and-play event to every session registered for it.
    pub fn fire_pnp(&self, event: PnpEvent) {
        let targets: Vec<(SessionId, u64, PnpHandler)> = {
            let state = self.state.lock();
            state
                .sessions
                .iter()
                .flat_map(|(id, s)| {
                    s.pnp
                        .iter()
                        .filter(|(_, e, _)| *e == event)
                        .map(move |(key, _, handler)| (*id, *key, handler.clone()))
                })
                .collect()
        };
        for (id, key, handler) in targets {
            if !handler(event) {
                if let Some(session) = self.state.lock().sessions.get_mut(&id) {
                    session.pnp.retain(|(k, _, _)| *k != key);
                }
            }
        }
    }

    fn notify_frame_done(&self, id: SessionId, buffer: u32) {
        let handlers = match self.state.lock().sessions.get(&id) {
            Some(session) => session.frame_done.clone(),
            None => return,
        };
        for (key, handler) in handlers {
            if !handler(buffer) {
                if let Some(session) = self.state.lock().sessions.get_mut(&id) {
                    session.frame_done.retain(|(k, _)| *k != key);
                }
            }
        }
    }

    fn with_attribute<T>(
        &self,
        id: SessionId,
        name: &str,
        f: impl FnOnce(&SimAttribute) -> Result<T>,
    ) -> Result<T> {
        let state = self.state.lock();
        f(state.session(id)?.attribute(name)?)
    }
}

impl Driver for SimulatedDriver {
    fn open_camera(&self, name: &str, mode: CameraControlMode) -> Result<SessionId> {
        let mut state = self.state.lock();
        state.take_failure("open_camera")?;
        let camera = state.camera(name)?;
        if camera.info.flags & INTERFACE_FLAG_CONNECTED == 0 {
            return Err(driver_error(ErrorCode::CameraRemoved));
        }
        if mode == CameraControlMode::Controller
            && state
                .sessions
                .values()
                .any(|s| s.camera == name && s.mode == CameraControlMode::Controller)
        {
            return Err(driver_error(ErrorCode::CameraInUse));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.sessions.insert(
            id,
            SimSession {
                camera: name.to_string(),
                mode,
                attributes: default_attributes(),
                acquisition: None,
                registers: HashMap::new(),
                memory: vec![0; MEMORY_SIZE],
                frame_done: Vec::new(),
                pnp: Vec::new(),
            },
        );
        debug!("Simulated camera {} opened as session {}", name, id);
        Ok(id)
    }

    fn close_camera(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("close_camera")?;
        state
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| driver_error(ErrorCode::InvalidInterface))
    }

    fn reset_camera(&self, name: &str, reset_all: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("reset_camera")?;
        if !reset_all {
            state.camera(name)?;
        }
        for session in state.sessions.values_mut().filter(|s| reset_all || s.camera == name) {
            session.acquisition = None;
            session.sync_status();
        }
        state.resets.push(if reset_all { "*".to_string() } else { name.to_string() });
        Ok(())
    }

    fn reset_ethernet_camera_address(
        &self,
        name: &str,
        address: &str,
        _subnet: &str,
        _gateway: &str,
        _timeout_ms: i32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("reset_ethernet_camera_address")?;
        if BusType::from(state.camera(name)?.info.bus_type) != BusType::Ethernet {
            return Err(driver_error(ErrorCode::InvalidDeviceType));
        }
        state.ethernet_addresses.insert(name.to_string(), address.to_string());
        Ok(())
    }

    fn enumerate_cameras(&self, connected_only: bool) -> Result<Vec<CameraInformation>> {
        let mut state = self.state.lock();
        state.take_failure("enumerate_cameras")?;
        Ok(state
            .cameras
            .iter()
            .filter(|c| !connected_only || c.info.flags & INTERFACE_FLAG_CONNECTED != 0)
            .map(|c| CameraInformation::from(c.info.clone()))
            .collect())
    }

    fn discover_ethernet_cameras(&self, address: &str, _timeout_ms: i32) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("discover_ethernet_cameras")?;
        state.discoveries.push(address.to_string());
        Ok(())
    }

    fn enumerate_attributes(
        &self,
        id: SessionId,
        root: &str,
        visibility: AttributeVisibility,
    ) -> Result<Vec<AttributeInfo>> {
        let mut state = self.state.lock();
        state.take_failure("enumerate_attributes")?;
        let private = visibility == PRIVATE_VISIBILITY;
        Ok(state
            .session(id)?
            .attributes
            .iter()
            .filter(|a| a.name.starts_with(root))
            .filter(|a| {
                let is_private = a.visibility == PRIVATE_VISIBILITY;
                if private {
                    is_private
                } else {
                    !is_private && a.visibility.raw() <= visibility.raw()
                }
            })
            .map(|a| AttributeInfo {
                name: a.name.clone(),
                attribute_type: a.attribute_type,
                readable: a.readable(),
                writable: a.writable,
            })
            .collect())
    }

    fn attribute_description(&self, id: SessionId, name: &str) -> Result<String> {
        self.with_attribute(id, name, |a| Ok(format!("Simulated {} attribute.", a.short_name())))
    }

    fn attribute_display_name(&self, id: SessionId, name: &str) -> Result<String> {
        self.with_attribute(id, name, |a| Ok(a.short_name().to_string()))
    }

    fn attribute_tooltip(&self, id: SessionId, name: &str) -> Result<String> {
        self.with_attribute(id, name, |a| Ok(format!("{} ({})", a.short_name(), a.attribute_type)))
    }

    fn attribute_units(&self, id: SessionId, name: &str) -> Result<String> {
        self.with_attribute(id, name, |a| Ok(a.units.to_string()))
    }

    fn attribute_visibility(&self, id: SessionId, name: &str) -> Result<AttributeVisibility> {
        self.with_attribute(id, name, |a| Ok(a.visibility))
    }

    fn is_attribute_readable(&self, id: SessionId, name: &str) -> Result<bool> {
        self.with_attribute(id, name, |a| Ok(a.readable()))
    }

    fn is_attribute_writable(&self, id: SessionId, name: &str) -> Result<bool> {
        let state = self.state.lock();
        let session = state.session(id)?;
        let attribute = session.attribute(name)?;
        Ok(attribute.writable && !(attribute.locked_while_running && session.running()))
    }

    fn get_attribute(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        let mut state = self.state.lock();
        state.take_failure("get_attribute")?;
        state.session(id)?.attribute(name)?.value_as(value_type)
    }

    fn set_attribute(&self, id: SessionId, name: &str, value: &AttributeValue) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("set_attribute")?;
        let session = state.session_mut(id)?;
        let running = session.running();
        let attribute = session.attribute(name)?;
        if !attribute.writable || (attribute.locked_while_running && running) {
            return Err(driver_error(ErrorCode::AttributeNotSettable));
        }
        match attribute.attribute_type {
            AttributeType::Command => {
                if *value != AttributeValue::Boolean(true) {
                    return Err(driver_error(ErrorCode::InvalidParameter));
                }
                if attribute.short_name() == "UserSetLoad" {
                    for a in session.attributes.iter_mut().filter(|a| a.writable) {
                        a.value = a.default.clone();
                    }
                }
                Ok(())
            }
            AttributeType::Other(_) => Err(driver_error(ErrorCode::AttributeNotSupported)),
            _ => {
                let value = attribute.coerce(value)?;
                session.attribute_mut(name)?.value = Some(value);
                Ok(())
            }
        }
    }

    fn attribute_minimum(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.with_attribute(id, name, |a| match &a.range {
            Some((min, _, _)) => marshal(min, value_type),
            None => Err(driver_error(ErrorCode::InvalidParameter)),
        })
    }

    fn attribute_maximum(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.with_attribute(id, name, |a| match &a.range {
            Some((_, max, _)) => marshal(max, value_type),
            None => Err(driver_error(ErrorCode::InvalidParameter)),
        })
    }

    fn attribute_increment(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.with_attribute(id, name, |a| match &a.range {
            Some((_, _, inc)) => marshal(inc, value_type),
            None => Err(driver_error(ErrorCode::InvalidParameter)),
        })
    }

    fn enumerate_attribute_values(
        &self,
        id: SessionId,
        name: &str,
    ) -> Result<Vec<EnumAttributeItem>> {
        self.with_attribute(id, name, |a| match a.attribute_type {
            AttributeType::Enum => Ok(a.items.clone()),
            _ => Err(driver_error(ErrorCode::InvalidParameter)),
        })
    }

    fn write_attributes(&self, id: SessionId, path: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("write_attributes")?;
        let session = state.session(id)?;
        let settings = session.settings_string();
        match path {
            Some(path) => fs::write(path, settings).map_err(|e| {
                warn!("Failed to write {}: {}", path, e);
                driver_error(ErrorCode::InvalidParameter)
            }),
            None => {
                let camera = session.camera.clone();
                state.camera_mut(&camera)?.camera_file = Some(settings);
                Ok(())
            }
        }
    }

    fn read_attributes(&self, id: SessionId, path: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("read_attributes")?;
        let settings = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                warn!("Failed to read {}: {}", path, e);
                driver_error(ErrorCode::InvalidParameter)
            })?,
            None => {
                let camera = state.session(id)?.camera.clone();
                // A camera without a saved file keeps its current values.
                state.camera(&camera)?.camera_file.clone().unwrap_or_default()
            }
        };
        state.session_mut(id)?.apply_settings(&settings)
    }

    fn write_attributes_to_string(&self, id: SessionId) -> Result<String> {
        let mut state = self.state.lock();
        state.take_failure("write_attributes_to_string")?;
        Ok(state.session(id)?.settings_string())
    }

    fn read_attributes_from_string(&self, id: SessionId, attributes: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("read_attributes_from_string")?;
        state.session_mut(id)?.apply_settings(attributes)
    }

    fn fully_qualified_attribute_name(
        &self,
        id: SessionId,
        partial: &str,
    ) -> Result<Option<String>> {
        let mut state = self.state.lock();
        state.take_failure("fully_qualified_attribute_name")?;
        let session = state.session(id)?;
        let suffix = format!("::{}", partial);
        Ok(session
            .attributes
            .iter()
            .find(|a| a.name == partial)
            .or_else(|| session.attributes.iter().find(|a| a.name.ends_with(&suffix)))
            .map(|a| a.name.clone()))
    }

    fn configure_grab(&self, id: SessionId) -> Result<()> {
        self.configure_acquisition(id, true, GRAB_BUFFER_COUNT)?;
        self.start_acquisition(id)
    }

    fn configure_acquisition(
        &self,
        id: SessionId,
        continuous: bool,
        buffer_count: u32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("configure_acquisition")?;
        let session = state.session_mut(id)?;
        if session.acquisition.is_some() {
            return Err(driver_error(ErrorCode::ResourcesAllocated));
        }
        if buffer_count == 0 {
            return Err(driver_error(ErrorCode::InvalidParameter));
        }
        session.acquisition = Some(SimAcquisition {
            continuous,
            buffer_count,
            running: false,
            acquired: 0,
        });
        session.sync_status();
        Ok(())
    }

    fn start_acquisition(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("start_acquisition")?;
        let session = state.session_mut(id)?;
        match session.acquisition.as_mut() {
            None => Err(driver_error(ErrorCode::CameraNotInitialized)),
            Some(acq) if acq.running => Err(driver_error(ErrorCode::CameraRunning)),
            Some(acq) => {
                acq.running = true;
                acq.acquired = 0;
                session.sync_status();
                Ok(())
            }
        }
    }

    fn stop_acquisition(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("stop_acquisition")?;
        let session = state.session_mut(id)?;
        match session.acquisition.as_mut() {
            Some(acq) if acq.running => {
                acq.running = false;
                session.sync_status();
                Ok(())
            }
            _ => Err(driver_error(ErrorCode::CameraNotRunning)),
        }
    }

    fn unconfigure_acquisition(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("unconfigure_acquisition")?;
        let session = state.session_mut(id)?;
        if session.running() {
            return Err(driver_error(ErrorCode::CameraRunning));
        }
        session.acquisition = None;
        session.sync_status();
        Ok(())
    }

    fn raw_buffer_size(&self, id: SessionId) -> Result<u32> {
        let mut state = self.state.lock();
        state.take_failure("raw_buffer_size")?;
        Ok(state.session(id)?.payload_size() as u32)
    }

    fn get_image_data(
        &self,
        id: SessionId,
        buffer: &mut [u8],
        mode: BufferNumberMode,
        desired_buffer_number: u32,
    ) -> Result<u32> {
        let mut produced = Vec::new();
        let actual = {
            let mut state = self.state.lock();
            state.take_failure("get_image_data")?;
            let session = state.session_mut(id)?;
            let size = session.payload_size();
            if buffer.len() < size {
                return Err(driver_error(ErrorCode::InvalidParameter));
            }
            let acq = session
                .acquisition
                .ok_or_else(|| driver_error(ErrorCode::CameraNotInitialized))?;
            let actual = match mode {
                BufferNumberMode::Next => {
                    let n = session.produce()?;
                    produced.push(n);
                    n
                }
                BufferNumberMode::Last => {
                    if acq.acquired == 0 {
                        let n = session.produce()?;
                        produced.push(n);
                    }
                    session.acquisition.map_or(0, |a| a.acquired.saturating_sub(1))
                }
                BufferNumberMode::BufferNumber => {
                    if !acq.continuous && desired_buffer_number >= acq.buffer_count {
                        return Err(driver_error(ErrorCode::BufferNotAvailable));
                    }
                    let overwritten =
                        desired_buffer_number.saturating_add(acq.buffer_count) < acq.acquired;
                    if acq.continuous && overwritten {
                        return Err(driver_error(ErrorCode::BufferNotAvailable));
                    }
                    while session.acquisition.map_or(0, |a| a.acquired) <= desired_buffer_number {
                        produced.push(session.produce()?);
                    }
                    desired_buffer_number
                }
            };
            for (i, byte) in buffer[..size].iter_mut().enumerate() {
                *byte = (actual as usize).wrapping_add(i) as u8;
            }
            actual
        };
        for n in produced {
            self.notify_frame_done(id, n);
        }
        Ok(actual)
    }

    fn write_register(&self, id: SessionId, offset: u32, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("write_register")?;
        state.session_mut(id)?.registers.insert(offset, value);
        Ok(())
    }

    fn read_register(&self, id: SessionId, offset: u32) -> Result<u32> {
        let mut state = self.state.lock();
        state.take_failure("read_register")?;
        Ok(state.session(id)?.registers.get(&offset).copied().unwrap_or(0))
    }

    fn write_memory(&self, id: SessionId, offset: u32, values: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("write_memory")?;
        let memory = &mut state.session_mut(id)?.memory;
        let start = offset as usize;
        let end = start + values.len();
        if end > memory.len() {
            return Err(driver_error(ErrorCode::InvalidAddress));
        }
        memory[start..end].copy_from_slice(values);
        Ok(())
    }

    fn read_memory(&self, id: SessionId, offset: u32, values: &mut [u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.take_failure("read_memory")?;
        let memory = &state.session(id)?.memory;
        let start = offset as usize;
        let end = start + values.len();
        if end > memory.len() {
            return Err(driver_error(ErrorCode::InvalidAddress));
        }
        values.copy_from_slice(&memory[start..end]);
        Ok(())
    }

    fn register_frame_done_event(
        &self,
        id: SessionId,
        _buffer_interval: u32,
        handler: FrameDoneHandler,
    ) -> Result<()> {
        let key = self.next_handler.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.take_failure("register_frame_done_event")?;
        state.session_mut(id)?.frame_done.push((key, handler));
        Ok(())
    }

    fn register_pnp_event(
        &self,
        id: SessionId,
        event: PnpEvent,
        handler: PnpHandler,
    ) -> Result<()> {
        let key = self.next_handler.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.take_failure("register_pnp_event")?;
        state.session_mut(id)?.pnp.push((key, event, handler));
        Ok(())
    }

    fn error_string(&self, status: i32) -> Option<String> {
        (status != 0).then(|| describe(ErrorCode::from(status)))
    }
}
