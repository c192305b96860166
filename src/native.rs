use std::{
    collections::HashMap,
    env,
    ffi::{c_char, c_void, CStr, CString, OsStr},
    panic::{self, AssertUnwindSafe},
    ptr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use log::{error, warn};
use parking_lot::Mutex;

use crate::camera_info::{CameraInformation, RawCameraInformation};
use crate::driver::{AttributeInfo, Driver, FrameDoneHandler, PnpHandler, SessionId};
use crate::error::{Error, ErrorCode, Result, UNKNOWN_DRIVER_MESSAGE};
use crate::imaqdx_ffi::*;
use crate::types::{
    AttributeType, AttributeValue, AttributeVisibility, BufferNumberMode, CameraControlMode,
    EnumAttributeItem, PnpEvent,
};

/// Environment variable overriding the driver library path.
pub const LIBRARY_ENV_VAR: &str = "IMAQDX_LIBRARY";

macro_rules! IMAQDXCALL {
    ($self:ident, $func:ident($($arg:expr),*)) => {
        {
            let res = unsafe { ($self.lib.$func)($($arg),*) };
            $self.check(stringify!($func), res)?;
        }
    };
}

/// [`Driver`] backed by the vendor's shared library.
pub struct NativeDriver {
    lib: ImaqdxLibrary,
    frame_done: Mutex<HashMap<SessionId, Vec<Box<Registration<FrameDoneHandler>>>>>,
    pnp: Mutex<HashMap<SessionId, Vec<Box<Registration<PnpHandler>>>>>,
}

/// Callback data handed to the driver.
///
/// `retired` is set once the trampoline has told the driver to drop the
/// callback. The box is freed on the session's next registration or on close.
struct Registration<H> {
    handler: H,
    retired: AtomicBool,
}

impl<H> Registration<H> {
    fn new(handler: H) -> Box<Self> {
        Box::new(Registration {
            handler,
            retired: AtomicBool::new(false),
        })
    }

    fn data(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Report `keep` to the driver. Nothing may touch `self` after a
    /// `false` has been recorded.
    fn answer(&self, keep: bool) -> u32 {
        if !keep {
            self.retired.store(true, Ordering::Release);
        }
        keep as u32
    }
}

/// Store `registration` for `id`, freeing the ones the driver has dropped.
fn keep_alive<H>(
    slots: &mut HashMap<SessionId, Vec<Box<Registration<H>>>>,
    id: SessionId,
    registration: Box<Registration<H>>,
) {
    let live = slots.entry(id).or_default();
    live.retain(|r| !r.is_retired());
    live.push(registration);
}

static NATIVE_DRIVER: OnceLock<Arc<NativeDriver>> = OnceLock::new();

/// The process-wide native driver, loaded on first use from
/// `$IMAQDX_LIBRARY` or the platform default library name.
pub fn native_driver() -> Result<Arc<dyn Driver>> {
    if let Some(driver) = NATIVE_DRIVER.get() {
        return Ok(driver.clone());
    }
    let path = env::var_os(LIBRARY_ENV_VAR).unwrap_or_else(|| IMAQDX_LIBRARY_NAME.into());
    let driver = Arc::new(NativeDriver::load(&path)?);
    // A concurrent loader may have won; both handles point at the same library.
    Ok(NATIVE_DRIVER.get_or_init(|| driver).clone())
}

fn c_string(name: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| Error::InvalidArgument {
        name,
        reason: "must not contain NUL bytes".to_string(),
    })
}

unsafe extern "system" fn frame_done_trampoline(
    _id: IMAQdxSession,
    buffer_number: u32,
    data: *mut c_void,
) -> u32 {
    if data.is_null() {
        return 0;
    }
    let registration = &*(data as *const Registration<FrameDoneHandler>);
    let handler = &registration.handler;
    let keep = panic::catch_unwind(AssertUnwindSafe(|| handler(buffer_number))).unwrap_or_else(|_| {
        error!("Frame done handler panicked, unregistering");
        false
    });
    registration.answer(keep)
}

unsafe extern "system" fn pnp_trampoline(_id: IMAQdxSession, event: u32, data: *mut c_void) -> u32 {
    if data.is_null() {
        return 0;
    }
    let Some(event) = PnpEvent::from_raw(event) else {
        warn!("Ignoring unknown plug-and-play event {}", event);
        return 1;
    };
    let registration = &*(data as *const Registration<PnpHandler>);
    let handler = &registration.handler;
    let keep = panic::catch_unwind(AssertUnwindSafe(|| handler(event))).unwrap_or_else(|_| {
        error!("Plug-and-play handler panicked, unregistering");
        false
    });
    registration.answer(keep)
}

impl NativeDriver {
    /// Load the driver library from `path`.
    pub fn load(path: &OsStr) -> Result<Self> {
        Ok(NativeDriver {
            lib: ImaqdxLibrary::load(path)?,
            frame_done: Mutex::new(HashMap::new()),
            pnp: Mutex::new(HashMap::new()),
        })
    }

    fn check(&self, func: &str, status: IMAQdxError) -> Result<()> {
        if status < 0 {
            let message = self
                .error_string(status)
                .unwrap_or_else(|| UNKNOWN_DRIVER_MESSAGE.to_string());
            return Err(Error::from_status(status, message));
        }
        if status > 0 {
            warn!(
                "{}() returned warning 0x{:08X}: {}",
                func,
                status,
                self.error_string(status)
                    .unwrap_or_else(|| UNKNOWN_DRIVER_MESSAGE.to_string())
            );
        }
        Ok(())
    }

    fn text(
        &self,
        call: IMAQdxGetAttributeText,
        func: &str,
        id: SessionId,
        name: &str,
    ) -> Result<String> {
        let name = c_string("name", name)?;
        let mut buf = vec![0 as c_char; IMAQDX_MAX_TEXT_LENGTH];
        let res = unsafe { call(id, name.as_ptr(), buf.as_mut_ptr(), buf.len() as u32) };
        self.check(func, res)?;
        Ok(fixed_to_string(&buf))
    }

    fn flag(
        &self,
        call: IMAQdxIsAttributeFlag,
        func: &str,
        id: SessionId,
        name: &str,
    ) -> Result<bool> {
        let name = c_string("name", name)?;
        let mut flag: bool32 = 0;
        let res = unsafe { call(id, name.as_ptr(), &mut flag) };
        self.check(func, res)?;
        Ok(flag != 0)
    }

    fn typed(
        &self,
        call: IMAQdxGetAttributeTyped,
        func: &str,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        let cname = c_string("name", name)?;
        let raw = value_type.raw();
        macro_rules! read {
            ($init:expr) => {{
                let mut value = $init;
                let data = &mut value as *mut _ as *mut c_void;
                let res = unsafe { call(id, cname.as_ptr(), raw, data) };
                self.check(func, res)?;
                value
            }};
        }
        let value = match value_type {
            AttributeType::UInt32 => AttributeValue::UInt32(read!(0u32)),
            AttributeType::Int64 => AttributeValue::Int64(read!(0i64)),
            AttributeType::Double => AttributeValue::Double(read!(0f64)),
            AttributeType::String => {
                let buf = read!([0 as c_char; IMAQDX_MAX_API_STRING_LENGTH]);
                AttributeValue::String(fixed_to_string(&buf))
            }
            AttributeType::Enum => {
                let item = read!(IMAQdxEnumItem::zeroed());
                AttributeValue::Enum(EnumAttributeItem::from_words(
                    fixed_to_string(&item.Name),
                    item.Value,
                    item.Reserved,
                ))
            }
            AttributeType::Boolean => AttributeValue::Boolean(read!(0 as bool32) != 0),
            AttributeType::Command => return Err(Error::CommandNotReadable),
            AttributeType::Other(raw) => return Err(Error::UnknownDataType(raw)),
        };
        Ok(value)
    }

    /// Copy a driver-allocated string and hand it back to the driver.
    unsafe fn take_driver_string(&self, ptr: *const c_char) -> String {
        if ptr.is_null() {
            return String::new();
        }
        let text = CStr::from_ptr(ptr).to_string_lossy().into_owned();
        let res = (self.lib.dispose)(ptr as *mut c_void);
        if res != IMAQdxErrorSuccess {
            warn!("IMAQdxDispose() returned 0x{:08X}", res);
        }
        text
    }
}

impl Driver for NativeDriver {
    fn open_camera(&self, name: &str, mode: CameraControlMode) -> Result<SessionId> {
        let name = c_string("name", name)?;
        let mut id: IMAQdxSession = 0;
        IMAQDXCALL!(self, open_camera(name.as_ptr(), mode.raw(), &mut id));
        Ok(id)
    }

    fn close_camera(&self, id: SessionId) -> Result<()> {
        let res = unsafe { (self.lib.close_camera)(id) };
        // The driver delivers no callbacks after close returns.
        self.frame_done.lock().remove(&id);
        self.pnp.lock().remove(&id);
        self.check("close_camera", res)
    }

    fn reset_camera(&self, name: &str, reset_all: bool) -> Result<()> {
        let name = c_string("name", name)?;
        IMAQDXCALL!(self, reset_camera(name.as_ptr(), reset_all as bool32));
        Ok(())
    }

    fn reset_ethernet_camera_address(
        &self,
        name: &str,
        address: &str,
        subnet: &str,
        gateway: &str,
        timeout_ms: i32,
    ) -> Result<()> {
        let name = c_string("name", name)?;
        let address = c_string("address", address)?;
        let subnet = c_string("subnet", subnet)?;
        let gateway = c_string("gateway", gateway)?;
        IMAQDXCALL!(
            self,
            reset_ethernet_camera_address(
                name.as_ptr(),
                address.as_ptr(),
                subnet.as_ptr(),
                gateway.as_ptr(),
                timeout_ms
            )
        );
        Ok(())
    }

    fn enumerate_cameras(&self, connected_only: bool) -> Result<Vec<CameraInformation>> {
        let mut count: u32 = 0;
        IMAQDXCALL!(
            self,
            enumerate_cameras(ptr::null_mut(), &mut count, connected_only as bool32)
        );
        let mut infos = vec![IMAQdxCameraInformation::zeroed(); count as usize];
        IMAQDXCALL!(
            self,
            enumerate_cameras(infos.as_mut_ptr(), &mut count, connected_only as bool32)
        );
        infos.truncate(count as usize);
        Ok(infos
            .iter()
            .map(|info| {
                CameraInformation::from(RawCameraInformation {
                    flags: info.Flags,
                    serial_number_hi: info.SerialNumberHi,
                    serial_number_lo: info.SerialNumberLo,
                    bus_type: info.BusType,
                    interface_name: fixed_to_string(&info.InterfaceName),
                    vendor_name: fixed_to_string(&info.VendorName),
                    model_name: fixed_to_string(&info.ModelName),
                    camera_file_name: fixed_to_string(&info.CameraFileName),
                    camera_attribute_url: fixed_to_string(&info.CameraAttributeURL),
                })
            })
            .collect())
    }

    fn discover_ethernet_cameras(&self, address: &str, timeout_ms: i32) -> Result<()> {
        let address = c_string("address", address)?;
        IMAQDXCALL!(self, discover_ethernet_cameras(address.as_ptr(), timeout_ms));
        Ok(())
    }

    fn enumerate_attributes(
        &self,
        id: SessionId,
        root: &str,
        visibility: AttributeVisibility,
    ) -> Result<Vec<AttributeInfo>> {
        let root = c_string("root", root)?;
        let mut count: u32 = 0;
        IMAQDXCALL!(
            self,
            enumerate_attributes2(id, ptr::null_mut(), &mut count, root.as_ptr(), visibility.raw())
        );
        let mut infos = vec![IMAQdxAttributeInformation::zeroed(); count as usize];
        IMAQDXCALL!(
            self,
            enumerate_attributes2(
                id,
                infos.as_mut_ptr(),
                &mut count,
                root.as_ptr(),
                visibility.raw()
            )
        );
        infos.truncate(count as usize);
        Ok(infos
            .iter()
            .map(|info| AttributeInfo {
                name: fixed_to_string(&info.Name),
                attribute_type: AttributeType::from(info.Type),
                readable: info.Readable != 0,
                writable: info.Writable != 0,
            })
            .collect())
    }

    fn attribute_description(&self, id: SessionId, name: &str) -> Result<String> {
        self.text(self.lib.get_attribute_description, "get_attribute_description", id, name)
    }

    fn attribute_display_name(&self, id: SessionId, name: &str) -> Result<String> {
        self.text(self.lib.get_attribute_display_name, "get_attribute_display_name", id, name)
    }

    fn attribute_tooltip(&self, id: SessionId, name: &str) -> Result<String> {
        self.text(self.lib.get_attribute_tooltip, "get_attribute_tooltip", id, name)
    }

    fn attribute_units(&self, id: SessionId, name: &str) -> Result<String> {
        self.text(self.lib.get_attribute_units, "get_attribute_units", id, name)
    }

    fn attribute_visibility(&self, id: SessionId, name: &str) -> Result<AttributeVisibility> {
        let name = c_string("name", name)?;
        let mut visibility: u32 = 0;
        IMAQDXCALL!(self, get_attribute_visibility(id, name.as_ptr(), &mut visibility));
        Ok(AttributeVisibility::from(visibility))
    }

    fn is_attribute_readable(&self, id: SessionId, name: &str) -> Result<bool> {
        self.flag(self.lib.is_attribute_readable, "is_attribute_readable", id, name)
    }

    fn is_attribute_writable(&self, id: SessionId, name: &str) -> Result<bool> {
        self.flag(self.lib.is_attribute_writable, "is_attribute_writable", id, name)
    }

    fn get_attribute(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.typed(self.lib.get_attribute, "get_attribute", id, name, value_type)
    }

    fn set_attribute(&self, id: SessionId, name: &str, value: &AttributeValue) -> Result<()> {
        let name = c_string("name", name)?;
        let ty = value.attribute_type().raw();
        let res = unsafe {
            match value {
                AttributeValue::UInt32(v) => (self.lib.set_attribute)(id, name.as_ptr(), ty, *v),
                AttributeValue::Int64(v) => (self.lib.set_attribute)(id, name.as_ptr(), ty, *v),
                AttributeValue::Double(v) => (self.lib.set_attribute)(id, name.as_ptr(), ty, *v),
                AttributeValue::String(v) => {
                    let v = c_string("value", v)?;
                    (self.lib.set_attribute)(id, name.as_ptr(), ty, v.as_ptr())
                }
                // Enum values go through the 64-bit integer path.
                AttributeValue::Enum(item) => (self.lib.set_attribute)(
                    id,
                    name.as_ptr(),
                    AttributeType::Int64.raw(),
                    item.value(),
                ),
                AttributeValue::Boolean(v) => {
                    (self.lib.set_attribute)(id, name.as_ptr(), ty, *v as bool32)
                }
            }
        };
        self.check("set_attribute", res)
    }

    fn attribute_minimum(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.typed(self.lib.get_attribute_minimum, "get_attribute_minimum", id, name, value_type)
    }

    fn attribute_maximum(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.typed(self.lib.get_attribute_maximum, "get_attribute_maximum", id, name, value_type)
    }

    fn attribute_increment(
        &self,
        id: SessionId,
        name: &str,
        value_type: AttributeType,
    ) -> Result<AttributeValue> {
        self.typed(
            self.lib.get_attribute_increment,
            "get_attribute_increment",
            id,
            name,
            value_type,
        )
    }

    fn enumerate_attribute_values(
        &self,
        id: SessionId,
        name: &str,
    ) -> Result<Vec<EnumAttributeItem>> {
        let name = c_string("name", name)?;
        let mut count: u32 = 0;
        IMAQDXCALL!(
            self,
            enumerate_attribute_values(id, name.as_ptr(), ptr::null_mut(), &mut count)
        );
        let mut items = vec![IMAQdxEnumItem::zeroed(); count as usize];
        IMAQDXCALL!(
            self,
            enumerate_attribute_values(id, name.as_ptr(), items.as_mut_ptr(), &mut count)
        );
        items.truncate(count as usize);
        Ok(items
            .iter()
            .map(|item| {
                let name = fixed_to_string(&item.Name);
                EnumAttributeItem::from_words(name, item.Value, item.Reserved)
            })
            .collect())
    }

    fn write_attributes(&self, id: SessionId, path: Option<&str>) -> Result<()> {
        let path = path.map(|p| c_string("path", p)).transpose()?;
        let ptr = path.as_ref().map_or(ptr::null(), |p| p.as_ptr());
        IMAQDXCALL!(self, write_attributes(id, ptr));
        Ok(())
    }

    fn read_attributes(&self, id: SessionId, path: Option<&str>) -> Result<()> {
        let path = path.map(|p| c_string("path", p)).transpose()?;
        let ptr = path.as_ref().map_or(ptr::null(), |p| p.as_ptr());
        IMAQDXCALL!(self, read_attributes(id, ptr));
        Ok(())
    }

    fn write_attributes_to_string(&self, id: SessionId) -> Result<String> {
        let mut text: *const c_char = ptr::null();
        IMAQDXCALL!(self, write_attributes_to_string(id, &mut text));
        Ok(unsafe { self.take_driver_string(text) })
    }

    fn read_attributes_from_string(&self, id: SessionId, attributes: &str) -> Result<()> {
        let attributes = c_string("attributes", attributes)?;
        IMAQDXCALL!(self, read_attributes_from_string(id, attributes.as_ptr()));
        Ok(())
    }

    fn fully_qualified_attribute_name(
        &self,
        id: SessionId,
        partial: &str,
    ) -> Result<Option<String>> {
        let partial = c_string("name", partial)?;
        let mut full: *const c_char = ptr::null();
        let res = unsafe {
            (self.lib.get_fully_qualified_attribute_name)(id, partial.as_ptr(), &mut full)
        };
        if ErrorCode::from(res) == ErrorCode::AttributeNotSupported {
            return Ok(None);
        }
        self.check("get_fully_qualified_attribute_name", res)?;
        Ok(Some(unsafe { self.take_driver_string(full) }))
    }

    fn configure_grab(&self, id: SessionId) -> Result<()> {
        IMAQDXCALL!(self, configure_grab(id));
        Ok(())
    }

    fn configure_acquisition(
        &self,
        id: SessionId,
        continuous: bool,
        buffer_count: u32,
    ) -> Result<()> {
        IMAQDXCALL!(self, configure_acquisition(id, continuous as bool32, buffer_count));
        Ok(())
    }

    fn start_acquisition(&self, id: SessionId) -> Result<()> {
        IMAQDXCALL!(self, start_acquisition(id));
        Ok(())
    }

    fn stop_acquisition(&self, id: SessionId) -> Result<()> {
        IMAQDXCALL!(self, stop_acquisition(id));
        Ok(())
    }

    fn unconfigure_acquisition(&self, id: SessionId) -> Result<()> {
        IMAQDXCALL!(self, unconfigure_acquisition(id));
        Ok(())
    }

    fn raw_buffer_size(&self, id: SessionId) -> Result<u32> {
        let mut size: u32 = 0;
        IMAQDXCALL!(self, get_raw_buffer_size(id, &mut size));
        Ok(size)
    }

    fn get_image_data(
        &self,
        id: SessionId,
        buffer: &mut [u8],
        mode: BufferNumberMode,
        desired_buffer_number: u32,
    ) -> Result<u32> {
        let mut actual: u32 = 0;
        IMAQDXCALL!(
            self,
            get_image_data(
                id,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len() as u32,
                mode.raw(),
                desired_buffer_number,
                &mut actual
            )
        );
        Ok(actual)
    }

    fn write_register(&self, id: SessionId, offset: u32, value: u32) -> Result<()> {
        IMAQDXCALL!(self, write_register(id, offset, value));
        Ok(())
    }

    fn read_register(&self, id: SessionId, offset: u32) -> Result<u32> {
        let mut value: u32 = 0;
        IMAQDXCALL!(self, read_register(id, offset, &mut value));
        Ok(value)
    }

    fn write_memory(&self, id: SessionId, offset: u32, values: &[u8]) -> Result<()> {
        // The driver only reads from the buffer on write.
        IMAQDXCALL!(
            self,
            write_memory(id, offset, values.as_ptr() as *mut c_char, values.len() as u32)
        );
        Ok(())
    }

    fn read_memory(&self, id: SessionId, offset: u32, values: &mut [u8]) -> Result<()> {
        IMAQDXCALL!(
            self,
            read_memory(id, offset, values.as_mut_ptr() as *mut c_char, values.len() as u32)
        );
        Ok(())
    }

    fn register_frame_done_event(
        &self,
        id: SessionId,
        buffer_interval: u32,
        handler: FrameDoneHandler,
    ) -> Result<()> {
        let registration = Registration::new(handler);
        let data = registration.data();
        let mut slots = self.frame_done.lock();
        IMAQDXCALL!(
            self,
            register_frame_done_event(id, buffer_interval, frame_done_trampoline, data)
        );
        keep_alive(&mut slots, id, registration);
        Ok(())
    }

    fn register_pnp_event(
        &self,
        id: SessionId,
        event: PnpEvent,
        handler: PnpHandler,
    ) -> Result<()> {
        let registration = Registration::new(handler);
        let data = registration.data();
        let mut slots = self.pnp.lock();
        IMAQDXCALL!(self, register_pnp_event(id, event.raw(), pnp_trampoline, data));
        keep_alive(&mut slots, id, registration);
        Ok(())
    }

    fn error_string(&self, status: i32) -> Option<String> {
        let mut buf = vec![0 as c_char; IMAQDX_MAX_TEXT_LENGTH];
        let res =
            unsafe { (self.lib.get_error_string)(status, buf.as_mut_ptr(), buf.len() as u32) };
        if res != IMAQdxErrorSuccess {
            return None;
        }
        let text = fixed_to_string(&buf);
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_library() {
        let res = NativeDriver::load(OsStr::new("libdoes-not-exist-imaqdx.so"));
        assert!(matches!(res, Err(Error::LibraryLoad(_))));
    }

    #[test]
    fn test_c_string_rejects_nul() {
        assert!(c_string("name", "cam0").is_ok());
        assert!(matches!(
            c_string("name", "cam\00"),
            Err(Error::InvalidArgument { name: "name", .. })
        ));
    }

    #[test]
    fn test_frame_done_trampoline() {
        let handler: FrameDoneHandler = Arc::new(|buffer: u32| buffer < 3);
        let registration = Registration::new(handler);
        let data = registration.data();
        unsafe {
            assert_eq!(frame_done_trampoline(1, 2, data), 1);
            assert!(!registration.is_retired());
            assert_eq!(frame_done_trampoline(1, 3, data), 0);
            assert!(registration.is_retired());
            assert_eq!(frame_done_trampoline(1, 0, ptr::null_mut()), 0);
        }
    }

    #[test]
    fn test_pnp_trampoline_panic_unregisters() {
        let handler: PnpHandler = Arc::new(|_: PnpEvent| -> bool { panic!("boom") });
        let registration = Registration::new(handler);
        let data = registration.data();
        unsafe {
            assert_eq!(pnp_trampoline(1, 99, data), 1);
            assert!(!registration.is_retired());
            assert_eq!(pnp_trampoline(1, PnpEvent::CameraDetached.raw(), data), 0);
            assert!(registration.is_retired());
        }
    }

    #[test]
    fn test_retired_registrations_are_freed() {
        let mut slots: HashMap<SessionId, Vec<Box<Registration<FrameDoneHandler>>>> =
            HashMap::new();
        for _ in 0..10 {
            let handler: FrameDoneHandler = Arc::new(|_: u32| false);
            let registration = Registration::new(handler);
            let data = registration.data();
            keep_alive(&mut slots, 1, registration);
            unsafe {
                assert_eq!(frame_done_trampoline(1, 0, data), 0);
            }
        }
        assert_eq!(slots[&1].len(), 1);

        let handler: FrameDoneHandler = Arc::new(|_: u32| true);
        keep_alive(&mut slots, 1, Registration::new(handler));
        keep_alive(&mut slots, 2, Registration::new(Arc::new(|_: u32| true) as FrameDoneHandler));
        assert_eq!(slots[&1].len(), 1);
        assert_eq!(slots[&2].len(), 1);
    }
}
