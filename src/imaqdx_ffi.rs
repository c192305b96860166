//! Raw declarations for the NI-IMAQdx C API.
//!
//! The driver ships as a closed binary (`niimaqdx.dll`, `libniimaqdx.so`), so
//! the entry points are resolved at run time instead of being linked.

#![allow(non_snake_case)]
#![allow(dead_code)]

use std::ffi::{c_char, c_void, OsStr};

use libloading::Library;

use crate::error::{Error, Result};

pub type IMAQdxSession = u32;
pub type IMAQdxError = i32;
pub type bool32 = u32;

pub const IMAQDX_MAX_API_STRING_LENGTH: usize = 512;
/// Length used for free-form text (descriptions, tooltips, error messages).
pub const IMAQDX_MAX_TEXT_LENGTH: usize = 2048;

pub const IMAQdxErrorSuccess: IMAQdxError = 0;

#[cfg(windows)]
pub const IMAQDX_LIBRARY_NAME: &str = "niimaqdx.dll";
#[cfg(not(windows))]
pub const IMAQDX_LIBRARY_NAME: &str = "libniimaqdx.so";

#[repr(C)]
#[derive(Clone, Copy)]
pub struct IMAQdxCameraInformation {
    pub Type: u32,
    pub Version: u32,
    pub Flags: u32,
    pub SerialNumberHi: u32,
    pub SerialNumberLo: u32,
    pub BusType: u32,
    pub InterfaceName: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
    pub VendorName: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
    pub ModelName: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
    pub CameraFileName: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
    pub CameraAttributeURL: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct IMAQdxAttributeInformation {
    pub Type: i32,
    pub Readable: bool32,
    pub Writable: bool32,
    pub Name: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct IMAQdxEnumItem {
    pub Value: u32,
    pub Reserved: u32,
    pub Name: [c_char; IMAQDX_MAX_API_STRING_LENGTH],
}

impl IMAQdxCameraInformation {
    pub fn zeroed() -> Self {
        IMAQdxCameraInformation {
            Type: 0,
            Version: 0,
            Flags: 0,
            SerialNumberHi: 0,
            SerialNumberLo: 0,
            BusType: 0,
            InterfaceName: [0; IMAQDX_MAX_API_STRING_LENGTH],
            VendorName: [0; IMAQDX_MAX_API_STRING_LENGTH],
            ModelName: [0; IMAQDX_MAX_API_STRING_LENGTH],
            CameraFileName: [0; IMAQDX_MAX_API_STRING_LENGTH],
            CameraAttributeURL: [0; IMAQDX_MAX_API_STRING_LENGTH],
        }
    }
}

impl IMAQdxAttributeInformation {
    pub fn zeroed() -> Self {
        IMAQdxAttributeInformation {
            Type: 0,
            Readable: 0,
            Writable: 0,
            Name: [0; IMAQDX_MAX_API_STRING_LENGTH],
        }
    }
}

impl IMAQdxEnumItem {
    pub fn zeroed() -> Self {
        IMAQdxEnumItem {
            Value: 0,
            Reserved: 0,
            Name: [0; IMAQDX_MAX_API_STRING_LENGTH],
        }
    }
}

/// Non-zero return keeps the callback registered.
pub type FrameDoneEventCallbackPtr = unsafe extern "system" fn(
    id: IMAQdxSession,
    bufferNumber: u32,
    callbackData: *mut c_void,
) -> u32;
pub type PnpEventCallbackPtr =
    unsafe extern "system" fn(id: IMAQdxSession, pnpEvent: u32, callbackData: *mut c_void) -> u32;

pub type IMAQdxOpenCamera = unsafe extern "system" fn(
    name: *const c_char,
    mode: u32,
    id: *mut IMAQdxSession,
) -> IMAQdxError;
pub type IMAQdxCloseCamera = unsafe extern "system" fn(id: IMAQdxSession) -> IMAQdxError;
pub type IMAQdxResetCamera =
    unsafe extern "system" fn(name: *const c_char, resetAll: bool32) -> IMAQdxError;
pub type IMAQdxResetEthernetCameraAddress = unsafe extern "system" fn(
    name: *const c_char,
    address: *const c_char,
    subnet: *const c_char,
    gateway: *const c_char,
    timeout: i32,
) -> IMAQdxError;
pub type IMAQdxEnumerateCameras = unsafe extern "system" fn(
    cameraInformationArray: *mut IMAQdxCameraInformation,
    count: *mut u32,
    connectedOnly: bool32,
) -> IMAQdxError;
pub type IMAQdxDiscoverEthernetCameras =
    unsafe extern "system" fn(address: *const c_char, timeout: i32) -> IMAQdxError;

pub type IMAQdxEnumerateAttributes2 = unsafe extern "system" fn(
    id: IMAQdxSession,
    attributeInformationArray: *mut IMAQdxAttributeInformation,
    count: *mut u32,
    root: *const c_char,
    visibility: u32,
) -> IMAQdxError;
pub type IMAQdxGetAttributeText = unsafe extern "system" fn(
    id: IMAQdxSession,
    name: *const c_char,
    text: *mut c_char,
    length: u32,
) -> IMAQdxError;
pub type IMAQdxGetAttributeVisibility = unsafe extern "system" fn(
    id: IMAQdxSession,
    name: *const c_char,
    visibility: *mut u32,
) -> IMAQdxError;
pub type IMAQdxIsAttributeFlag = unsafe extern "system" fn(
    id: IMAQdxSession,
    name: *const c_char,
    flag: *mut bool32,
) -> IMAQdxError;
pub type IMAQdxGetAttributeTyped = unsafe extern "system" fn(
    id: IMAQdxSession,
    name: *const c_char,
    valueType: i32,
    value: *mut c_void,
) -> IMAQdxError;
/// Variadic: the value is passed after the type, promoted per C rules.
pub type IMAQdxSetAttribute = unsafe extern "C" fn(
    id: IMAQdxSession,
    name: *const c_char,
    valueType: i32,
    ...
) -> IMAQdxError;
pub type IMAQdxEnumerateAttributeValues = unsafe extern "system" fn(
    id: IMAQdxSession,
    name: *const c_char,
    list: *mut IMAQdxEnumItem,
    size: *mut u32,
) -> IMAQdxError;
pub type IMAQdxAttributesFile =
    unsafe extern "system" fn(id: IMAQdxSession, filename: *const c_char) -> IMAQdxError;
pub type IMAQdxWriteAttributesToString = unsafe extern "system" fn(
    id: IMAQdxSession,
    attributesString: *mut *const c_char,
) -> IMAQdxError;
pub type IMAQdxReadAttributesFromString =
    unsafe extern "system" fn(id: IMAQdxSession, attributesString: *const c_char) -> IMAQdxError;
pub type IMAQdxGetFullyQualifiedAttributeName = unsafe extern "system" fn(
    id: IMAQdxSession,
    partialName: *const c_char,
    fullName: *mut *const c_char,
) -> IMAQdxError;
pub type IMAQdxDispose = unsafe extern "system" fn(buffer: *mut c_void) -> IMAQdxError;

pub type IMAQdxSessionCall = unsafe extern "system" fn(id: IMAQdxSession) -> IMAQdxError;
pub type IMAQdxConfigureAcquisition = unsafe extern "system" fn(
    id: IMAQdxSession,
    continuous: bool32,
    bufferCount: u32,
) -> IMAQdxError;
pub type IMAQdxGetImageData = unsafe extern "system" fn(
    id: IMAQdxSession,
    buffer: *mut c_void,
    bufferSize: u32,
    mode: u32,
    desiredBufferNumber: u32,
    actualBufferNumber: *mut u32,
) -> IMAQdxError;
pub type IMAQdxGetRawBufferSize =
    unsafe extern "system" fn(id: IMAQdxSession, bufferSize: *mut u32) -> IMAQdxError;

pub type IMAQdxWriteRegister =
    unsafe extern "system" fn(id: IMAQdxSession, offset: u32, value: u32) -> IMAQdxError;
pub type IMAQdxReadRegister =
    unsafe extern "system" fn(id: IMAQdxSession, offset: u32, value: *mut u32) -> IMAQdxError;
pub type IMAQdxMemory = unsafe extern "system" fn(
    id: IMAQdxSession,
    offset: u32,
    values: *mut c_char,
    count: u32,
) -> IMAQdxError;

pub type IMAQdxRegisterFrameDoneEvent = unsafe extern "system" fn(
    id: IMAQdxSession,
    bufferInterval: u32,
    callbackFunction: FrameDoneEventCallbackPtr,
    callbackData: *mut c_void,
) -> IMAQdxError;
pub type IMAQdxRegisterPnpEvent = unsafe extern "system" fn(
    id: IMAQdxSession,
    event: u32,
    callbackFunction: PnpEventCallbackPtr,
    callbackData: *mut c_void,
) -> IMAQdxError;

pub type IMAQdxGetErrorString = unsafe extern "system" fn(
    error: IMAQdxError,
    message: *mut c_char,
    messageLength: u32,
) -> IMAQdxError;

/// Entry points of a loaded driver library.
pub struct ImaqdxLibrary {
    _library: Library,
    pub open_camera: IMAQdxOpenCamera,
    pub close_camera: IMAQdxCloseCamera,
    pub reset_camera: IMAQdxResetCamera,
    pub reset_ethernet_camera_address: IMAQdxResetEthernetCameraAddress,
    pub enumerate_cameras: IMAQdxEnumerateCameras,
    pub discover_ethernet_cameras: IMAQdxDiscoverEthernetCameras,
    pub enumerate_attributes2: IMAQdxEnumerateAttributes2,
    pub get_attribute_description: IMAQdxGetAttributeText,
    pub get_attribute_display_name: IMAQdxGetAttributeText,
    pub get_attribute_tooltip: IMAQdxGetAttributeText,
    pub get_attribute_units: IMAQdxGetAttributeText,
    pub get_attribute_visibility: IMAQdxGetAttributeVisibility,
    pub is_attribute_readable: IMAQdxIsAttributeFlag,
    pub is_attribute_writable: IMAQdxIsAttributeFlag,
    pub get_attribute: IMAQdxGetAttributeTyped,
    pub set_attribute: IMAQdxSetAttribute,
    pub get_attribute_minimum: IMAQdxGetAttributeTyped,
    pub get_attribute_maximum: IMAQdxGetAttributeTyped,
    pub get_attribute_increment: IMAQdxGetAttributeTyped,
    pub enumerate_attribute_values: IMAQdxEnumerateAttributeValues,
    pub write_attributes: IMAQdxAttributesFile,
    pub read_attributes: IMAQdxAttributesFile,
    pub write_attributes_to_string: IMAQdxWriteAttributesToString,
    pub read_attributes_from_string: IMAQdxReadAttributesFromString,
    pub get_fully_qualified_attribute_name: IMAQdxGetFullyQualifiedAttributeName,
    pub dispose: IMAQdxDispose,
    pub configure_grab: IMAQdxSessionCall,
    pub configure_acquisition: IMAQdxConfigureAcquisition,
    pub start_acquisition: IMAQdxSessionCall,
    pub stop_acquisition: IMAQdxSessionCall,
    pub unconfigure_acquisition: IMAQdxSessionCall,
    pub get_image_data: IMAQdxGetImageData,
    pub get_raw_buffer_size: IMAQdxGetRawBufferSize,
    pub write_register: IMAQdxWriteRegister,
    pub read_register: IMAQdxReadRegister,
    pub write_memory: IMAQdxMemory,
    pub read_memory: IMAQdxMemory,
    pub register_frame_done_event: IMAQdxRegisterFrameDoneEvent,
    pub register_pnp_event: IMAQdxRegisterPnpEvent,
    pub get_error_string: IMAQdxGetErrorString,
}

// Function pointers into a library that stays loaded for the lifetime of the struct.
unsafe impl Send for ImaqdxLibrary {}
unsafe impl Sync for ImaqdxLibrary {}

macro_rules! symbol {
    ($library:expr, $t:ty, $name:literal) => {{
        let symbol: libloading::Symbol<$t> = $library
            .get(concat!($name, "\0").as_bytes())
            .map_err(|e| Error::LibraryLoad(format!("Symbol {}: {}", $name, e)))?;
        *symbol
    }};
}

impl ImaqdxLibrary {
    /// Load the driver from `path` (a file name or full path).
    pub fn load(path: &OsStr) -> Result<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| {
            Error::LibraryLoad(format!("{}: {}", path.to_string_lossy(), e))
        })?;

        unsafe {
            Ok(ImaqdxLibrary {
                open_camera: symbol!(library, IMAQdxOpenCamera, "IMAQdxOpenCamera"),
                close_camera: symbol!(library, IMAQdxCloseCamera, "IMAQdxCloseCamera"),
                reset_camera: symbol!(library, IMAQdxResetCamera, "IMAQdxResetCamera"),
                reset_ethernet_camera_address: symbol!(
                    library,
                    IMAQdxResetEthernetCameraAddress,
                    "IMAQdxResetEthernetCameraAddress"
                ),
                enumerate_cameras: symbol!(
                    library,
                    IMAQdxEnumerateCameras,
                    "IMAQdxEnumerateCameras"
                ),
                discover_ethernet_cameras: symbol!(
                    library,
                    IMAQdxDiscoverEthernetCameras,
                    "IMAQdxDiscoverEthernetCameras"
                ),
                enumerate_attributes2: symbol!(
                    library,
                    IMAQdxEnumerateAttributes2,
                    "IMAQdxEnumerateAttributes2"
                ),
                get_attribute_description: symbol!(
                    library,
                    IMAQdxGetAttributeText,
                    "IMAQdxGetAttributeDescription"
                ),
                get_attribute_display_name: symbol!(
                    library,
                    IMAQdxGetAttributeText,
                    "IMAQdxGetAttributeDisplayName"
                ),
                get_attribute_tooltip: symbol!(
                    library,
                    IMAQdxGetAttributeText,
                    "IMAQdxGetAttributeTooltip"
                ),
                get_attribute_units: symbol!(
                    library,
                    IMAQdxGetAttributeText,
                    "IMAQdxGetAttributeUnits"
                ),
                get_attribute_visibility: symbol!(
                    library,
                    IMAQdxGetAttributeVisibility,
                    "IMAQdxGetAttributeVisibility"
                ),
                is_attribute_readable: symbol!(
                    library,
                    IMAQdxIsAttributeFlag,
                    "IMAQdxIsAttributeReadable"
                ),
                is_attribute_writable: symbol!(
                    library,
                    IMAQdxIsAttributeFlag,
                    "IMAQdxIsAttributeWritable"
                ),
                get_attribute: symbol!(library, IMAQdxGetAttributeTyped, "IMAQdxGetAttribute"),
                set_attribute: symbol!(library, IMAQdxSetAttribute, "IMAQdxSetAttribute"),
                get_attribute_minimum: symbol!(
                    library,
                    IMAQdxGetAttributeTyped,
                    "IMAQdxGetAttributeMinimum"
                ),
                get_attribute_maximum: symbol!(
                    library,
                    IMAQdxGetAttributeTyped,
                    "IMAQdxGetAttributeMaximum"
                ),
                get_attribute_increment: symbol!(
                    library,
                    IMAQdxGetAttributeTyped,
                    "IMAQdxGetAttributeIncrement"
                ),
                enumerate_attribute_values: symbol!(
                    library,
                    IMAQdxEnumerateAttributeValues,
                    "IMAQdxEnumerateAttributeValues"
                ),
                write_attributes: symbol!(library, IMAQdxAttributesFile, "IMAQdxWriteAttributes"),
                read_attributes: symbol!(library, IMAQdxAttributesFile, "IMAQdxReadAttributes"),
                write_attributes_to_string: symbol!(
                    library,
                    IMAQdxWriteAttributesToString,
                    "IMAQdxWriteAttributesToString"
                ),
                read_attributes_from_string: symbol!(
                    library,
                    IMAQdxReadAttributesFromString,
                    "IMAQdxReadAttributesFromString"
                ),
                get_fully_qualified_attribute_name: symbol!(
                    library,
                    IMAQdxGetFullyQualifiedAttributeName,
                    "IMAQdxGetFullyQualifiedAttributeName"
                ),
                dispose: symbol!(library, IMAQdxDispose, "IMAQdxDispose"),
                configure_grab: symbol!(library, IMAQdxSessionCall, "IMAQdxConfigureGrab"),
                configure_acquisition: symbol!(
                    library,
                    IMAQdxConfigureAcquisition,
                    "IMAQdxConfigureAcquisition"
                ),
                start_acquisition: symbol!(library, IMAQdxSessionCall, "IMAQdxStartAcquisition"),
                stop_acquisition: symbol!(library, IMAQdxSessionCall, "IMAQdxStopAcquisition"),
                unconfigure_acquisition: symbol!(
                    library,
                    IMAQdxSessionCall,
                    "IMAQdxUnconfigureAcquisition"
                ),
                get_image_data: symbol!(library, IMAQdxGetImageData, "IMAQdxGetImageData"),
                get_raw_buffer_size: symbol!(
                    library,
                    IMAQdxGetRawBufferSize,
                    "IMAQdxGetRawBufferSize"
                ),
                write_register: symbol!(library, IMAQdxWriteRegister, "IMAQdxWriteRegister"),
                read_register: symbol!(library, IMAQdxReadRegister, "IMAQdxReadRegister"),
                write_memory: symbol!(library, IMAQdxMemory, "IMAQdxWriteMemory"),
                read_memory: symbol!(library, IMAQdxMemory, "IMAQdxReadMemory"),
                register_frame_done_event: symbol!(
                    library,
                    IMAQdxRegisterFrameDoneEvent,
                    "IMAQdxRegisterFrameDoneEvent"
                ),
                register_pnp_event: symbol!(
                    library,
                    IMAQdxRegisterPnpEvent,
                    "IMAQdxRegisterPnpEvent"
                ),
                get_error_string: symbol!(library, IMAQdxGetErrorString, "IMAQdxGetErrorString"),
                _library: library,
            })
        }
    }
}

/// Read a NUL-terminated string out of a fixed-size `char` array.
pub fn fixed_to_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
