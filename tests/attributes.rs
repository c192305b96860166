use std::sync::Arc;

use cameraunit_imaqdx::{
    sim::SimulatedDriver, AttributeType, AttributeValue, AttributeVisibility, CameraControlMode,
    Error, ErrorCode, Session, StandardAttribute,
};

fn open() -> Session {
    Session::open_with(
        Arc::new(SimulatedDriver::new()),
        "cam0",
        CameraControlMode::Controller,
    )
    .unwrap()
}

#[test]
fn test_enumeration_and_lookup() {
    let session = open();
    let attributes = session.attributes().unwrap();
    assert_eq!(attributes.len(), 19);
    assert_eq!(attributes.to_string(), "AttributeCollection: Count=19");
    assert!(attributes.iter().all(|a| !a.name().contains("Private")));

    let width = attributes.by_name("Width").unwrap().unwrap();
    assert_eq!(width.name(), "AcquisitionAttributes::Width");
    assert_eq!(width.attribute_type(), AttributeType::UInt32);
    assert_eq!(
        width.to_string(),
        "Attribute: Name=AcquisitionAttributes::Width, Type=UInt32"
    );
    assert_eq!(attributes.index_of("Width").unwrap(), Some(7));
    assert_eq!(attributes.index_of_standard(StandardAttribute::Width).unwrap(), Some(7));
    assert_eq!(attributes.get(7).unwrap().name(), width.name());
    assert!(attributes.contains_standard(StandardAttribute::PixelFormat).unwrap());
    assert!(!attributes.contains_standard(StandardAttribute::PrimaryUrlString).unwrap());

    assert!(attributes.by_name("NoSuchAttribute").unwrap().is_none());
    assert!(matches!(
        attributes.by_name(""),
        Err(Error::InvalidArgument { name: "name", .. })
    ));
    assert_eq!(
        attributes.get(100).unwrap_err(),
        Error::IndexOutOfRange { index: 100, len: 19 }
    );
}

#[test]
fn test_metadata() {
    let session = open();
    let attributes = session.attributes().unwrap();
    let width = attributes.standard(StandardAttribute::Width).unwrap().unwrap();
    assert_eq!(width.display_name().unwrap(), "Width");
    assert_eq!(width.units().unwrap(), "Pixels");
    assert_eq!(width.visibility().unwrap(), AttributeVisibility::Simple);
    assert!(width.is_readable().unwrap());
    assert!(width.is_writable().unwrap());
    assert!(!width.description().unwrap().is_empty());
    assert!(!width.tooltip().unwrap().is_empty());

    let vendor = attributes.by_name("VendorName").unwrap().unwrap();
    assert!(!vendor.is_writable().unwrap());
    assert_eq!(
        vendor.set_value("other").unwrap_err().code(),
        Some(ErrorCode::AttributeNotSettable)
    );

    session.configure_grab().unwrap();
    assert!(!width.is_writable().unwrap());
}

#[test]
fn test_numeric_attributes() {
    let session = open();
    let attributes = session.attributes().unwrap();
    let width = attributes.by_name("Width").unwrap().unwrap().as_u32().unwrap();
    assert_eq!(width.value().unwrap(), 64);
    assert_eq!(width.minimum().unwrap(), 8);
    assert_eq!(width.maximum().unwrap(), 4096);
    assert_eq!(width.increment().unwrap(), 8);
    width.set_value(128).unwrap();
    assert_eq!(width.value().unwrap(), 128);
    assert_eq!(
        width.set_value(100).unwrap_err().code(),
        Some(ErrorCode::AttributeOutOfRange)
    );
    assert_eq!(session.snap().unwrap().width(), 128);

    let gain = attributes.by_name("Gain").unwrap().unwrap().as_i64().unwrap();
    gain.set_value(-3).unwrap();
    assert_eq!(gain.value().unwrap(), -3);

    let exposure = attributes.by_name("ExposureTime").unwrap().unwrap().as_f64().unwrap();
    exposure.set_value(2500.5).unwrap();
    assert_eq!(exposure.value().unwrap(), 2500.5);
    assert_eq!(exposure.name(), "CameraAttributes::AcquisitionControl::ExposureTime");
}

#[test]
fn test_type_mismatch() {
    let session = open();
    let width = session.attributes().unwrap().by_name("Width").unwrap().unwrap();
    match width.as_i64() {
        Err(Error::TypeMismatch { name, expected, actual }) => {
            assert_eq!(name, "AcquisitionAttributes::Width");
            assert_eq!(expected, "UInt32");
            assert_eq!(actual, "Int64");
        }
        other => panic!("unexpected {:?}", other.map(|a| a.name().to_string())),
    }
    assert!(width.as_string().is_err());
    assert!(width.as_bool().is_err());
    assert!(width.as_enum().is_err());
    assert!(width.as_command().is_err());
}

#[test]
fn test_enum_string_bool_attributes() {
    let session = open();
    let attributes = session.attributes().unwrap();

    let format = attributes
        .standard(StandardAttribute::PixelFormat)
        .unwrap()
        .unwrap()
        .as_enum()
        .unwrap();
    let names: Vec<String> = format
        .supported_values()
        .unwrap()
        .iter()
        .map(|item| item.name().to_string())
        .collect();
    assert_eq!(names, vec!["Mono8", "Mono16", "RGB8Packed", "BGRA8Packed"]);
    assert_eq!(format.value().unwrap().name(), "Mono8");
    format.set_by_name("Mono16").unwrap();
    assert_eq!(format.value().unwrap().name(), "Mono16");
    assert!(matches!(
        format.set_by_name("YUV422"),
        Err(Error::InvalidArgument { .. })
    ));
    let frame = session.snap().unwrap();
    assert_eq!(frame.pixel_format(), "Mono16");
    assert_eq!(frame.data().len(), 64 * 48 * 2);

    let user_id = attributes.by_name("DeviceUserID").unwrap().unwrap().as_string().unwrap();
    user_id.set_value("bench").unwrap();
    assert_eq!(user_id.value().unwrap(), "bench");

    let reverse = attributes.by_name("ReverseX").unwrap().unwrap().as_bool().unwrap();
    reverse.set_value(true).unwrap();
    assert!(reverse.value().unwrap());
}

#[test]
fn test_command_and_unknown_types() {
    let session = open();
    let attributes = session.attributes().unwrap();
    let gain = attributes.by_name("Gain").unwrap().unwrap();
    gain.set_value(5i64).unwrap();

    let load = attributes.by_name("UserSetLoad").unwrap().unwrap().as_command().unwrap();
    assert_eq!(load.value(), Err(Error::CommandNotReadable));
    load.execute().unwrap();
    assert_eq!(gain.value().unwrap(), AttributeValue::Int64(0));

    let blob = attributes.by_name("FileData").unwrap().unwrap();
    assert_eq!(blob.attribute_type(), AttributeType::Other(7));
    assert_eq!(blob.value(), Err(Error::UnknownDataType(7)));
}

#[test]
fn test_persistence() {
    let session = open();
    let attributes = session.attributes().unwrap();
    let gain = attributes.by_name("Gain").unwrap().unwrap().as_i64().unwrap();

    gain.set_value(7).unwrap();
    let saved = attributes.write_to_string().unwrap();
    assert!(saved.contains("CameraAttributes::AnalogControl::Gain = 7"));
    gain.set_value(0).unwrap();
    attributes.read_from_string(&saved).unwrap();
    assert_eq!(gain.value().unwrap(), 7);
    assert!(matches!(
        attributes.read_from_string(""),
        Err(Error::InvalidArgument { name: "attributes", .. })
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cam0.txt");
    gain.set_value(11).unwrap();
    attributes.write_to_file(&path).unwrap();
    gain.set_value(0).unwrap();
    attributes.read_from_file(&path).unwrap();
    assert_eq!(gain.value().unwrap(), 11);

    gain.set_value(12).unwrap();
    attributes.write_to_camera_file().unwrap();
    gain.set_value(0).unwrap();
    attributes.read_from_camera_file().unwrap();
    assert_eq!(gain.value().unwrap(), 12);
}

#[test]
fn test_private_attribute() {
    let session = open();
    let attributes = session.attributes().unwrap();
    let name = "CameraAttributes::Private::DebugLevel";
    assert!(attributes.by_name(name).unwrap().is_none());

    let debug = attributes.add_private_attribute(name).unwrap();
    assert_eq!(debug.name(), name);
    assert_eq!(attributes.len(), 20);
    assert_eq!(attributes.index_of(name).unwrap(), Some(19));
    attributes.add_private_attribute(name).unwrap();
    assert_eq!(attributes.len(), 20);

    debug.set_value(3u32).unwrap();
    assert_eq!(debug.value().unwrap(), AttributeValue::UInt32(3));

    assert_eq!(
        attributes.add_private_attribute("CameraAttributes::Private::Nothing").unwrap_err(),
        Error::NonexistentPrivateAttribute("CameraAttributes::Private::Nothing".to_string())
    );
}
