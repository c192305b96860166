//! Runs against a real camera when `IMAQDX_CAMERA` names one.

use std::env;

use cameraunit_imaqdx::{open_camera, CameraInfo, Session, StandardAttribute};

fn camera() -> Option<String> {
    env::var("IMAQDX_CAMERA").ok().filter(|name| !name.is_empty())
}

#[test]
fn test_hardware_camera() {
    let Some(name) = camera() else {
        return;
    };
    let session = Session::open(&name).unwrap();
    let attributes = session.attributes().unwrap();
    assert!(!attributes.is_empty());
    assert!(attributes.contains_standard(StandardAttribute::Width).unwrap());
    let frame = session.snap().unwrap();
    assert!(!frame.data().is_empty());
    session.close().unwrap();

    let cam = open_camera(&name).unwrap();
    assert!(cam.camera_ready());
    assert_eq!(cam.camera_name(), name);
    assert!(cam.get_ccd_width() > 0);
    println!("{} {:?}", name, cam.get_uuid());
}
