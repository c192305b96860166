use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::channel,
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use cameraunit_imaqdx::{
    sim::SimulatedDriver, AcquisitionType, CameraControlMode, Error, ErrorCode, Session,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn open(driver: &Arc<SimulatedDriver>, name: &str) -> Result<Session, Error> {
    Session::open_with(driver.clone(), name, CameraControlMode::Controller)
}

#[test]
fn test_open_errors() {
    let driver = Arc::new(SimulatedDriver::new());
    let err = open(&driver, "cam9").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CameraNotFound));
    let err = open(&driver, "cam2").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CameraRemoved));

    let _controller = open(&driver, "cam0").unwrap();
    let err = open(&driver, "cam0").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CameraInUse));
    let listener = Session::open_with(driver.clone(), "cam0", CameraControlMode::Listener).unwrap();
    assert!(listener.is_open());
    assert_eq!(driver.open_sessions(), 2);
}

#[test]
fn test_snap() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    let frame = session.snap().unwrap();
    assert_eq!(frame.width(), 64);
    assert_eq!(frame.height(), 48);
    assert_eq!(frame.pixel_format(), "Mono8");
    assert_eq!(frame.buffer_number(), 0);
    assert_eq!(frame.data().len(), 64 * 48);
    assert!(frame.data().iter().enumerate().all(|(i, b)| *b == i as u8));

    let image = frame.to_image().unwrap();
    assert_eq!(image.width(), 64);
    assert_eq!(image.height(), 48);

    // The one-shot acquisition has been torn down.
    session
        .acquisition()
        .unwrap()
        .configure(AcquisitionType::SingleShot, 1)
        .unwrap();
}

#[test]
fn test_snap_tears_down_after_start_failure() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    driver.fail_next("start_acquisition", ErrorCode::Timeout);
    assert_eq!(session.snap().unwrap_err().code(), Some(ErrorCode::Timeout));
    assert!(session.snap().is_ok());
}

#[test]
fn test_snap_while_grabbing() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    session.configure_grab().unwrap();
    assert_eq!(
        session.snap().unwrap_err().code(),
        Some(ErrorCode::ResourcesAllocated)
    );
}

#[test]
fn test_sequence() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    let frames = session.sequence(3).unwrap();
    let numbers: Vec<u32> = frames.iter().map(|f| f.buffer_number()).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
    assert_eq!(frames[2].data()[0], 2);
}

#[test]
fn test_grab() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    session.configure_grab().unwrap();
    assert_eq!(session.grab(true).unwrap().buffer_number(), 0);
    assert_eq!(session.grab(true).unwrap().buffer_number(), 1);
    assert_eq!(session.grab(false).unwrap().buffer_number(), 1);
}

#[test]
fn test_low_level_acquisition() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    let acquisition = session.acquisition().unwrap();
    assert!(matches!(
        acquisition.configure(AcquisitionType::Continuous, 0),
        Err(Error::InvalidArgument { name: "buffer_count", .. })
    ));

    acquisition.configure(AcquisitionType::Continuous, 3).unwrap();
    acquisition.start().unwrap();
    let mut data = Vec::new();
    assert_eq!(acquisition.next_image_data(&mut data).unwrap(), 0);
    assert_eq!(data.len(), 64 * 48);
    // Only the low 28 bits of the requested number are used.
    assert_eq!(acquisition.image_data_at(&mut data, 0xF000_0001).unwrap(), 1);
    assert_eq!(data[0], 1);
    assert_eq!(acquisition.last_frame().unwrap().buffer_number(), 1);
    assert_eq!(acquisition.next_frame().unwrap().buffer_number(), 2);
    assert_eq!(acquisition.frame_at(3).unwrap().buffer_number(), 3);

    assert_eq!(
        acquisition.unconfigure().unwrap_err().code(),
        Some(ErrorCode::CameraRunning)
    );
    acquisition.stop().unwrap();
    assert_eq!(
        acquisition.stop().unwrap_err().code(),
        Some(ErrorCode::CameraNotRunning)
    );
    acquisition.unconfigure().unwrap();
}

#[test]
fn test_registers_and_memory() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    session.write_register(0x10, 0xABCD).unwrap();
    assert_eq!(session.read_register(0x10).unwrap(), 0xABCD);
    assert_eq!(session.read_register(0x14).unwrap(), 0);

    session.write_memory(4, &[1, 2, 3]).unwrap();
    assert_eq!(session.read_memory(4, 3).unwrap(), vec![1, 2, 3]);
    assert_eq!(
        session.read_memory(4095, 2).unwrap_err().code(),
        Some(ErrorCode::InvalidAddress)
    );
}

#[test]
fn test_closed_session_rejects_everything() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    let width = session.attributes().unwrap().by_name("Width").unwrap().unwrap();
    session.close().unwrap();

    assert!(!session.is_open());
    assert_eq!(session.session_id(), Err(Error::SessionClosed));
    assert!(matches!(session.acquisition(), Err(Error::SessionClosed)));
    assert!(matches!(session.attributes(), Err(Error::SessionClosed)));
    assert!(matches!(session.snap(), Err(Error::SessionClosed)));
    assert!(matches!(session.grab(true), Err(Error::SessionClosed)));
    assert!(matches!(session.sequence(2), Err(Error::SessionClosed)));
    assert_eq!(session.configure_grab(), Err(Error::SessionClosed));
    assert_eq!(session.snap_async(None), Err(Error::SessionClosed));
    assert_eq!(session.synchronize_callbacks(), Err(Error::SessionClosed));
    assert!(matches!(
        session.add_camera_attached_handler(|_| {}),
        Err(Error::SessionClosed)
    ));
    assert_eq!(width.value(), Err(Error::SessionClosed));
    assert_eq!(session.camera_name(), "cam0");
}

#[test]
fn test_close_failure_still_invalidates() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam0").unwrap();
    driver.fail_next("close_camera", ErrorCode::Internal);
    assert_eq!(session.close().unwrap_err().code(), Some(ErrorCode::Internal));
    assert!(!session.is_open());
    assert_eq!(session.close(), Err(Error::SessionClosed));
}

#[test]
fn test_close_without_waiting() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam1").unwrap();
    let (started_tx, started_rx) = channel();
    let (release_tx, release_rx) = channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    session
        .acquisition()
        .unwrap()
        .add_image_acquired_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            started_tx.lock().unwrap().send(()).unwrap();
            release_rx.lock().unwrap().recv_timeout(TIMEOUT).ok();
        })
        .unwrap();
    session.configure_grab().unwrap();
    driver.acquire_frames("cam1", 1).unwrap();
    started_rx.recv_timeout(TIMEOUT).unwrap();

    // The handler is still blocked on the dispatch thread.
    let start = Instant::now();
    session.close_with(false).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(!session.is_open());
    assert_eq!(driver.open_sessions(), 0);

    release_tx.send(()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_waits_for_running_handler() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver, "cam1").unwrap();
    let (started_tx, started_rx) = channel();
    let started_tx = Mutex::new(started_tx);
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    session
        .acquisition()
        .unwrap()
        .add_image_acquired_handler(move |_| {
            started_tx.lock().unwrap().send(()).unwrap();
            thread::sleep(Duration::from_millis(200));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
    session.configure_grab().unwrap();
    driver.acquire_frames("cam1", 1).unwrap();
    started_rx.recv_timeout(TIMEOUT).unwrap();

    session.close().unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(driver.open_sessions(), 0);
}
