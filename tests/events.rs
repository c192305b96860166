use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::channel,
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use cameraunit_imaqdx::{
    sim::SimulatedDriver, Callback, CameraControlMode, Error, PnpEvent, Session,
    SynchronizationContext,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn open(driver: &Arc<SimulatedDriver>) -> Session {
    Session::open_with(driver.clone(), "cam0", CameraControlMode::Controller).unwrap()
}

#[test]
fn test_image_acquired_inline() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let id = session.session_id().unwrap();
    let acquisition = session.acquisition().unwrap();
    assert!(acquisition.synchronize_callbacks().unwrap());
    acquisition.set_synchronize_callbacks(false).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_a = seen.clone();
    let a = acquisition
        .add_image_acquired_handler(move |e| seen_a.lock().unwrap().push(e.buffer_number))
        .unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let count_b = count.clone();
    let b = acquisition
        .add_image_acquired_handler(move |_| {
            count_b.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(driver.frame_done_registrations(id), 1);

    session.configure_grab().unwrap();
    driver.acquire_frames("cam0", 3).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(count.load(Ordering::SeqCst), 3);

    assert!(acquisition.remove_image_acquired_handler(a).unwrap());
    assert!(!acquisition.remove_image_acquired_handler(a).unwrap());
    assert!(acquisition.remove_image_acquired_handler(b).unwrap());
    // The driver callback drops itself on its next delivery.
    assert_eq!(driver.frame_done_registrations(id), 1);
    driver.acquire_frames("cam0", 1).unwrap();
    assert_eq!(driver.frame_done_registrations(id), 0);
    assert_eq!(count.load(Ordering::SeqCst), 3);

    let again = acquisition.add_image_acquired_handler(|_| {}).unwrap();
    assert_eq!(driver.frame_done_registrations(id), 1);
    assert!(acquisition.remove_image_acquired_handler(again).unwrap());
}

#[test]
fn test_image_acquired_synchronized() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    session
        .acquisition()
        .unwrap()
        .add_image_acquired_handler(move |e| {
            let name = thread::current().name().map(str::to_string);
            tx.lock().unwrap().send((e.buffer_number, name)).unwrap();
        })
        .unwrap();
    session.configure_grab().unwrap();
    let frame = session.grab(true).unwrap();
    let (number, name) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(number, frame.buffer_number());
    assert_eq!(name.as_deref(), Some("imaqdx-cam0"));
}

#[test]
fn test_plug_and_play_registration() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let id = session.session_id().unwrap();
    session.set_synchronize_callbacks(false).unwrap();

    let attached = Arc::new(AtomicUsize::new(0));
    let first = attached.clone();
    let a = session
        .add_camera_attached_handler(move |e| {
            assert_eq!(*e, PnpEvent::CameraAttached);
            first.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let second = attached.clone();
    let b = session
        .add_camera_attached_handler(move |_| {
            second.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(driver.pnp_registrations(id, PnpEvent::CameraAttached), 1);
    assert_eq!(driver.pnp_registrations(id, PnpEvent::CameraDetached), 0);

    driver.fire_pnp(PnpEvent::CameraAttached);
    driver.fire_pnp(PnpEvent::CameraDetached);
    assert_eq!(attached.load(Ordering::SeqCst), 2);

    // Removing and re-adding before the next event keeps one registration.
    assert!(session.remove_camera_attached_handler(a).unwrap());
    assert!(session.remove_camera_attached_handler(b).unwrap());
    let c = session.add_camera_attached_handler(|_| {}).unwrap();
    assert_eq!(driver.pnp_registrations(id, PnpEvent::CameraAttached), 1);

    assert!(session.remove_camera_attached_handler(c).unwrap());
    driver.fire_pnp(PnpEvent::CameraAttached);
    assert_eq!(driver.pnp_registrations(id, PnpEvent::CameraAttached), 0);
    assert_eq!(attached.load(Ordering::SeqCst), 2);
}

#[test]
fn test_detach_and_bus_reset() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    session.set_synchronize_callbacks(false).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let detached = events.clone();
    let reset = events.clone();
    let d = session
        .add_camera_detached_handler(move |e| detached.lock().unwrap().push(*e))
        .unwrap();
    session
        .add_bus_reset_completed_handler(move |e| reset.lock().unwrap().push(*e))
        .unwrap();
    driver.fire_pnp(PnpEvent::BusResetCompleted);
    driver.fire_pnp(PnpEvent::CameraDetached);
    assert_eq!(
        *events.lock().unwrap(),
        vec![PnpEvent::BusResetCompleted, PnpEvent::CameraDetached]
    );
    assert!(session.remove_camera_detached_handler(d).unwrap());
    assert!(!session.remove_bus_reset_completed_handler(d).unwrap());
}

#[test]
fn test_snap_async() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    session
        .add_snap_completed_handler(move |e| {
            let tag = e.user_state::<String>().cloned();
            let width = e.result.as_ref().map(|f| f.width()).ok();
            tx.lock().unwrap().send((tag, width)).unwrap();
        })
        .unwrap();
    session
        .snap_async(Some(Arc::new("first".to_string())))
        .unwrap();
    let (tag, width) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(tag.as_deref(), Some("first"));
    assert_eq!(width, Some(64));
}

#[test]
fn test_grab_and_sequence_async() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    session
        .add_sequence_completed_handler(move |e| {
            let numbers: Vec<u32> = e
                .result
                .as_ref()
                .map(|frames| frames.iter().map(|f| f.buffer_number()).collect())
                .unwrap_or_default();
            tx.lock().unwrap().send(numbers).unwrap();
        })
        .unwrap();
    assert!(matches!(
        session.sequence_async(0, None),
        Err(Error::InvalidArgument { name: "count", .. })
    ));
    session.sequence_async(2, None).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), vec![0, 1]);

    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    session
        .add_grab_completed_handler(move |e| {
            let state = e.user_state::<u32>().copied();
            let number = e.result.as_ref().map(|f| f.buffer_number()).ok();
            tx.lock().unwrap().send((state, number)).unwrap();
        })
        .unwrap();
    session.configure_grab().unwrap();
    session.grab_async(true, Some(Arc::new(7u32))).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (Some(7), Some(0)));
}

#[test]
fn test_async_failure_is_reported() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    session
        .add_grab_completed_handler(move |e| {
            tx.lock().unwrap().send(e.result.is_err()).unwrap();
        })
        .unwrap();
    // Not configured: the driver rejects the read.
    session.grab_async(true, None).unwrap();
    assert!(rx.recv_timeout(TIMEOUT).unwrap());
}

struct CountingContext {
    posted: AtomicUsize,
}

impl SynchronizationContext for CountingContext {
    fn post(&self, callback: Callback) {
        self.posted.fetch_add(1, Ordering::SeqCst);
        callback();
    }
}

#[test]
fn test_custom_synchronization_context() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let context = Arc::new(CountingContext {
        posted: AtomicUsize::new(0),
    });
    session.set_synchronization_context(context.clone()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let pnp_calls = calls.clone();
    session
        .add_camera_attached_handler(move |_| {
            pnp_calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let frame_calls = calls.clone();
    session
        .acquisition()
        .unwrap()
        .add_image_acquired_handler(move |_| {
            frame_calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    driver.fire_pnp(PnpEvent::CameraAttached);
    session.snap().unwrap();
    assert_eq!(context.posted.load(Ordering::SeqCst), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    session.set_synchronize_callbacks(false).unwrap();
    driver.fire_pnp(PnpEvent::CameraAttached);
    assert_eq!(context.posted.load(Ordering::SeqCst), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_no_events_after_close() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = open(&driver);
    let id = session.session_id().unwrap();
    session.set_synchronize_callbacks(false).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    session
        .add_camera_attached_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    session.close().unwrap();
    driver.fire_pnp(PnpEvent::CameraAttached);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(driver.pnp_registrations(id, PnpEvent::CameraAttached), 0);
}

#[test]
fn test_close_from_inline_handler() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = Arc::new(open(&driver));
    session.set_synchronize_callbacks(false).unwrap();
    // Acquisition events stay synchronized and queue behind the inline handler.
    session
        .acquisition()
        .unwrap()
        .add_image_acquired_handler(|_| {})
        .unwrap();

    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    let this = session.clone();
    let sim = driver.clone();
    session
        .add_snap_completed_handler(move |_| {
            this.configure_grab().unwrap();
            sim.acquire_frames("cam0", 1).unwrap();
            tx.lock().unwrap().send(this.close()).unwrap();
        })
        .unwrap();
    session.snap_async(None).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Ok(()));
    assert!(!session.is_open());
    assert_eq!(driver.open_sessions(), 0);
}

#[test]
fn test_close_from_synchronized_handler() {
    let driver = Arc::new(SimulatedDriver::new());
    let session = Arc::new(open(&driver));
    let (tx, rx) = channel();
    let tx = Mutex::new(tx);
    let this = session.clone();
    session
        .acquisition()
        .unwrap()
        .add_image_acquired_handler(move |_| {
            let name = thread::current().name().map(str::to_string);
            tx.lock().unwrap().send((name, this.close())).unwrap();
        })
        .unwrap();
    session.configure_grab().unwrap();
    driver.acquire_frames("cam0", 2).unwrap();

    let (name, result) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(name.as_deref(), Some("imaqdx-cam0"));
    assert_eq!(result, Ok(()));
    assert!(!session.is_open());
    // The second buffer finds the session closed.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}
