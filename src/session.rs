use std::{
    fmt,
    sync::{Arc, OnceLock},
    thread,
};

use log::{debug, info, warn};
use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::acquisition::Acquisition;
use crate::attributes::AttributeCollection;
use crate::driver::{Driver, PnpHandler, SessionId};
use crate::error::{Error, Result};
use crate::events::{
    CallbackManager, DispatchThread, DriverCallback, GrabCompletedEvent, HandlerId, HandlerList,
    SequenceCompletedEvent, SnapCompletedEvent, SynchronizationContext, UserState,
};
use crate::frame::Frame;
use crate::native::native_driver;
use crate::standard_attribute::StandardAttribute;
use crate::types::{AttributeType, AttributeValue, BufferNumberMode, CameraControlMode, PnpEvent};

/// Only the low 28 bits of a requested buffer number reach the driver.
pub(crate) const BUFFER_NUMBER_MASK: u32 = 0x0FFF_FFFF;

struct PnpSlot {
    handlers: Arc<HandlerList<PnpEvent>>,
    callback: DriverCallback,
}

impl PnpSlot {
    fn new() -> Self {
        PnpSlot {
            handlers: Arc::new(HandlerList::new()),
            callback: DriverCallback::default(),
        }
    }
}

/// State shared between a [`Session`], its attributes, its acquisition and
/// the threads delivering its events.
pub(crate) struct SessionInner {
    name: String,
    driver: Arc<dyn Driver>,
    handle: RwLock<Option<SessionId>>,
    callback_lock: ReentrantMutex<()>,
    callbacks: CallbackManager,
    dispatcher: Arc<DispatchThread>,
    attributes: OnceLock<AttributeCollection>,
    attributes_lock: Mutex<()>,
    pub(crate) acquisition: Acquisition,
    snap_completed: Arc<HandlerList<SnapCompletedEvent>>,
    grab_completed: Arc<HandlerList<GrabCompletedEvent>>,
    sequence_completed: Arc<HandlerList<SequenceCompletedEvent>>,
    pnp: [PnpSlot; 3],
}

impl SessionInner {
    pub fn id(&self) -> Result<SessionId> {
        self.handle.read_recursive().ok_or(Error::SessionClosed)
    }

    pub fn is_open(&self) -> bool {
        self.handle.read_recursive().is_some()
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    fn pnp_slot(&self, event: PnpEvent) -> &PnpSlot {
        &self.pnp[event.raw() as usize]
    }

    /// Deliver `args` to `handlers` through `callbacks`.
    ///
    /// Nothing is delivered once the session is closed, both when raising
    /// and again when a posted delivery finally runs.
    pub fn raise<A: Send + 'static>(
        self: &Arc<Self>,
        callbacks: &CallbackManager,
        handlers: &Arc<HandlerList<A>>,
        args: A,
    ) {
        let _guard = self.callback_lock.lock();
        if !self.is_open() || handlers.is_empty() {
            return;
        }
        let session = Arc::downgrade(self);
        let handlers = handlers.clone();
        callbacks.raise(Box::new(move || {
            let Some(inner) = session.upgrade() else {
                return;
            };
            let _guard = inner.callback_lock.lock();
            if inner.is_open() {
                handlers.invoke(&args);
            }
        }));
    }

    fn u32_attribute(&self, id: SessionId, attribute: StandardAttribute) -> Result<u32> {
        match self
            .driver
            .get_attribute(id, attribute.full_name(), AttributeType::UInt32)?
        {
            AttributeValue::UInt32(value) => Ok(value),
            other => Err(Error::TypeMismatch {
                name: attribute.full_name().to_string(),
                expected: AttributeType::UInt32.to_string(),
                actual: other.attribute_type().to_string(),
            }),
        }
    }

    fn pixel_format(&self, id: SessionId) -> Result<String> {
        let name = StandardAttribute::PixelFormat.full_name();
        match self.driver.get_attribute(id, name, AttributeType::Enum)? {
            AttributeValue::Enum(item) => Ok(item.name().to_string()),
            other => Ok(other.to_string()),
        }
    }

    /// Copy one buffer out of the driver together with the geometry it was
    /// acquired with.
    pub fn read_frame(
        &self,
        id: SessionId,
        mode: BufferNumberMode,
        buffer_number: u32,
    ) -> Result<Frame> {
        let width = self.u32_attribute(id, StandardAttribute::Width)?;
        let height = self.u32_attribute(id, StandardAttribute::Height)?;
        let pixel_format = self.pixel_format(id)?;
        let size = self.driver.raw_buffer_size(id)? as usize;
        let mut data = vec![0u8; size];
        let actual = self
            .driver
            .get_image_data(id, &mut data, mode, buffer_number & BUFFER_NUMBER_MASK)?;
        Ok(Frame::new(data, width, height, pixel_format, actual))
    }

    fn teardown(&self, step: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("Failed to {} acquisition on {}: {}", step, self.name, e);
        }
    }

    /// Run `read` inside a one-shot acquisition of `buffers` buffers.
    /// Stop and unconfigure are always attempted.
    fn one_shot<T>(&self, buffers: u32, read: impl FnOnce(SessionId) -> Result<T>) -> Result<T> {
        let id = self.id()?;
        self.driver.configure_acquisition(id, false, buffers)?;
        let result = self.driver.start_acquisition(id).and_then(|()| {
            let result = read(id);
            self.teardown("stop", self.driver.stop_acquisition(id));
            result
        });
        self.teardown("unconfigure", self.driver.unconfigure_acquisition(id));
        result
    }

    fn snap(&self) -> Result<Frame> {
        self.one_shot(1, |id| self.read_frame(id, BufferNumberMode::Next, 0))
    }

    fn grab(&self, wait_for_next_buffer: bool) -> Result<Frame> {
        let id = self.id()?;
        let mode = if wait_for_next_buffer {
            BufferNumberMode::Next
        } else {
            BufferNumberMode::Last
        };
        self.read_frame(id, mode, 0)
    }

    fn sequence(&self, count: u32) -> Result<Vec<Frame>> {
        self.one_shot(count, |id| {
            (0..count)
                .map(|n| self.read_frame(id, BufferNumberMode::BufferNumber, n))
                .collect()
        })
    }

    fn close(&self, wait_for_pending_callbacks: bool) -> Result<()> {
        let (id, result) = {
            let _guard = wait_for_pending_callbacks.then(|| self.callback_lock.lock());
            let id = self.handle.write().take().ok_or(Error::SessionClosed)?;
            for slot in &self.pnp {
                slot.callback.reset();
                slot.handlers.clear();
            }
            self.snap_completed.clear();
            self.grab_completed.clear();
            self.sequence_completed.clear();
            self.acquisition.reset_callback();
            (id, self.driver.close_camera(id))
        };
        // Joining while this thread still holds the callback lock, from a
        // handler running inline, would block on deliveries queued behind it.
        let wait = wait_for_pending_callbacks && !self.callback_lock.is_owned_by_current_thread();
        self.dispatcher.shutdown(wait);
        match &result {
            Ok(()) => info!("Closed IMAQdx session {} on {}", id, self.name),
            Err(e) => warn!("Closing IMAQdx session {} on {} failed: {}", id, self.name, e),
        }
        result
    }
}

/// An open connection to one IMAQdx camera.
///
/// Every operation fails with [`Error::SessionClosed`] once the session has
/// been closed. Dropping an open session closes it.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Open `name` as controller through the native driver.
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with_mode(name, CameraControlMode::default())
    }

    /// Open `name` through the native driver.
    pub fn open_with_mode(name: &str, mode: CameraControlMode) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::empty("name"));
        }
        Self::open_with(native_driver()?, name, mode)
    }

    /// Open `name` through `driver`.
    pub fn open_with(driver: Arc<dyn Driver>, name: &str, mode: CameraControlMode) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::empty("name"));
        }
        let id = driver.open_camera(name, mode)?;
        info!("Opened IMAQdx camera {} as session {} ({:?})", name, id, mode);
        let dispatcher = Arc::new(DispatchThread::new(format!("imaqdx-{}", name)));
        let inner = Arc::new_cyclic(|session| SessionInner {
            name: name.to_string(),
            driver,
            handle: RwLock::new(Some(id)),
            callback_lock: ReentrantMutex::new(()),
            callbacks: CallbackManager::new(dispatcher.clone()),
            acquisition: Acquisition::new(
                session.clone(),
                CallbackManager::new(dispatcher.clone()),
            ),
            dispatcher,
            attributes: OnceLock::new(),
            attributes_lock: Mutex::new(()),
            snap_completed: Arc::new(HandlerList::new()),
            grab_completed: Arc::new(HandlerList::new()),
            sequence_completed: Arc::new(HandlerList::new()),
            pnp: [PnpSlot::new(), PnpSlot::new(), PnpSlot::new()],
        });
        Ok(Session { inner })
    }

    /// Close the session, waiting for event handlers that are running.
    pub fn close(&self) -> Result<()> {
        self.close_with(true)
    }

    /// Close the session. With `wait_for_pending_callbacks` unset, teardown
    /// does not wait for running event handlers.
    pub fn close_with(&self, wait_for_pending_callbacks: bool) -> Result<()> {
        self.inner.close(wait_for_pending_callbacks)
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// The native session identifier.
    pub fn session_id(&self) -> Result<SessionId> {
        self.inner.id()
    }

    pub fn camera_name(&self) -> &str {
        &self.inner.name
    }

    /// Low-level acquisition control.
    pub fn acquisition(&self) -> Result<&Acquisition> {
        self.inner.id()?;
        Ok(&self.inner.acquisition)
    }

    /// The camera's attributes, enumerated on first access.
    pub fn attributes(&self) -> Result<&AttributeCollection> {
        self.inner.id()?;
        if let Some(attributes) = self.inner.attributes.get() {
            return Ok(attributes);
        }
        let _guard = self.inner.attributes_lock.lock();
        if let Some(attributes) = self.inner.attributes.get() {
            return Ok(attributes);
        }
        let attributes = AttributeCollection::load(&self.inner)?;
        Ok(self.inner.attributes.get_or_init(|| attributes))
    }

    /// Whether session events are posted to the synchronization context
    /// rather than run on the raising thread. Defaults to `true`.
    pub fn synchronize_callbacks(&self) -> Result<bool> {
        self.inner.id()?;
        Ok(self.inner.callbacks.synchronize())
    }

    pub fn set_synchronize_callbacks(&self, synchronize: bool) -> Result<()> {
        self.inner.id()?;
        self.inner.callbacks.set_synchronize(synchronize);
        Ok(())
    }

    /// Deliver synchronized session and acquisition events through `context`
    /// instead of the session's dispatch thread.
    pub fn set_synchronization_context(
        &self,
        context: Arc<dyn SynchronizationContext>,
    ) -> Result<()> {
        self.inner.id()?;
        self.inner.callbacks.set_context(context.clone());
        self.inner.acquisition.set_context(context);
        Ok(())
    }

    /// Acquire a single frame: configure, start, read, stop, unconfigure.
    pub fn snap(&self) -> Result<Frame> {
        self.inner.id()?;
        debug!("Snap on {}", self.inner.name);
        self.inner.snap()
    }

    /// Configure and start a continuous acquisition for [`grab`](Self::grab).
    pub fn configure_grab(&self) -> Result<()> {
        let id = self.inner.id()?;
        debug!("Configuring grab on {}", self.inner.name);
        self.inner.driver.configure_grab(id)
    }

    /// Read the next buffer, or the most recent one when
    /// `wait_for_next_buffer` is unset. The buffer number read is
    /// [`Frame::buffer_number`].
    pub fn grab(&self, wait_for_next_buffer: bool) -> Result<Frame> {
        self.inner.grab(wait_for_next_buffer)
    }

    /// Acquire `count` frames in one one-shot acquisition.
    pub fn sequence(&self, count: u32) -> Result<Vec<Frame>> {
        self.inner.id()?;
        if count == 0 {
            return Err(Error::not_positive("count"));
        }
        debug!("Sequence of {} on {}", count, self.inner.name);
        self.inner.sequence(count)
    }

    fn spawn_worker(
        &self,
        op: &str,
        work: impl FnOnce(Arc<SessionInner>) + Send + 'static,
    ) -> Result<()> {
        let inner = self.inner.clone();
        thread::Builder::new()
            .name(format!("imaqdx-{}-{}", op, self.inner.name))
            .spawn(move || work(inner))
            .map(|_| ())
            .map_err(|e| Error::Worker(e.to_string()))
    }

    /// [`snap`](Self::snap) on a worker thread, raising `SnapCompleted`.
    pub fn snap_async(&self, user_state: UserState) -> Result<()> {
        self.inner.id()?;
        self.spawn_worker("snap", move |inner| {
            let result = inner.snap();
            let handlers = inner.snap_completed.clone();
            inner.raise(&inner.callbacks, &handlers, SnapCompletedEvent { result, user_state });
        })
    }

    /// [`grab`](Self::grab) on a worker thread, raising `GrabCompleted`.
    pub fn grab_async(&self, wait_for_next_buffer: bool, user_state: UserState) -> Result<()> {
        self.inner.id()?;
        self.spawn_worker("grab", move |inner| {
            let result = inner.grab(wait_for_next_buffer);
            let handlers = inner.grab_completed.clone();
            inner.raise(&inner.callbacks, &handlers, GrabCompletedEvent { result, user_state });
        })
    }

    /// [`sequence`](Self::sequence) on a worker thread, raising
    /// `SequenceCompleted`.
    pub fn sequence_async(&self, count: u32, user_state: UserState) -> Result<()> {
        self.inner.id()?;
        if count == 0 {
            return Err(Error::not_positive("count"));
        }
        self.spawn_worker("sequence", move |inner| {
            let result = inner.sequence(count);
            let handlers = inner.sequence_completed.clone();
            inner.raise(&inner.callbacks, &handlers, SequenceCompletedEvent { result, user_state });
        })
    }

    pub fn add_snap_completed_handler(
        &self,
        handler: impl Fn(&SnapCompletedEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.inner.id()?;
        self.inner.snap_completed.add_with(Arc::new(handler), || Ok(()))
    }

    pub fn remove_snap_completed_handler(&self, id: HandlerId) -> Result<bool> {
        self.inner.id()?;
        Ok(self.inner.snap_completed.remove_with(id, || {}))
    }

    pub fn add_grab_completed_handler(
        &self,
        handler: impl Fn(&GrabCompletedEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.inner.id()?;
        self.inner.grab_completed.add_with(Arc::new(handler), || Ok(()))
    }

    pub fn remove_grab_completed_handler(&self, id: HandlerId) -> Result<bool> {
        self.inner.id()?;
        Ok(self.inner.grab_completed.remove_with(id, || {}))
    }

    pub fn add_sequence_completed_handler(
        &self,
        handler: impl Fn(&SequenceCompletedEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.inner.id()?;
        self.inner.sequence_completed.add_with(Arc::new(handler), || Ok(()))
    }

    pub fn remove_sequence_completed_handler(&self, id: HandlerId) -> Result<bool> {
        self.inner.id()?;
        Ok(self.inner.sequence_completed.remove_with(id, || {}))
    }

    /// Add a handler for a plug-and-play event. The first handler of a kind
    /// registers the driver callback for it.
    fn add_pnp_handler(
        &self,
        event: PnpEvent,
        handler: impl Fn(&PnpEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        let id = self.inner.id()?;
        let slot = self.inner.pnp_slot(event);
        let session = Arc::downgrade(&self.inner);
        slot.handlers.add_with(Arc::new(handler), || {
            slot.callback.install(|| {
                let callback: PnpHandler = Arc::new(move |event: PnpEvent| {
                    let Some(inner) = session.upgrade() else {
                        return false;
                    };
                    let slot = inner.pnp_slot(event);
                    if !slot.callback.keep_registered() {
                        return false;
                    }
                    inner.raise(&inner.callbacks, &slot.handlers, event);
                    true
                });
                self.inner.driver.register_pnp_event(id, event, callback)
            })
        })
    }

    /// Remove a plug-and-play handler. Removing the last handler of a kind
    /// lets the driver callback unregister itself on its next delivery.
    fn remove_pnp_handler(&self, event: PnpEvent, id: HandlerId) -> Result<bool> {
        self.inner.id()?;
        let slot = self.inner.pnp_slot(event);
        Ok(slot.handlers.remove_with(id, || slot.callback.uninstall()))
    }

    pub fn add_camera_attached_handler(
        &self,
        handler: impl Fn(&PnpEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.add_pnp_handler(PnpEvent::CameraAttached, handler)
    }

    pub fn remove_camera_attached_handler(&self, id: HandlerId) -> Result<bool> {
        self.remove_pnp_handler(PnpEvent::CameraAttached, id)
    }

    pub fn add_camera_detached_handler(
        &self,
        handler: impl Fn(&PnpEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.add_pnp_handler(PnpEvent::CameraDetached, handler)
    }

    pub fn remove_camera_detached_handler(&self, id: HandlerId) -> Result<bool> {
        self.remove_pnp_handler(PnpEvent::CameraDetached, id)
    }

    pub fn add_bus_reset_completed_handler(
        &self,
        handler: impl Fn(&PnpEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.add_pnp_handler(PnpEvent::BusResetCompleted, handler)
    }

    pub fn remove_bus_reset_completed_handler(&self, id: HandlerId) -> Result<bool> {
        self.remove_pnp_handler(PnpEvent::BusResetCompleted, id)
    }

    pub fn write_register(&self, offset: u32, value: u32) -> Result<()> {
        let id = self.inner.id()?;
        self.inner.driver.write_register(id, offset, value)
    }

    pub fn read_register(&self, offset: u32) -> Result<u32> {
        let id = self.inner.id()?;
        self.inner.driver.read_register(id, offset)
    }

    pub fn write_memory(&self, offset: u32, values: &[u8]) -> Result<()> {
        let id = self.inner.id()?;
        if values.is_empty() {
            return Err(Error::empty("values"));
        }
        self.inner.driver.write_memory(id, offset, values)
    }

    pub fn read_memory(&self, offset: u32, count: usize) -> Result<Vec<u8>> {
        let id = self.inner.id()?;
        if count == 0 {
            return Err(Error::not_positive("count"));
        }
        let mut values = vec![0u8; count];
        self.inner.driver.read_memory(id, offset, &mut values)?;
        Ok(values)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.inner.is_open() {
            if let Err(e) = self.inner.close(true) {
                warn!("Error closing {} on drop: {}", self.inner.name, e);
            }
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session: Name={}", self.inner.name)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("handle", &*self.inner.handle.read_recursive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedDriver;

    fn open(name: &str) -> (Arc<SimulatedDriver>, Session) {
        let driver = Arc::new(SimulatedDriver::new());
        let session =
            Session::open_with(driver.clone(), name, CameraControlMode::Controller).unwrap();
        (driver, session)
    }

    #[test]
    fn test_empty_name_rejected() {
        let driver = Arc::new(SimulatedDriver::new());
        let res = Session::open_with(driver.clone(), "", CameraControlMode::Controller);
        assert!(matches!(res, Err(Error::InvalidArgument { name: "name", .. })));
        assert_eq!(driver.open_sessions(), 0);
    }

    #[test]
    fn test_close_twice() {
        let (driver, session) = open("cam0");
        assert_eq!(session.to_string(), "Session: Name=cam0");
        session.close().unwrap();
        assert_eq!(driver.open_sessions(), 0);
        assert_eq!(session.close(), Err(Error::SessionClosed));
        assert_eq!(session.read_register(0), Err(Error::SessionClosed));
    }

    #[test]
    fn test_drop_closes() {
        let (driver, session) = open("cam0");
        assert_eq!(driver.open_sessions(), 1);
        drop(session);
        assert_eq!(driver.open_sessions(), 0);
    }

    #[test]
    fn test_buffer_number_mask() {
        assert_eq!(0xF000_0003 & BUFFER_NUMBER_MASK, 3);
    }

    #[test]
    fn test_argument_validation() {
        let (_driver, session) = open("cam0");
        assert!(matches!(session.sequence(0), Err(Error::InvalidArgument { name: "count", .. })));
        assert!(matches!(
            session.read_memory(0, 0),
            Err(Error::InvalidArgument { name: "count", .. })
        ));
        assert!(matches!(
            session.write_memory(0, &[]),
            Err(Error::InvalidArgument { name: "values", .. })
        ));
    }
}
