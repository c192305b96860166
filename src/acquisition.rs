use std::sync::{Arc, Weak};

use log::debug;

use crate::driver::{FrameDoneHandler, SessionId};
use crate::error::{Error, Result};
use crate::events::{
    CallbackManager, DriverCallback, HandlerId, HandlerList, ImageAcquiredEvent,
    SynchronizationContext,
};
use crate::frame::Frame;
use crate::session::{SessionInner, BUFFER_NUMBER_MASK};
use crate::types::{AcquisitionType, BufferNumberMode};

/// Low-level acquisition control of a [`Session`](crate::Session).
///
/// Configure a buffer ring, start and stop the camera, and pull buffers
/// out by number. Obtained from [`Session::acquisition`](crate::Session::acquisition).
pub struct Acquisition {
    session: Weak<SessionInner>,
    callbacks: CallbackManager,
    image_acquired: Arc<HandlerList<ImageAcquiredEvent>>,
    frame_done: DriverCallback,
}

impl Acquisition {
    pub(crate) fn new(session: Weak<SessionInner>, callbacks: CallbackManager) -> Self {
        Acquisition {
            session,
            callbacks,
            image_acquired: Arc::new(HandlerList::new()),
            frame_done: DriverCallback::default(),
        }
    }

    fn session(&self) -> Result<(Arc<SessionInner>, SessionId)> {
        let inner = self.session.upgrade().ok_or(Error::SessionClosed)?;
        let id = inner.id()?;
        Ok((inner, id))
    }

    pub(crate) fn set_context(&self, context: Arc<dyn SynchronizationContext>) {
        self.callbacks.set_context(context);
    }

    /// Forget the frame-done registration and drop every handler.
    pub(crate) fn reset_callback(&self) {
        self.frame_done.reset();
        self.image_acquired.clear();
    }

    /// Whether `ImageAcquired` is posted to the synchronization context
    /// rather than run on the driver's thread. Defaults to `true`,
    /// independently of the session's setting.
    pub fn synchronize_callbacks(&self) -> Result<bool> {
        self.session()?;
        Ok(self.callbacks.synchronize())
    }

    pub fn set_synchronize_callbacks(&self, synchronize: bool) -> Result<()> {
        self.session()?;
        self.callbacks.set_synchronize(synchronize);
        Ok(())
    }

    /// Allocate `buffer_count` buffers for a one-shot or continuous
    /// acquisition.
    pub fn configure(&self, kind: AcquisitionType, buffer_count: u32) -> Result<()> {
        let (inner, id) = self.session()?;
        if buffer_count == 0 {
            return Err(Error::not_positive("buffer_count"));
        }
        debug!(
            "Configuring {:?} acquisition with {} buffers on session {}",
            kind, buffer_count, id
        );
        inner
            .driver()
            .configure_acquisition(id, kind == AcquisitionType::Continuous, buffer_count)
    }

    pub fn start(&self) -> Result<()> {
        let (inner, id) = self.session()?;
        debug!("Starting acquisition on session {}", id);
        inner.driver().start_acquisition(id)
    }

    pub fn stop(&self) -> Result<()> {
        let (inner, id) = self.session()?;
        debug!("Stopping acquisition on session {}", id);
        inner.driver().stop_acquisition(id)
    }

    /// Release the buffers allocated by [`configure`](Self::configure).
    pub fn unconfigure(&self) -> Result<()> {
        let (inner, id) = self.session()?;
        debug!("Unconfiguring acquisition on session {}", id);
        inner.driver().unconfigure_acquisition(id)
    }

    /// Add a handler called for every buffer the driver completes.
    ///
    /// The first handler registers the driver's frame-done callback.
    pub fn add_image_acquired_handler(
        &self,
        handler: impl Fn(&ImageAcquiredEvent) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        let (inner, id) = self.session()?;
        let session = self.session.clone();
        self.image_acquired.add_with(Arc::new(handler), || {
            self.frame_done.install(|| {
                let callback: FrameDoneHandler = Arc::new(move |buffer_number: u32| {
                    let Some(inner) = session.upgrade() else {
                        return false;
                    };
                    let acquisition = &inner.acquisition;
                    if !acquisition.frame_done.keep_registered() {
                        return false;
                    }
                    inner.raise(
                        &acquisition.callbacks,
                        &acquisition.image_acquired,
                        ImageAcquiredEvent { buffer_number },
                    );
                    true
                });
                inner.driver().register_frame_done_event(id, 1, callback)
            })
        })
    }

    /// Remove an `ImageAcquired` handler. Returns `false` if `id` was not
    /// registered here.
    pub fn remove_image_acquired_handler(&self, id: HandlerId) -> Result<bool> {
        self.session()?;
        Ok(self
            .image_acquired
            .remove_with(id, || self.frame_done.uninstall()))
    }

    fn image_data(
        &self,
        data: &mut Vec<u8>,
        mode: BufferNumberMode,
        buffer_number: u32,
    ) -> Result<u32> {
        let (inner, id) = self.session()?;
        let size = inner.driver().raw_buffer_size(id)? as usize;
        data.resize(size, 0);
        inner
            .driver()
            .get_image_data(id, data, mode, buffer_number & BUFFER_NUMBER_MASK)
    }

    /// Copy the most recently acquired buffer into `data`, resized to the
    /// raw buffer size. Returns the buffer number read.
    pub fn last_image_data(&self, data: &mut Vec<u8>) -> Result<u32> {
        self.image_data(data, BufferNumberMode::Last, 0)
    }

    /// Wait for the next buffer and copy it into `data`.
    pub fn next_image_data(&self, data: &mut Vec<u8>) -> Result<u32> {
        self.image_data(data, BufferNumberMode::Next, 0)
    }

    /// Copy buffer `buffer_number` into `data`.
    pub fn image_data_at(&self, data: &mut Vec<u8>, buffer_number: u32) -> Result<u32> {
        self.image_data(data, BufferNumberMode::BufferNumber, buffer_number)
    }

    pub fn last_frame(&self) -> Result<Frame> {
        let (inner, id) = self.session()?;
        inner.read_frame(id, BufferNumberMode::Last, 0)
    }

    pub fn next_frame(&self) -> Result<Frame> {
        let (inner, id) = self.session()?;
        inner.read_frame(id, BufferNumberMode::Next, 0)
    }

    pub fn frame_at(&self, buffer_number: u32) -> Result<Frame> {
        let (inner, id) = self.session()?;
        inner.read_frame(id, BufferNumberMode::BufferNumber, buffer_number)
    }
}
