//! Event arguments, handler lists and callback dispatch.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::frame::Frame;

/// Caller-supplied value passed through an asynchronous operation to its
/// completion event.
pub type UserState = Option<Arc<dyn Any + Send + Sync>>;

/// A unit of event delivery posted to a [`SynchronizationContext`].
pub type Callback = Box<dyn FnOnce() + Send>;

/// Where synchronized events are delivered.
///
/// When a session synchronizes callbacks, every event is wrapped into a
/// [`Callback`] and posted here instead of running on the thread that raised
/// it (a driver thread or an async worker).
pub trait SynchronizationContext: Send + Sync {
    fn post(&self, callback: Callback);
}

struct DispatchState {
    sender: Option<Sender<Callback>>,
    thread: Option<JoinHandle<()>>,
    closed: bool,
}

/// Default [`SynchronizationContext`]: a dedicated thread draining a channel.
///
/// The thread is spawned on the first post and runs callbacks in posting
/// order. A panicking callback is logged and does not stop the thread.
pub struct DispatchThread {
    name: String,
    state: Mutex<DispatchState>,
}

impl DispatchThread {
    pub fn new(name: impl Into<String>) -> Self {
        DispatchThread {
            name: name.into(),
            state: Mutex::new(DispatchState {
                sender: None,
                thread: None,
                closed: false,
            }),
        }
    }

    fn spawn(&self, state: &mut DispatchState) -> Option<Sender<Callback>> {
        let (sender, receiver) = mpsc::channel::<Callback>();
        let name = self.name.clone();
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            for callback in receiver {
                if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    error!("Event handler panicked on {}", name);
                }
            }
        });
        match spawned {
            Ok(handle) => {
                state.thread = Some(handle);
                state.sender = Some(sender.clone());
                Some(sender)
            }
            Err(e) => {
                warn!("Could not spawn {}: {}", self.name, e);
                None
            }
        }
    }

    /// Stop accepting callbacks. With `wait`, block until the queued ones
    /// have run; otherwise the thread drains its queue detached.
    ///
    /// Never waits when called from the dispatch thread itself.
    pub fn shutdown(&self, wait: bool) {
        let (sender, handle) = {
            let mut state = self.state.lock();
            state.closed = true;
            (state.sender.take(), state.thread.take())
        };
        drop(sender);
        let Some(handle) = handle else {
            return;
        };
        if !wait || handle.thread().id() == thread::current().id() {
            debug!("Detaching {}", self.name);
            return;
        }
        if handle.join().is_err() {
            error!("{} terminated abnormally", self.name);
        }
    }
}

impl SynchronizationContext for DispatchThread {
    fn post(&self, callback: Callback) {
        let rejected = {
            let mut state = self.state.lock();
            if state.closed {
                debug!("{} is shut down, dropping event", self.name);
                return;
            }
            let sender = match state.sender.clone() {
                Some(sender) => Some(sender),
                None => self.spawn(&mut state),
            };
            match sender {
                Some(sender) => match sender.send(callback) {
                    Ok(()) => return,
                    Err(mpsc::SendError(callback)) => callback,
                },
                None => callback,
            }
        };
        // No dispatch thread available.
        rejected();
    }
}

impl Drop for DispatchThread {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

impl fmt::Debug for DispatchThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchThread").field("name", &self.name).finish()
    }
}

/// Routes raised events either inline or through a synchronization context.
pub(crate) struct CallbackManager {
    synchronize: AtomicBool,
    context: RwLock<Arc<dyn SynchronizationContext>>,
}

impl CallbackManager {
    pub fn new(context: Arc<dyn SynchronizationContext>) -> Self {
        CallbackManager {
            synchronize: AtomicBool::new(true),
            context: RwLock::new(context),
        }
    }

    pub fn synchronize(&self) -> bool {
        self.synchronize.load(Ordering::SeqCst)
    }

    pub fn set_synchronize(&self, synchronize: bool) {
        self.synchronize.store(synchronize, Ordering::SeqCst);
    }

    pub fn set_context(&self, context: Arc<dyn SynchronizationContext>) {
        *self.context.write() = context;
    }

    pub fn raise(&self, callback: Callback) {
        if self.synchronize() {
            let context = self.context.read().clone();
            context.post(callback);
        } else {
            callback();
        }
    }
}

/// Identifies a registered event handler so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

pub(crate) struct HandlerList<A> {
    handlers: Mutex<Vec<(HandlerId, Handler<A>)>>,
}

impl<A> HandlerList<A> {
    pub fn new() -> Self {
        HandlerList {
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Add a handler, running `on_first` beforehand when the list is empty.
    /// The handler is not added if `on_first` fails.
    pub fn add_with(
        &self,
        handler: Handler<A>,
        on_first: impl FnOnce() -> Result<()>,
    ) -> Result<HandlerId> {
        let mut handlers = self.handlers.lock();
        if handlers.is_empty() {
            on_first()?;
        }
        let id = HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst));
        handlers.push((id, handler));
        Ok(id)
    }

    /// Remove a handler, running `on_last` when the list becomes empty.
    /// Returns `false` if `id` was not registered here.
    pub fn remove_with(&self, id: HandlerId, on_last: impl FnOnce()) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        let removed = handlers.len() != before;
        if removed && handlers.is_empty() {
            on_last();
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Call every handler with `args`. Handlers may add or remove handlers.
    pub fn invoke(&self, args: &A) {
        let snapshot: Vec<Handler<A>> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in snapshot {
            handler(args);
        }
    }
}

#[derive(Default)]
struct SlotState {
    installed: bool,
    registered: bool,
}

/// Registration state of one driver callback.
///
/// `installed` says whether events should be delivered; `registered` says
/// whether the driver still holds the callback. A driver callback that finds
/// the slot uninstalled asks the driver to drop it, and a later install
/// registers a fresh one.
#[derive(Default)]
pub(crate) struct DriverCallback {
    state: Mutex<SlotState>,
}

impl DriverCallback {
    pub fn install(&self, register: impl FnOnce() -> Result<()>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.registered {
            register()?;
            state.registered = true;
        }
        state.installed = true;
        Ok(())
    }

    pub fn uninstall(&self) {
        self.state.lock().installed = false;
    }

    /// Whether the driver should keep delivering this callback.
    pub fn keep_registered(&self) -> bool {
        let mut state = self.state.lock();
        if !state.installed {
            state.registered = false;
        }
        state.installed
    }

    #[cfg(test)]
    pub fn is_installed(&self) -> bool {
        self.state.lock().installed
    }

    /// Forget the registration; the driver drops callbacks on close.
    pub fn reset(&self) {
        *self.state.lock() = SlotState::default();
    }
}

fn downcast<T: Any>(state: &UserState) -> Option<&T> {
    state.as_deref().and_then(|s| s.downcast_ref::<T>())
}

/// Raised by an [`Acquisition`](crate::Acquisition) each time the driver
/// completes a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageAcquiredEvent {
    pub buffer_number: u32,
}

/// Raised when [`Session::snap_async`](crate::Session::snap_async) finishes.
#[derive(Debug)]
pub struct SnapCompletedEvent {
    pub result: Result<Frame>,
    pub user_state: UserState,
}

/// Raised when [`Session::grab_async`](crate::Session::grab_async) finishes.
/// The buffer number read is [`Frame::buffer_number`].
#[derive(Debug)]
pub struct GrabCompletedEvent {
    pub result: Result<Frame>,
    pub user_state: UserState,
}

/// Raised when [`Session::sequence_async`](crate::Session::sequence_async)
/// finishes.
#[derive(Debug)]
pub struct SequenceCompletedEvent {
    pub result: Result<Vec<Frame>>,
    pub user_state: UserState,
}

impl SnapCompletedEvent {
    /// The user state, if it is a `T`.
    pub fn user_state<T: Any>(&self) -> Option<&T> {
        downcast(&self.user_state)
    }
}

impl GrabCompletedEvent {
    /// The user state, if it is a `T`.
    pub fn user_state<T: Any>(&self) -> Option<&T> {
        downcast(&self.user_state)
    }
}

impl SequenceCompletedEvent {
    /// The user state, if it is a `T`.
    pub fn user_state<T: Any>(&self) -> Option<&T> {
        downcast(&self.user_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn test_dispatch_thread_runs_in_order() {
        let dispatch = DispatchThread::new("test-dispatch");
        let (tx, rx) = channel();
        for i in 0..5 {
            let tx = tx.clone();
            dispatch.post(Box::new(move || {
                tx.send((i, thread::current().name().map(str::to_string))).unwrap();
            }));
        }
        for i in 0..5 {
            let (n, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(n, i);
            assert_eq!(name.as_deref(), Some("test-dispatch"));
        }
    }

    #[test]
    fn test_dispatch_thread_survives_panic() {
        let dispatch = DispatchThread::new("test-panic");
        let (tx, rx) = channel();
        dispatch.post(Box::new(|| panic!("handler failure")));
        dispatch.post(Box::new(move || tx.send(1).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    }

    #[test]
    fn test_shutdown_drains_queue_then_drops() {
        let dispatch = DispatchThread::new("test-shutdown");
        let (tx, rx) = channel();
        let first = tx.clone();
        dispatch.post(Box::new(move || first.send(1).unwrap()));
        dispatch.shutdown(true);
        assert_eq!(rx.try_recv().unwrap(), 1);
        dispatch.post(Box::new(move || tx.send(2).unwrap()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_without_waiting_detaches() {
        let dispatch = DispatchThread::new("test-detach");
        let (started_tx, started_rx) = channel();
        let (release_tx, release_rx) = channel::<()>();
        let (done_tx, done_rx) = channel();
        dispatch.post(Box::new(move || {
            started_tx.send(()).unwrap();
            release_rx.recv_timeout(Duration::from_secs(5)).ok();
        }));
        dispatch.post(Box::new(move || done_tx.send(2).unwrap()));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let start = std::time::Instant::now();
        dispatch.shutdown(false);
        assert!(start.elapsed() < Duration::from_secs(1));

        // The detached thread still drains what was queued.
        release_tx.send(()).unwrap();
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
    }

    #[test]
    fn test_handler_list_first_and_last() {
        let list: HandlerList<u32> = HandlerList::new();
        let firsts = AtomicU64::new(0);
        let first = || {
            firsts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let a = list.add_with(Arc::new(|_: &u32| {}), first).unwrap();
        let b = list.add_with(Arc::new(|_: &u32| {}), first).unwrap();
        assert_eq!(firsts.load(Ordering::SeqCst), 1);

        let mut lasts = 0;
        assert!(list.remove_with(a, || lasts += 1));
        assert_eq!(lasts, 0);
        assert!(!list.remove_with(a, || lasts += 1));
        assert!(list.remove_with(b, || lasts += 1));
        assert_eq!(lasts, 1);
        assert!(list.is_empty());
    }

    #[test]
    fn test_handler_list_failed_install_adds_nothing() {
        let list: HandlerList<u32> = HandlerList::new();
        let res = list.add_with(Arc::new(|_: &u32| {}), || Err(crate::Error::SessionClosed));
        assert!(res.is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn test_driver_callback_reinstall() {
        let slot = DriverCallback::default();
        let mut registrations = 0;
        slot.install(|| {
            registrations += 1;
            Ok(())
        })
        .unwrap();
        assert!(slot.keep_registered());

        // Uninstall then reinstall before the driver calls back: still registered.
        slot.uninstall();
        slot.install(|| {
            registrations += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(registrations, 1);

        slot.uninstall();
        assert!(!slot.keep_registered());
        slot.install(|| {
            registrations += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(registrations, 2);
        assert!(slot.is_installed());
    }

    #[test]
    fn test_user_state_downcast() {
        let event = SnapCompletedEvent {
            result: Err(crate::Error::SessionClosed),
            user_state: Some(Arc::new(42u32)),
        };
        assert_eq!(event.user_state::<u32>(), Some(&42));
        assert_eq!(event.user_state::<String>(), None);
    }
}
