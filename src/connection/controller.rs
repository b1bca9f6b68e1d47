//! Connection controller
//!
//! Owns the transport handle, the cached open state, the auto-open intent
//! and the two-lock discipline the whole engine relies on:
//!
//! - **settings lock** (reentrant): user handlers, the desired port name and
//!   the VID/PID filter. Callbacks are invoked while holding this lock only,
//!   so a handler body may call back into `write`, `set_port_name`, `close`
//!   and friends without deadlocking.
//! - **transport lock**: the transport handle and the cached open flag.
//!
//! Any path needing both locks takes settings before transport and releases
//! the transport lock before invoking a callback.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex};

use crate::connection::callbacks::{CallbackRegistry, OnOpenHandle, OnReadHandle};
use crate::discovery::{DeviceResolver, VidPidFilter};
use crate::error::Result;
use crate::transport::Transport;

/// Guarded by the settings lock
struct Settings {
    callbacks: CallbackRegistry,
    prefs: RefCell<PortPrefs>,
}

/// Desired-port configuration
struct PortPrefs {
    /// Explicitly requested port name; empty means "autodetect via filter"
    port_name: String,
    filter: Option<VidPidFilter>,
}

/// Guarded by the transport lock
struct TransportCell {
    transport: Box<dyn Transport>,
    /// Cached, edge-tracked mirror of the transport's open flag
    open: bool,
}

/// The connection-management core shared by the public API and the monitor
pub struct ConnectionController {
    settings: ReentrantMutex<Settings>,
    transport: Mutex<TransportCell>,
    /// User intent: keep trying to (re)open the transport
    auto_open: AtomicBool,
}

impl ConnectionController {
    /// Create a controller owning `transport`, with an optional VID/PID
    /// filter for autodetection. `port_name` may be empty.
    pub fn new(
        mut transport: Box<dyn Transport>,
        port_name: impl Into<String>,
        filter: Option<VidPidFilter>,
    ) -> Self {
        let port_name = port_name.into();
        transport.set_port(&port_name);
        Self {
            settings: ReentrantMutex::new(Settings {
                callbacks: CallbackRegistry::default(),
                prefs: RefCell::new(PortPrefs { port_name, filter }),
            }),
            transport: Mutex::new(TransportCell {
                transport,
                open: false,
            }),
            auto_open: AtomicBool::new(true),
        }
    }

    /// Register the read handler
    pub fn set_on_read_handle(&self, handle: OnReadHandle) {
        self.settings.lock().callbacks.set_on_read(handle);
    }

    /// Register the open-state handler
    pub fn set_on_open_handle(&self, handle: OnOpenHandle) {
        self.settings.lock().callbacks.set_on_open(handle);
    }

    /// Write all of `data` to the transport.
    ///
    /// Returns `false` immediately, without touching the transport, when the
    /// cached state is closed. Otherwise loops until every byte is sent; a
    /// zero-length write or a transport error aborts with `false`. A failed
    /// write does not force the transport closed.
    pub fn write(&self, data: &[u8]) -> bool {
        let mut cell = self.transport.lock();
        if !cell.open {
            return false;
        }
        let mut sent = 0;
        while sent < data.len() {
            match cell.transport.write(&data[sent..]) {
                Ok(0) => {
                    tracing::error!("serial write stalled at {}/{} bytes", sent, data.len());
                    return false;
                }
                Ok(n) => sent += n,
                Err(e) => {
                    tracing::error!("write error: {}", e);
                    return false;
                }
            }
        }
        true
    }

    /// Change the desired port name.
    ///
    /// No-op when `name` matches the current desired port. If the transport
    /// is open on a different port it is forced closed (firing the
    /// open-state handler with `false`) so the monitor reopens under the new
    /// name; an autodetected line pinned to the port it already resolved to
    /// stays open.
    pub fn set_port_name(&self, name: &str) {
        let settings = self.settings.lock();
        {
            let mut prefs = settings.prefs.borrow_mut();
            if prefs.port_name == name {
                return;
            }
            tracing::debug!("set port name: {}", name);
            prefs.port_name = name.to_string();
        }
        let closed = {
            let mut cell = self.transport.lock();
            let already_there = cell.transport.port() == name;
            cell.transport.set_port(name);
            if cell.open && !already_there {
                cell.transport.close();
                cell.open = false;
                true
            } else {
                false
            }
        };
        if closed {
            settings.callbacks.notify_open(false);
        }
    }

    /// The currently desired port name
    pub fn port_name(&self) -> String {
        self.settings.lock().prefs.borrow().port_name.clone()
    }

    /// Set the VID/PID filter used for autodetection. Both strings are
    /// stored lower-cased; passing two empty strings clears the filter.
    pub fn set_vid_pid(&self, vid: &str, pid: &str) {
        let settings = self.settings.lock();
        let filter = if vid.is_empty() && pid.is_empty() {
            None
        } else {
            Some(VidPidFilter::new(vid, pid))
        };
        settings.prefs.borrow_mut().filter = filter;
    }

    /// Ask the engine to keep the transport open
    pub fn open(&self) {
        self.auto_open.store(true, Ordering::SeqCst);
    }

    /// Stop reconnection attempts and close the transport if open
    pub fn close(&self) {
        self.auto_open.store(false, Ordering::SeqCst);
        let settings = self.settings.lock();
        let closed = {
            let mut cell = self.transport.lock();
            // Close the handle even when the cached state lags an in-flight
            // reconnect; the callback still fires only on a real edge.
            cell.transport.close();
            let was_open = cell.open;
            cell.open = false;
            was_open
        };
        if closed {
            settings.callbacks.notify_open(false);
        }
    }

    /// The cached, edge-tracked open state (not a fresh hardware query)
    pub fn is_open(&self) -> bool {
        self.transport.lock().open
    }

    /// Whether the engine should be attempting to (re)open
    pub(crate) fn auto_open_intent(&self) -> bool {
        self.auto_open.load(Ordering::SeqCst)
    }

    /// Re-read the transport's actual open flag and fire the open-state
    /// handler if it differs from the cached state.
    pub(crate) fn update_open_state(&self) {
        let settings = self.settings.lock();
        let flipped = {
            let mut cell = self.transport.lock();
            let actual = cell.transport.is_open();
            if actual == cell.open {
                None
            } else {
                cell.open = actual;
                Some(actual)
            }
        };
        if let Some(open) = flipped {
            tracing::debug!("open state: {}", open);
            settings.callbacks.notify_open(open);
        }
    }

    /// Resolve the next port to try, reading the desired port and filter
    /// under the settings lock and enumerating under the transport lock.
    pub(crate) fn resolve_port(&self, resolver: &DeviceResolver) -> Result<Option<String>> {
        let settings = self.settings.lock();
        let prefs = settings.prefs.borrow();
        let cell = self.transport.lock();
        resolver.resolve(&prefs.port_name, prefs.filter.as_ref(), cell.transport.as_ref())
    }

    /// Point the transport at `port` and attempt to open it.
    ///
    /// Re-checks the auto-open intent under the transport lock so a `close`
    /// racing an in-flight reconnect cannot leave the line open.
    pub(crate) fn try_open(&self, port: &str) -> Result<()> {
        let mut cell = self.transport.lock();
        if !self.auto_open_intent() {
            return Ok(());
        }
        cell.transport.set_port(port);
        cell.transport.open()
    }

    /// Close the transport without touching the cached state; callers follow
    /// up with [`ConnectionController::update_open_state`].
    pub(crate) fn force_close(&self) {
        self.transport.lock().transport.close();
    }

    /// Bytes waiting on the transport, or `None` once the cached state has
    /// gone closed under us.
    pub(crate) fn poll_available(&self) -> Result<Option<usize>> {
        let mut cell = self.transport.lock();
        if !cell.open {
            return Ok(None);
        }
        cell.transport.available_bytes().map(Some)
    }

    /// Read into `buf` under the transport lock
    pub(crate) fn read_chunk(&self, buf: &mut [u8]) -> Result<usize> {
        let mut cell = self.transport.lock();
        if !cell.open {
            return Ok(0);
        }
        cell.transport.read(buf)
    }

    /// Deliver received bytes to the read handler under the settings lock
    pub(crate) fn dispatch_read(&self, data: &[u8]) {
        self.settings.lock().callbacks.notify_read(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::DeviceDescriptor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct StubTransport {
        open: bool,
        port: String,
        devices: Vec<DeviceDescriptor>,
    }

    impl Transport for StubTransport {
        fn open(&mut self) -> Result<()> {
            self.open = true;
            Ok(())
        }
        fn close(&mut self) {
            self.open = false;
        }
        fn is_open(&self) -> bool {
            self.open
        }
        fn available_bytes(&mut self) -> Result<usize> {
            Ok(0)
        }
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Err(TransportError::NotOpen)
        }
        fn write(&mut self, _data: &[u8]) -> Result<usize> {
            Err(TransportError::NotOpen)
        }
        fn set_port(&mut self, name: &str) {
            self.port = name.to_string();
        }
        fn port(&self) -> String {
            self.port.clone()
        }
        fn set_timeout(&mut self, _timeout: Duration) {}
        fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
            Ok(self.devices.clone())
        }
    }

    fn controller_with_counter() -> (ConnectionController, Arc<AtomicUsize>) {
        let controller =
            ConnectionController::new(Box::new(StubTransport::default()), "/dev/ttyUSB0", None);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        controller.set_on_open_handle(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (controller, fired)
    }

    #[test]
    fn open_state_callback_is_edge_triggered() {
        let (controller, fired) = controller_with_counter();

        // Still closed: repeated observations never fire.
        controller.update_open_state();
        controller.update_open_state();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        controller.try_open("/dev/ttyUSB0").unwrap();
        controller.update_open_state();
        controller.update_open_state();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(controller.is_open());

        controller.force_close();
        controller.update_open_state();
        controller.update_open_state();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(!controller.is_open());
    }

    #[test]
    fn close_is_synchronous_and_clears_intent() {
        let (controller, fired) = controller_with_counter();
        controller.try_open("/dev/ttyUSB0").unwrap();
        controller.update_open_state();

        controller.close();
        assert!(!controller.is_open());
        assert!(!controller.auto_open_intent());
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        // Closing again is a no-op.
        controller.close();
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        controller.open();
        assert!(controller.auto_open_intent());
    }

    #[test]
    fn handlers_may_call_back_into_the_controller() {
        let controller = Arc::new(ConnectionController::new(
            Box::new(StubTransport::default()),
            "/dev/ttyUSB0",
            None,
        ));
        controller.try_open("/dev/ttyUSB0").unwrap();
        controller.update_open_state();

        // A read handler closing the engine exercises settings-lock
        // re-entry plus the open-state notification from inside a callback.
        let observed = Arc::new(AtomicUsize::new(0));
        let inner = controller.clone();
        let count = observed.clone();
        controller.set_on_open_handle(Box::new(move |open| {
            if !open {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));
        controller.set_on_read_handle(Box::new(move |_| {
            inner.close();
        }));

        controller.dispatch_read(b"bye");
        assert!(!controller.is_open());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_handler_closing_the_engine_still_sees_the_closed_edge() {
        let controller = Arc::new(ConnectionController::new(
            Box::new(StubTransport::default()),
            "/dev/ttyUSB0",
            None,
        ));

        // An open handler that hangs up as soon as the line comes up. The
        // Open -> Closed edge it produces must still be delivered to it.
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = events.clone();
        let inner = controller.clone();
        controller.set_on_open_handle(Box::new(move |open| {
            seen.lock().push(open);
            if open {
                inner.close();
            }
        }));

        controller.try_open("/dev/ttyUSB0").unwrap();
        controller.update_open_state();

        assert!(!controller.is_open());
        assert_eq!(events.lock().as_slice(), &[true, false]);
    }

    #[test]
    fn adopting_the_open_port_as_explicit_name_keeps_the_line_open() {
        let (controller, fired) = controller_with_counter();
        controller.try_open("/dev/ttyACM2").unwrap();
        controller.update_open_state();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Pinning the name the transport is already open on must not force
        // a close/reopen cycle.
        controller.set_port_name("/dev/ttyACM2");
        assert!(controller.is_open());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(controller.port_name(), "/dev/ttyACM2");
    }

    #[test]
    fn vid_pid_filter_resolves_case_insensitively() {
        let stub = StubTransport {
            devices: vec![DeviceDescriptor::new("/dev/ttyACM2", "USB Serial Device")
                .with_hardware_id("USB VID:PID=04d8:000a SNR=0001")],
            ..Default::default()
        };
        let controller = ConnectionController::new(Box::new(stub), "", None);
        let resolver = DeviceResolver::new(&crate::discovery::PosixIdentityParser);

        // No filter configured: autodetection is refused.
        assert_eq!(controller.resolve_port(&resolver).unwrap(), None);

        controller.set_vid_pid("04D8", "000A");
        let resolved = controller.resolve_port(&resolver).unwrap();
        assert_eq!(resolved.as_deref(), Some("/dev/ttyACM2"));
    }
}
