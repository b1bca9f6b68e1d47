//! Public engine surface
//!
//! [`SmartSerial`] wraps a [`ConnectionController`] and the worker thread
//! running the monitor loop. Construction spawns the worker; dropping the
//! engine signals it and joins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionController, OnOpenHandle};
use crate::connection::monitor::MonitorLoop;
use crate::discovery::{DeviceResolver, VidPidFilter};
use crate::transport::serial::SerialTransport;
use crate::transport::{SerialSettings, Transport};

/// Engine configuration
///
/// Defaults match a typical USB CDC device: 115200 baud, a 1 s read timeout
/// (which also bounds how quickly a silent disconnect is noticed) and a 2 s
/// reconnect interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartSerialConfig {
    /// Explicit port name; empty enables VID/PID autodetection
    pub port_name: String,
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// USB vendor id as a hex string, e.g. "04d8"
    pub vid: Option<String>,
    /// USB product id as a hex string, e.g. "000a"
    pub pid: Option<String>,
    /// Blocking read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Delay between reconnect attempts and after transport errors,
    /// in milliseconds
    pub check_interval_ms: u64,
}

impl Default for SmartSerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115_200,
            vid: None,
            pid: None,
            read_timeout_ms: 1000,
            check_interval_ms: 2000,
        }
    }
}

impl SmartSerialConfig {
    fn filter(&self) -> Option<VidPidFilter> {
        match (self.vid.as_deref(), self.pid.as_deref()) {
            (Some(vid), Some(pid)) if !vid.is_empty() || !pid.is_empty() => {
                Some(VidPidFilter::new(vid, pid))
            }
            _ => None,
        }
    }
}

/// Resilient client for one hot-pluggable serial line
///
/// The engine resolves the device (by port name or USB VID/PID), opens it,
/// delivers received bytes to the read handler and transparently reopens
/// after a disconnect. All methods may be called from any thread; handlers
/// fire from the engine's worker thread (except the open-state handler,
/// which a direct `close` or `set_port_name` call fires synchronously).
///
/// # Example
///
/// ```no_run
/// use smartserial::SmartSerial;
///
/// let engine = SmartSerial::from_vid_pid("04d8", "000a", 115_200);
/// engine.set_on_open_handle(|open| println!("open: {}", open));
/// engine.set_on_read_handle(|data| println!("read {} bytes", data.len()));
///
/// loop {
///     std::thread::sleep(std::time::Duration::from_secs(1));
///     engine.write("hello world");
/// }
/// ```
pub struct SmartSerial {
    controller: Arc<ConnectionController>,
    running: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl SmartSerial {
    /// Create an engine for an explicit port name
    pub fn from_port(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self::new(SmartSerialConfig {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        })
    }

    /// Create an engine that autodetects the device by USB VID/PID
    pub fn from_vid_pid(vid: impl Into<String>, pid: impl Into<String>, baud_rate: u32) -> Self {
        Self::new(SmartSerialConfig {
            baud_rate,
            vid: Some(vid.into()),
            pid: Some(pid.into()),
            ..Default::default()
        })
    }

    /// Create an engine from a full configuration
    pub fn new(config: SmartSerialConfig) -> Self {
        let transport = SerialTransport::new(
            &config.port_name,
            SerialSettings {
                baud_rate: config.baud_rate,
                read_timeout: Duration::from_millis(config.read_timeout_ms),
            },
        );
        Self::with_transport(Box::new(transport), config, None)
    }

    /// Create an engine with the open-state handler registered before the
    /// worker starts, so the very first transition is observed.
    pub fn new_with_on_open(
        config: SmartSerialConfig,
        on_open: impl FnMut(bool) + Send + 'static,
    ) -> Self {
        let transport = SerialTransport::new(
            &config.port_name,
            SerialSettings {
                baud_rate: config.baud_rate,
                read_timeout: Duration::from_millis(config.read_timeout_ms),
            },
        );
        Self::with_transport(Box::new(transport), config, Some(Box::new(on_open)))
    }

    /// Create an engine over a caller-supplied transport
    pub fn with_transport(
        mut transport: Box<dyn Transport>,
        config: SmartSerialConfig,
        on_open: Option<OnOpenHandle>,
    ) -> Self {
        transport.set_timeout(Duration::from_millis(config.read_timeout_ms));
        let controller = Arc::new(ConnectionController::new(
            transport,
            &config.port_name,
            config.filter(),
        ));
        if let Some(handle) = on_open {
            controller.set_on_open_handle(handle);
        }

        let running = Arc::new(AtomicBool::new(true));
        let monitor = MonitorLoop::new(
            controller.clone(),
            DeviceResolver::default(),
            running.clone(),
            Duration::from_millis(config.check_interval_ms),
        );
        let worker = std::thread::Builder::new()
            .name("smartserial-monitor".to_string())
            .spawn(move || monitor.run())
            .expect("failed to spawn monitor thread");

        Self {
            controller,
            running,
            monitor: Some(worker),
        }
    }

    /// Register the read handler. Fires on the worker thread, once per
    /// successful read; the slice is only valid for the call.
    pub fn set_on_read_handle(&self, handle: impl FnMut(&[u8]) + Send + 'static) {
        self.controller.set_on_read_handle(Box::new(handle));
    }

    /// Register the open-state handler. Edge-triggered: fires once per
    /// actual open/closed transition.
    pub fn set_on_open_handle(&self, handle: impl FnMut(bool) + Send + 'static) {
        self.controller.set_on_open_handle(Box::new(handle));
    }

    /// Write all of `data`.
    ///
    /// Returns `true` only when every byte was handed to the transport.
    /// Returns `false` without touching the transport when closed. A failed
    /// write is never retried across calls.
    pub fn write(&self, data: impl AsRef<[u8]>) -> bool {
        self.controller.write(data.as_ref())
    }

    /// Change the desired port name. No-op when unchanged or when the line
    /// is already open on that port; otherwise an open line is closed
    /// (firing the open-state handler) and reopened under the new name by
    /// the worker.
    pub fn set_port_name(&self, name: &str) {
        self.controller.set_port_name(name);
    }

    /// The currently desired port name
    pub fn port_name(&self) -> String {
        self.controller.port_name()
    }

    /// Set the USB VID/PID autodetection filter (hex strings, any case)
    pub fn set_vid_pid(&self, vid: &str, pid: &str) {
        self.controller.set_vid_pid(vid, pid);
    }

    /// The cached open state, updated edge-wise by the engine
    pub fn is_open(&self) -> bool {
        self.controller.is_open()
    }

    /// Resume automatic (re)connection
    pub fn open(&self) {
        self.controller.open();
    }

    /// Stop reconnection attempts and close the line if open
    pub fn close(&self) {
        self.controller.close();
    }
}

impl Drop for SmartSerial {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.monitor.take() {
            if worker.join().is_err() {
                tracing::error!("monitor thread panicked");
            }
        }
    }
}
