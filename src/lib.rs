//! # smartserial
//!
//! A resilient client for a single serial line that may be hot-plugged,
//! disconnected, or renamed by the host OS. The engine finds the device
//! (by explicit port name or USB VID/PID identity), opens it, delivers
//! received bytes to a callback, and automatically reopens after a
//! disconnect. Applications never manage reconnection themselves.
//!
//! ## Architecture
//!
//! - [`transport`] — the [`Transport`] trait plus the `serialport`-backed
//!   implementation and device enumeration
//! - [`discovery`] — VID/PID device resolution over platform hardware ids
//! - [`connection`] — the controller, the two-lock discipline and the
//!   monitor worker
//! - [`SmartSerial`] — the public engine facade
//!
//! ## Quick start
//!
//! ```no_run
//! use smartserial::SmartSerial;
//!
//! // Find the device by USB identity wherever the OS enumerates it.
//! let engine = SmartSerial::from_vid_pid("04d8", "000a", 115_200);
//! engine.set_on_read_handle(|data| {
//!     println!("received {} bytes", data.len());
//! });
//! engine.write("hello");
//! ```

pub mod connection;
pub mod discovery;
pub mod error;
pub mod transport;

mod client;

pub use client::{SmartSerial, SmartSerialConfig};
pub use connection::{ConnectionController, OnOpenHandle, OnReadHandle};
pub use discovery::{DeviceResolver, UsbIdentity, VidPidFilter};
pub use error::{Result, TransportError};
pub use transport::serial::{list_devices, SerialTransport};
pub use transport::{DeviceDescriptor, SerialSettings, Transport, HARDWARE_ID_NONE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
