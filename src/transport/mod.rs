//! Transport abstraction over one physical serial line
//!
//! The engine drives all I/O through the [`Transport`] trait so that the
//! connection machinery can be exercised against test doubles. The shipped
//! implementation is [`serial::SerialTransport`], backed by the `serialport`
//! crate.

pub mod serial;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sentinel hardware id reported for ports with no identity information.
pub const HARDWARE_ID_NONE: &str = "n/a";

/// Information about an enumerated serial device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Human-readable description (e.g., "USB Serial Port")
    pub description: String,

    /// Platform-dependent hardware identity text, possibly embedding a
    /// USB VID/PID pair. `"n/a"` when no identity is available.
    pub hardware_id: String,
}

impl DeviceDescriptor {
    /// Create a descriptor with no hardware identity
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            hardware_id: HARDWARE_ID_NONE.to_string(),
        }
    }

    /// Set the hardware identity text
    pub fn with_hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = hardware_id.into();
        self
    }

    /// Check whether this descriptor carries any identity information
    pub fn has_hardware_id(&self) -> bool {
        self.hardware_id != HARDWARE_ID_NONE
    }
}

/// Line parameters for a serial transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Baud rate in bits per second
    pub baud_rate: u32,

    /// Blocking read timeout. Also bounds how quickly a silent disconnect
    /// is noticed by the monitor.
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(1000),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Low-level serial transport interface
///
/// One instance represents one physical line. Implementations report
/// failures as [`crate::TransportError`]; any I/O operation may fail at any
/// time if the device disappears.
pub trait Transport: Send {
    /// Open the currently configured port
    fn open(&mut self) -> Result<()>;

    /// Close the port. Closing an already-closed port is a no-op.
    fn close(&mut self);

    /// Whether the port is currently open
    fn is_open(&self) -> bool;

    /// Number of bytes waiting to be read
    fn available_bytes(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes, returning the count actually read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write up to `data.len()` bytes, returning the count actually written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Change the port name. Takes effect on the next open.
    fn set_port(&mut self, name: &str);

    /// The currently configured port name
    fn port(&self) -> String;

    /// Change the blocking read timeout
    fn set_timeout(&mut self, timeout: Duration);

    /// Enumerate serial devices present on the system
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>>;
}
