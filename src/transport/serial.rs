//! Serial transport backed by the `serialport` crate
//!
//! Provides the real hardware implementation of [`Transport`] plus system
//! device enumeration with USB identity reporting.

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::transport::{DeviceDescriptor, SerialSettings, Transport};

/// Real serial transport using the `serialport` crate
///
/// The handle is `None` while the port is closed. Opening builds a fresh
/// native handle so a port that was unplugged and re-enumerated by the OS
/// can be reopened under the same (or a new) name.
pub struct SerialTransport {
    port_name: String,
    settings: SerialSettings,
    handle: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    /// Create a closed transport for the given port name and settings
    pub fn new(port_name: impl Into<String>, settings: SerialSettings) -> Self {
        Self {
            port_name: port_name.into(),
            settings,
            handle: None,
        }
    }

    fn handle_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.handle.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        if self.port_name.is_empty() {
            return Err(TransportError::InvalidConfig {
                reason: "port name is empty".to_string(),
            });
        }

        let builder = serialport::new(&self.port_name, self.settings.baud_rate)
            .timeout(self.settings.read_timeout);

        match builder.open() {
            Ok(port) => {
                self.handle = Some(port);
                Ok(())
            }
            Err(e) => {
                tracing::debug!("failed to open serial port {}: {}", self.port_name, e);
                Err(TransportError::FailedToOpen {
                    port: self.port_name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn close(&mut self) {
        // Dropping the native handle releases the port.
        self.handle = None;
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn available_bytes(&mut self) -> Result<usize> {
        let port = self.handle_mut()?;
        Ok(port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.handle_mut()?;
        Ok(port.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.handle_mut()?;
        Ok(port.write(data)?)
    }

    fn set_port(&mut self, name: &str) {
        self.port_name = name.to_string();
    }

    fn port(&self) -> String {
        self.port_name.clone()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.settings.read_timeout = timeout;
        if let Some(port) = self.handle.as_mut() {
            if let Err(e) = port.set_timeout(timeout) {
                tracing::warn!("failed to update read timeout: {}", e);
            }
        }
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        list_devices()
    }
}

/// List serial devices present on the system
///
/// Maps `serialport::available_ports()` into [`DeviceDescriptor`]s. USB
/// ports get a hardware id of the form `USB VID:PID=xxxx:yyyy SNR=...`;
/// ports without identity information report `"n/a"`.
pub fn list_devices() -> Result<Vec<DeviceDescriptor>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("failed to enumerate serial ports: {}", e);
        TransportError::enumeration(e.to_string())
    })?;

    Ok(ports
        .iter()
        .map(|port| {
            let descriptor = DeviceDescriptor::new(&port.port_name, describe_port(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let snr = usb.serial_number.as_deref().unwrap_or("");
                    descriptor.with_hardware_id(format!(
                        "USB VID:PID={:04x}:{:04x} SNR={}",
                        usb.vid, usb.pid, snr
                    ))
                }
                _ => descriptor,
            }
        })
        .collect())
}

/// Get a user-friendly description for a port
fn describe_port(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            format!(
                "USB {} {}",
                usb.manufacturer.as_deref().unwrap_or("Device"),
                usb.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}
