//! Shared test double: a scripted in-memory transport.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smartserial::{DeviceDescriptor, Result, Transport, TransportError};

/// Shared, scriptable state behind a [`MockTransport`]
#[derive(Default)]
pub struct MockState {
    /// Devices reported by enumeration
    pub devices: Vec<DeviceDescriptor>,
    /// Whether `open` succeeds
    pub can_open: bool,
    /// Force read-side operations to fail
    pub fail_reads: bool,
    /// Force write operations to fail
    pub fail_writes: bool,
    /// Next writes report zero bytes written
    pub write_zero: bool,
    /// Cap on bytes accepted per write call
    pub write_chunk: Option<usize>,
    /// Bytes the fake device has "sent"
    pub rx: VecDeque<u8>,
    /// Bytes written by the engine
    pub written: Vec<u8>,
    pub port: String,
    pub open: bool,
    pub open_calls: usize,
    pub write_calls: usize,
    pub set_port_calls: usize,
}

impl MockState {
    /// Queue bytes for the engine to read
    pub fn push_rx(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport plus a handle for scripting it from the test
    pub fn new() -> (Box<dyn Transport>, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState {
            can_open: true,
            ..Default::default()
        }));
        (
            Box::new(MockTransport {
                state: state.clone(),
            }),
            state,
        )
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.open_calls += 1;
        if !state.can_open {
            return Err(TransportError::FailedToOpen {
                port: state.port.clone(),
                reason: "scripted open failure".to_string(),
            });
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn available_bytes(&mut self) -> Result<usize> {
        let state = self.state.lock();
        if state.fail_reads {
            return Err(TransportError::NotOpen);
        }
        Ok(state.rx.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.fail_reads {
            return Err(TransportError::NotOpen);
        }
        let n = buf.len().min(state.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.rx.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        state.write_calls += 1;
        if state.fail_writes {
            return Err(TransportError::NotOpen);
        }
        if state.write_zero {
            return Ok(0);
        }
        let n = state.write_chunk.unwrap_or(data.len()).min(data.len());
        state.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn set_port(&mut self, name: &str) {
        let mut state = self.state.lock();
        state.set_port_calls += 1;
        state.port = name.to_string();
    }

    fn port(&self) -> String {
        self.state.lock().port.clone()
    }

    fn set_timeout(&mut self, _timeout: Duration) {}

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(self.state.lock().devices.clone())
    }
}

/// A USB device descriptor in the posix hardware-id format
pub fn usb_device(port: &str, vid: &str, pid: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(port, "USB Serial Device")
        .with_hardware_id(format!("USB VID:PID={}:{} SNR=0001", vid, pid))
}

/// Engine config with short intervals for tests
pub fn fast_config() -> smartserial::SmartSerialConfig {
    smartserial::SmartSerialConfig {
        read_timeout_ms: 50,
        check_interval_ms: 20,
        ..Default::default()
    }
}

/// Poll `predicate` until it holds or ~2 s elapse
pub fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
