//! Monitor loop
//!
//! The single worker thread behind every engine instance. It is the only
//! driver of reconnection and read delivery: closed transports are resolved
//! and reopened, open transports are polled for data, and received bytes are
//! handed to the read handler. Transport errors never escape the loop; they
//! force the transport closed and the cycle starts over after a backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connection::controller::ConnectionController;
use crate::discovery::DeviceResolver;
use crate::error::Result;

/// Read buffer capacity per iteration
pub(crate) const READ_BUFFER_SIZE: usize = 1024;

/// Poll delay while reads are arriving
const FAST_POLL: Duration = Duration::from_millis(1);

/// Poll delay while the line is quiet
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// How long after a successful read the fast poll interval is kept
const FAST_WINDOW: Duration = Duration::from_secs(1);

/// Whether the last successful read is recent enough for fast polling
fn in_fast_window(last_read: Option<Instant>) -> bool {
    last_read.is_some_and(|at| at.elapsed() < FAST_WINDOW)
}

pub(crate) struct MonitorLoop {
    controller: Arc<ConnectionController>,
    resolver: DeviceResolver,
    running: Arc<AtomicBool>,
    /// Backoff between reconnect attempts and after transport errors
    check_interval: Duration,
}

impl MonitorLoop {
    pub(crate) fn new(
        controller: Arc<ConnectionController>,
        resolver: DeviceResolver,
        running: Arc<AtomicBool>,
        check_interval: Duration,
    ) -> Self {
        Self {
            controller,
            resolver,
            running,
            check_interval,
        }
    }

    /// Run until the lifetime flag clears, then close the transport.
    pub(crate) fn run(self) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut last_read: Option<Instant> = None;

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.iterate(&mut buf, &mut last_read) {
                tracing::debug!("monitor error: {}", e);
                std::thread::sleep(self.check_interval);
                self.controller.force_close();
                self.controller.update_open_state();
            }
        }

        self.controller.force_close();
        self.controller.update_open_state();
    }

    fn iterate(&self, buf: &mut [u8], last_read: &mut Option<Instant>) -> Result<()> {
        if !self.controller.is_open() {
            self.try_reconnect()?;
            return Ok(());
        }

        let available = match self.controller.poll_available()? {
            Some(n) => n,
            // Closed by a caller between checks; next iteration resolves.
            None => return Ok(()),
        };

        if available == 0 {
            // Both waits happen with the transport lock released, so a
            // caller's write never queues behind a quiet line.
            let delay = if in_fast_window(*last_read) {
                FAST_POLL
            } else {
                IDLE_WAIT
            };
            std::thread::sleep(delay);
            return Ok(());
        }

        let n = self.controller.read_chunk(buf)?;
        if n > 0 {
            *last_read = Some(Instant::now());
            // Transport lock already released; the handler runs under the
            // settings lock only.
            self.controller.dispatch_read(&buf[..n]);
        }
        Ok(())
    }

    fn try_reconnect(&self) -> Result<()> {
        let candidate = self.controller.resolve_port(&self.resolver)?;
        let port = match (candidate, self.controller.auto_open_intent()) {
            (Some(port), true) => port,
            _ => {
                std::thread::sleep(self.check_interval);
                return Ok(());
            }
        };

        tracing::debug!("try open: {}", port);
        self.controller.try_open(&port)?;
        self.controller.update_open_state();
        Ok(())
    }
}
