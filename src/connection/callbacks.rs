//! User callback storage and dispatch
//!
//! Handlers live inside the settings lock and are only ever invoked while it
//! is held. Each handler sits in its own `RefCell` so a read handler may
//! trigger an open-state notification (e.g. by calling `close`) without a
//! borrow conflict. An open-state edge produced by the open handler itself
//! (an open handler calling `close`, say) is queued and delivered as soon as
//! the in-flight call returns, so no transition is ever lost.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Handler invoked with each chunk of received bytes.
///
/// Fires on the engine's worker thread. The slice is valid only for the
/// duration of the call.
pub type OnReadHandle = Box<dyn FnMut(&[u8]) + Send>;

/// Handler invoked on each open-state transition.
///
/// Edge-triggered: fires once per actual `Closed -> Open` or
/// `Open -> Closed` flip, from whichever thread observes it.
pub type OnOpenHandle = Box<dyn FnMut(bool) + Send>;

/// Holds the two optional user handlers
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    on_read: RefCell<Option<OnReadHandle>>,
    on_open: RefCell<Option<OnOpenHandle>>,
    /// True while the open handler is mid-call on this thread
    open_in_flight: Cell<bool>,
    /// Edges observed while the open handler was mid-call
    pending_open: RefCell<VecDeque<bool>>,
}

impl CallbackRegistry {
    pub(crate) fn set_on_read(&self, handle: OnReadHandle) {
        *self.on_read.borrow_mut() = Some(handle);
    }

    pub(crate) fn set_on_open(&self, handle: OnOpenHandle) {
        *self.on_open.borrow_mut() = Some(handle);
    }

    /// Invoke the read handler, if any
    pub(crate) fn notify_read(&self, data: &[u8]) {
        match self.on_read.try_borrow_mut() {
            Ok(mut slot) => {
                if let Some(handle) = slot.as_mut() {
                    handle(data);
                }
            }
            Err(_) => tracing::debug!("read handler re-entered, notification dropped"),
        }
    }

    /// Invoke the open-state handler, if any.
    ///
    /// The handler is taken out of its slot for the duration of the call, so
    /// its body may call back into the engine. An edge that call produces is
    /// queued and delivered once the outer call returns, in order.
    pub(crate) fn notify_open(&self, open: bool) {
        if self.open_in_flight.get() {
            self.pending_open.borrow_mut().push_back(open);
            return;
        }
        let taken = self.on_open.borrow_mut().take();
        let Some(mut handle) = taken else {
            return;
        };
        self.open_in_flight.set(true);
        handle(open);
        loop {
            let next = self.pending_open.borrow_mut().pop_front();
            match next {
                Some(edge) => handle(edge),
                None => break,
            }
        }
        self.open_in_flight.set(false);
        // The handler may have installed a replacement while it was out.
        let mut slot = self.on_open.borrow_mut();
        if slot.is_none() {
            *slot = Some(handle);
        }
    }
}
