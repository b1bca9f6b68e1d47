//! Connection management engine
//!
//! The pieces behind [`crate::SmartSerial`]: the controller that owns the
//! transport and the locking discipline, the callback registry, and the
//! monitor loop that drives reconnection and read delivery from a dedicated
//! worker thread.

pub mod callbacks;
pub mod controller;
pub(crate) mod monitor;

pub use callbacks::{OnOpenHandle, OnReadHandle};
pub use controller::ConnectionController;
