//! Device discovery
//!
//! Resolves which port the engine should open next: an explicitly configured
//! port name wins outright; otherwise enumerated devices are matched against
//! a configured USB VID/PID filter. With neither configured the resolver
//! refuses to guess.

pub mod matcher;

use crate::error::Result;
use crate::transport::Transport;

pub use matcher::{
    platform_parser, IdentityParser, PosixIdentityParser, UsbIdentity, WindowsIdentityParser,
};

/// A USB vendor/product identity filter, stored lower-cased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VidPidFilter {
    identity: UsbIdentity,
}

impl VidPidFilter {
    /// Create a filter from hex id strings; matching is case-insensitive
    pub fn new(vid: impl AsRef<str>, pid: impl AsRef<str>) -> Self {
        Self {
            identity: UsbIdentity::new(vid, pid),
        }
    }

    /// Check whether an extracted identity matches this filter
    pub fn matches(&self, identity: &UsbIdentity) -> bool {
        self.identity == *identity
    }
}

/// Picks the port the engine should try to open
pub struct DeviceResolver {
    parser: &'static dyn IdentityParser,
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new(matcher::platform_parser())
    }
}

impl DeviceResolver {
    /// Create a resolver with a specific identity parser
    pub fn new(parser: &'static dyn IdentityParser) -> Self {
        Self { parser }
    }

    /// Resolve a candidate port.
    ///
    /// - A non-empty `explicit_port` is returned as-is, without enumeration.
    /// - Without a filter, autodetection is refused (`Ok(None)`).
    /// - Otherwise the first enumerated device whose hardware id yields a
    ///   matching identity wins. Devices without identity are skipped.
    pub fn resolve(
        &self,
        explicit_port: &str,
        filter: Option<&VidPidFilter>,
        transport: &dyn Transport,
    ) -> Result<Option<String>> {
        if !explicit_port.is_empty() {
            return Ok(Some(explicit_port.to_string()));
        }

        let Some(filter) = filter else {
            return Ok(None);
        };

        for device in transport.enumerate_devices()? {
            if !device.has_hardware_id() {
                continue;
            }
            if let Some(identity) = self.parser.parse(&device.hardware_id) {
                if filter.matches(&identity) {
                    tracing::debug!(
                        "matched device {} (vid:{} pid:{})",
                        device.port_name,
                        identity.vid,
                        identity.pid
                    );
                    return Ok(Some(device.port_name));
                }
            }
        }

        Ok(None)
    }
}
