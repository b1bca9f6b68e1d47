//! Platform-specific USB identity extraction
//!
//! Hardware id strings are free text whose format differs per platform:
//!
//! - macOS / Linux: `USB VID:PID=1234:5740 SNR=8D8842A64955`
//! - Windows: `USB\VID_1234&PID_5740&REV_0200`
//!
//! The matching rule is isolated behind [`IdentityParser`] so the resolver's
//! control flow stays platform-agnostic.

use std::sync::OnceLock;

use regex::Regex;

/// A USB vendor/product identity pair, lower-cased hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbIdentity {
    /// Vendor id, e.g. "04d8"
    pub vid: String,
    /// Product id, e.g. "000a"
    pub pid: String,
}

impl UsbIdentity {
    /// Create an identity, lower-casing both components
    pub fn new(vid: impl AsRef<str>, pid: impl AsRef<str>) -> Self {
        Self {
            vid: vid.as_ref().to_ascii_lowercase(),
            pid: pid.as_ref().to_ascii_lowercase(),
        }
    }
}

/// Extracts a USB identity from platform hardware id text
pub trait IdentityParser: Send + Sync {
    /// Parse the hardware id, returning `None` when no identity is embedded
    fn parse(&self, hardware_id: &str) -> Option<UsbIdentity>;
}

/// Parser for the `VID:PID=xxxx:yyyy` format used on macOS and Linux
pub struct PosixIdentityParser;

impl IdentityParser for PosixIdentityParser {
    fn parse(&self, hardware_id: &str) -> Option<UsbIdentity> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"VID:PID=([0-9a-fA-F]+):([0-9a-fA-F]+)")
                .expect("invalid posix identity pattern")
        });
        let caps = re.captures(hardware_id)?;
        Some(UsbIdentity::new(&caps[1], &caps[2]))
    }
}

/// Parser for the `VID_xxxx&PID_yyyy&` format used on Windows
pub struct WindowsIdentityParser;

impl IdentityParser for WindowsIdentityParser {
    fn parse(&self, hardware_id: &str) -> Option<UsbIdentity> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"VID_([0-9a-fA-F]+)&PID_([0-9a-fA-F]+)")
                .expect("invalid windows identity pattern")
        });
        let caps = re.captures(hardware_id)?;
        Some(UsbIdentity::new(&caps[1], &caps[2]))
    }
}

/// The identity parser for the current platform family
pub fn platform_parser() -> &'static dyn IdentityParser {
    #[cfg(windows)]
    {
        static PARSER: WindowsIdentityParser = WindowsIdentityParser;
        &PARSER
    }
    #[cfg(not(windows))]
    {
        static PARSER: PosixIdentityParser = PosixIdentityParser;
        &PARSER
    }
}
