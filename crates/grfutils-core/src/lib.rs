//! # grfutils Core Library
//!
//! Protocol engine for serial radio modules that bridge to wireless smoke
//! detectors.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Framing and parsing of the module's `STX`/`ETX` protocol
//! - Decomposition of long timeouts into tty-sized waits
//! - Group and device scans, telemetry read-out, and signal control
//! - Decoding of bit-packed detector registers
//!
//! ## Example
//!
//! ```rust,ignore
//! use grfutils_core::{config::RadioConfig, protocol::{RadioSession, SerialTransport}};
//!
//! let config = RadioConfig::default();
//! let port = SerialTransport::open(&config.device, config.baud_rate)?;
//!
//! let record = RadioSession::scoped(port, config.timeout_secs, |session| {
//!     session.query_version()?;
//!     session.read_data("ab12")
//! })?;
//! println!("{}", record);
//! ```

pub mod config;
pub mod device;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RadioConfig;
    pub use crate::device::{AlertCounters, DeviceList, DeviceRecord};
    pub use crate::protocol::{GroupId, ProtocolError, RadioSession, SerialTransport, Transport};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
