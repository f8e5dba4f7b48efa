//! Radio Module Protocol
//!
//! Implements the framed text protocol spoken by the serial radio module
//! that bridges to wireless smoke detectors.
//!
//! Messages are either single control bytes (`NUL`, `ACK`, `NAK`) or ASCII
//! payloads wrapped between `STX` and `ETX`.

pub mod commands;
mod error;
pub mod frame;
pub mod mock;
pub mod serial;
mod session;
pub mod timeout;
pub mod transport;

pub use commands::{AcquisitionCode, Command};
pub use error::ProtocolError;
pub use frame::{ControlByte, FrameParser, Message, Payload};
pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use session::{GroupId, RadioSession};
pub use timeout::{split_timeout, TimeoutSplit};
pub use transport::Transport;

/// Null control byte, also sent ahead of the handshake
pub const NUL: u8 = 0x00;
/// Start of a framed message
pub const STX: u8 = 0x02;
/// End of a framed message
pub const ETX: u8 = 0x03;
/// Positive acknowledgement
pub const ACK: u8 = 0x06;
/// Continuation of a previous message, ignored between frames
pub const CONT: u8 = 0x0a;
/// Negative acknowledgement
pub const NAK: u8 = 0x15;

/// Baud rate of the radio module
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default user timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// Largest accepted user timeout in seconds
pub const MAX_TIMEOUT_SECS: u32 = 600;

/// Maximum size of a single frame, `STX` and `ETX` included
pub const MAX_MESSAGE_SIZE: usize = 255;

/// Maximum payload between `STX` and `ETX`
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - 2;

/// Space separated hex dump for wire logging
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
