//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the radio module
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Timeout: no response from radio module")]
    Timeout,

    #[error("Framing error: unexpected byte {byte:#04x} while {state}")]
    FramingError { state: &'static str, byte: u8 },

    #[error("Buffer overflow: message exceeds {capacity} bytes")]
    BufferOverflow { capacity: usize },

    #[error("Protocol mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch { expected: String, actual: String },

    #[error("Resource exhausted: capacity of {capacity} entries exceeded")]
    ResourceExhausted { capacity: usize },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Invalid timeout: {0} seconds is out of range")]
    InvalidTimeout(u32),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Transport error: {0}")]
    TransportError(#[from] std::io::Error),
}

impl ProtocolError {
    pub(crate) fn mismatch(expected: impl Into<String>, actual: impl std::fmt::Display) -> Self {
        ProtocolError::ProtocolMismatch {
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    /// True for errors caused by the module staying silent
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Timeout)
    }
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        ProtocolError::TransportError(e.into())
    }
}
