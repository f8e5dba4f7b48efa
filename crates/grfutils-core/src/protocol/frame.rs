//! Frame parsing
//!
//! Turns the raw byte stream coming from the radio module into discrete
//! [`Message`]s. The parser is a two-state machine:
//!
//! | state     | byte              | result                              |
//! |-----------|-------------------|-------------------------------------|
//! | `Idle`    | `NUL`/`ACK`/`NAK` | control message                     |
//! | `Idle`    | `STX`             | start collecting, go to `InFrame`   |
//! | `Idle`    | `CONT`            | ignored                             |
//! | `Idle`    | other             | framing error                       |
//! | `InFrame` | `ETX`             | payload message, back to `Idle`     |
//! | `InFrame` | `STX`             | missed `ETX`: drop partial, restart |
//! | `InFrame` | `NUL`/`ACK`/`NAK` | framing error                       |
//! | `InFrame` | other             | append                              |

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use super::{
    hex, ProtocolError, TimeoutSplit, Transport, ACK, CONT, ETX, MAX_PAYLOAD_SIZE, NAK, NUL, STX,
};

/// Prefix of the firmware version answer (`GI_RM_V00.70` on known modules)
pub const VERSION_PREFIX: &str = "GI_RM_V";

/// Literal answer the module sends when a device did not respond
pub const ANSWER_TIMEOUT: &str = "Timeout";

/// Literal answer indicating the module is recording
pub const ANSWER_REC: &str = "REC";

/// Literal answer indicating completion of a command
pub const ANSWER_DONE: &str = "Done";

/// Unframed single-byte messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlByte {
    Nul,
    Ack,
    Nak,
}

impl ControlByte {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            NUL => Some(ControlByte::Nul),
            ACK => Some(ControlByte::Ack),
            NAK => Some(ControlByte::Nak),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            ControlByte::Nul => NUL,
            ControlByte::Ack => ACK,
            ControlByte::Nak => NAK,
        }
    }
}

impl fmt::Display for ControlByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlByte::Nul => "NUL",
            ControlByte::Ack => "ACK",
            ControlByte::Nak => "NAK",
        };
        f.write_str(name)
    }
}

/// Content of a `STX ... ETX` frame, classified by the known literals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Firmware version string
    Version(String),
    /// `"Timeout"`
    Timeout,
    /// `"REC"`
    Recording,
    /// `"Done"`
    Done,
    /// Anything else: ids, telemetry registers
    Data(String),
}

impl Payload {
    pub fn classify(text: String) -> Self {
        match text.as_str() {
            ANSWER_TIMEOUT => Payload::Timeout,
            ANSWER_REC => Payload::Recording,
            ANSWER_DONE => Payload::Done,
            t if t.starts_with(VERSION_PREFIX) => Payload::Version(text),
            _ => Payload::Data(text),
        }
    }

    /// The payload text as it was received
    pub fn as_str(&self) -> &str {
        match self {
            Payload::Version(s) | Payload::Data(s) => s,
            Payload::Timeout => ANSWER_TIMEOUT,
            Payload::Recording => ANSWER_REC,
            Payload::Done => ANSWER_DONE,
        }
    }
}

/// One parsed unit from the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Control(ControlByte),
    Payload(Payload),
    /// Nothing arrived within the whole wait budget
    Timeout,
}

impl Message {
    /// Silence on the line, or the module reporting a timeout in text
    pub fn is_timeout(&self) -> bool {
        matches!(self, Message::Timeout | Message::Payload(Payload::Timeout))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Control(c) => write!(f, "{}", c),
            Message::Payload(p) => write!(f, "payload {:?}", p.as_str()),
            Message::Timeout => f.write_str("timeout"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    InFrame,
}

/// Incremental parser for the module's byte stream
#[derive(Debug)]
pub struct FrameParser {
    state: ParserState,
    buffer: Vec<u8>,
    capacity: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Parser accepting payloads up to [`MAX_PAYLOAD_SIZE`] bytes
    pub fn new() -> Self {
        Self::with_capacity(MAX_PAYLOAD_SIZE)
    }

    /// `capacity` bounds the payload, markers not included
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: ParserState::Idle,
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Forget any partially received frame
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.buffer.clear();
    }

    /// True while a frame has been started but not terminated
    pub fn in_frame(&self) -> bool {
        self.state == ParserState::InFrame
    }

    /// Feed one byte. Returns a message once one is complete.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Message>, ProtocolError> {
        match (self.state, byte) {
            (ParserState::Idle, NUL | ACK | NAK) => {
                Ok(ControlByte::from_byte(byte).map(Message::Control))
            }
            (ParserState::Idle, STX) => {
                self.buffer.clear();
                self.state = ParserState::InFrame;
                Ok(None)
            }
            (ParserState::Idle, CONT) => Ok(None),
            (ParserState::Idle, _) => Err(ProtocolError::FramingError {
                state: "waiting for a message",
                byte,
            }),
            (ParserState::InFrame, ETX) => self.finish().map(Some),
            (ParserState::InFrame, STX) => {
                warn!(
                    "Missed ETX! Incomplete message was: {:?}",
                    String::from_utf8_lossy(&self.buffer)
                );
                self.buffer.clear();
                Ok(None)
            }
            (ParserState::InFrame, NUL | ACK | NAK) => {
                self.reset();
                Err(ProtocolError::FramingError {
                    state: "inside a frame",
                    byte,
                })
            }
            (ParserState::InFrame, _) => {
                if self.buffer.len() >= self.capacity {
                    self.reset();
                    return Err(ProtocolError::BufferOverflow {
                        capacity: self.capacity,
                    });
                }
                self.buffer.push(byte);
                Ok(None)
            }
        }
    }

    fn finish(&mut self) -> Result<Message, ProtocolError> {
        let bytes = std::mem::take(&mut self.buffer);
        self.reset();
        let text = String::from_utf8(bytes)
            .map_err(|e| ProtocolError::DecodeError(format!("frame is not valid text: {}", e)))?;
        Ok(Message::Payload(Payload::classify(text)))
    }

    /// Read one message from `transport`, honouring the repeat count of `split`.
    ///
    /// Every empty wait unit consumes one attempt; when all attempts are
    /// used up the result is [`Message::Timeout`].
    pub fn read_message<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        split: TimeoutSplit,
    ) -> Result<Message, ProtocolError> {
        self.reset();
        let mut remaining = split.repeats.max(1);
        let mut raw = Vec::new();

        loop {
            match transport.read_byte()? {
                Some(byte) => {
                    raw.push(byte);
                    if let Some(message) = self.feed(byte)? {
                        debug!("recv: {} ({})", message, hex(&raw));
                        return Ok(message);
                    }
                }
                None => {
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                    debug!(
                        "read: No data received. Retrying {} more time(s)...",
                        remaining
                    );
                }
            }
        }

        if self.in_frame() {
            warn!(
                "Frame not terminated before timeout: {:?}",
                String::from_utf8_lossy(&self.buffer)
            );
        } else {
            debug!("recv: Timeout! No data received.");
        }
        self.reset();
        Ok(Message::Timeout)
    }
}
