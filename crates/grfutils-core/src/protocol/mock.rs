//! Scripted in-memory transport
//!
//! Lets tests play the radio module's side of a conversation without a
//! serial port: queue up what the module "sends", run an operation, then
//! inspect what the session wrote.

use std::collections::VecDeque;
use std::io;

use super::{Transport, ACK, ETX, NAK, STX};

/// One scripted read result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// A byte arrives within the wait unit
    Byte(u8),
    /// A full wait unit passes without data
    Silence,
}

/// Everything the session sent, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    Control(u8),
    Frame(Vec<u8>),
}

/// A [`Transport`] that replays a script
#[derive(Debug, Default)]
pub struct MockTransport {
    script: VecDeque<ReadEvent>,
    written: Vec<Written>,
    waits: Vec<u8>,
    released: bool,
    fail_on_write: bool,
}

impl MockTransport {
    /// Creates an empty mock; reads report silence once the script runs out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.script
            .extend(bytes.iter().copied().map(ReadEvent::Byte));
        self
    }

    /// Queue a single `ACK`
    pub fn ack(self) -> Self {
        self.bytes(&[ACK])
    }

    /// Queue a single `NAK`
    pub fn nak(self) -> Self {
        self.bytes(&[NAK])
    }

    /// Queue `STX <text> ETX`
    pub fn frame(self, text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 2);
        bytes.push(STX);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(ETX);
        self.bytes(&bytes)
    }

    /// Queue `n` empty wait units
    pub fn silence(mut self, n: usize) -> Self {
        self.script
            .extend(std::iter::repeat(ReadEvent::Silence).take(n));
        self
    }

    /// Make every subsequent write fail with a broken pipe
    pub fn failing_writes(mut self) -> Self {
        self.fail_on_write = true;
        self
    }

    /// Everything written so far
    pub fn written(&self) -> &[Written] {
        &self.written
    }

    /// Payloads of written frames as text, with `STX`/`ETX` stripped
    pub fn written_payloads(&self) -> Vec<String> {
        self.written
            .iter()
            .filter_map(|w| match w {
                Written::Frame(bytes) if bytes.len() >= 2 => {
                    Some(String::from_utf8_lossy(&bytes[1..bytes.len() - 1]).into_owned())
                }
                _ => None,
            })
            .collect()
    }

    /// Wait units applied via `set_wait`, in order
    pub fn waits(&self) -> &[u8] {
        &self.waits
    }

    /// Script entries not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn check_write(&self) -> io::Result<()> {
        if self.fail_on_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        if self.released {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "mock released"));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.check_write()?;
        self.written.push(Written::Frame(bytes.to_vec()));
        Ok(())
    }

    fn write_control(&mut self, byte: u8) -> io::Result<()> {
        self.check_write()?;
        self.written.push(Written::Control(byte));
        Ok(())
    }

    fn set_wait(&mut self, unit_deciseconds: u8) -> io::Result<()> {
        self.waits.push(unit_deciseconds);
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.script.pop_front() {
            Some(ReadEvent::Byte(b)) => Ok(Some(b)),
            Some(ReadEvent::Silence) | None => Ok(None),
        }
    }

    fn release(&mut self) -> io::Result<()> {
        self.released = true;
        Ok(())
    }
}
