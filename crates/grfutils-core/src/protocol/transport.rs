//! Transport abstraction
//!
//! The protocol engine only needs a handful of primitives from the
//! underlying link. Anything implementing [`Transport`] can carry a
//! [`RadioSession`](super::RadioSession): the real serial port, or the
//! scripted [`MockTransport`](super::MockTransport) used in tests.

use std::io;

/// Byte-level link to the radio module
pub trait Transport {
    /// Write an exact byte sequence
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Write a single unframed control byte
    fn write_control(&mut self, byte: u8) -> io::Result<()>;

    /// Set the wait applied to each [`read_byte`](Transport::read_byte) call.
    ///
    /// `unit_deciseconds == 0` makes reads block until a byte arrives.
    fn set_wait(&mut self, unit_deciseconds: u8) -> io::Result<()>;

    /// Read one byte, or `None` if nothing arrived within one wait unit
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Drop pending data and release the underlying port
    fn release(&mut self) -> io::Result<()>;
}

macro_rules! forward_transport {
    ($($ty:ty),+) => {$(
        impl<T: Transport + ?Sized> Transport for $ty {
            fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
                (**self).write_frame(bytes)
            }

            fn write_control(&mut self, byte: u8) -> io::Result<()> {
                (**self).write_control(byte)
            }

            fn set_wait(&mut self, unit_deciseconds: u8) -> io::Result<()> {
                (**self).set_wait(unit_deciseconds)
            }

            fn read_byte(&mut self) -> io::Result<Option<u8>> {
                (**self).read_byte()
            }

            fn release(&mut self) -> io::Result<()> {
                (**self).release()
            }
        }
    )+};
}

// Borrowing a transport lets callers inspect it after the session is gone.
forward_transport!(&mut T, Box<T>);
