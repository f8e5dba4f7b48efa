//! Serial port handling
//!
//! Provides the [`Transport`] implementation backed by a real tty.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

use super::{ProtocolError, Transport};

/// Poll interval used while waiting indefinitely for a byte
const BLOCKING_POLL: Duration = Duration::from_secs(1);

/// Radio module attached to a serial port (8N1, raw, no flow control)
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    /// `None` blocks until a byte arrives
    wait: Option<Duration>,
}

impl SerialTransport {
    /// Open and configure the port
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, ProtocolError> {
        info!("Opening {}...", name);
        let mut port = serialport::new(name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(BLOCKING_POLL)
            .open()?;

        // Drop whatever the module sent before we were listening
        port.clear(serialport::ClearBuffer::All)?;
        debug!("{} configured at {} baud", name, baud_rate);

        Ok(Self {
            name: name.to_string(),
            port: Some(port),
            wait: Some(BLOCKING_POLL),
        })
    }

    /// Port name this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port released"))
    }
}

impl Transport for SerialTransport {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn write_control(&mut self, byte: u8) -> io::Result<()> {
        trace!("sctl: {:#04x}", byte);
        let port = self.port()?;
        port.write_all(&[byte])?;
        port.flush()
    }

    fn set_wait(&mut self, unit_deciseconds: u8) -> io::Result<()> {
        let wait = match unit_deciseconds {
            0 => None,
            n => Some(Duration::from_millis(u64::from(n) * 100)),
        };
        info!(
            "Setting timeout of {} to {:.1} seconds...",
            self.name,
            f32::from(unit_deciseconds) / 10.0
        );
        let port = self.port()?;
        port.set_timeout(wait.unwrap_or(BLOCKING_POLL))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.wait = wait;
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let blocking = self.wait.is_none();
        let port = self.port()?;
        let mut buf = [0u8; 1];
        loop {
            match port.read(&mut buf) {
                Ok(0) if blocking => continue,
                Ok(0) => return Ok(None),
                Ok(_) => {
                    trace!("read: {:#04x}", buf[0]);
                    return Ok(Some(buf[0]));
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    if blocking {
                        continue;
                    }
                    return Ok(None);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn release(&mut self) -> io::Result<()> {
        if let Some(port) = self.port.take() {
            info!("Closing communication at device {}", self.name);
            port.clear(serialport::ClearBuffer::All)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(())
    }
}
