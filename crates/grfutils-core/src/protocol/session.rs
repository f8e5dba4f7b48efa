//! Radio session management
//!
//! Drives the high-level operations as ordered request/response exchanges
//! with the radio module.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    commands::{validate_identifier, AcquisitionCode, Command},
    hex, split_timeout, ControlByte, FrameParser, Message, Payload, ProtocolError, TimeoutSplit,
    Transport,
};
use crate::device::{telemetry, DeviceList, DeviceRecord};

/// Group id announced by a detector in programming mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open conversation with the radio module.
///
/// Owns the transport for its whole lifetime. [`close`](RadioSession::close)
/// releases it explicitly; dropping the session releases it as well.
pub struct RadioSession<T: Transport> {
    transport: T,
    /// Requested wait in deciseconds
    timeout_user: u32,
    split: TimeoutSplit,
    firmware_version: Option<String>,
    parser: FrameParser,
    released: bool,
}

impl<T: Transport> RadioSession<T> {
    /// Take ownership of `transport` and apply the timeout.
    pub fn open(mut transport: T, timeout_secs: u32) -> Result<Self, ProtocolError> {
        let split = split_timeout(timeout_secs)?;
        transport.set_wait(split.unit)?;
        info!(
            "Radio session opened ({} s timeout as {} x {} 1/10s)",
            timeout_secs, split.repeats, split.unit
        );

        Ok(Self {
            transport,
            timeout_user: timeout_secs * 10,
            split,
            firmware_version: None,
            parser: FrameParser::new(),
            released: false,
        })
    }

    /// Open a session, run `f`, and close the session on every exit path.
    ///
    /// An error from `f` takes precedence over an error while closing.
    pub fn scoped<R, E, F>(transport: T, timeout_secs: u32, f: F) -> Result<R, E>
    where
        E: From<ProtocolError>,
        F: FnOnce(&mut Self) -> Result<R, E>,
    {
        let mut session = Self::open(transport, timeout_secs)?;
        let result = f(&mut session);
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Release the transport
    pub fn close(mut self) -> Result<(), ProtocolError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), ProtocolError> {
        if !self.released {
            self.released = true;
            self.transport.release()?;
        }
        Ok(())
    }

    /// Requested wait in deciseconds
    pub fn timeout_user(&self) -> u32 {
        self.timeout_user
    }

    pub fn timeout_split(&self) -> TimeoutSplit {
        self.split
    }

    /// Firmware version, once [`query_version`](RadioSession::query_version) succeeded
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send(&mut self, command: Command<'_>) -> Result<(), ProtocolError> {
        let bytes = command.encode()?;
        debug!("send: {} ({})", command, hex(&bytes));
        self.transport.write_frame(&bytes)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Message, ProtocolError> {
        self.parser.read_message(&mut self.transport, self.split)
    }

    fn expect_ack(&mut self) -> Result<(), ProtocolError> {
        match self.receive()? {
            Message::Control(ControlByte::Ack) => Ok(()),
            m if m.is_timeout() => Err(ProtocolError::Timeout),
            other => Err(ProtocolError::mismatch("ACK", other)),
        }
    }

    fn expect_answer(&mut self, expected: Payload) -> Result<(), ProtocolError> {
        match self.receive()? {
            Message::Payload(p) if p == expected => Ok(()),
            m if m.is_timeout() => Err(ProtocolError::Timeout),
            other => Err(ProtocolError::mismatch(
                format!("payload {:?}", expected.as_str()),
                other,
            )),
        }
    }

    /// Put the module into command mode: `NUL`, `01TESTA1`, expect `ACK`
    pub fn handshake(&mut self) -> Result<(), ProtocolError> {
        let nul = ControlByte::Nul.as_byte();
        debug!("sctl: {:#04x}", nul);
        self.transport.write_control(nul)?;
        self.send(Command::EnterTestMode)?;
        self.expect_ack()
    }

    /// Ask the module for its firmware version and remember it
    pub fn query_version(&mut self) -> Result<&str, ProtocolError> {
        self.handshake()?;
        self.send(Command::RequestVersion)?;
        match self.receive()? {
            Message::Payload(Payload::Version(version)) => {
                info!("Firmware version: {}", version);
                Ok(self.firmware_version.insert(version).as_str())
            }
            m if m.is_timeout() => Err(ProtocolError::Timeout),
            other => Err(ProtocolError::mismatch("firmware version", other)),
        }
    }

    /// Wait for a detector in programming mode to announce its group.
    ///
    /// Returns `None` if no detector spoke up within the timeout.
    pub fn scan_groups(&mut self) -> Result<Option<GroupId>, ProtocolError> {
        self.handshake()?;
        self.send(Command::ScanGroup)?;
        self.expect_ack()?;
        match self.receive()? {
            Message::Payload(Payload::Data(id)) => Ok(Some(GroupId(id))),
            m if m.is_timeout() => {
                info!("No group found");
                Ok(None)
            }
            other => Err(ProtocolError::mismatch("group id", other)),
        }
    }

    /// List the devices belonging to `group`
    pub fn scan_devices(&mut self, group: impl AsRef<str>) -> Result<DeviceList, ProtocolError> {
        let group = group.as_ref();
        validate_identifier(group)?;

        self.handshake()?;
        self.send(Command::ScanDevices { group })?;
        self.expect_ack()?;
        self.expect_answer(Payload::Recording)?;

        let mut devices = DeviceList::new();
        loop {
            match self.receive()? {
                Message::Payload(Payload::Data(id)) => {
                    debug!("Found device {} in group {}", id, group);
                    devices.push(id)?;
                }
                m if m.is_timeout() => break,
                other => return Err(ProtocolError::mismatch("device id", other)),
            }
        }

        info!("Found {} devices in group {}", devices.len(), group);
        Ok(devices)
    }

    /// Read out all registers of a device
    pub fn read_data(&mut self, device: &str) -> Result<DeviceRecord, ProtocolError> {
        validate_identifier(device)?;
        let mut record = DeviceRecord::new(device);

        self.handshake()?;
        self.start_acquisition(device)?;

        self.send(Command::DataAcquisition {
            device,
            code: AcquisitionCode::SendData,
        })?;
        self.expect_ack()?;

        // No end marker: the stream is over when the module falls silent.
        loop {
            match self.receive()? {
                Message::Payload(Payload::Data(text)) => telemetry::apply(&mut record, &text)?,
                m if m.is_timeout() => break,
                other => return Err(ProtocolError::mismatch("telemetry register", other)),
            }
        }

        self.acquisition(device, AcquisitionCode::Stop)?;
        Ok(record)
    }

    /// Switch the acoustic signal of a device on or off
    pub fn switch_signal(&mut self, device: &str, on: bool) -> Result<(), ProtocolError> {
        validate_identifier(device)?;

        self.handshake()?;
        self.start_acquisition(device)?;

        let code = if on {
            AcquisitionCode::SignalOn
        } else {
            AcquisitionCode::SignalOff
        };
        self.acquisition(device, code)?;
        self.acquisition(device, AcquisitionCode::Stop)
    }

    fn acquisition(&mut self, device: &str, code: AcquisitionCode) -> Result<(), ProtocolError> {
        self.send(Command::DataAcquisition { device, code })?;
        self.expect_ack()?;
        if code.expects_done() {
            self.expect_answer(Payload::Done)?;
        }
        Ok(())
    }

    /// Start acquisition, entering diagnosis mode once if the device
    /// does not answer. A second timeout is returned to the caller.
    fn start_acquisition(&mut self, device: &str) -> Result<(), ProtocolError> {
        match self.acquisition(device, AcquisitionCode::Start) {
            Err(e) if e.is_timeout() => {
                info!("Device {} not in diagnosis mode, starting diagnosis...", device);
                self.start_diagnosis(device)?;
                self.acquisition(device, AcquisitionCode::Start)
            }
            other => other,
        }
    }

    fn start_diagnosis(&mut self, device: &str) -> Result<(), ProtocolError> {
        self.send(Command::StartDiagnosis { device })?;
        self.expect_ack()?;
        self.expect_answer(Payload::Recording)?;
        self.expect_answer(Payload::Done)
    }
}

impl<T: Transport> Drop for RadioSession<T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Releasing the radio transport failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::Written;
    use crate::protocol::{MockTransport, ACK, ETX, NUL, STX};

    fn session(mock: &mut MockTransport) -> RadioSession<&mut MockTransport> {
        RadioSession::open(mock, 1).unwrap()
    }

    #[test]
    fn test_open_applies_wait_unit() {
        let mut mock = MockTransport::new();
        let s = RadioSession::open(&mut mock, 60).unwrap();
        assert_eq!(s.timeout_user(), 600);
        assert_eq!(s.timeout_split(), TimeoutSplit { unit: 200, repeats: 3 });
        drop(s);
        assert_eq!(mock.waits(), &[200]);
    }

    #[test]
    fn test_open_rejects_out_of_range_timeout() {
        let mut mock = MockTransport::new();
        assert!(matches!(
            RadioSession::open(&mut mock, 10_000),
            Err(ProtocolError::InvalidTimeout(10_000))
        ));
    }

    #[test]
    fn test_handshake_bytes() {
        let mut mock = MockTransport::new().ack();
        session(&mut mock).handshake().unwrap();
        let mut frame = vec![STX];
        frame.extend_from_slice(b"01TESTA1");
        frame.push(ETX);
        assert_eq!(
            mock.written(),
            &[Written::Control(NUL), Written::Frame(frame)]
        );
    }

    #[test]
    fn test_handshake_timeout_and_nak_differ() {
        let mut mock = MockTransport::new();
        assert!(matches!(
            session(&mut mock).handshake(),
            Err(ProtocolError::Timeout)
        ));

        let mut mock = MockTransport::new().nak();
        assert!(matches!(
            session(&mut mock).handshake(),
            Err(ProtocolError::ProtocolMismatch { .. })
        ));
    }

    #[test]
    fn test_timeout_literal_counts_as_timeout() {
        let mut mock = MockTransport::new().frame("Timeout");
        assert!(matches!(
            session(&mut mock).handshake(),
            Err(ProtocolError::Timeout)
        ));
    }

    #[test]
    fn test_query_version() {
        let mut mock = MockTransport::new().ack().frame("GI_RM_V00.70");
        let mut s = session(&mut mock);
        assert_eq!(s.query_version().unwrap(), "GI_RM_V00.70");
        assert_eq!(s.firmware_version(), Some("GI_RM_V00.70"));
    }

    #[test]
    fn test_query_version_rejects_other_payload() {
        let mut mock = MockTransport::new().ack().frame("hello");
        let mut s = session(&mut mock);
        assert!(matches!(
            s.query_version(),
            Err(ProtocolError::ProtocolMismatch { .. })
        ));
        assert_eq!(s.firmware_version(), None);
    }

    #[test]
    fn test_scan_groups_payload_instead_of_ack() {
        let mut mock = MockTransport::new().ack().frame("5678");
        assert!(matches!(
            session(&mut mock).scan_groups(),
            Err(ProtocolError::ProtocolMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_device_id_sends_nothing() {
        let mut mock = MockTransport::new();
        assert!(matches!(
            session(&mut mock).read_data("a:b"),
            Err(ProtocolError::InvalidIdentifier(_))
        ));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_close_releases_transport() {
        let mut mock = MockTransport::new();
        session(&mut mock).close().unwrap();
        assert!(mock.is_released());

        let mut mock = MockTransport::new();
        drop(session(&mut mock));
        assert!(mock.is_released());
    }

    #[test]
    fn test_scoped_closes_on_error() {
        let mut mock = MockTransport::new().bytes(&[ACK]);
        let result: Result<(), ProtocolError> =
            RadioSession::scoped(&mut mock, 1, |s| {
                s.handshake()?;
                s.handshake()
            });
        assert!(matches!(result, Err(ProtocolError::Timeout)));
        assert!(mock.is_released());
    }

    #[test]
    fn test_group_id_display() {
        let id = GroupId::new("5678");
        assert_eq!(id.to_string(), "5678");
        assert_eq!(id.as_ref(), "5678");
    }
}
