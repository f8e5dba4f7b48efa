//! Protocol commands
//!
//! Defines the requests understood by the radio module and renders them
//! into framed bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ProtocolError, ETX, MAX_MESSAGE_SIZE, STX};

/// Sub-commands of the data acquisition (`DA`) request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionCode {
    /// Stream the recorded registers
    SendData,
    /// Sound the detector's signal
    SignalOn,
    /// Leave data acquisition
    Stop,
    /// Enter data acquisition
    Start,
    /// Silence the detector's signal
    SignalOff,
}

impl AcquisitionCode {
    /// Numeric code sent on the wire
    pub fn code(self) -> u8 {
        match self {
            AcquisitionCode::SendData => 1,
            AcquisitionCode::SignalOn => 3,
            AcquisitionCode::Stop => 4,
            AcquisitionCode::Start => 5,
            AcquisitionCode::SignalOff => 6,
        }
    }

    /// Whether the module confirms the sub-command with `Done`
    pub fn expects_done(self) -> bool {
        !matches!(self, AcquisitionCode::SendData)
    }
}

/// Requests sent to the radio module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Put the module into command mode (`01TESTA1`)
    EnterTestMode,
    /// Ask for the firmware version (`SV`)
    RequestVersion,
    /// Listen for a detector announcing its group (`GA`)
    ScanGroup,
    /// List the devices of a group (`GD:<group>`)
    ScanDevices { group: &'a str },
    /// Data acquisition control (`DA:<device>:<code>`)
    DataAcquisition {
        device: &'a str,
        code: AcquisitionCode,
    },
    /// Put a device into diagnosis mode (`SD:<device>`)
    StartDiagnosis { device: &'a str },
}

impl Command<'_> {
    /// Text between `STX` and `ETX`
    pub fn payload(&self) -> String {
        match self {
            Command::EnterTestMode => "01TESTA1".to_string(),
            Command::RequestVersion => "SV".to_string(),
            Command::ScanGroup => "GA".to_string(),
            Command::ScanDevices { group } => format!("GD:{}", group),
            Command::DataAcquisition { device, code } => {
                format!("DA:{}:{:02}", device, code.code())
            }
            Command::StartDiagnosis { device } => format!("SD:{}", device),
        }
    }

    fn identifier(&self) -> Option<&str> {
        match self {
            Command::ScanDevices { group } => Some(group),
            Command::DataAcquisition { device, .. } | Command::StartDiagnosis { device } => {
                Some(device)
            }
            _ => None,
        }
    }

    /// Render into `STX <payload> ETX`
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        self.encode_with_capacity(MAX_MESSAGE_SIZE)
    }

    /// Render into at most `capacity` bytes, markers included
    pub fn encode_with_capacity(&self, capacity: usize) -> Result<Vec<u8>, ProtocolError> {
        if let Some(id) = self.identifier() {
            validate_identifier(id)?;
        }

        let payload = self.payload();
        let size = payload.len() + 2;
        if size > capacity {
            return Err(ProtocolError::BufferOverflow { capacity });
        }

        let mut bytes = Vec::with_capacity(size);
        bytes.push(STX);
        bytes.extend_from_slice(payload.as_bytes());
        bytes.push(ETX);
        Ok(bytes)
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload())
    }
}

/// Group and device ids travel inside frames, so they must be plain
/// printable ASCII without separators.
pub fn validate_identifier(id: &str) -> Result<(), ProtocolError> {
    let valid = !id.is_empty() && id.bytes().all(|b| b.is_ascii_graphic() && b != b':');
    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidIdentifier(id.to_string()))
    }
}
