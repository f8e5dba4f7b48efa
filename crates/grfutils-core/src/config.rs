//! Radio configuration
//!
//! Settings needed to open a session on a real serial port.

use serde::{Deserialize, Serialize};

use crate::protocol::{
    split_timeout, ProtocolError, RadioSession, SerialTransport, DEFAULT_BAUD_RATE,
    DEFAULT_TIMEOUT_SECS,
};

/// Default device path of the radio module
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// Where and how to reach the radio module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Serial device path
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-operation wait in seconds, 0 waits forever
    pub timeout_secs: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RadioConfig {
    /// Check the settings without touching the port
    pub fn validate(&self) -> Result<(), ProtocolError> {
        split_timeout(self.timeout_secs)?;
        Ok(())
    }

    /// Open the serial port and start a session on it
    pub fn open(&self) -> Result<RadioSession<SerialTransport>, ProtocolError> {
        self.validate()?;
        let transport = SerialTransport::open(&self.device, self.baud_rate)?;
        RadioSession::open(transport, self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_config_default() {
        let config = RadioConfig::default();
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_timeout_fails_before_opening() {
        let config = RadioConfig {
            device: "/dev/grfutils-does-not-exist".to_string(),
            timeout_secs: 100_000,
            ..RadioConfig::default()
        };
        assert!(matches!(
            config.open(),
            Err(ProtocolError::InvalidTimeout(100_000))
        ));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: RadioConfig = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.device, DEFAULT_DEVICE);
    }
}
