//! Timeout decomposition
//!
//! The tty layer expresses read timeouts as a single byte of deciseconds,
//! so one wait can last at most 25.5 seconds. Reading out a detector can take
//! a minute, so longer waits are split into `unit * repeats` where `unit`
//! fits in that byte.

use super::{ProtocolError, MAX_TIMEOUT_SECS};
use tracing::debug;

/// Largest single wait the transport can express, in deciseconds
pub const MAX_WAIT_UNIT: u8 = 255;

/// Waits up to this many seconds are passed through in one unit
const DIRECT_LIMIT_SECS: u32 = 25;

/// A user timeout expressed in transport wait units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSplit {
    /// Wait per read attempt in deciseconds; 0 blocks until data arrives
    pub unit: u8,
    /// Number of read attempts
    pub repeats: u16,
}

impl TimeoutSplit {
    /// Block for at least one byte, no matter how long it takes
    pub const INFINITE: TimeoutSplit = TimeoutSplit { unit: 0, repeats: 1 };

    /// Total wait budget in deciseconds (0 for an infinite wait)
    pub fn total_deciseconds(&self) -> u32 {
        u32::from(self.unit) * u32::from(self.repeats)
    }

    pub fn is_infinite(&self) -> bool {
        self.unit == 0
    }
}

/// Split a timeout given in whole seconds.
///
/// `0` means "wait indefinitely" and is not decomposed. Timeouts above
/// [`MAX_TIMEOUT_SECS`] are rejected.
pub fn split_timeout(seconds: u32) -> Result<TimeoutSplit, ProtocolError> {
    if seconds > MAX_TIMEOUT_SECS {
        return Err(ProtocolError::InvalidTimeout(seconds));
    }
    if seconds == 0 {
        return Ok(TimeoutSplit::INFINITE);
    }

    let total = seconds * 10;
    let split = if seconds <= DIRECT_LIMIT_SECS {
        TimeoutSplit {
            unit: total as u8,
            repeats: 1,
        }
    } else {
        // Terminates at 10 at the latest since total is a multiple of 10.
        let unit = (1..=u32::from(MAX_WAIT_UNIT))
            .rev()
            .find(|d| total % d == 0)
            .unwrap_or(10);
        TimeoutSplit {
            unit: unit as u8,
            repeats: (total / unit) as u16,
        }
    };

    debug!(
        "timeout {} 1/10s --> {} 1/10s * {}",
        total, split.unit, split.repeats
    );
    Ok(split)
}
