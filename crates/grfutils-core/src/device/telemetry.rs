//! Telemetry decoding
//!
//! During a read-out the module streams one frame per register, formatted
//! as `KKKK:VVVVVVVV` (16-bit hex key, 32-bit hex value). Most registers
//! pack several fields into the value:
//!
//! | key         | bits 31-24    | bits 23-16     | bits 15-8        | bits 7-0           |
//! |-------------|---------------|----------------|------------------|--------------------|
//! | 0x04        | aux (hi)      | aux (lo)       | local smoke      | pollution          |
//! | 0x05        | battery (hi)  | battery (lo)   | temperature 1    | temperature 2      |
//! | 0x06        | local temp.   | local test     | remote wired     | remote wireless    |
//! | 0x07        | -             | -              | remote wired tst | remote wireless tst|
//!
//! Registers 0x02, 0x14-0x3b and 0x64 have no known meaning and are kept raw.

use tracing::{trace, warn};

use super::record::{DeviceRecord, UNKNOWN_REGISTER_COUNT, UNKNOWN_REGISTER_FIRST};
use crate::protocol::ProtocolError;

const KEY_SERIAL_NUMBER: u16 = 0x0001;
const KEY_REGISTER_02: u16 = 0x0002;
const KEY_OPERATION_TIME: u16 = 0x0003;
const KEY_SMOKE_CHAMBER: u16 = 0x0004;
const KEY_BATTERY_TEMPERATURE: u16 = 0x0005;
const KEY_ALERTS: u16 = 0x0006;
const KEY_TEST_ALERTS: u16 = 0x0007;
const KEY_REGISTER_64: u16 = 0x0064;
const KEY_UNKNOWN_LAST: u16 = UNKNOWN_REGISTER_FIRST + UNKNOWN_REGISTER_COUNT as u16 - 1;

/// One `key:value` telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub key: u16,
    pub value: u32,
}

impl Register {
    /// Parse the exact `%04x:%08x` form
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::DecodeError(format!("malformed register {:?}", payload));

        let (key, value) = payload.split_once(':').ok_or_else(malformed)?;
        if key.len() != 4 || value.len() != 8 {
            return Err(malformed());
        }
        // from_str_radix accepts a leading '+', the wire format does not
        if !key.bytes().chain(value.bytes()).all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }

        Ok(Self {
            key: u16::from_str_radix(key, 16).map_err(|_| malformed())?,
            value: u32::from_str_radix(value, 16).map_err(|_| malformed())?,
        })
    }
}

/// Extract `width` bits starting at bit `shift`
#[inline]
fn bits(value: u32, shift: u32, width: u32) -> u32 {
    (value >> shift) & ((1u32 << width) - 1)
}

#[inline]
fn byte(value: u32, shift: u32) -> u8 {
    bits(value, shift, 8) as u8
}

fn temperature(raw: u8) -> f64 {
    f64::from(raw) * 0.50 - 20.0
}

/// Decode one telemetry payload into `record`.
///
/// Unknown keys are logged and skipped; only malformed payloads fail.
pub fn apply(record: &mut DeviceRecord, payload: &str) -> Result<(), ProtocolError> {
    let register = Register::parse(payload)?;
    trace!("register {:#06x} = {:#010x}", register.key, register.value);
    apply_register(record, register);
    Ok(())
}

/// Store a parsed register in `record`. Returns false for unknown keys.
pub fn apply_register(record: &mut DeviceRecord, register: Register) -> bool {
    let v = register.value;
    match register.key {
        KEY_SERIAL_NUMBER => record.serial_number = v,
        KEY_REGISTER_02 => record.register_02 = v,
        KEY_OPERATION_TIME => record.operation_time = f64::from(v) * 0.25,
        KEY_SMOKE_CHAMBER => {
            record.smoke_chamber_aux = bits(v, 16, 16) as u16;
            record.alerts.local_smoke = byte(v, 8);
            record.smoke_chamber_pollution = byte(v, 0);
        }
        KEY_BATTERY_TEMPERATURE => {
            record.battery_voltage = f64::from(bits(v, 16, 16)) * 9.184 / 500.0;
            record.temperature1 = temperature(byte(v, 8));
            record.temperature2 = temperature(byte(v, 0));
        }
        KEY_ALERTS => {
            record.alerts.local_temperature = byte(v, 24);
            record.alerts.local_test = byte(v, 16);
            record.alerts.remote_wired = byte(v, 8);
            record.alerts.remote_wireless = byte(v, 0);
        }
        KEY_TEST_ALERTS => {
            if bits(v, 16, 16) != 0 {
                trace!("register 0x07 upper half is {:#06x}", bits(v, 16, 16));
            }
            record.alerts.remote_wired_test = byte(v, 8);
            record.alerts.remote_wireless_test = byte(v, 0);
        }
        UNKNOWN_REGISTER_FIRST..=KEY_UNKNOWN_LAST => {
            record.set_unknown_register(register.key, v);
        }
        KEY_REGISTER_64 => record.register_64 = v,
        key => {
            warn!("Unknown register {:#06x} = {:#010x}, dropped", key, v);
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(payloads: &[&str]) -> DeviceRecord {
        let mut record = DeviceRecord::new("ab12");
        for p in payloads {
            apply(&mut record, p).unwrap();
        }
        record
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(
            Register::parse("0005:23F05A32").unwrap(),
            Register { key: 5, value: 0x23f0_5a32 }
        );
        assert_eq!(
            Register::parse("003b:ffffffff").unwrap(),
            Register { key: 0x3b, value: u32::MAX }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for p in ["", "0005", "0005:", "005:23F05A32", "0005:23F05A3", "0005-23F05A32", "0005:+3F05A32", "zzzz:00000000", "0005:23F05A32:"] {
            assert!(
                matches!(Register::parse(p), Err(ProtocolError::DecodeError(_))),
                "payload {:?} should be rejected",
                p
            );
        }
    }

    #[test]
    fn test_serial_and_operation_time() {
        let record = decode(&["0001:0001e240", "0003:00000007"]);
        assert_eq!(record.serial_number, 123456);
        assert_eq!(record.operation_time, 1.75);
    }

    #[test]
    fn test_smoke_chamber() {
        let record = decode(&["0004:abcd0342"]);
        assert_eq!(record.smoke_chamber_aux, 0xabcd);
        assert_eq!(record.alerts.local_smoke, 3);
        assert_eq!(record.smoke_chamber_pollution, 0x42);
    }

    #[test]
    fn test_battery_and_temperatures() {
        let record = decode(&["0005:23F05A32"]);
        let expected_voltage = f64::from(0x23f0u32) * 9.184 / 500.0;
        assert!((record.battery_voltage - expected_voltage).abs() < 1e-9);
        assert!((record.battery_voltage - 168.9856).abs() < 1e-9);
        assert_eq!(record.temperature1, 25.0);
        assert_eq!(record.temperature2, 5.0);
    }

    #[test]
    fn test_alert_counters() {
        let record = decode(&["0006:01020304", "0007:00000506"]);
        assert_eq!(
            record.alerts,
            crate::device::AlertCounters {
                local_smoke: 0,
                local_temperature: 1,
                local_test: 2,
                remote_wired: 3,
                remote_wireless: 4,
                remote_wired_test: 5,
                remote_wireless_test: 6,
            }
        );
    }

    #[test]
    fn test_opaque_registers() {
        let record = decode(&["0002:deadbeef", "0014:00000001", "003b:0000002a", "0064:cafebabe"]);
        assert_eq!(record.register_02, 0xdead_beef);
        assert_eq!(record.unknown_register(0x14), Some(1));
        assert_eq!(record.unknown_register(0x3b), Some(42));
        assert_eq!(record.register_64, 0xcafe_babe);
    }

    #[test]
    fn test_unknown_key_is_dropped() {
        let mut record = DeviceRecord::new("ab12");
        let before = record.clone();
        assert!(!apply_register(&mut record, Register { key: 0x3c, value: 1 }));
        assert!(!apply_register(&mut record, Register { key: 0x0008, value: 1 }));
        assert!(apply(&mut record, "0013:00000001").is_ok());
        assert_eq!(record, before);
    }
}
