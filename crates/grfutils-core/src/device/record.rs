//! Decoded device data

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// First register id stored in the unknown register table
pub const UNKNOWN_REGISTER_FIRST: u16 = 0x14;

/// Number of registers in the unknown register table (0x14..=0x3b)
pub const UNKNOWN_REGISTER_COUNT: usize = 40;

/// Alarm counters kept by a detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounters {
    pub local_smoke: u8,
    pub local_temperature: u8,
    pub local_test: u8,
    pub remote_wired: u8,
    pub remote_wireless: u8,
    pub remote_wired_test: u8,
    pub remote_wireless_test: u8,
}

/// Everything read out of one detector.
///
/// Fields start at zero and are filled in as telemetry frames arrive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    /// 4-character device id
    pub id: String,
    /// When the read-out started
    pub received_at: DateTime<Utc>,
    pub serial_number: u32,
    /// Cumulative operation time in seconds
    pub operation_time: f64,
    /// Smoke chamber pollution, 0-255
    pub smoke_chamber_pollution: u8,
    /// Upper half of register 0x04, meaning unknown
    pub smoke_chamber_aux: u16,
    /// Volts
    pub battery_voltage: f64,
    /// Degrees Celsius
    pub temperature1: f64,
    /// Degrees Celsius
    pub temperature2: f64,
    pub alerts: AlertCounters,
    /// Raw register 0x02
    pub register_02: u32,
    /// Raw register 0x64
    pub register_64: u32,
    unknown_registers: Vec<u32>,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_timestamp(id, Utc::now())
    }

    pub fn with_timestamp(id: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            received_at,
            serial_number: 0,
            operation_time: 0.0,
            smoke_chamber_pollution: 0,
            smoke_chamber_aux: 0,
            battery_voltage: 0.0,
            temperature1: 0.0,
            temperature2: 0.0,
            alerts: AlertCounters::default(),
            register_02: 0,
            register_64: 0,
            unknown_registers: vec![0; UNKNOWN_REGISTER_COUNT],
        }
    }

    /// Raw value of an unidentified register, by register id
    pub fn unknown_register(&self, register: u16) -> Option<u32> {
        let index = register.checked_sub(UNKNOWN_REGISTER_FIRST)? as usize;
        self.unknown_registers.get(index).copied()
    }

    /// All unidentified registers, indexed by `register - 0x14`
    pub fn unknown_registers(&self) -> &[u32] {
        &self.unknown_registers
    }

    /// Returns false if `register` is outside the table
    pub(crate) fn set_unknown_register(&mut self, register: u16, value: u32) -> bool {
        let slot = register
            .checked_sub(UNKNOWN_REGISTER_FIRST)
            .and_then(|i| self.unknown_registers.get_mut(i as usize));
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.alerts;
        writeln!(f, "    Device id:                  {}", self.id)?;
        writeln!(f, "    Received at:                {}", self.received_at.to_rfc3339())?;
        writeln!(f, "    Serial number:              {}", self.serial_number)?;
        writeln!(
            f,
            "    Operation time:             {:.2} s ({:.1} days)",
            self.operation_time,
            self.operation_time / 86_400.0
        )?;
        writeln!(f, "    Smoke chamber pollution:    {}", self.smoke_chamber_pollution)?;
        writeln!(f, "    Smoke chamber (aux):        0x{:04x}", self.smoke_chamber_aux)?;
        writeln!(f, "    Battery voltage:            {:.3} V", self.battery_voltage)?;
        writeln!(f, "    Temperature 1:              {:.1} °C", self.temperature1)?;
        writeln!(f, "    Temperature 2:              {:.1} °C", self.temperature2)?;
        writeln!(f, "    Alerts (local smoke):       {}", a.local_smoke)?;
        writeln!(f, "    Alerts (local temperature): {}", a.local_temperature)?;
        writeln!(f, "    Alerts (local test):        {}", a.local_test)?;
        writeln!(f, "    Alerts (remote wired):      {}", a.remote_wired)?;
        writeln!(f, "    Alerts (remote wireless):   {}", a.remote_wireless)?;
        writeln!(f, "    Alerts (remote wired test): {}", a.remote_wired_test)?;
        writeln!(f, "    Alerts (remote wl. test):   {}", a.remote_wireless_test)?;
        writeln!(f, "    Register 0x02:              0x{:08x}", self.register_02)?;
        for (i, value) in self.unknown_registers.iter().enumerate() {
            writeln!(
                f,
                "    Register 0x{:02x}:              0x{:08x}",
                usize::from(UNKNOWN_REGISTER_FIRST) + i,
                value
            )?;
        }
        write!(f, "    Register 0x64:              0x{:08x}", self.register_64)
    }
}
