//! Smoke Detector Data
//!
//! Device records assembled from telemetry frames, and the bounded list of
//! devices found by a scan.

mod list;
mod record;
pub mod telemetry;

pub use list::DeviceList;
pub use record::{AlertCounters, DeviceRecord, UNKNOWN_REGISTER_COUNT, UNKNOWN_REGISTER_FIRST};
pub use telemetry::Register;
