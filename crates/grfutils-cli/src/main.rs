//! grfctl: talk to wireless smoke detectors through a serial radio module

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grfutils_core::config::{RadioConfig, DEFAULT_DEVICE};
use grfutils_core::device::{DeviceList, DeviceRecord};
use grfutils_core::protocol::{GroupId, RadioSession, SerialTransport, DEFAULT_TIMEOUT_SECS};

const SCAN_GROUPS_HINT: &str = "    Please activate sending the group ID at your smoke detector by
    pressing the \"programming\" button until the programming LED
    flashes once per second. Afterwards press the smoke detector
    button until you hear a beep sound!";

#[derive(Debug, Parser)]
#[command(name = "grfctl", version, about = "Control wireless smoke detectors via a radio module")]
struct Cli {
    /// Serial device of the radio module
    #[arg(short, long, env = "GRF_DEVICE", default_value = DEFAULT_DEVICE)]
    device: String,

    /// Seconds to wait for each answer, 0 waits forever
    #[arg(short, long, env = "GRF_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u32,

    /// Log level; RUST_LOG takes precedence
    #[arg(short, long, value_enum, default_value_t = Verbosity::Warn)]
    verbose: Verbosity,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the program version
    ShowVersion,
    /// Show the firmware version of the radio module
    ShowFirmwareVersion,
    /// Scan for detector groups
    ScanGroups,
    /// Scan for all devices in the given group
    ScanDevices { group: String },
    /// Read the data of the given device
    RequestData { device: String },
    /// Activate the acoustic signal of the given device
    ActivateSignal { device: String },
    /// Deactivate the acoustic signal of the given device
    DeactivateSignal { device: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    /// Debug output including every byte on the wire
    Debugio,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Debugio => "trace",
        }
    }
}

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Serialize)]
struct FirmwareReport<'a> {
    firmware_version: &'a str,
}

#[derive(Debug, Serialize)]
struct GroupReport<'a> {
    group: Option<&'a GroupId>,
}

#[derive(Debug, Serialize)]
struct DevicesReport<'a> {
    group: &'a str,
    devices: &'a DeviceList,
}

#[derive(Debug, Serialize)]
struct SignalReport<'a> {
    device: &'a str,
    signal: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open the radio, query its firmware version, then run `f`
fn with_radio<R>(
    config: &RadioConfig,
    f: impl FnOnce(&mut RadioSession<SerialTransport>) -> Result<R>,
) -> Result<R> {
    config
        .validate()
        .with_context(|| format!("Invalid timeout of {} seconds", config.timeout_secs))?;
    let transport = SerialTransport::open(&config.device, config.baud_rate)
        .context("Initialization of radio device failed")?;

    RadioSession::scoped(transport, config.timeout_secs, |session| {
        info!(
            "Using device {} with a {} second timeout...",
            session.transport().name(),
            config.timeout_secs
        );
        session
            .query_version()
            .context("Initializing communication failed")?;
        f(session)
    })
}

fn switch_signal(config: &RadioConfig, device: &str, on: bool, json: bool) -> Result<()> {
    let action = if on { "Activating" } else { "Deactivating" };
    with_radio(config, |s| {
        s.switch_signal(device, on)
            .with_context(|| format!("{} signal of device {} failed", action, device))
    })?;
    if json {
        print_json(&SignalReport { device, signal: on })?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = RadioConfig {
        device: cli.device,
        timeout_secs: cli.timeout,
        ..RadioConfig::default()
    };
    let json = cli.json;

    match cli.command {
        Commands::ShowVersion => {
            println!("grfctl version {}", grfutils_core::VERSION);
        }
        Commands::ShowFirmwareVersion => {
            let version = with_radio(&config, |s| {
                Ok(s.firmware_version().unwrap_or_default().to_string())
            })?;
            if json {
                return print_json(&FirmwareReport {
                    firmware_version: &version,
                });
            }
            println!("Firmware version: {}", version);
        }
        Commands::ScanGroups => {
            if !json {
                println!("Scanning group IDs...");
                println!("{}", SCAN_GROUPS_HINT);
            }
            let group = with_radio(&config, |s| {
                s.scan_groups().context("Scanning group IDs failed")
            })?;
            if json {
                return print_json(&GroupReport {
                    group: group.as_ref(),
                });
            }
            match group {
                Some(group) => {
                    println!("Found the following groups:");
                    println!("    {}", group);
                }
                None => println!("No group found!"),
            }
        }
        Commands::ScanDevices { group } => {
            let devices = with_radio(&config, |s| {
                s.scan_devices(&group)
                    .with_context(|| format!("Scanning devices of group {} failed", group))
            })?;
            if json {
                return print_json(&DevicesReport {
                    group: &group,
                    devices: &devices,
                });
            }
            if devices.is_empty() {
                println!("No devices found!");
            } else {
                println!("Found {} devices in group {}:", devices.len(), group);
                for id in &devices {
                    println!("    {}", id);
                }
            }
        }
        Commands::RequestData { device } => {
            let record: DeviceRecord = with_radio(&config, |s| {
                s.read_data(&device)
                    .with_context(|| format!("Requesting data of device {} failed", device))
            })?;
            if json {
                return print_json(&record);
            }
            println!("Data of {}:", device);
            println!("{}", record);
        }
        Commands::ActivateSignal { device } => switch_signal(&config, &device, true, json)?,
        Commands::DeactivateSignal { device } => switch_signal(&config, &device, false, json)?,
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
