//! Desktop simulator for the ember gas/flame alarm monitor.
//!
//! Runs the real `ember-core` monitor loop against a simulated conversion unit
//! and serves the same HTTP endpoints as the firmware, so the page and the
//! status contract can be exercised without hardware.
//!
//! # Usage
//!
//! ```text
//! ember-simulator [--listen ADDR] [--no-calibration] [--fault-every N] [key=value ...]
//! ```
//!
//! | Argument           | Effect                                              |
//! |--------------------|-----------------------------------------------------|
//! | `--listen ADDR`    | HTTP bind address (default `127.0.0.1:8080`)        |
//! | `--no-calibration` | Withhold the reference point, forcing raw codes     |
//! | `--fault-every N`  | Fail every Nth conversion to exercise fault paths   |
//! | `key=value`        | Monitor option override, e.g. `gas_threshold=450`   |
//!
//! The synthetic gas signal leaks every minute and the IR signal sees a
//! flame every 90 seconds, so the alarm toggles on its own.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;
use std::thread;
use std::time::Duration as StdDuration;

use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{error, info, warn};

use ember_core::error::{AppError, PeripheralInitFault};
use ember_core::sensors::{AdcSettings, CalibrationReference};
use ember_core::status::Response;
use ember_core::{
    AdcUnit, AlarmOutputs, AnalogReader, Channel, Monitor, MonitorConfig, SnapshotCell,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Reference point handed out when calibration is allowed
const SIMULATED_REFERENCE: CalibrationReference = CalibrationReference {
    code: 2482,
    mv: 2000,
};

const MAX_REQUEST_SIZE: usize = 1024;

/// Shared with the HTTP thread; the monitor is the only writer.
static SNAPSHOT: SnapshotCell = SnapshotCell::new();

// ---------------------------------------------------------------------------
// Simulated conversion unit
// ---------------------------------------------------------------------------

/// Generates gas and IR codes from slow waveforms plus deterministic noise.
struct SimulatedAdc {
    started: Instant,
    conversions: u64,
    fault_every: Option<u64>,
    calibrated: bool,
}

impl SimulatedAdc {
    fn new(fault_every: Option<u64>, calibrated: bool) -> Self {
        Self {
            started: Instant::now(),
            conversions: 0,
            fault_every,
            calibrated,
        }
    }

    /// Pseudo-random value in `[-1, 1]` from the conversion counter.
    fn noise(&self) -> f64 {
        let x = (self.conversions as f64 * 12.9898).sin() * 43_758.545_3;
        (x - x.floor()) * 2.0 - 1.0
    }

    fn code_at(&self, channel: Channel, t: f64) -> u16 {
        let value = match channel {
            Channel::Gas => {
                // Clean air around 150, a 12 s leak at the start of each minute
                let leak = if t % 60.0 < 12.0 { 380.0 } else { 0.0 };
                150.0 + 40.0 * (t / 7.0).sin() + leak + 8.0 * self.noise()
            }
            Channel::Infrared => {
                // Flame drags the output low for 8 s every 90 s
                let flame = if (t % 90.0) >= 40.0 && (t % 90.0) < 48.0 {
                    1_500.0
                } else {
                    0.0
                };
                4_050.0 - 25.0 * (t / 5.0).sin().abs() - flame + 6.0 * self.noise()
            }
        };
        value.clamp(0.0, 4_095.0) as u16
    }
}

impl AdcUnit for SimulatedAdc {
    type Error = &'static str;

    fn configure(
        &mut self,
        channel: Channel,
        settings: &AdcSettings,
    ) -> Result<(), PeripheralInitFault> {
        info!(
            "Simulated ADC{}: {} channel at {:?}, {} bits",
            settings.unit,
            channel.label(),
            settings.attenuation,
            settings.bit_width
        );
        Ok(())
    }

    fn read_raw(&mut self, channel: Channel) -> Result<u16, Self::Error> {
        self.conversions += 1;
        if let Some(n) = self.fault_every
            && self.conversions % n == 0
        {
            return Err("injected conversion fault");
        }

        let t = (Instant::now() - self.started).as_millis() as f64 / 1000.0;
        Ok(self.code_at(channel, t))
    }

    fn calibration_reference(&self, _settings: &AdcSettings) -> Option<CalibrationReference> {
        self.calibrated.then_some(SIMULATED_REFERENCE)
    }
}

// ---------------------------------------------------------------------------
// Output pins
// ---------------------------------------------------------------------------

/// Output pin that logs its level changes.
struct LoggingPin {
    name: &'static str,
    level: Option<bool>,
}

impl LoggingPin {
    const fn new(name: &'static str) -> Self {
        Self { name, level: None }
    }

    fn set(&mut self, high: bool) {
        if self.level != Some(high) {
            log::debug!("{} -> {}", self.name, if high { "HIGH" } else { "LOW" });
            self.level = Some(high);
        }
    }
}

impl ErrorType for LoggingPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for LoggingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator
// ---------------------------------------------------------------------------

fn serve_http(listener: TcpListener) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_connection(stream) {
                    warn!("HTTP connection error: {}", e);
                }
            }
            Err(e) => warn!("HTTP accept error: {}", e),
        }
    }
}

fn handle_connection(mut stream: TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(Some(StdDuration::from_secs(5)))?;

    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0;
    // Read until the end of headers or the buffer is full
    loop {
        let n = stream.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
        if total >= MAX_REQUEST_SIZE || buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    if total == 0 {
        return Ok(());
    }

    let response = Response::for_request(
        &buf[..total],
        &SNAPSHOT.latest(),
        Instant::now().as_millis(),
    );
    stream.write_all(response.head().as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

struct Args {
    listen: String,
    calibrated: bool,
    fault_every: Option<u64>,
    overrides: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        listen: DEFAULT_LISTEN_ADDR.to_string(),
        calibrated: true,
        fault_every: None,
        overrides: Vec::new(),
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" => {
                parsed.listen = args.next().ok_or("--listen needs an address")?;
            }
            "--no-calibration" => parsed.calibrated = false,
            "--fault-every" => {
                let n = args
                    .next()
                    .and_then(|n| n.parse::<u64>().ok())
                    .filter(|&n| n > 0)
                    .ok_or("--fault-every needs a positive integer")?;
                parsed.fault_every = Some(n);
            }
            _ if arg.contains('=') => parsed.overrides.push(arg),
            _ => return Err(format!("unrecognized argument: {}", arg)),
        }
    }

    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run(args: Args) -> Result<(), AppError> {
    let config = MonitorConfig::from_overrides(args.overrides.iter().map(String::as_str))?;

    let listener = TcpListener::bind(&args.listen).map_err(|e| {
        error!("Failed to bind {}: {}", args.listen, e);
        PeripheralInitFault::Network {
            details: "could not bind the HTTP listener",
        }
    })?;
    info!("Status page at http://{}/", args.listen);
    thread::spawn(move || serve_http(listener));

    let reader = AnalogReader::init(
        SimulatedAdc::new(args.fault_every, args.calibrated),
        config.adc,
    )?;
    let outputs = AlarmOutputs::new(
        LoggingPin::new("safe LED"),
        LoggingPin::new("danger LED"),
        LoggingPin::new("buzzer"),
    );
    let mut monitor = Monitor::new(&config, reader, outputs, &SNAPSHOT)?;

    embassy_futures::block_on(monitor.run(&mut embassy_time::Delay))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting ember simulator");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
