//! Hardware-independent core library for ember
//!
//! This crate contains all platform-agnostic logic for the ember gas/flame
//! alarm monitor: the calibrated analog reader, averaging sampler, alarm
//! evaluation, output driving, the periodic monitor loop, the shared sensor
//! snapshot and the status report served to the network collaborator.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod config;
pub mod error;
pub mod monitor;
pub mod outputs;
pub mod sensors;
pub mod snapshot;
pub mod status;

pub use alarm::AlarmEvaluator;
pub use config::MonitorConfig;
pub use error::{AppError, ConfigError, ConfigurationFault, HardwareFault, PeripheralInitFault};
pub use monitor::{CycleSchedule, Monitor};
pub use outputs::AlarmOutputs;
pub use sensors::{AdcUnit, AnalogReader, AveragingSampler, CalibrationContext, Channel};
pub use snapshot::{SensorSnapshot, SnapshotCell};
