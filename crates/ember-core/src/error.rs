//! Fault taxonomy for ember
//!
//! Each fault class has a fixed severity:
//! - [`ConfigurationFault`]: calibration unavailable, downgrades to raw codes
//! - [`HardwareFault`]: a conversion failed, aborts one monitor cycle
//! - [`PeripheralInitFault`]: conversion unit or network missing, aborts startup
//! - [`ConfigError`]: an invalid configuration option, aborts startup

use thiserror_no_std::Error;

use crate::sensors::Channel;

/// Calibration scheme could not be constructed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationFault {
    #[error("No calibration scheme for attenuation {attenuation:?} at {bit_width} bits")]
    UnsupportedScheme {
        attenuation: crate::sensors::Attenuation,
        bit_width: u8,
    },
    #[error("Calibration reference point missing: {details}")]
    MissingReference { details: &'static str },
    #[error("Calibration reference point invalid: code={code}, mv={mv}")]
    InvalidReference { code: u16, mv: u16 },
}

/// A conversion could not complete during sampling.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    #[error("Conversion failed on {channel:?} channel: {details}")]
    ConversionFailed {
        channel: Channel,
        details: &'static str,
    },
    #[error("Code {code} out of range for {channel:?} channel (max {max})")]
    CodeOutOfRange { channel: Channel, code: u16, max: u16 },
}

impl HardwareFault {
    /// Channel the fault was observed on
    pub const fn channel(&self) -> Channel {
        match self {
            Self::ConversionFailed { channel, .. } | Self::CodeOutOfRange { channel, .. } => {
                *channel
            }
        }
    }
}

/// A peripheral needed at startup could not be acquired.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralInitFault {
    #[error("Conversion unit unavailable: {details}")]
    ConversionUnit { details: &'static str },
    #[error("Network bring-up failed: {details}")]
    Network { details: &'static str },
}

/// An invalid configuration option.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown configuration option")]
    UnknownOption,
    #[error("Option {option} has an unparsable value")]
    InvalidValue { option: &'static str },
    #[error("Option {option} is out of range: {details}")]
    OutOfRange {
        option: &'static str,
        details: &'static str,
    },
    #[error("Malformed override, expected key=value")]
    MalformedOverride,
}

/// Application-level error, covering everything that can abort startup.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(ConfigError),
    #[error("Peripheral init failed: {0}")]
    PeripheralInit(PeripheralInitFault),
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<PeripheralInitFault> for AppError {
    fn from(value: PeripheralInitFault) -> Self {
        Self::PeripheralInit(value)
    }
}
