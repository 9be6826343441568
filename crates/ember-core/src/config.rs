//! Startup configuration
//!
//! Defaults match the reference board. A handful of options can be
//! overridden with `key=value` strings (from the firmware's build-time
//! environment or the simulator's command line); the result is validated once
//! and is immutable afterwards.

use log::info;

use crate::error::ConfigError;
use crate::sensors::{AdcSettings, DEFAULT_INTER_SAMPLE_DELAY_MS, DEFAULT_SAMPLE_COUNT};

/// Reference input voltage at full scale, in millivolts
pub const FULL_SCALE_MV: u16 = 3300;

/// Largest 12-bit code
pub const FULL_SCALE_CODE: u16 = 4095;

pub const DEFAULT_GAS_THRESHOLD: u16 = 300;
pub const DEFAULT_IR_THRESHOLD: u16 = 3900;
pub const DEFAULT_CYCLE_PERIOD_MS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    /// Gas cutoff in raw codes
    pub gas_threshold: u16,
    /// IR cutoff in raw codes
    pub ir_threshold: u16,
    /// Numerator of the code-to-millivolt threshold rescaling
    pub full_scale_mv: u16,
    /// Denominator of the code-to-millivolt threshold rescaling
    pub full_scale_code: u16,
}

impl ThresholdConfig {
    pub const DEFAULT: Self = Self {
        gas_threshold: DEFAULT_GAS_THRESHOLD,
        ir_threshold: DEFAULT_IR_THRESHOLD,
        full_scale_mv: FULL_SCALE_MV,
        full_scale_code: FULL_SCALE_CODE,
    };

    /// Rescale a raw-code threshold to millivolts, truncating.
    pub const fn scale(&self, threshold: u16) -> u16 {
        (threshold as u32 * self.full_scale_mv as u32 / self.full_scale_code as u32) as u16
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything the monitor needs to know at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub adc: AdcSettings,
    pub thresholds: ThresholdConfig,
    pub sample_count: u16,
    pub inter_sample_delay_ms: u32,
    pub cycle_period_ms: u32,
}

impl MonitorConfig {
    pub const DEFAULT: Self = Self {
        adc: AdcSettings::DEFAULT,
        thresholds: ThresholdConfig::DEFAULT,
        sample_count: DEFAULT_SAMPLE_COUNT,
        inter_sample_delay_ms: DEFAULT_INTER_SAMPLE_DELAY_MS,
        cycle_period_ms: DEFAULT_CYCLE_PERIOD_MS,
    };

    /// Apply a single option by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key.trim() {
            "gas_threshold" => self.thresholds.gas_threshold = parse("gas_threshold", value)?,
            "ir_threshold" => self.thresholds.ir_threshold = parse("ir_threshold", value)?,
            "sample_count" => self.sample_count = parse("sample_count", value)?,
            "inter_sample_delay_ms" => {
                self.inter_sample_delay_ms = parse("inter_sample_delay_ms", value)?
            }
            "cycle_period_ms" => self.cycle_period_ms = parse("cycle_period_ms", value)?,
            _ => return Err(ConfigError::UnknownOption),
        }
        Ok(())
    }

    /// Apply a `key=value` override.
    pub fn apply_override(&mut self, entry: &str) -> Result<(), ConfigError> {
        let (key, value) = entry.split_once('=').ok_or(ConfigError::MalformedOverride)?;
        self.set(key, value)
    }

    /// Defaults plus every override, validated.
    pub fn from_overrides<'a, I>(overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut config = Self::DEFAULT;
        for entry in overrides {
            config.apply_override(entry)?;
        }
        config.validate()?;
        info!("{:?}", config);
        Ok(config)
    }

    /// Wall-clock time spent in the inter-sample delays of one cycle.
    /// Widened so no `u16 * u32` combination can overflow.
    pub const fn sampling_burst_ms(&self) -> u64 {
        // Two channels per cycle
        2 * self.sample_count as u64 * self.inter_sample_delay_ms as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(9..=12).contains(&self.adc.bit_width) {
            return Err(ConfigError::OutOfRange {
                option: "bit_width",
                details: "must be between 9 and 12",
            });
        }
        let max_code = self.adc.max_code();
        if self.thresholds.gas_threshold > max_code {
            return Err(ConfigError::OutOfRange {
                option: "gas_threshold",
                details: "above the largest conversion code",
            });
        }
        if self.thresholds.ir_threshold > max_code {
            return Err(ConfigError::OutOfRange {
                option: "ir_threshold",
                details: "above the largest conversion code",
            });
        }
        if self.thresholds.full_scale_code == 0 {
            return Err(ConfigError::OutOfRange {
                option: "full_scale_code",
                details: "must not be zero",
            });
        }
        if self.sample_count == 0 {
            return Err(ConfigError::OutOfRange {
                option: "sample_count",
                details: "must be at least 1",
            });
        }
        if self.cycle_period_ms == 0 {
            return Err(ConfigError::OutOfRange {
                option: "cycle_period_ms",
                details: "must be at least 1",
            });
        }
        if self.sampling_burst_ms() >= self.cycle_period_ms as u64 {
            return Err(ConfigError::OutOfRange {
                option: "cycle_period_ms",
                details: "must be longer than the sampling burst",
            });
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn parse<T: core::str::FromStr>(option: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { option })
}
