mod analog;
mod calibration;
mod sampler;

pub use analog::AnalogReader;
pub use calibration::{CalibrationContext, CalibrationReference};
pub use sampler::{AveragingSampler, DEFAULT_INTER_SAMPLE_DELAY_MS, DEFAULT_SAMPLE_COUNT};

#[cfg(test)]
pub(crate) use analog::tests::ScriptedAdc;
#[cfg(test)]
pub(crate) use sampler::tests::RecordingDelay;

use crate::error::PeripheralInitFault;

/// Analog inputs wired to the conversion unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Gas sensor (MQ-series analog output). Higher is worse.
    Gas,
    /// Infrared/flame sensor analog output. Lower is worse.
    Infrared,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Gas, Channel::Infrared];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Gas => "gas",
            Self::Infrared => "ir",
        }
    }
}

/// Input attenuation of a conversion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attenuation {
    Db0,
    Db2_5,
    Db6,
    Db11,
}

/// Per-channel conversion settings, applied once during reader init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSettings {
    /// Conversion unit number (1-based, as printed in the datasheet)
    pub unit: u8,
    pub attenuation: Attenuation,
    pub bit_width: u8,
}

impl AdcSettings {
    pub const DEFAULT: Self = Self {
        unit: 1,
        attenuation: Attenuation::Db11,
        bit_width: 12,
    };

    /// Largest code a conversion at this bit width can produce
    pub const fn max_code(&self) -> u16 {
        ((1u32 << self.bit_width) - 1) as u16
    }
}

impl Default for AdcSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One reading of one channel.
///
/// Produced fresh for every sample; the averaging window is the only thing
/// that ever looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelReading {
    pub channel: Channel,
    pub raw_code: u16,
    /// Millivolts, present only when calibration is enabled
    pub calibrated_mv: Option<u16>,
}

impl ChannelReading {
    /// The value thresholds are compared against: millivolts when
    /// calibrated, the raw code otherwise.
    pub const fn value(&self) -> u16 {
        match self.calibrated_mv {
            Some(mv) => mv,
            None => self.raw_code,
        }
    }
}

/// A one-shot analog-to-digital conversion unit.
///
/// Implemented by the firmware on top of the chip's ADC and by the simulator
/// on top of synthetic waveforms. The [`AnalogReader`] owns the unit
/// exclusively for the lifetime of the program.
pub trait AdcUnit {
    type Error: core::fmt::Debug;

    /// Apply attenuation and bit width to `channel`.
    fn configure(
        &mut self,
        channel: Channel,
        settings: &AdcSettings,
    ) -> Result<(), PeripheralInitFault>;

    /// Perform a single blocking conversion and return the raw code.
    fn read_raw(&mut self, channel: Channel) -> Result<u16, Self::Error>;

    /// Factory calibration reference point for `settings`, if the device
    /// carries one.
    fn calibration_reference(&self, settings: &AdcSettings) -> Option<CalibrationReference> {
        let _ = settings;
        None
    }
}
