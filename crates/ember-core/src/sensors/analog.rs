use log::{error, info};

use super::{AdcSettings, AdcUnit, CalibrationContext, Channel, ChannelReading};
use crate::error::{HardwareFault, PeripheralInitFault};

/// Calibrated one-shot reader over an exclusively owned conversion unit.
pub struct AnalogReader<A> {
    adc: A,
    calibration: CalibrationContext,
}

impl<A: AdcUnit> AnalogReader<A> {
    /// Take ownership of the conversion unit, configure every channel and
    /// try to build the calibration scheme.
    ///
    /// A channel that cannot be configured is fatal. A calibration scheme
    /// that cannot be built is not: the reader falls back to raw codes for
    /// the rest of the run.
    pub fn init(mut adc: A, settings: AdcSettings) -> Result<Self, PeripheralInitFault> {
        for channel in Channel::ALL {
            adc.configure(channel, &settings).map_err(|e| {
                error!("Failed to configure {} channel: {}", channel.label(), e);
                e
            })?;
        }
        info!(
            "ADC{} configured: {:?}, {} bits",
            settings.unit, settings.attenuation, settings.bit_width
        );

        let reference = adc.calibration_reference(&settings);
        let calibration = CalibrationContext::new_or_raw(settings, reference);

        Ok(Self { adc, calibration })
    }

    pub const fn calibration(&self) -> &CalibrationContext {
        &self.calibration
    }

    /// Single conversion, returning the raw code.
    pub fn read_raw(&mut self, channel: Channel) -> Result<u16, HardwareFault> {
        let code = self.adc.read_raw(channel).map_err(|e| {
            error!("ADC read on {} channel failed: {:?}", channel.label(), e);
            HardwareFault::ConversionFailed {
                channel,
                details: "one-shot conversion did not complete",
            }
        })?;

        let max = self.calibration.settings().max_code();
        if code > max {
            return Err(HardwareFault::CodeOutOfRange { channel, code, max });
        }

        Ok(code)
    }

    /// Raw code to the active unit. Identity when calibration is disabled.
    pub fn to_physical(&self, code: u16) -> u16 {
        self.calibration.to_physical(code)
    }

    /// Single conversion, calibrated when the context allows it.
    pub fn read(&mut self, channel: Channel) -> Result<ChannelReading, HardwareFault> {
        let raw_code = self.read_raw(channel)?;
        let calibrated_mv = self
            .calibration
            .enabled()
            .then(|| self.calibration.to_physical(raw_code));

        Ok(ChannelReading {
            channel,
            raw_code,
            calibrated_mv,
        })
    }
}
