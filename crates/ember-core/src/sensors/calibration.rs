//! Raw code to millivolt calibration
//!
//! Uses a line fit through the origin, anchored on the factory reference
//! point burned into the chip: `mv = code * gain >> GAIN_SHIFT` with
//! `gain = (ref_mv << GAIN_SHIFT) / ref_code`. Only the 11 dB / 12-bit
//! combination has a reference point, so every other combination downgrades
//! to raw codes.

use log::{info, warn};

use super::{AdcSettings, Attenuation};
use crate::config::FULL_SCALE_MV;
use crate::error::ConfigurationFault;

const GAIN_SHIFT: u32 = 16;

/// Factory reference point: the code measured for a known input voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReference {
    pub code: u16,
    pub mv: u16,
}

/// Calibration state shared read-only by every reader call.
///
/// Built once at startup. When construction of the scheme fails the context
/// is created disabled and stays disabled for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationContext {
    settings: AdcSettings,
    /// Millivolts per code, fixed point with [`GAIN_SHIFT`] fractional bits.
    /// `None` means raw-code mode.
    gain: Option<u32>,
}

impl CalibrationContext {
    /// Build the line-fit scheme for `settings` from an optional factory
    /// reference point.
    pub fn try_new(
        settings: AdcSettings,
        reference: Option<CalibrationReference>,
    ) -> Result<Self, ConfigurationFault> {
        if settings.attenuation != Attenuation::Db11 || settings.bit_width != 12 {
            return Err(ConfigurationFault::UnsupportedScheme {
                attenuation: settings.attenuation,
                bit_width: settings.bit_width,
            });
        }

        let reference = reference.ok_or(ConfigurationFault::MissingReference {
            details: "no factory reference point for this unit",
        })?;

        if reference.code == 0
            || reference.code > settings.max_code()
            || reference.mv == 0
            || reference.mv > FULL_SCALE_MV
        {
            return Err(ConfigurationFault::InvalidReference {
                code: reference.code,
                mv: reference.mv,
            });
        }

        let gain = ((reference.mv as u32) << GAIN_SHIFT) / reference.code as u32;

        Ok(Self {
            settings,
            gain: Some(gain),
        })
    }

    /// Like [`try_new`](Self::try_new), but a failure downgrades to raw-code
    /// mode instead of erroring.
    pub fn new_or_raw(settings: AdcSettings, reference: Option<CalibrationReference>) -> Self {
        match Self::try_new(settings, reference) {
            Ok(context) => {
                info!(
                    "ADC{} calibration enabled ({:?}, {} bits)",
                    settings.unit, settings.attenuation, settings.bit_width
                );
                context
            }
            Err(fault) => {
                warn!(
                    "ADC{} calibration unavailable, using raw codes: {}",
                    settings.unit, fault
                );
                Self::raw(settings)
            }
        }
    }

    /// A context in raw-code mode.
    pub const fn raw(settings: AdcSettings) -> Self {
        Self {
            settings,
            gain: None,
        }
    }

    pub const fn enabled(&self) -> bool {
        self.gain.is_some()
    }

    pub const fn settings(&self) -> &AdcSettings {
        &self.settings
    }

    /// Convert a raw code to the active unit: millivolts when enabled, the
    /// code itself otherwise.
    pub fn to_physical(&self, code: u16) -> u16 {
        match self.gain {
            Some(gain) => {
                let mv = (code as u64 * gain as u64) >> GAIN_SHIFT;
                mv.min(u16::MAX as u64) as u16
            }
            None => code,
        }
    }
}
