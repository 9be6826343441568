//! esp-hal bindings for the conversion unit and the alarm outputs
//!
//! Pin map (ESP32-S3):
//!
//! | Signal     | GPIO | Peripheral      |
//! |------------|------|-----------------|
//! | Gas sensor | 4    | ADC1 channel 3  |
//! | IR sensor  | 5    | ADC1 channel 4  |
//! | Safe LED   | 6    | output          |
//! | Danger LED | 7    | output          |
//! | Buzzer     | 15   | output          |
//!
//! Pins are enabled with esp-hal's basic calibration, which subtracts the
//! zero-input offset from every code. The eFuse line fit in
//! `ember_core::sensors::calibration` is then applied to offset-free codes.

use esp_hal::Blocking;
use esp_hal::analog::adc::{
    Adc, AdcCalBasic, AdcConfig, AdcPin, Attenuation as EspAttenuation,
};
use esp_hal::efuse::Efuse;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::peripherals::{ADC1, GPIO4, GPIO5, GPIO6, GPIO7, GPIO15};
use log::{debug, error};

use ember_core::error::PeripheralInitFault;
use ember_core::sensors::{AdcSettings, Attenuation, CalibrationReference};
use ember_core::{AdcUnit, AlarmOutputs, Channel, Monitor};

/// The only resolution the ESP32-S3 SAR ADC offers
const NATIVE_BIT_WIDTH: u8 = 12;

/// Zero-offset correction applied by esp-hal on every read
pub type OffsetCal = AdcCalBasic<ADC1<'static>>;

pub type GasPin = AdcPin<GPIO4<'static>, ADC1<'static>, OffsetCal>;
pub type InfraredPin = AdcPin<GPIO5<'static>, ADC1<'static>, OffsetCal>;

pub type FirmwareOutputs = AlarmOutputs<Output<'static>, Output<'static>, Output<'static>>;
pub type FirmwareMonitor =
    Monitor<'static, EspAdc, Output<'static>, Output<'static>, Output<'static>>;

const fn esp_attenuation(attenuation: Attenuation) -> EspAttenuation {
    match attenuation {
        Attenuation::Db0 => EspAttenuation::_0dB,
        Attenuation::Db2_5 => EspAttenuation::_2p5dB,
        Attenuation::Db6 => EspAttenuation::_6dB,
        Attenuation::Db11 => EspAttenuation::_11dB,
    }
}

/// ADC1 with the gas and IR pins enabled.
///
/// esp-hal fixes attenuation when a pin is enabled, so the settings are
/// applied here and [`AdcUnit::configure`] only checks that they match.
pub struct EspAdc {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    gas: GasPin,
    infrared: InfraredPin,
    settings: AdcSettings,
}

impl EspAdc {
    pub fn new(
        adc1: ADC1<'static>,
        gas: GPIO4<'static>,
        infrared: GPIO5<'static>,
        settings: AdcSettings,
    ) -> Result<Self, PeripheralInitFault> {
        if settings.unit != 1 {
            error!("Sensors are wired to ADC1, not ADC{}", settings.unit);
            return Err(PeripheralInitFault::ConversionUnit {
                details: "sensors are wired to ADC1",
            });
        }

        let attenuation = esp_attenuation(settings.attenuation);
        let mut config = AdcConfig::new();
        let gas = config.enable_pin_with_cal::<_, OffsetCal>(gas, attenuation);
        let infrared = config.enable_pin_with_cal::<_, OffsetCal>(infrared, attenuation);

        Ok(Self {
            adc: Adc::new(adc1, config),
            gas,
            infrared,
            settings,
        })
    }
}

impl AdcUnit for EspAdc {
    type Error = ();

    fn configure(
        &mut self,
        channel: Channel,
        settings: &AdcSettings,
    ) -> Result<(), PeripheralInitFault> {
        if settings.bit_width != NATIVE_BIT_WIDTH {
            return Err(PeripheralInitFault::ConversionUnit {
                details: "ESP32-S3 only converts at 12 bits",
            });
        }
        if *settings != self.settings {
            return Err(PeripheralInitFault::ConversionUnit {
                details: "settings differ from those the pins were enabled with",
            });
        }

        debug!("{} channel ready", channel.label());
        Ok(())
    }

    fn read_raw(&mut self, channel: Channel) -> Result<u16, Self::Error> {
        match channel {
            Channel::Gas => nb::block!(self.adc.read_oneshot(&mut self.gas)),
            Channel::Infrared => nb::block!(self.adc.read_oneshot(&mut self.infrared)),
        }
    }

    fn calibration_reference(&self, settings: &AdcSettings) -> Option<CalibrationReference> {
        let attenuation = esp_attenuation(settings.attenuation);
        let code = Efuse::rtc_calib_cal_code(settings.unit, attenuation)?;
        let mv = Efuse::rtc_calib_cal_mv(settings.unit, attenuation);

        debug!("eFuse calibration point: code={} mv={}", code, mv);
        Some(CalibrationReference { code, mv })
    }
}

/// Claim the three output pins and start them in the safe state.
pub fn alarm_outputs(
    safe_led: GPIO6<'static>,
    danger_led: GPIO7<'static>,
    buzzer: GPIO15<'static>,
) -> FirmwareOutputs {
    let config = OutputConfig::default();
    AlarmOutputs::new(
        Output::new(safe_led, Level::High, config),
        Output::new(danger_led, Level::Low, config),
        Output::new(buzzer, Level::Low, config),
    )
}
