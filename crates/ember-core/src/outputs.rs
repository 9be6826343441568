//! Safe/danger indicator pair plus buzzer

use embedded_hal::digital::{OutputPin, PinState};
use log::{info, warn};

/// Drives the green (safe) LED, the red (danger) LED and the buzzer.
///
/// All three lines follow one boolean and are written together, so the two
/// indicators can never be lit at the same time. Writes are fire-and-forget:
/// a pin error is logged and otherwise ignored.
pub struct AlarmOutputs<S, D, B> {
    safe_led: S,
    danger_led: D,
    buzzer: B,
    is_safe: bool,
}

impl<S, D, B> AlarmOutputs<S, D, B>
where
    S: OutputPin,
    D: OutputPin,
    B: OutputPin,
{
    /// Take the three pins and drive them to the safe state.
    pub fn new(safe_led: S, danger_led: D, buzzer: B) -> Self {
        let mut outputs = Self {
            safe_led,
            danger_led,
            buzzer,
            is_safe: true,
        };
        outputs.write(true);
        outputs
    }

    pub const fn is_safe(&self) -> bool {
        self.is_safe
    }

    pub fn set_safe(&mut self, is_safe: bool) {
        if is_safe != self.is_safe {
            if is_safe {
                info!("Alarm cleared");
            } else {
                warn!("ALARM: gas or flame threshold crossed");
            }
        }
        self.write(is_safe);
    }

    fn write(&mut self, is_safe: bool) {
        let danger = PinState::from(!is_safe);

        if let Err(e) = self.safe_led.set_state(PinState::from(is_safe)) {
            warn!("Failed to drive safe LED: {:?}", e);
        }
        if let Err(e) = self.danger_led.set_state(danger) {
            warn!("Failed to drive danger LED: {:?}", e);
        }
        if let Err(e) = self.buzzer.set_state(danger) {
            warn!("Failed to drive buzzer: {:?}", e);
        }

        self.is_safe = is_safe;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use std::cell::Cell;
    use std::rc::Rc;

    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    use super::*;

    /// Output pin whose level can be observed after it has been moved into
    /// the driver.
    #[derive(Clone, Default)]
    pub(crate) struct SpyPin(pub(crate) Rc<Cell<bool>>);

    impl SpyPin {
        pub(crate) fn is_high(&self) -> bool {
            self.0.get()
        }
    }

    impl ErrorType for SpyPin {
        type Error = Infallible;
    }

    impl OutputPin for SpyPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.set(true);
            Ok(())
        }
    }

    pub(crate) fn spied_outputs() -> (AlarmOutputs<SpyPin, SpyPin, SpyPin>, [SpyPin; 3]) {
        let pins = [SpyPin::default(), SpyPin::default(), SpyPin::default()];
        let outputs = AlarmOutputs::new(pins[0].clone(), pins[1].clone(), pins[2].clone());
        (outputs, pins)
    }

    #[test]
    fn test_starts_safe() {
        let (outputs, [safe, danger, buzzer]) = spied_outputs();
        assert!(outputs.is_safe());
        assert!(safe.is_high());
        assert!(!danger.is_high());
        assert!(!buzzer.is_high());
    }

    #[test]
    fn test_exactly_one_indicator_and_buzzer_follows_danger() {
        let (mut outputs, [safe, danger, buzzer]) = spied_outputs();

        for is_safe in [false, true, true, false, false, true] {
            outputs.set_safe(is_safe);

            assert!(
                safe.is_high() != danger.is_high(),
                "exactly one indicator after set_safe({})",
                is_safe
            );
            assert_eq!(safe.is_high(), is_safe);
            assert_eq!(buzzer.is_high(), danger.is_high());
            assert_eq!(outputs.is_safe(), is_safe);
        }
    }
}
