//! Threshold-based alarm decision
//!
//! Raw thresholds are defined in ADC codes. With calibration enabled the
//! readings arrive in millivolts, so both thresholds are rescaled once, at
//! construction, by `full_scale_mv / full_scale_code`. The status report only
//! echoes the flag the monitor computed here, so the two cannot disagree.

use crate::config::ThresholdConfig;

/// Effective thresholds for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Alarm when gas is at or above this value
    pub gas: u16,
    /// Alarm when IR is at or below this value (flame pulls the output low)
    pub ir: u16,
}

impl Thresholds {
    const fn is_alarm(&self, gas_value: u16, ir_value: u16) -> bool {
        gas_value >= self.gas || ir_value <= self.ir
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEvaluator {
    raw: Thresholds,
    calibrated: Thresholds,
}

impl AlarmEvaluator {
    pub const fn new(config: &ThresholdConfig) -> Self {
        Self {
            raw: Thresholds {
                gas: config.gas_threshold,
                ir: config.ir_threshold,
            },
            calibrated: Thresholds {
                gas: config.scale(config.gas_threshold),
                ir: config.scale(config.ir_threshold),
            },
        }
    }

    /// Thresholds in effect for the given calibration mode
    pub const fn thresholds(&self, calibration_enabled: bool) -> Thresholds {
        if calibration_enabled {
            self.calibrated
        } else {
            self.raw
        }
    }

    /// `true` when gas is at/above its threshold or IR at/below its
    /// threshold. Both boundaries count as alarm.
    pub const fn evaluate(&self, gas_value: u16, ir_value: u16, calibration_enabled: bool) -> bool {
        self.thresholds(calibration_enabled).is_alarm(gas_value, ir_value)
    }
}

impl Default for AlarmEvaluator {
    fn default() -> Self {
        Self::new(&ThresholdConfig::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_boundary_is_inclusive() {
        assert!(AlarmEvaluator::default().evaluate(300, 4000, false));
    }

    #[test]
    fn test_ir_boundary_is_inclusive() {
        assert!(AlarmEvaluator::default().evaluate(0, 3900, false));
    }

    #[test]
    fn test_clear_just_inside_both_thresholds() {
        assert!(!AlarmEvaluator::default().evaluate(299, 3901, false));
    }

    #[test]
    fn test_calibrated_thresholds_are_rescaled_once() {
        let evaluator = AlarmEvaluator::default();
        let scaled = evaluator.thresholds(true);

        // 300 * 3300 / 4095 = 241.75..., 3900 * 3300 / 4095 = 3142.85...
        assert_eq!(scaled, Thresholds { gas: 241, ir: 3142 });
        assert_eq!(evaluator.thresholds(false), Thresholds { gas: 300, ir: 3900 });
    }

    #[test]
    fn test_calibrated_boundaries() {
        let evaluator = AlarmEvaluator::default();
        assert!(evaluator.evaluate(241, 3200, true));
        assert!(evaluator.evaluate(0, 3142, true));
        assert!(!evaluator.evaluate(240, 3143, true));
        // Gas at 241 is clear against the raw threshold, IR 3200 is not
        assert!(!evaluator.evaluate(241, 4000, false));
        assert!(evaluator.evaluate(241, 3200, false));
    }

    #[test]
    fn test_custom_thresholds() {
        let config = ThresholdConfig {
            gas_threshold: 1000,
            ir_threshold: 100,
            ..ThresholdConfig::DEFAULT
        };
        let evaluator = AlarmEvaluator::new(&config);
        assert!(!evaluator.evaluate(999, 101, false));
        assert!(evaluator.evaluate(1000, 101, false));
        assert!(evaluator.evaluate(999, 100, false));
    }
}
