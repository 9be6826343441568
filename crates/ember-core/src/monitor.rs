//! Periodic sample → evaluate → drive → publish loop
//!
//! Cycles are scheduled on absolute deadlines (`start + k * period`), so the
//! time spent sampling never accumulates into drift. A cycle that overruns
//! its period skips the ticks it missed and rejoins the grid.

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::alarm::AlarmEvaluator;
use crate::config::MonitorConfig;
use crate::error::{ConfigError, HardwareFault};
use crate::outputs::AlarmOutputs;
use crate::sensors::{AdcUnit, AnalogReader, AveragingSampler, Channel};
use crate::snapshot::{SensorSnapshot, SnapshotCell};

/// Consecutive failed cycles before the fault streak is logged as an error
pub const FAULT_ESCALATION_THRESHOLD: u32 = 10;

/// Absolute-deadline cycle clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSchedule {
    reference: Instant,
    period: Duration,
}

impl CycleSchedule {
    /// A zero `period` is raised to one tick.
    pub const fn new(start: Instant, period: Duration) -> Self {
        let period = if period.as_ticks() == 0 {
            Duration::from_ticks(1)
        } else {
            period
        };
        Self {
            reference: start,
            period,
        }
    }

    /// Wake time of the current cycle
    pub const fn reference(&self) -> Instant {
        self.reference
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Finish the current cycle at `now` and return the wake time of the
    /// next one, plus the number of ticks skipped because of an overrun.
    pub fn advance(&mut self, now: Instant) -> (Instant, u64) {
        let mut next = self.reference + self.period;
        let mut skipped = 0;

        if now > next {
            let late = (now - next).as_ticks();
            skipped = late / self.period.as_ticks() + 1;
            next += Duration::from_ticks(self.period.as_ticks() * skipped);
        }

        self.reference = next;
        (next, skipped)
    }
}

/// The monitor task's state. Owns the reader and the output pins; the
/// snapshot cell is the only thing it shares.
pub struct Monitor<'a, A, S, D, B> {
    reader: AnalogReader<A>,
    sampler: AveragingSampler,
    evaluator: AlarmEvaluator,
    outputs: AlarmOutputs<S, D, B>,
    snapshot: &'a SnapshotCell,
    period: Duration,
    sequence: u32,
    consecutive_faults: u32,
}

impl<'a, A, S, D, B> Monitor<'a, A, S, D, B>
where
    A: AdcUnit,
    S: OutputPin,
    D: OutputPin,
    B: OutputPin,
{
    /// Build the monitor from a config, which is validated again here.
    pub fn new(
        config: &MonitorConfig,
        reader: AnalogReader<A>,
        outputs: AlarmOutputs<S, D, B>,
        snapshot: &'a SnapshotCell,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            "Monitor: period {} ms, {} samples x {} ms per channel, calibration {}",
            config.cycle_period_ms,
            config.sample_count,
            config.inter_sample_delay_ms,
            if reader.calibration().enabled() {
                "on"
            } else {
                "off"
            }
        );

        Ok(Self {
            reader,
            sampler: AveragingSampler::new(config.sample_count, config.inter_sample_delay_ms),
            evaluator: AlarmEvaluator::new(&config.thresholds),
            outputs,
            snapshot,
            period: Duration::from_millis(config.cycle_period_ms as u64),
            sequence: 0,
            consecutive_faults: 0,
        })
    }

    pub const fn evaluator(&self) -> &AlarmEvaluator {
        &self.evaluator
    }

    pub const fn outputs(&self) -> &AlarmOutputs<S, D, B> {
        &self.outputs
    }

    pub const fn consecutive_faults(&self) -> u32 {
        self.consecutive_faults
    }

    /// Sample both channels, evaluate, drive the outputs and publish.
    ///
    /// On a fault nothing downstream of sampling is touched: outputs keep
    /// their state and the previous snapshot stays published.
    pub async fn run_cycle<Dl: DelayNs>(
        &mut self,
        delay: &mut Dl,
    ) -> Result<SensorSnapshot, HardwareFault> {
        let gas_value = self
            .sampler
            .average(&mut self.reader, Channel::Gas, delay)
            .await?;
        let ir_value = self
            .sampler
            .average(&mut self.reader, Channel::Infrared, delay)
            .await?;

        let calibrated = self.reader.calibration().enabled();
        let alarm_active = self.evaluator.evaluate(gas_value, ir_value, calibrated);

        self.outputs.set_safe(!alarm_active);

        self.sequence = self.sequence.wrapping_add(1).max(1);
        let snapshot = SensorSnapshot {
            gas_value,
            ir_value,
            alarm_active,
            calibrated,
            sequence: self.sequence,
            captured_at_ms: Instant::now().as_millis(),
        };
        self.snapshot.publish(snapshot);

        debug!(
            "Cycle {}: gas={} ir={} alarm={}",
            snapshot.sequence, gas_value, ir_value, alarm_active
        );

        Ok(snapshot)
    }

    /// One scheduled cycle: run it, record the outcome, then sleep until the
    /// next deadline.
    pub async fn tick<Dl: DelayNs>(&mut self, schedule: &mut CycleSchedule, delay: &mut Dl) {
        match self.run_cycle(delay).await {
            Ok(_) => {
                if self.consecutive_faults > 0 {
                    info!(
                        "Sampling recovered after {} failed cycle(s)",
                        self.consecutive_faults
                    );
                }
                self.consecutive_faults = 0;
            }
            Err(fault) => {
                self.consecutive_faults = self.consecutive_faults.saturating_add(1);
                warn!("Cycle skipped: {}", fault);
                if self.consecutive_faults == FAULT_ESCALATION_THRESHOLD {
                    error!(
                        "{} consecutive sampling faults, snapshot is going stale",
                        self.consecutive_faults
                    );
                }
            }
        }

        let (deadline, skipped) = schedule.advance(Instant::now());
        if skipped > 0 {
            warn!("Monitor overran its period, skipped {} tick(s)", skipped);
        }
        Timer::at(deadline).await;
    }

    /// Run forever on a fixed period, starting now.
    pub async fn run<Dl: DelayNs>(&mut self, delay: &mut Dl) -> ! {
        let mut schedule = CycleSchedule::new(Instant::now(), self.period);
        loop {
            self.tick(&mut schedule, delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::outputs::tests::{SpyPin, spied_outputs};
    use crate::sensors::{AdcSettings, CalibrationReference, RecordingDelay, ScriptedAdc};

    const PERIOD: Duration = Duration::from_millis(500);

    fn monitor_with(
        adc: ScriptedAdc,
        snapshot: &SnapshotCell,
    ) -> (Monitor<'_, ScriptedAdc, SpyPin, SpyPin, SpyPin>, [SpyPin; 3]) {
        let reader = AnalogReader::init(adc, AdcSettings::DEFAULT).unwrap();
        let (outputs, pins) = spied_outputs();
        let monitor = Monitor::new(&MonitorConfig::default(), reader, outputs, snapshot).unwrap();
        (monitor, pins)
    }

    #[test]
    fn test_schedule_has_no_drift_when_cycles_fit() {
        let start = Instant::from_millis(1_000);
        let mut schedule = CycleSchedule::new(start, PERIOD);
        let burst = Duration::from_millis(40);

        for k in 1..=1_000u64 {
            // Each cycle finishes one sampling burst after its wake time
            let finished = schedule.reference() + burst;
            let (deadline, skipped) = schedule.advance(finished);

            assert_eq!(skipped, 0);
            assert_eq!(deadline, start + Duration::from_millis(500 * k));
        }
    }

    #[test]
    fn test_schedule_cycle_ending_on_deadline_is_not_an_overrun() {
        let mut schedule = CycleSchedule::new(Instant::from_millis(0), PERIOD);
        assert_eq!(
            schedule.advance(Instant::from_millis(500)),
            (Instant::from_millis(500), 0)
        );
    }

    #[test]
    fn test_schedule_overrun_skips_to_grid() {
        let mut schedule = CycleSchedule::new(Instant::from_millis(0), PERIOD);

        // Cycle took 1.2 s: the ticks at 500 ms and 1000 ms are gone
        let (deadline, skipped) = schedule.advance(Instant::from_millis(1_200));
        assert_eq!(deadline, Instant::from_millis(1_500));
        assert_eq!(skipped, 2);

        // Back on the original grid afterwards
        let (deadline, skipped) = schedule.advance(Instant::from_millis(1_540));
        assert_eq!(deadline, Instant::from_millis(2_000));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_schedule_with_zero_period_still_advances() {
        let mut schedule = CycleSchedule::new(Instant::from_millis(0), Duration::from_millis(0));
        assert_eq!(schedule.period(), Duration::from_ticks(1));

        let (deadline, _) = schedule.advance(Instant::from_millis(10));
        assert!(deadline > Instant::from_millis(10));
    }

    #[test]
    fn test_monitor_rejects_invalid_config() {
        let snapshot = SnapshotCell::new();
        let config = MonitorConfig {
            cycle_period_ms: 0,
            ..MonitorConfig::DEFAULT
        };
        let reader = AnalogReader::init(ScriptedAdc::default(), AdcSettings::DEFAULT).unwrap();
        let (outputs, _) = spied_outputs();

        let result = Monitor::new(&config, reader, outputs, &snapshot);
        assert!(matches!(
            result,
            Err(ConfigError::OutOfRange {
                option: "cycle_period_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_cycle_publishes_and_drives_outputs() {
        let snapshot = SnapshotCell::new();
        let (mut monitor, [safe, danger, buzzer]) =
            monitor_with(ScriptedAdc::constant(350, 4000, 10), &snapshot);
        let mut delay = RecordingDelay::default();

        let published = block_on(monitor.run_cycle(&mut delay)).unwrap();

        assert_eq!(published.gas_value, 350);
        assert_eq!(published.ir_value, 4000);
        assert!(published.alarm_active);
        assert!(!published.calibrated);
        assert_eq!(published.sequence, 1);
        assert_eq!(snapshot.latest(), published);

        assert!(!safe.is_high());
        assert!(danger.is_high());
        assert!(buzzer.is_high());

        // 2 channels x 10 samples x 2 ms
        assert_eq!(delay.total_ms(), 40);
    }

    #[test]
    fn test_alarm_tracks_latest_pair_only() {
        let snapshot = SnapshotCell::new();
        let adc = ScriptedAdc {
            gas: [[400u16; 10], [100; 10]].concat().into_iter().map(Some).collect(),
            ir: core::iter::repeat_n(Some(4000), 20).collect(),
            ..Default::default()
        };
        let (mut monitor, [safe, ..]) = monitor_with(adc, &snapshot);
        let mut delay = RecordingDelay::default();

        assert!(block_on(monitor.run_cycle(&mut delay)).unwrap().alarm_active);
        let second = block_on(monitor.run_cycle(&mut delay)).unwrap();

        assert!(!second.alarm_active);
        assert_eq!(second.sequence, 2);
        assert!(safe.is_high());
    }

    #[test]
    fn test_fault_keeps_previous_snapshot_and_outputs() {
        let snapshot = SnapshotCell::new();
        let mut ir: std::collections::VecDeque<Option<u16>> =
            core::iter::repeat_n(Some(100), 10).collect();
        ir.extend([Some(100), Some(100), None]);
        let adc = ScriptedAdc {
            gas: core::iter::repeat_n(Some(50), 20).collect(),
            ir,
            ..Default::default()
        };
        let (mut monitor, [safe, danger, _]) = monitor_with(adc, &snapshot);
        let mut delay = RecordingDelay::default();

        // IR at 100 is a flame: alarm
        let first = block_on(monitor.run_cycle(&mut delay)).unwrap();
        assert!(first.alarm_active);

        let fault = block_on(monitor.run_cycle(&mut delay)).unwrap_err();
        assert_eq!(fault.channel(), Channel::Infrared);

        assert_eq!(snapshot.latest(), first, "stale but whole snapshot kept");
        assert!(danger.is_high());
        assert!(!safe.is_high());
    }

    #[test]
    fn test_calibrated_cycle_reports_millivolts() {
        let snapshot = SnapshotCell::new();
        let adc = ScriptedAdc {
            reference: Some(CalibrationReference {
                code: 2048,
                mv: 1650,
            }),
            // 300 codes ~ 241 mV, right at the rescaled gas threshold
            ..ScriptedAdc::constant(300, 4095, 10)
        };
        let (mut monitor, _) = monitor_with(adc, &snapshot);
        let mut delay = RecordingDelay::default();

        let published = block_on(monitor.run_cycle(&mut delay)).unwrap();

        assert!(published.calibrated);
        assert_eq!(published.gas_value, 241);
        assert_eq!(published.ir_value, 3299);
        assert!(published.alarm_active);
        assert_eq!(
            monitor.evaluator().thresholds(true).gas,
            published.gas_value,
            "same threshold used for evaluation and reporting"
        );
    }

    #[test]
    fn test_tick_counts_and_recovers_from_faults() {
        let snapshot = SnapshotCell::new();
        let adc = ScriptedAdc {
            gas: [None, None]
                .into_iter()
                .chain(core::iter::repeat_n(Some(10), 10))
                .collect(),
            ir: core::iter::repeat_n(Some(4000), 10).collect(),
            ..Default::default()
        };
        let (mut monitor, _) = monitor_with(adc, &snapshot);
        let mut delay = RecordingDelay::default();
        let mut schedule = CycleSchedule::new(Instant::now(), Duration::from_millis(5));

        block_on(monitor.tick(&mut schedule, &mut delay));
        block_on(monitor.tick(&mut schedule, &mut delay));
        assert_eq!(monitor.consecutive_faults(), 2);
        assert!(!snapshot.latest().is_published());

        block_on(monitor.tick(&mut schedule, &mut delay));
        assert_eq!(monitor.consecutive_faults(), 0);
        assert_eq!(snapshot.latest().sequence, 1);
    }

    #[test]
    fn test_ticks_follow_wall_clock_period() {
        let snapshot = SnapshotCell::new();
        let cycles = 5u64;
        let (mut monitor, _) = monitor_with(
            ScriptedAdc::constant(0, 4095, 10 * cycles as usize),
            &snapshot,
        );
        // Real delays: each cycle spends ~40 ms sampling inside a 100 ms period
        let mut delay = embassy_time::Delay;
        let period = Duration::from_millis(100);

        let start = Instant::now();
        let mut schedule = CycleSchedule::new(start, period);
        for _ in 0..cycles {
            block_on(monitor.tick(&mut schedule, &mut delay));
        }
        let elapsed = Instant::now() - start;

        assert_eq!(schedule.reference(), start + period * cycles as u32);
        assert!(elapsed >= period * cycles as u32);
        // Drift is bounded by one sampling burst plus scheduling slack
        assert!(
            elapsed < period * cycles as u32 + Duration::from_millis(40 + 50),
            "elapsed {} ms",
            elapsed.as_millis()
        );
    }
}
