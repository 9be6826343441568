use embedded_hal_async::delay::DelayNs;

use super::{AdcUnit, AnalogReader, Channel};
use crate::error::HardwareFault;

/// Default number of conversions averaged per channel per cycle
pub const DEFAULT_SAMPLE_COUNT: u16 = 10;

/// Default spacing between conversions in milliseconds
pub const DEFAULT_INTER_SAMPLE_DELAY_MS: u32 = 2;

/// Noise suppression by averaging consecutive conversions.
///
/// The average is the truncating integer division of the sum by the sample
/// count. Thresholds are defined against that same truncation, so a mean of
/// 299.9 compares as 299.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AveragingSampler {
    sample_count: u16,
    inter_sample_delay_ms: u32,
}

impl AveragingSampler {
    /// `sample_count` is clamped to at least one conversion.
    pub const fn new(sample_count: u16, inter_sample_delay_ms: u32) -> Self {
        Self {
            sample_count: if sample_count == 0 { 1 } else { sample_count },
            inter_sample_delay_ms,
        }
    }

    pub const fn sample_count(&self) -> u16 {
        self.sample_count
    }

    pub const fn inter_sample_delay_ms(&self) -> u32 {
        self.inter_sample_delay_ms
    }

    /// Wall-clock time one [`average`](Self::average) call spends waiting
    pub const fn burst_duration_ms(&self) -> u64 {
        self.sample_count as u64 * self.inter_sample_delay_ms as u64
    }

    /// Average `sample_count` readings of `channel` in the reader's active
    /// unit, awaiting `delay` after each one so other tasks keep running.
    ///
    /// The first fault aborts the whole average.
    pub async fn average<A, D>(
        &self,
        reader: &mut AnalogReader<A>,
        channel: Channel,
        delay: &mut D,
    ) -> Result<u16, HardwareFault>
    where
        A: AdcUnit,
        D: DelayNs,
    {
        let mut sum: u32 = 0;
        for _ in 0..self.sample_count {
            sum += reader.read(channel)?.value() as u32;
            delay.delay_ms(self.inter_sample_delay_ms).await;
        }

        Ok((sum / self.sample_count as u32) as u16)
    }
}

impl Default for AveragingSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COUNT, DEFAULT_INTER_SAMPLE_DELAY_MS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use std::vec::Vec;

    use embassy_futures::block_on;

    use super::*;
    use crate::sensors::{AdcSettings, ScriptedAdc};

    /// Delay that returns immediately and remembers what it was asked for.
    #[derive(Default)]
    pub(crate) struct RecordingDelay {
        pub(crate) waits_ns: Vec<u64>,
    }

    impl RecordingDelay {
        pub(crate) fn total_ms(&self) -> u64 {
            self.waits_ns.iter().sum::<u64>() / 1_000_000
        }
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.waits_ns.push(ns as u64);
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.waits_ns.push(ms as u64 * 1_000_000);
        }
    }

    fn reader_with(gas: &[u16]) -> AnalogReader<ScriptedAdc> {
        let adc = ScriptedAdc {
            gas: gas.iter().copied().map(Some).collect(),
            ..Default::default()
        };
        AnalogReader::init(adc, AdcSettings::DEFAULT).unwrap()
    }

    #[test]
    fn test_average_truncates() {
        let samples = [300, 300, 300, 300, 300, 300, 300, 300, 300, 299];
        let mut reader = reader_with(&samples);
        let mut delay = RecordingDelay::default();

        let avg = block_on(AveragingSampler::default().average(
            &mut reader,
            Channel::Gas,
            &mut delay,
        ));

        // 2999 / 10 = 299.9, truncated
        assert_eq!(avg, Ok(299));
    }

    #[test]
    fn test_average_matches_integer_division_for_sequences() {
        let sequences: [&[u16]; 4] = [
            &[0],
            &[4095, 4095, 4095],
            &[1, 2, 3, 4, 5, 6, 7],
            &[10, 11, 11, 11, 12],
        ];

        for seq in sequences {
            let mut reader = reader_with(seq);
            let mut delay = RecordingDelay::default();
            let sampler = AveragingSampler::new(seq.len() as u16, 1);

            let expected = seq.iter().map(|&v| v as u32).sum::<u32>() / seq.len() as u32;
            let avg = block_on(sampler.average(&mut reader, Channel::Gas, &mut delay));

            assert_eq!(avg, Ok(expected as u16), "sequence {:?}", seq);
        }
    }

    #[test]
    fn test_average_waits_between_samples() {
        let mut reader = reader_with(&[100; 10]);
        let mut delay = RecordingDelay::default();
        let sampler = AveragingSampler::default();

        block_on(sampler.average(&mut reader, Channel::Gas, &mut delay)).unwrap();

        assert_eq!(delay.waits_ns.len(), 10);
        assert_eq!(delay.total_ms(), sampler.burst_duration_ms());
    }

    #[test]
    fn test_fault_aborts_average() {
        let adc = ScriptedAdc {
            gas: [Some(100), Some(100), None, Some(100)].into_iter().collect(),
            ..Default::default()
        };
        let mut reader = AnalogReader::init(adc, AdcSettings::DEFAULT).unwrap();
        let mut delay = RecordingDelay::default();

        let result = block_on(AveragingSampler::new(4, 2).average(
            &mut reader,
            Channel::Gas,
            &mut delay,
        ));

        assert!(result.is_err());
        assert_eq!(delay.waits_ns.len(), 2, "no waiting after the faulting read");
    }

    #[test]
    fn test_zero_sample_count_is_clamped() {
        assert_eq!(AveragingSampler::new(0, 2).sample_count(), 1);
    }
}
