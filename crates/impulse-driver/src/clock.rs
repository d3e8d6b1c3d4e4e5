// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use impulse_structures::Timestamp;

/// Derives strictly increasing sample timestamps from a fixed sampling rate.
///
/// Sample `i` is stamped `origin + round(i * 1e6 / rate)` microseconds. When
/// the rate exceeds 1 MHz rounding would repeat a stamp; such stamps are
/// nudged forward by one microsecond.
#[derive(Debug, Clone)]
pub struct SampleClock {
    sampling_rate_hz: f64,
    origin: Timestamp,
    index: u64,
    last: Option<Timestamp>,
}

impl SampleClock {
    pub fn new(sampling_rate_hz: f64, origin: Timestamp) -> Self {
        Self {
            sampling_rate_hz,
            origin,
            index: 0,
            last: None,
        }
    }

    /// Timestamp for the next sample
    pub fn tick(&mut self) -> Timestamp {
        let offset = (self.index as f64 * 1e6 / self.sampling_rate_hz).round() as u64;
        let mut stamp = Timestamp::from_micros(self.origin.as_micros().saturating_add(offset));
        if let Some(last) = self.last {
            if stamp <= last {
                stamp = Timestamp::from_micros(last.as_micros().saturating_add(1));
            }
        }
        self.index += 1;
        self.last = Some(stamp);
        stamp
    }

    /// Samples stamped so far
    pub fn ticks(&self) -> u64 {
        self.index
    }

    pub fn sampling_rate_hz(&self) -> f64 {
        self.sampling_rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_follow_rate() {
        let mut clock = SampleClock::new(256.0, Timestamp::from_micros(10));
        let stamps: Vec<u64> = (0..4).map(|_| clock.tick().as_micros()).collect();
        assert_eq!(stamps, vec![10, 3_916, 7_823, 11_729]);
        assert_eq!(clock.ticks(), 4);
    }

    #[test]
    fn test_high_rates_stay_strictly_increasing() {
        let mut clock = SampleClock::new(4e6, Timestamp::ZERO);
        let mut last = clock.tick();
        for _ in 0..100 {
            let next = clock.tick();
            assert!(next > last);
            last = next;
        }
    }
}
