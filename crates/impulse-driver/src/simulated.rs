// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulated Neural Impulse Actuator

use crate::clock::SampleClock;
use crate::driver::SensorDriver;
use crate::error::DriverError;
use impulse_config::DriverConfig;
use impulse_structures::{Sample, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Sinusoid added on top of the noise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f64,
    pub amplitude: f32,
}

/// Seeded stand-in for the NIA headband.
///
/// Produces uniform noise in `[-noise_amplitude, noise_amplitude]` (default
/// `[-1, 1]`) plus an optional injected tone. The same seed always yields the
/// same stream.
#[derive(Debug)]
pub struct SimulatedNiaDriver {
    rng: StdRng,
    clock: SampleClock,
    noise_amplitude: f32,
    tone: Option<Tone>,
    connected: bool,
}

impl SimulatedNiaDriver {
    pub fn new(sampling_rate_hz: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock: SampleClock::new(sampling_rate_hz, Timestamp::ZERO),
            noise_amplitude: 1.0,
            tone: None,
            connected: false,
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.sampling_rate_hz, config.seed)
    }

    pub fn with_tone(mut self, frequency_hz: f64, amplitude: f32) -> Self {
        self.tone = Some(Tone {
            frequency_hz,
            amplitude,
        });
        self
    }

    pub fn with_noise_amplitude(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Change the injected tone while running
    pub fn set_tone(&mut self, tone: Option<Tone>) {
        self.tone = tone;
    }

    fn next_value(&mut self, index: u64) -> f32 {
        let noise = if self.noise_amplitude > 0.0 {
            self.rng.gen_range(-1.0f32..=1.0) * self.noise_amplitude
        } else {
            0.0
        };
        let tone = self.tone.map_or(0.0, |tone| {
            let t = index as f64 / self.clock.sampling_rate_hz();
            (tone.amplitude as f64 * (2.0 * std::f64::consts::PI * tone.frequency_hz * t).sin())
                as f32
        });
        noise + tone
    }
}

impl SensorDriver for SimulatedNiaDriver {
    fn connect(&mut self) -> Result<(), DriverError> {
        let rate = self.clock.sampling_rate_hz();
        if !(rate.is_finite() && rate > 0.0) {
            return Err(DriverError::ConnectionFailed(format!(
                "invalid sampling rate {} Hz",
                rate
            )));
        }
        if !self.connected {
            self.connected = true;
            info!("[DRIVER] Simulated NIA connected at {} Hz", rate);
        }
        Ok(())
    }

    fn read_signal(&mut self, count: usize) -> Result<Vec<Sample>, DriverError> {
        if !self.connected {
            return Err(DriverError::NotConnected(self.name().to_string()));
        }

        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let index = self.clock.ticks();
            let value = self.next_value(index);
            samples.push(Sample::new(value, self.clock.tick()));
        }
        debug!("[DRIVER] Read {} simulated samples", samples.len());
        Ok(samples)
    }

    fn disconnect(&mut self) {
        if !self.connected {
            warn!("[DRIVER] Simulated NIA already disconnected");
            return;
        }
        self.connected = false;
        info!("[DRIVER] Simulated NIA disconnected");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn sampling_rate(&self) -> f64 {
        self.clock.sampling_rate_hz()
    }

    fn name(&self) -> &str {
        "simulated-nia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_requires_connection() {
        let mut driver = SimulatedNiaDriver::new(256.0, 1);
        assert!(matches!(
            driver.read_signal(4),
            Err(DriverError::NotConnected(_))
        ));
    }

    #[test]
    fn test_seeded_stream_is_reproducible() {
        let mut a = SimulatedNiaDriver::new(256.0, 42);
        let mut b = SimulatedNiaDriver::new(256.0, 42);
        a.connect().unwrap();
        b.connect().unwrap();
        assert_eq!(a.read_signal(64).unwrap(), b.read_signal(64).unwrap());
    }

    #[test]
    fn test_noise_stays_in_unit_range() {
        let mut driver = SimulatedNiaDriver::new(256.0, 3);
        driver.connect().unwrap();
        let samples = driver.read_signal(1_000).unwrap();
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(&s.value)));
        assert!(samples.windows(2).all(|p| p[1].timestamp > p[0].timestamp));
    }

    #[test]
    fn test_pure_tone() {
        let mut driver = SimulatedNiaDriver::new(100.0, 0)
            .with_noise_amplitude(0.0)
            .with_tone(25.0, 0.5);
        driver.connect().unwrap();
        let values: Vec<f32> = driver.read_signal(4).unwrap().iter().map(|s| s.value).collect();
        assert!(values[0].abs() < 1e-6);
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert!((values[3] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_double_disconnect_is_noop() {
        let mut driver = SimulatedNiaDriver::new(256.0, 1);
        driver.connect().unwrap();
        driver.disconnect();
        driver.disconnect();
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_invalid_rate_fails_to_connect() {
        let mut driver = SimulatedNiaDriver::new(0.0, 1);
        assert!(matches!(
            driver.connect(),
            Err(DriverError::ConnectionFailed(_))
        ));
    }
}
