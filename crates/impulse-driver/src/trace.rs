// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Replay of recorded sessions

use crate::clock::SampleClock;
use crate::driver::SensorDriver;
use crate::error::DriverError;
use impulse_structures::{Sample, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, warn};

/// A recorded session stored as JSON:
///
/// ```json
/// { "sampling_rate_hz": 256.0, "start_us": 0, "samples": [0.01, -0.02, ...] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedTrace {
    pub sampling_rate_hz: f64,
    /// Timestamp of the first sample
    #[serde(default)]
    pub start_us: u64,
    pub samples: Vec<f32>,
}

impl RecordedTrace {
    pub fn new(sampling_rate_hz: f64, samples: Vec<f32>) -> Self {
        Self {
            sampling_rate_hz,
            start_us: 0,
            samples,
        }
    }

    pub fn load(path: &Path) -> Result<Self, DriverError> {
        let file = File::open(path).map_err(|source| DriverError::TraceIo {
            path: path.to_path_buf(),
            source,
        })?;
        let trace: RecordedTrace = serde_json::from_reader(BufReader::new(file))?;
        trace.validate()?;
        debug!(
            "[DRIVER] Loaded trace {} ({} samples at {} Hz)",
            path.display(),
            trace.samples.len(),
            trace.sampling_rate_hz
        );
        Ok(trace)
    }

    pub fn save(&self, path: &Path) -> Result<(), DriverError> {
        let file = File::create(path).map_err(|source| DriverError::TraceIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return Err(DriverError::TraceFormat(format!(
                "sampling_rate_hz must be positive, got {}",
                self.sampling_rate_hz
            )));
        }
        if let Some(index) = self.samples.iter().position(|v| !v.is_finite()) {
            return Err(DriverError::TraceFormat(format!(
                "sample {} is not finite",
                index
            )));
        }
        Ok(())
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sampling_rate_hz
    }
}

/// Driver that plays back a [`RecordedTrace`] once
#[derive(Debug)]
pub struct TraceDriver {
    trace: RecordedTrace,
    position: usize,
    clock: SampleClock,
    connected: bool,
}

impl TraceDriver {
    pub fn new(trace: RecordedTrace) -> Result<Self, DriverError> {
        trace.validate()?;
        let clock = SampleClock::new(trace.sampling_rate_hz, Timestamp::from_micros(trace.start_us));
        Ok(Self {
            trace,
            position: 0,
            clock,
            connected: false,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, DriverError> {
        Self::new(RecordedTrace::load(path)?)
    }

    /// Samples left to replay
    pub fn remaining(&self) -> usize {
        self.trace.samples.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn trace(&self) -> &RecordedTrace {
        &self.trace
    }
}

impl SensorDriver for TraceDriver {
    fn connect(&mut self) -> Result<(), DriverError> {
        if !self.connected {
            self.connected = true;
            info!(
                "[DRIVER] Trace replay connected ({} samples, {:.1}s)",
                self.trace.samples.len(),
                self.trace.duration_secs()
            );
        }
        Ok(())
    }

    fn read_signal(&mut self, count: usize) -> Result<Vec<Sample>, DriverError> {
        if !self.connected {
            return Err(DriverError::NotConnected(self.name().to_string()));
        }

        let end = (self.position + count).min(self.trace.samples.len());
        let samples: Vec<Sample> = self.trace.samples[self.position..end]
            .iter()
            .map(|value| Sample::new(*value, self.clock.tick()))
            .collect();
        self.position = end;
        Ok(samples)
    }

    fn disconnect(&mut self) {
        if !self.connected {
            warn!("[DRIVER] Trace replay already disconnected");
            return;
        }
        self.connected = false;
        info!(
            "[DRIVER] Trace replay disconnected at sample {}/{}",
            self.position,
            self.trace.samples.len()
        );
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn sampling_rate(&self) -> f64 {
        self.trace.sampling_rate_hz
    }

    fn name(&self) -> &str {
        "trace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_in_batches() {
        let trace = RecordedTrace::new(1_000.0, (0..10).map(|i| i as f32).collect());
        let mut driver = TraceDriver::new(trace).unwrap();
        driver.connect().unwrap();

        let first = driver.read_signal(4).unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first[1].timestamp, Timestamp::from_micros(1_000));

        let rest = driver.read_signal(100).unwrap();
        assert_eq!(rest.len(), 6);
        assert_eq!(rest[0].value, 4.0);
        assert!(driver.is_exhausted());
        assert!(driver.read_signal(4).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        let trace = RecordedTrace::new(256.0, vec![0.0, f32::NAN]);
        assert!(matches!(
            TraceDriver::new(trace),
            Err(DriverError::TraceFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = RecordedTrace::load(Path::new("/nonexistent/trace.json")).unwrap_err();
        assert!(matches!(err, DriverError::TraceIo { .. }));
    }
}
