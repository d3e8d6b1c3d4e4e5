// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Moves samples from a [`SensorDriver`] into the sample buffer

use crate::driver::SensorDriver;
use crate::error::DriverError;
use impulse_signal::{SampleProducer, SignalError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why an acquisition run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was requested
    Requested,
    /// A finite source returned no more samples
    SourceExhausted,
    /// The buffer was closed for shutdown
    BufferClosed,
}

/// Counters for samples handed to the buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub samples_read: u64,
    pub samples_accepted: u64,
    /// Pushes that displaced the oldest buffered sample
    pub overflows: u64,
    /// Samples discarded for arriving out of order
    pub out_of_order: u64,
}

/// Outcome of one [`AcquisitionLoop::pump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Samples were read (possibly zero for a live device)
    Continue,
    Exhausted,
    BufferClosed,
}

/// Driver plus buffer producer, run synchronously or on its own thread
pub struct AcquisitionLoop<D: SensorDriver> {
    driver: D,
    producer: SampleProducer,
    read_batch: usize,
    /// Sleep between batches, `None` reads as fast as the driver allows
    pace: Option<Duration>,
    stats: AcquisitionStats,
}

impl<D: SensorDriver> AcquisitionLoop<D> {
    pub fn new(driver: D, producer: SampleProducer, read_batch: usize) -> Self {
        Self {
            driver,
            producer,
            read_batch: read_batch.max(1),
            pace: None,
            stats: AcquisitionStats::default(),
        }
    }

    /// Sleep one batch duration between reads, approximating a live device
    pub fn real_time(mut self) -> Self {
        let rate = self.driver.sampling_rate();
        if rate > 0.0 {
            self.pace = Some(Duration::from_secs_f64(self.read_batch as f64 / rate));
        }
        self
    }

    /// Read one batch and push it into the buffer
    pub fn pump(&mut self) -> Result<PumpStatus, DriverError> {
        if !self.driver.is_connected() {
            self.driver.connect()?;
        }
        if self.producer.is_closed() {
            return Ok(PumpStatus::BufferClosed);
        }

        let samples = self.driver.read_signal(self.read_batch)?;
        if samples.is_empty() {
            return Ok(PumpStatus::Exhausted);
        }

        for sample in samples {
            self.stats.samples_read += 1;
            match self.producer.push(sample) {
                Ok(()) => self.stats.samples_accepted += 1,
                Err(SignalError::Overflow { overflow_count, .. }) => {
                    self.stats.samples_accepted += 1;
                    self.stats.overflows += 1;
                    if overflow_count == 1 || overflow_count % 256 == 0 {
                        warn!("[ACQUISITION] Sample buffer overflow (total {})", overflow_count);
                    }
                }
                Err(SignalError::OutOfOrderSample { timestamp, last }) => {
                    self.stats.out_of_order += 1;
                    debug!(
                        "[ACQUISITION] Discarded out-of-order sample at {} (last {})",
                        timestamp, last
                    );
                }
                Err(SignalError::BufferClosed) => return Ok(PumpStatus::BufferClosed),
                Err(other) => {
                    warn!("[ACQUISITION] Unexpected push failure: {}", other);
                }
            }
        }
        Ok(PumpStatus::Continue)
    }

    /// Pump until the source is exhausted or the buffer closes
    pub fn run_to_end(&mut self) -> Result<StopReason, DriverError> {
        loop {
            match self.pump()? {
                PumpStatus::Continue => {
                    if let Some(pace) = self.pace {
                        thread::sleep(pace);
                    }
                }
                PumpStatus::Exhausted => return Ok(StopReason::SourceExhausted),
                PumpStatus::BufferClosed => return Ok(StopReason::BufferClosed),
            }
        }
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}

impl<D: SensorDriver + 'static> AcquisitionLoop<D> {
    /// Run the loop on a dedicated thread
    pub fn spawn(self) -> AcquisitionHandle<D> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut acquisition = self;

        let thread = thread::spawn(move || {
            info!("[ACQUISITION] Started on driver {}", acquisition.driver.name());
            let outcome = loop {
                if !flag.load(Ordering::Relaxed) {
                    break Ok(StopReason::Requested);
                }
                match acquisition.pump() {
                    Ok(PumpStatus::Continue) => {
                        if let Some(pace) = acquisition.pace {
                            thread::sleep(pace);
                        }
                    }
                    Ok(PumpStatus::Exhausted) => break Ok(StopReason::SourceExhausted),
                    Ok(PumpStatus::BufferClosed) => break Ok(StopReason::BufferClosed),
                    Err(e) => break Err(e),
                }
            };
            flag.store(false, Ordering::Relaxed);

            if acquisition.driver.is_connected() {
                acquisition.driver.disconnect();
            }
            match &outcome {
                Ok(reason) => info!(
                    "[ACQUISITION] Stopped ({:?}) after {} samples",
                    reason, acquisition.stats.samples_read
                ),
                Err(e) => warn!("[ACQUISITION] Stopped on driver error: {}", e),
            }
            AcquisitionRun {
                outcome,
                stats: acquisition.stats,
                driver: acquisition.driver,
            }
        });

        AcquisitionHandle {
            running,
            thread: Some(thread),
        }
    }
}

/// Final state of a threaded acquisition run
pub struct AcquisitionRun<D> {
    pub outcome: Result<StopReason, DriverError>,
    pub stats: AcquisitionStats,
    /// The driver, disconnected
    pub driver: D,
}

/// Controls an acquisition thread started with [`AcquisitionLoop::spawn`]
pub struct AcquisitionHandle<D> {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<AcquisitionRun<D>>>,
}

impl<D> AcquisitionHandle<D> {
    /// False once the thread has stopped on its own or was asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask the thread to stop and wait for it
    pub fn stop(mut self) -> Result<AcquisitionRun<D>, DriverError> {
        self.running.store(false, Ordering::Relaxed);
        self.join_thread()
    }

    /// Wait for the thread to end on its own
    pub fn join(mut self) -> Result<AcquisitionRun<D>, DriverError> {
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<AcquisitionRun<D>, DriverError> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| DriverError::Thread("acquisition thread already joined".to_string()))?;
        thread
            .join()
            .map_err(|_| DriverError::Thread("acquisition thread panicked".to_string()))
    }
}

impl<D> Drop for AcquisitionHandle<D> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedNiaDriver;
    use crate::trace::{RecordedTrace, TraceDriver};
    use impulse_signal::SampleBuffer;

    #[test]
    fn test_pump_connects_and_pushes() {
        let buffer = SampleBuffer::new(64).unwrap();
        let driver = SimulatedNiaDriver::new(256.0, 9);
        let mut acquisition = AcquisitionLoop::new(driver, buffer.producer(), 16);

        assert_eq!(acquisition.pump().unwrap(), PumpStatus::Continue);
        assert!(acquisition.driver().is_connected());
        assert_eq!(buffer.len(), 16);
        assert_eq!(acquisition.stats().samples_accepted, 16);
    }

    #[test]
    fn test_overflow_is_counted_not_fatal() {
        let buffer = SampleBuffer::new(8).unwrap();
        let trace = RecordedTrace::new(256.0, vec![0.5; 20]);
        let mut acquisition =
            AcquisitionLoop::new(TraceDriver::new(trace).unwrap(), buffer.producer(), 5);

        assert_eq!(acquisition.run_to_end().unwrap(), StopReason::SourceExhausted);
        let stats = acquisition.stats();
        assert_eq!(stats.samples_read, 20);
        assert_eq!(stats.overflows, 12);
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_closed_buffer_stops_loop() {
        let buffer = SampleBuffer::new(64).unwrap();
        buffer.close();
        let mut acquisition =
            AcquisitionLoop::new(SimulatedNiaDriver::new(256.0, 1), buffer.producer(), 4);
        assert_eq!(acquisition.run_to_end().unwrap(), StopReason::BufferClosed);
    }
}
