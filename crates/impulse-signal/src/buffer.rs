// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded sample buffer between the sensor driver and the processing loop.
//!
//! The producer side never blocks: when the buffer is full the oldest sample
//! is dropped. The consumer polls for complete windows.

use crate::SignalError;
use impulse_structures::{Sample, Timestamp, Window};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
struct BufferState {
    samples: VecDeque<Sample>,
    capacity: usize,
    last_timestamp: Option<Timestamp>,
    accepted: u64,
    overflow_count: u64,
    out_of_order_count: u64,
    windows_emitted: u64,
    closed: bool,
}

impl BufferState {
    fn push(&mut self, sample: Sample) -> Result<(), SignalError> {
        if self.closed {
            return Err(SignalError::BufferClosed);
        }
        if let Some(last) = self.last_timestamp {
            if sample.timestamp <= last {
                self.out_of_order_count += 1;
                debug!(
                    "[BUFFER] Discarded out-of-order sample at {} (last {})",
                    sample.timestamp, last
                );
                return Err(SignalError::OutOfOrderSample {
                    timestamp: sample.timestamp,
                    last,
                });
            }
        }

        self.last_timestamp = Some(sample.timestamp);
        self.accepted += 1;

        let dropped = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);

        match dropped {
            Some(old) => {
                self.overflow_count += 1;
                Err(SignalError::Overflow {
                    dropped: old.timestamp,
                    overflow_count: self.overflow_count,
                })
            }
            None => Ok(()),
        }
    }
}

/// Counters describing the buffer since construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub len: usize,
    pub capacity: usize,
    pub accepted: u64,
    pub overflow_count: u64,
    pub out_of_order_count: u64,
    pub windows_emitted: u64,
    pub closed: bool,
}

/// Bounded FIFO of raw samples with overlapping-window extraction.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Result<Self, SignalError> {
        if capacity == 0 {
            return Err(SignalError::InvalidWindowGeometry(
                "buffer capacity must be at least 1".into(),
            ));
        }
        Ok(SampleBuffer {
            state: Arc::new(Mutex::new(BufferState {
                samples: VecDeque::with_capacity(capacity),
                capacity,
                last_timestamp: None,
                accepted: 0,
                overflow_count: 0,
                out_of_order_count: 0,
                windows_emitted: 0,
                closed: false,
            })),
        })
    }

    /// Accept one sample.
    ///
    /// `Err(Overflow)` means the sample was stored but the oldest one was
    /// dropped to make room. `Err(OutOfOrderSample)` means the sample was
    /// discarded. Both are counted and neither blocks.
    pub fn push(&self, sample: Sample) -> Result<(), SignalError> {
        self.state.lock().push(sample)
    }

    /// Return the next window of `size` samples if enough are buffered.
    ///
    /// After a window is returned its first `hop` samples are discarded, so
    /// the following window starts `hop` samples later.
    pub fn drain_window(&self, size: usize, hop: usize) -> Result<Option<Window>, SignalError> {
        let mut state = self.state.lock();
        if size == 0 || hop == 0 || hop > size {
            return Err(SignalError::InvalidWindowGeometry(format!(
                "size {} and hop {} must satisfy 1 <= hop <= size",
                size, hop
            )));
        }
        if size > state.capacity {
            return Err(SignalError::InvalidWindowGeometry(format!(
                "window of {} samples exceeds buffer capacity {}",
                size, state.capacity
            )));
        }
        if state.samples.len() < size {
            return Ok(None);
        }

        let sequence = state.windows_emitted;
        let window = {
            let contiguous = state.samples.make_contiguous();
            Window::from_samples(sequence, &contiguous[..size])?
        };
        state.samples.drain(..hop);
        state.windows_emitted += 1;
        Ok(Some(window))
    }

    /// Push-only handle for the acquisition side
    pub fn producer(&self) -> SampleProducer {
        SampleProducer {
            state: Arc::clone(&self.state),
        }
    }

    /// Stop accepting samples. Buffered samples stay available for draining.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            info!(
                "[BUFFER] Closed with {} samples pending ({} accepted, {} overflows)",
                state.samples.len(),
                state.accepted,
                state.overflow_count
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.state.lock();
        BufferStats {
            len: state.samples.len(),
            capacity: state.capacity,
            accepted: state.accepted,
            overflow_count: state.overflow_count,
            out_of_order_count: state.out_of_order_count,
            windows_emitted: state.windows_emitted,
            closed: state.closed,
        }
    }

    /// Copy of the samples currently retained, oldest first
    pub fn retained_samples(&self) -> Vec<Sample> {
        self.state.lock().samples.iter().copied().collect()
    }
}

/// Cloneable push-only access to a [`SampleBuffer`]
#[derive(Debug, Clone)]
pub struct SampleProducer {
    state: Arc<Mutex<BufferState>>,
}

impl SampleProducer {
    /// Driver callback: one reading at a monotonic timestamp
    pub fn on_sample(&self, value: f32, timestamp: Timestamp) -> Result<(), SignalError> {
        self.push(Sample::new(value, timestamp))
    }

    pub fn push(&self, sample: Sample) -> Result<(), SignalError> {
        self.state.lock().push(sample)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
