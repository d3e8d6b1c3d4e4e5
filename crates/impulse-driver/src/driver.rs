// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::DriverError;
use impulse_structures::Sample;

/// Source of timestamped impulse samples
pub trait SensorDriver: Send {
    /// Open the device
    ///
    /// # Returns
    /// Ok(()) or `ConnectionFailed`
    fn connect(&mut self) -> Result<(), DriverError>;

    /// Read up to `count` samples
    ///
    /// # Arguments
    /// * `count` - Maximum number of samples to return
    ///
    /// # Returns
    /// Samples in timestamp order; empty once a finite source is exhausted.
    /// `NotConnected` if the driver is not connected.
    fn read_signal(&mut self, count: usize) -> Result<Vec<Sample>, DriverError>;

    /// Close the device. Disconnecting twice logs a warning and does nothing.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Samples per second produced by the device
    fn sampling_rate(&self) -> f64;

    /// Driver name for logs (e.g., "simulated-nia", "trace")
    fn name(&self) -> &str;
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    fn connect(&mut self) -> Result<(), DriverError> {
        (**self).connect()
    }

    fn read_signal(&mut self, count: usize) -> Result<Vec<Sample>, DriverError> {
        (**self).read_signal(count)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn sampling_rate(&self) -> f64 {
        (**self).sampling_rate()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
