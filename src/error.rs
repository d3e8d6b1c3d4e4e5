// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use impulse_command::CommandError;
use impulse_config::ConfigError;
use impulse_driver::DriverError;
use impulse_signal::SignalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Pipeline is shut down")]
    ShutDown,
}

impl PipelineError {
    /// True for errors that must stop processing
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Signal(SignalError::InsufficientWindow { .. })
                | PipelineError::Signal(SignalError::FeatureLengthMismatch { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
