// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use impulse_config::{validate_profile, CalibrationProfile, ConfigError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Staging slot for calibration profile hot swaps.
///
/// Any thread may stage a profile; the pipeline adopts the most recently
/// staged one at its next window boundary. A window is never processed with a
/// mix of two profiles.
#[derive(Debug, Clone)]
pub struct ProfileHandle {
    pending: Arc<Mutex<Option<Arc<CalibrationProfile>>>>,
    buffer_capacity: usize,
}

impl ProfileHandle {
    pub(crate) fn new(buffer_capacity: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
            buffer_capacity,
        }
    }

    /// Validate and stage a profile, replacing any profile not yet adopted
    pub fn stage(&self, profile: CalibrationProfile) -> Result<(), ConfigError> {
        validate_profile(&profile)?;
        if profile.window.size > self.buffer_capacity {
            return Err(ConfigError::ValidationError(format!(
                "profile window of {} samples exceeds buffer capacity {}",
                profile.window.size, self.buffer_capacity
            )));
        }

        let version = profile.version;
        let replaced = self.pending.lock().replace(Arc::new(profile)).is_some();
        info!(
            "[PROFILE] Staged calibration profile v{}{}",
            version,
            if replaced { " (replacing unadopted profile)" } else { "" }
        );
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub(crate) fn take(&self) -> Option<Arc<CalibrationProfile>> {
        self.pending.lock().take()
    }
}
