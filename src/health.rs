// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Degraded-health detection from buffer and delivery counters

use impulse_config::HealthConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Snapshot of pipeline health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineHealth {
    pub status: HealthStatus,
    /// Samples dropped to overflow since start
    pub overflow_count: u64,
    /// Overflows during the current run of overflowing windows
    pub recent_overflows: u64,
    pub out_of_order_count: u64,
    /// Events dropped since start
    pub delivery_failures: u64,
    pub consecutive_delivery_failures: u32,
    /// Why the pipeline is degraded, empty when healthy
    pub reasons: Vec<String>,
}

/// Tracks counters between windows and decides the health status.
///
/// Overflow is "sustained" while each processed window sees new overflows;
/// one clean window resets the run. Delivery health follows the emitter's
/// consecutive-failure count.
#[derive(Debug)]
pub(crate) struct HealthMonitor {
    thresholds: HealthConfig,
    last_overflow_count: u64,
    recent_overflows: u64,
    current: PipelineHealth,
}

impl HealthMonitor {
    pub(crate) fn new(thresholds: &HealthConfig) -> Self {
        Self {
            thresholds: thresholds.clone(),
            last_overflow_count: 0,
            recent_overflows: 0,
            current: PipelineHealth {
                status: HealthStatus::Healthy,
                overflow_count: 0,
                recent_overflows: 0,
                out_of_order_count: 0,
                delivery_failures: 0,
                consecutive_delivery_failures: 0,
                reasons: Vec::new(),
            },
        }
    }

    /// Fold in the latest counters; called once per processed window
    pub(crate) fn observe(
        &mut self,
        overflow_count: u64,
        out_of_order_count: u64,
        delivery_failures: u64,
        consecutive_delivery_failures: u32,
    ) -> &PipelineHealth {
        let new_overflows = overflow_count.saturating_sub(self.last_overflow_count);
        self.last_overflow_count = overflow_count;
        if new_overflows == 0 {
            self.recent_overflows = 0;
        } else {
            self.recent_overflows += new_overflows;
        }

        let mut reasons = Vec::new();
        if self.recent_overflows >= self.thresholds.overflow_degraded_threshold {
            reasons.push(format!(
                "sustained buffer overflow ({} samples dropped)",
                self.recent_overflows
            ));
        }
        if consecutive_delivery_failures >= self.thresholds.delivery_failure_degraded_threshold {
            reasons.push(format!(
                "{} consecutive delivery failures",
                consecutive_delivery_failures
            ));
        }

        let status = if reasons.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        match (self.current.status, status) {
            (HealthStatus::Healthy, HealthStatus::Degraded) => {
                warn!("[HEALTH] Pipeline degraded: {}", reasons.join("; "));
            }
            (HealthStatus::Degraded, HealthStatus::Healthy) => {
                info!("[HEALTH] Pipeline recovered");
            }
            _ => {}
        }

        self.current = PipelineHealth {
            status,
            overflow_count,
            recent_overflows: self.recent_overflows,
            out_of_order_count,
            delivery_failures,
            consecutive_delivery_failures,
            reasons,
        };
        &self.current
    }

    pub(crate) fn current(&self) -> &PipelineHealth {
        &self.current
    }
}
