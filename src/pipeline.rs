// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Window-driven command pipeline.

One processing context owns every stage after the sample buffer and runs
each window to completion:

```text
SampleBuffer -> FilterBank -> FeatureExtractor -> Classifier
             -> CommandStateMachine -> EventEmitter -> CommandSink
```

The sensor side only holds a [`SampleProducer`]. Profile swaps staged via
[`ProfileHandle`] are adopted between windows.
*/

use crate::error::{PipelineError, Result};
use crate::health::{HealthMonitor, PipelineHealth};
use crate::profile_slot::ProfileHandle;
use impulse_command::{
    CommandSink, CommandStateMachine, EmitCancel, EmitOutcome, EmitterStats, EventEmitter,
};
use impulse_config::{validate_config, CalibrationProfile, ImpulseConfig};
use impulse_signal::{BufferStats, Classifier, FeatureExtractor, FilterBank, SampleBuffer, SampleProducer};
use impulse_structures::{ClassificationResult, CommandEvent, Intent, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happened to one window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub sequence: u64,
    pub classification: ClassificationResult,
    /// Events generated, in order
    pub events: Vec<CommandEvent>,
    /// Events the sink accepted (skipped HOLDs excluded)
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Profile version used for this window
    pub profile_version: u32,
}

/// Summary returned by [`CommandPipeline::shutdown`]
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    pub windows_processed: u64,
    /// Full windows drained after the buffer was closed
    pub drained_windows: u64,
    /// Samples left over that did not fill a window
    pub discarded_samples: usize,
    /// EXIT for the command active at shutdown, if any
    pub final_event: Option<CommandEvent>,
    pub final_event_delivered: bool,
    pub emitter: EmitterStats,
    pub buffer: BufferStats,
    pub health: PipelineHealth,
}

/// Stages rebuilt together whenever a profile is adopted
struct SignalStages {
    profile: Arc<CalibrationProfile>,
    filters: FilterBank,
    extractor: FeatureExtractor,
    classifier: Classifier,
}

impl SignalStages {
    fn build(profile: Arc<CalibrationProfile>) -> Result<Self> {
        Ok(Self {
            filters: FilterBank::from_profile(&profile)?,
            extractor: FeatureExtractor::from_profile(&profile)?,
            classifier: Classifier::from_profile(&profile)?,
            profile,
        })
    }
}

pub struct CommandPipeline<S: CommandSink> {
    buffer: SampleBuffer,
    stages: SignalStages,
    state_machine: CommandStateMachine,
    emitter: EventEmitter<S>,
    profile_handle: ProfileHandle,
    health: HealthMonitor,
    poll_interval: Duration,
    windows_processed: u64,
    last_window_end: Option<Timestamp>,
    shut_down: bool,
}

impl<S: CommandSink> CommandPipeline<S> {
    /// Build every stage from a validated configuration
    pub fn new(config: &ImpulseConfig, sink: S) -> Result<Self> {
        validate_config(config)?;

        let profile = Arc::new(config.profile.clone());
        let stages = SignalStages::build(Arc::clone(&profile))?;
        let state_machine = CommandStateMachine::from_settings(&profile.debounce)?;
        let emitter = EventEmitter::new(sink, &config.emitter)?;
        let buffer = SampleBuffer::new(config.pipeline.buffer_capacity)?;

        info!(
            "[PIPELINE] Ready: profile v{}, {}-sample windows (hop {}), {} filter stages, {} features, {} classifier, debounce {}",
            profile.version,
            profile.window.size,
            profile.window.hop,
            stages.filters.stage_count(),
            stages.extractor.feature_len(),
            stages.classifier.model_name(),
            profile.debounce.debounce_window
        );
        debug!("[PIPELINE] Features: {:?}", stages.extractor.feature_names());

        Ok(Self {
            buffer,
            stages,
            state_machine,
            emitter,
            profile_handle: ProfileHandle::new(config.pipeline.buffer_capacity),
            health: HealthMonitor::new(&config.health),
            poll_interval: Duration::from_millis(config.pipeline.poll_interval_ms),
            windows_processed: 0,
            last_window_end: None,
            shut_down: false,
        })
    }

    /// Push-only handle for the sensor driver
    pub fn producer(&self) -> SampleProducer {
        self.buffer.producer()
    }

    /// Handle for staging profiles from other threads
    pub fn profile_handle(&self) -> ProfileHandle {
        self.profile_handle.clone()
    }

    /// Stage a profile; it applies from the next window on
    pub fn set_profile(&self, profile: CalibrationProfile) -> Result<()> {
        Ok(self.profile_handle.stage(profile)?)
    }

    pub fn active_profile(&self) -> Arc<CalibrationProfile> {
        Arc::clone(&self.stages.profile)
    }

    /// Process at most one window.
    ///
    /// Returns `Ok(None)` when no full window is buffered. Delivery failures
    /// are logged and counted, never returned; only stage wiring errors are.
    pub fn poll_once(&mut self) -> Result<Option<WindowReport>> {
        self.adopt_staged_profile();

        let window_settings = self.stages.profile.window;
        let Some(window) = self
            .buffer
            .drain_window(window_settings.size, window_settings.hop)?
        else {
            return Ok(None);
        };
        let sequence = window.sequence();

        let filtered = self.stages.filters.apply(window);
        let features = self.stages.extractor.extract(&filtered).map_err(|e| {
            error!("[PIPELINE] Window {} rejected by feature extractor: {}", sequence, e);
            PipelineError::from(e)
        })?;
        let classification = self
            .stages
            .classifier
            .classify(&features, &self.stages.profile)?;
        debug!(
            "[PIPELINE] Window {}: {} ({:.3}) features={:?}",
            sequence,
            classification.label,
            classification.confidence,
            features.values()
        );

        let events = self.state_machine.observe(&classification);
        let mut report = WindowReport {
            sequence,
            classification,
            events: events.clone(),
            delivered: 0,
            skipped: 0,
            failed: 0,
            profile_version: self.stages.profile.version,
        };
        for event in events {
            match self.emitter.emit(event) {
                Ok(EmitOutcome::Delivered { .. }) => report.delivered += 1,
                Ok(EmitOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!("[PIPELINE] {}", e);
                    report.failed += 1;
                }
            }
        }

        self.windows_processed += 1;
        self.last_window_end = Some(filtered.end_timestamp());
        self.refresh_health();
        Ok(Some(report))
    }

    /// Process every full window currently buffered
    pub fn process_available(&mut self) -> Result<Vec<WindowReport>> {
        let mut reports = Vec::new();
        while let Some(report) = self.poll_once()? {
            reports.push(report);
        }
        Ok(reports)
    }

    /// Poll until `stop` is set, waiting `poll` between empty polls.
    ///
    /// Returns the number of windows processed by this call. Call
    /// [`shutdown`](Self::shutdown) afterwards to drain and force IDLE.
    pub fn run(&mut self, stop: &AtomicBool, poll: Duration) -> Result<u64> {
        if self.shut_down {
            return Err(PipelineError::ShutDown);
        }
        info!("[PIPELINE] Processing loop started");
        let start = self.windows_processed;
        while !stop.load(Ordering::Relaxed) {
            if self.poll_once()?.is_none() {
                thread::sleep(poll);
            }
        }
        let processed = self.windows_processed - start;
        info!("[PIPELINE] Processing loop stopped after {} windows", processed);
        Ok(processed)
    }

    /// [`run`](Self::run) with the configured poll interval
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<u64> {
        let poll = self.poll_interval;
        self.run(stop, poll)
    }

    /// Controlled stop: close the buffer, drain every full window, force IDLE
    /// and deliver the final EXIT.
    pub fn shutdown(&mut self) -> Result<ShutdownReport> {
        if self.shut_down {
            return Err(PipelineError::ShutDown);
        }
        info!("[PIPELINE] Shutting down");
        self.buffer.close();

        let before = self.windows_processed;
        self.process_available()?;
        let drained_windows = self.windows_processed - before;

        let timestamp = self.last_window_end.unwrap_or(Timestamp::ZERO);
        let final_event = self.state_machine.force_idle(timestamp);
        let mut final_event_delivered = false;
        if let Some(event) = final_event {
            match self.emitter.emit(event) {
                Ok(_) => final_event_delivered = true,
                Err(e) => warn!("[PIPELINE] Final transition lost: {}", e),
            }
            self.refresh_health();
        }

        self.shut_down = true;
        let report = ShutdownReport {
            windows_processed: self.windows_processed,
            drained_windows,
            discarded_samples: self.buffer.len(),
            final_event,
            final_event_delivered,
            emitter: self.emitter.stats(),
            buffer: self.buffer.stats(),
            health: self.health.current().clone(),
        };
        info!(
            "[PIPELINE] Shutdown complete: {} windows, {} delivered, {} failed, {} samples discarded",
            report.windows_processed,
            report.emitter.delivered,
            report.emitter.failed,
            report.discarded_samples
        );
        Ok(report)
    }

    /// Cancels the delivery currently waiting on a retry backoff
    pub fn cancel_handle(&self) -> EmitCancel {
        self.emitter.cancel_handle()
    }

    pub fn health(&self) -> PipelineHealth {
        self.health.current().clone()
    }

    pub fn active(&self) -> Intent {
        self.state_machine.active()
    }

    pub fn windows_processed(&self) -> u64 {
        self.windows_processed
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn emitter_stats(&self) -> EmitterStats {
        self.emitter.stats()
    }

    pub fn sink(&self) -> &S {
        self.emitter.sink()
    }

    pub fn into_sink(self) -> S {
        self.emitter.into_sink()
    }

    fn adopt_staged_profile(&mut self) {
        let Some(profile) = self.profile_handle.take() else {
            return;
        };

        let stages = match SignalStages::build(Arc::clone(&profile)) {
            Ok(stages) => stages,
            Err(e) => {
                error!(
                    "[PROFILE] Failed to build stages for profile v{}, keeping v{}: {}",
                    profile.version, self.stages.profile.version, e
                );
                return;
            }
        };
        if let Err(e) = self.state_machine.reconfigure(&profile.debounce) {
            error!(
                "[PROFILE] Rejected debounce settings of profile v{}: {}",
                profile.version, e
            );
            return;
        }
        if profile.sampling_rate_hz != self.stages.profile.sampling_rate_hz {
            warn!(
                "[PROFILE] Sampling rate changed {} -> {} Hz; the driver must match",
                self.stages.profile.sampling_rate_hz, profile.sampling_rate_hz
            );
        }

        info!(
            "[PROFILE] Adopted profile v{} after window {} ({} classifier, debounce {})",
            profile.version,
            self.windows_processed,
            stages.classifier.model_name(),
            profile.debounce.debounce_window
        );
        self.stages = stages;
    }

    fn refresh_health(&mut self) {
        let buffer = self.buffer.stats();
        let emitter = self.emitter.stats();
        self.health.observe(
            buffer.overflow_count,
            buffer.out_of_order_count,
            emitter.failed,
            emitter.consecutive_failures,
        );
    }
}
