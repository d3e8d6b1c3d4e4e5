// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end pipeline behaviour on synthetic impulse streams

use impulse::command::{RecordingSink, SinkError};
use impulse::config::{ClassifierModel, ImpulseConfig, ThresholdRule};
use impulse::driver::{AcquisitionLoop, RecordedTrace, SampleClock, TraceDriver};
use impulse::signal::SampleProducer;
use impulse::structures::{Command, CommandEvent, Intent, Timestamp, Transition};
use impulse::{CommandPipeline, HealthStatus, PipelineError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const RATE: f64 = 256.0;

/// Feeds tone and silence segments with continuous timestamps
struct Stimulus {
    producer: SampleProducer,
    clock: SampleClock,
}

impl Stimulus {
    fn new(producer: SampleProducer) -> Self {
        Self {
            producer,
            clock: SampleClock::new(RATE, Timestamp::from_micros(1)),
        }
    }

    fn tone(&mut self, samples: usize, frequency_hz: f64) {
        for _ in 0..samples {
            let t = self.clock.ticks() as f64 / RATE;
            let value = (2.0 * std::f64::consts::PI * frequency_hz * t).sin() as f32;
            let _ = self.producer.on_sample(value, self.clock.tick());
        }
    }

    fn silence(&mut self, samples: usize) {
        for _ in 0..samples {
            let _ = self.producer.on_sample(0.0, self.clock.tick());
        }
    }
}

fn config_without_hold() -> ImpulseConfig {
    let mut config = ImpulseConfig::default();
    config.profile.debounce.command_hold_timeout_ms = 0;
    config.emitter.base_backoff_ms = 1;
    config.emitter.max_backoff_ms = 2;
    config
}

fn transitions(events: &[CommandEvent]) -> Vec<(Transition, Command)> {
    events.iter().map(|e| (e.transition, e.command)).collect()
}

#[test]
fn sustained_tone_enters_once_and_silence_exits() {
    let probe = RecordingSink::new();
    let mut pipeline = CommandPipeline::new(&config_without_hold(), probe.clone()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    stimulus.tone(1_024, 10.0);
    let reports = pipeline.process_available().unwrap();
    assert_eq!(reports.len(), 7);
    assert_eq!(pipeline.active(), Intent::Forward);
    assert_eq!(
        transitions(&probe.events()),
        vec![(Transition::Enter, Command::Forward)]
    );

    // The ENTER is only produced after enough consecutive FORWARD windows
    let enter_at = reports.iter().position(|r| !r.events.is_empty()).unwrap();
    assert!(enter_at >= 2);
    assert!(reports[enter_at + 1 - 3..=enter_at]
        .iter()
        .all(|r| r.classification.label == Intent::Forward));

    stimulus.silence(1_536);
    pipeline.process_available().unwrap();
    assert_eq!(pipeline.active(), Intent::Idle);
    assert_eq!(
        transitions(&probe.events()),
        vec![
            (Transition::Enter, Command::Forward),
            (Transition::Exit, Command::Forward),
        ]
    );

    let report = pipeline.shutdown().unwrap();
    assert_eq!(report.final_event, None);
    assert_eq!(probe.events().len(), 2);
}

#[test]
fn silence_never_produces_commands() {
    let probe = RecordingSink::new();
    let mut pipeline = CommandPipeline::new(&config_without_hold(), probe.clone()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    stimulus.silence(4_096);
    let reports = pipeline.process_available().unwrap();
    assert!(!reports.is_empty());
    for report in &reports {
        assert_eq!(report.classification.label, Intent::Idle);
        assert_eq!(report.classification.confidence, 1.0);
    }
    assert!(probe.events().is_empty());
}

#[test]
fn shutdown_drains_windows_and_exits_active_command() {
    let probe = RecordingSink::new();
    let mut pipeline = CommandPipeline::new(&config_without_hold(), probe.clone()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    // Nothing is processed before shutdown; it must drain all 7 windows
    stimulus.tone(1_024 + 100, 10.0);
    let report = pipeline.shutdown().unwrap();

    assert_eq!(report.drained_windows, 7);
    assert_eq!(report.windows_processed, 7);
    assert_eq!(report.discarded_samples, 1_124 - 7 * 128);
    assert!(report.final_event_delivered);
    let exit = report.final_event.unwrap();
    assert_eq!((exit.transition, exit.command), (Transition::Exit, Command::Forward));

    let events = probe.events();
    assert_eq!(
        transitions(&events),
        vec![
            (Transition::Enter, Command::Forward),
            (Transition::Exit, Command::Forward),
        ]
    );
    assert!(events[1].timestamp >= events[0].timestamp);

    // Closed buffer refuses new samples, and shutdown happens once
    assert!(pipeline.producer().on_sample(0.0, Timestamp::from_millis(3_600_000)).is_err());
    assert!(matches!(pipeline.shutdown(), Err(PipelineError::ShutDown)));
}

#[test]
fn hold_heartbeats_follow_hold_timeout() {
    let mut config = config_without_hold();
    config.profile.debounce.command_hold_timeout_ms = 1_000;
    let probe = RecordingSink::new();
    let mut pipeline = CommandPipeline::new(&config, probe.clone()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    stimulus.tone(3_072, 10.0);
    pipeline.process_available().unwrap();

    let events = probe.events();
    assert_eq!(events[0].transition, Transition::Enter);
    let holds: Vec<&CommandEvent> = events
        .iter()
        .filter(|e| e.transition == Transition::Hold)
        .collect();
    assert!(!holds.is_empty());
    let mut last = events[0].timestamp;
    for hold in holds {
        assert!(hold.timestamp.duration_since(last) >= Duration::from_millis(1_000));
        last = hold.timestamp;
    }
}

#[test]
fn hot_swapped_profile_applies_between_windows() {
    let probe = RecordingSink::new();
    let mut pipeline = CommandPipeline::new(&config_without_hold(), probe.clone()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    stimulus.tone(2_048, 10.0);
    let mut before = Vec::new();
    while pipeline.active() != Intent::Forward {
        before.push(pipeline.poll_once().unwrap().unwrap());
    }

    // Same features, but the 8-12 Hz band now means TURN RIGHT
    let mut swapped = pipeline.active_profile().as_ref().clone();
    swapped.version = 2;
    swapped.debounce.debounce_window = 2;
    swapped.classifier = ClassifierModel::FeatureThreshold {
        rules: vec![ThresholdRule {
            label: Intent::TurnRight,
            feature_index: 1,
            floor: 0.005,
            ceiling: 0.05,
        }],
    };
    let handle = pipeline.profile_handle();
    thread::spawn(move || handle.stage(swapped).unwrap())
        .join()
        .unwrap();
    assert_eq!(pipeline.active_profile().version, 1);

    let rest = pipeline.process_available().unwrap();
    assert!(before.iter().all(|r| r.profile_version == 1));
    assert!(rest.len() >= 4);
    assert!(rest.iter().all(|r| r.profile_version == 2));
    assert_eq!(pipeline.active_profile().version, 2);

    // The streak restarts under the new debounce window
    assert!(rest[0].events.is_empty());
    let swapped_events: Vec<CommandEvent> =
        rest.iter().flat_map(|r| r.events.iter().copied()).collect();
    assert_eq!(
        transitions(&swapped_events),
        vec![
            (Transition::Exit, Command::Forward),
            (Transition::Enter, Command::TurnRight),
        ]
    );
    assert_eq!(pipeline.active(), Intent::TurnRight);
}

#[test]
fn sustained_overflow_reports_degraded_health() {
    let mut config = config_without_hold();
    config.pipeline.buffer_capacity = 512;
    config.health.overflow_degraded_threshold = 64;
    let mut pipeline = CommandPipeline::new(&config, RecordingSink::new()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    stimulus.silence(2_048);
    pipeline.poll_once().unwrap();
    let health = pipeline.health();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.overflow_count, 2_048 - 512);
    assert!(!health.reasons.is_empty());

    // No further overflow: the next window is healthy again
    pipeline.poll_once().unwrap();
    assert_eq!(pipeline.health().status, HealthStatus::Healthy);
}

#[test]
fn delivery_failures_do_not_halt_processing() {
    let mut config = config_without_hold();
    config.health.delivery_failure_degraded_threshold = 1;
    let probe = RecordingSink::new();
    probe.fail_next(SinkError::Rejected("vehicle busy".to_string()));
    let mut pipeline = CommandPipeline::new(&config, probe.clone()).unwrap();
    let mut stimulus = Stimulus::new(pipeline.producer());

    stimulus.tone(1_024, 10.0);
    let reports = pipeline.process_available().unwrap();
    assert_eq!(reports.iter().map(|r| r.failed).sum::<usize>(), 1);
    assert_eq!(pipeline.health().status, HealthStatus::Degraded);
    assert_eq!(pipeline.active(), Intent::Forward);

    stimulus.silence(1_536);
    pipeline.process_available().unwrap();
    assert_eq!(
        transitions(&probe.events()),
        vec![(Transition::Exit, Command::Forward)]
    );
    assert_eq!(pipeline.health().status, HealthStatus::Healthy);
    assert_eq!(pipeline.emitter_stats().failed, 1);
}

#[test]
fn threaded_acquisition_with_run_loop() {
    let samples: Vec<f32> = (0..3_000)
        .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / RATE).sin() as f32)
        .collect();
    let trace = RecordedTrace::new(RATE, samples);

    let mut config = config_without_hold();
    config.pipeline.buffer_capacity = 4_096;
    let probe = RecordingSink::new();
    let mut pipeline = CommandPipeline::new(&config, probe.clone()).unwrap();
    let acquisition = AcquisitionLoop::new(TraceDriver::new(trace).unwrap(), pipeline.producer(), 32)
        .spawn();
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            let run = acquisition.join().unwrap();
            assert_eq!(run.stats.samples_accepted, 3_000);
            stop.store(true, Ordering::Relaxed);
        });
        pipeline.run(&stop, Duration::from_millis(1)).unwrap();
    });

    let report = pipeline.shutdown().unwrap();
    assert_eq!(report.windows_processed, ((3_000 - 256) / 128 + 1) as u64);
    assert_eq!(
        transitions(&probe.events()),
        vec![
            (Transition::Enter, Command::Forward),
            (Transition::Exit, Command::Forward),
        ]
    );
    assert_eq!(report.health.status, HealthStatus::Healthy);
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut config = ImpulseConfig::default();
    config.profile.window.hop = config.profile.window.size + 1;
    assert!(matches!(
        CommandPipeline::new(&config, RecordingSink::new()),
        Err(PipelineError::Config(_))
    ));
}
