// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cancellation of an in-flight emit

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct CancelState {
    requested: Mutex<bool>,
    wakeup: Condvar,
}

/// Cloneable handle that fails the emit currently waiting out a backoff.
///
/// A request is consumed by exactly one emit. Requests made while no emit is
/// running are discarded when the next emit starts.
#[derive(Debug, Clone, Default)]
pub struct EmitCancel {
    state: Arc<CancelState>,
}

impl EmitCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiting emit
    pub fn cancel(&self) {
        *self.state.requested.lock() = true;
        self.state.wakeup.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.state.requested.lock()
    }

    /// Drop a stale request
    pub(crate) fn clear(&self) {
        *self.state.requested.lock() = false;
    }

    /// Sleep for `delay` unless cancelled first. Returns true (and consumes
    /// the request) if cancelled.
    pub(crate) fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut requested = self.state.requested.lock();
        while !*requested {
            if self
                .state
                .wakeup
                .wait_until(&mut requested, deadline)
                .timed_out()
            {
                break;
            }
        }
        let cancelled = *requested;
        *requested = false;
        cancelled
    }
}
