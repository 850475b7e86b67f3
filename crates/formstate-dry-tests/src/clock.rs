// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Manually advanced clock.

use formstate_core::ports::Clock;
use std::sync::{Arc, Mutex};
use time::{macros::datetime, Duration, OffsetDateTime};

/// A [`Clock`] that only moves when told to. Clones share the same time.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(datetime!(2026-03-01 09:00 UTC))
    }
}

impl ManualClock {
    /// Clock fixed at 2026-03-01 09:00 UTC.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock fixed at `now`.
    pub fn at(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
