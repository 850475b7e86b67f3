// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-shell doubles: an exit guard and a navigator that record every call.

use formstate_core::ports::{ExitGuard, Navigator, PortError};
use std::sync::{Arc, Mutex};

/// [`ExitGuard`] that records each toggle and can simulate a detached shell.
#[derive(Clone, Default)]
pub struct RecordingExitGuard {
    inner: Arc<Mutex<GuardInner>>,
}

#[derive(Default)]
struct GuardInner {
    calls: Vec<bool>,
    fail: bool,
}

impl RecordingExitGuard {
    /// New guard, initially disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value passed to `set_exit_guard`, in order (failed ones included).
    pub fn calls(&self) -> Vec<bool> {
        self.lock().calls.clone()
    }

    /// Last requested state; `false` if never called.
    pub fn enabled(&self) -> bool {
        self.lock().calls.last().copied().unwrap_or(false)
    }

    /// Make subsequent calls fail.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GuardInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ExitGuard for RecordingExitGuard {
    fn set_exit_guard(&self, enabled: bool) -> Result<(), PortError> {
        let mut inner = self.lock();
        inner.calls.push(enabled);
        if inner.fail {
            return Err(PortError::Unavailable("simulated shell failure".into()));
        }
        Ok(())
    }
}

/// [`Navigator`] that records requested URIs and treats each as current.
#[derive(Clone)]
pub struct RecordingNavigator {
    inner: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    /// Navigator currently showing `start`.
    pub fn at(start: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(vec![start.into()])),
        }
    }

    /// Every URI visited, starting with the initial one.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_uri(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn navigate_to(&self, uri: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(uri.to_owned());
    }
}
