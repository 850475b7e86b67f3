// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Terminal stand-ins for the browser shell.

use formstate_core::{ExitGuard, Navigator, PortError};
use std::sync::Mutex;
use tracing::info;

/// Logs exit-guard toggles instead of installing a `beforeunload` hook.
pub struct LogExitGuard;

impl ExitGuard for LogExitGuard {
    fn set_exit_guard(&self, enabled: bool) -> Result<(), PortError> {
        info!(enabled, "exit guard");
        Ok(())
    }
}

/// Keeps the current URI in memory.
pub struct ShellNavigator {
    current: Mutex<String>,
}

impl ShellNavigator {
    pub fn at(uri: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(uri.into()),
        }
    }
}

impl Navigator for ShellNavigator {
    fn current_uri(&self) -> String {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn navigate_to(&self, uri: &str) {
        info!(uri, "navigate");
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = uri.to_owned();
    }
}
