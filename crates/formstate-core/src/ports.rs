// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collaborator ports. The hosting shell and the record data service plug in
//! here; nothing in this crate depends on a UI framework or transport.

use crate::field::FieldAccessible;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

/// Error reported by a best-effort port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The host side channel is not reachable right now.
    #[error("port unavailable: {0}")]
    Unavailable(String),
}

/// Side channel asking the shell to warn before the window/tab closes.
///
/// Delivery is best-effort: callers log failures and carry on.
pub trait ExitGuard: Send + Sync {
    /// Enable or disable the close warning.
    fn set_exit_guard(&self, enabled: bool) -> Result<(), PortError>;
}

/// Exit guard for headless hosts with nothing to warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExitGuard;

impl ExitGuard for NoExitGuard {
    fn set_exit_guard(&self, _enabled: bool) -> Result<(), PortError> {
        Ok(())
    }
}

/// In-app navigation surface of the shell.
pub trait Navigator {
    /// Absolute URI currently displayed.
    fn current_uri(&self) -> String;
    /// Request navigation to `uri`.
    fn navigate_to(&self, uri: &str);
}

/// Source of "now" for edit-state timestamps and garbage collection.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// An editable record served by a [`DataService`].
pub trait Record: FieldAccessible + Clone {
    /// Record key. Must round-trip through `Display`/`FromStr` so a parked
    /// editor can be reopened from its stored key.
    type Id: Clone + Display + FromStr;

    /// This record's key.
    fn id(&self) -> Self::Id;
}

/// Record data service. Returned records are copies, never aliases of stored
/// state.
#[allow(async_fn_in_trait)]
pub trait DataService<R: Record> {
    /// All records.
    async fn list(&self) -> Vec<R>;
    /// One record, or `None` when the key is unknown.
    async fn get(&self, id: &R::Id) -> Option<R>;
    /// Commit `record`. `true` only if a record with the same key existed.
    async fn save(&self, record: &R) -> bool;
}
