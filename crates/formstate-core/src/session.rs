// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-session editing context.
//!
//! An [`EditSession`] is created once per user session and handed to every
//! editor and to the navigation machine. Clones share the same state.

use crate::config::FormStateConfig;
use crate::ports::ExitGuard;
use crate::store::{EditStateStore, FormIdentity, StoreError};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// The editor whose unsaved work the navigation gate protects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkedEditor {
    /// Store key of the parked edit.
    pub identity: FormIdentity,
    /// Route that renders this editor.
    pub route: String,
    /// Key of the record being edited, as text.
    pub record_key: String,
}

struct SessionInner {
    store: Mutex<EditStateStore>,
    parked: Mutex<Option<ParkedEditor>>,
    exit_guard: Arc<dyn ExitGuard>,
    config: FormStateConfig,
}

/// Shared session state: parked edit store, active dirty editor, exit guard.
#[derive(Clone)]
pub struct EditSession {
    inner: Arc<SessionInner>,
}

impl EditSession {
    /// Session over `store`, reporting exit-guard changes to `exit_guard`.
    pub fn new(store: EditStateStore, exit_guard: Arc<dyn ExitGuard>, config: FormStateConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store: Mutex::new(store),
                parked: Mutex::new(None),
                exit_guard,
                config,
            }),
        }
    }

    /// Session with an in-memory store built from `config`.
    pub fn from_config(config: FormStateConfig, exit_guard: Arc<dyn ExitGuard>) -> Self {
        Self::new(EditStateStore::from_config(&config), exit_guard, config)
    }

    /// Session configuration.
    pub fn config(&self) -> &FormStateConfig {
        &self.inner.config
    }

    /// Run `f` against the store. The lock is held only for the call.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut EditStateStore) -> T) -> T {
        let mut store = self.inner.store.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut store)
    }

    /// Mark `editor` as the active dirty editor.
    pub fn park(&self, editor: ParkedEditor) {
        info!(identity = %editor.identity, route = %editor.route, "editor parked");
        *self.lock_parked() = Some(editor);
    }

    /// Forget the active dirty editor if it is `identity`. Returns whether it was.
    pub fn unpark(&self, identity: &FormIdentity) -> bool {
        let mut parked = self.lock_parked();
        if parked.as_ref().is_some_and(|p| &p.identity == identity) {
            *parked = None;
            return true;
        }
        false
    }

    /// The active dirty editor, whether or not its record is still live.
    pub fn parked_editor(&self) -> Option<ParkedEditor> {
        self.lock_parked().clone()
    }

    /// The active dirty editor if the store still holds its unsaved work.
    ///
    /// A parked editor whose record was garbage-collected is forgotten and the
    /// exit guard is dropped.
    pub fn unsaved_editor(&self) -> Option<ParkedEditor> {
        let parked = self.parked_editor()?;
        if self.with_store(|s| s.get(&parked.identity).is_some()) {
            return Some(parked);
        }
        info!(identity = %parked.identity, "parked edit expired");
        self.unpark(&parked.identity);
        self.set_exit_guard(false);
        None
    }

    /// Drop the active dirty editor's parked record and the exit guard.
    ///
    /// The editor is unparked and the guard dropped even when the mirror write
    /// fails; the error is returned so the caller knows a restore could still
    /// bring the edit back until the store flushes.
    pub fn discard_parked(&self) -> Result<Option<ParkedEditor>, StoreError> {
        let Some(parked) = self.lock_parked().take() else {
            return Ok(None);
        };
        let cleared = self.with_store(|s| s.clear(&parked.identity));
        self.set_exit_guard(false);
        info!(identity = %parked.identity, "unsaved edits discarded");
        cleared.map(|_| Some(parked))
    }

    /// Best-effort exit-guard toggle. Failures are logged, never returned.
    pub fn set_exit_guard(&self, enabled: bool) {
        if let Err(err) = self.inner.exit_guard.set_exit_guard(enabled) {
            warn!(enabled, error = %err, "exit guard not delivered");
        }
    }

    fn lock_parked(&self) -> std::sync::MutexGuard<'_, Option<ParkedEditor>> {
        self.inner.parked.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("parked", &self.parked_editor())
            .finish_non_exhaustive()
    }
}
