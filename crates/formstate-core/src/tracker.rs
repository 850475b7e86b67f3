// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field-level dirty tracking over any [`FieldAccessible`] model.
//!
//! The tracker keeps a baseline and a current value per field. Aggregate
//! dirty status is maintained as a count of dirty fields, updated in the same
//! step as the field it depends on, so it cannot drift from the snapshot pair.
//!
//! The tracker never owns the model. Every operation borrows it from the
//! caller, which keeps the host as the single owner of the edited instance.

use crate::field::{FieldAccessible, FieldSnapshot, FieldValue};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for tracker operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Used before a successful `initialize`.
    #[error("tracker is not initialized")]
    Uninitialized,
    /// `initialize` was given no model.
    #[error("cannot track a null model")]
    NullModel,
    /// Change notification for a field outside the tracked set.
    #[error("field `{0}` is not tracked")]
    UnknownField(String),
}

/// Result of a single field change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldUpdate {
    /// Whether the changed field now differs from its baseline.
    pub field_dirty: bool,
    /// Aggregate dirty status after the change.
    pub dirty: bool,
    /// `true` when the aggregate status flipped with this change.
    pub transitioned: bool,
}

#[derive(Debug, Clone)]
struct TrackedField {
    baseline: FieldValue,
    current: FieldValue,
}

impl TrackedField {
    fn is_dirty(&self) -> bool {
        self.baseline != self.current
    }
}

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Handle for a dirty-state listener. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<ListenerSet>>,
}

impl Subscription {
    /// Detach now. Equivalent to dropping the handle.
    pub fn detach(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(set) = self.listeners.upgrade() {
            let mut set = set.lock().unwrap_or_else(|e| e.into_inner());
            set.entries.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Snapshot/diff tracker for one model instance.
#[derive(Default)]
pub struct FieldDiffTracker {
    fields: Option<BTreeMap<String, TrackedField>>,
    dirty_count: usize,
    listeners: Arc<Mutex<ListenerSet>>,
}

impl FieldDiffTracker {
    /// Create an uninitialized tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline `model` and optionally overlay `recovered` values onto it.
    ///
    /// Recovered values are written into the live model, so the model reflects
    /// the parked edits once this returns. Names in `recovered` that the model
    /// does not track, or values the model rejects, are skipped with a warning.
    /// When the overlay leaves the model dirty, listeners are notified with
    /// `true` before this returns.
    ///
    /// Returns the aggregate dirty status. On `NullModel` the tracker is left
    /// uninitialized.
    pub fn initialize<M>(
        &mut self,
        model: Option<&mut M>,
        recovered: Option<&FieldSnapshot>,
    ) -> Result<bool, TrackerError>
    where
        M: FieldAccessible + ?Sized,
    {
        self.fields = None;
        self.dirty_count = 0;
        let Some(model) = model else {
            warn!("tracker initialize called without a model");
            return Err(TrackerError::NullModel);
        };

        let baseline = model.snapshot();
        if let Some(recovered) = recovered {
            for (name, value) in recovered {
                if !baseline.contains_key(name) {
                    debug!(field = %name, "recovered field not tracked by model; skipped");
                    continue;
                }
                if let Err(err) = model.set_field(name, value.clone()) {
                    warn!(field = %name, error = %err, "recovered value rejected by model");
                }
            }
        }
        let current = model.snapshot();

        let fields: BTreeMap<String, TrackedField> = baseline
            .into_iter()
            .map(|(name, baseline)| {
                let current = current.get(&name).cloned().unwrap_or_else(|| baseline.clone());
                (name, TrackedField { baseline, current })
            })
            .collect();
        self.dirty_count = fields.values().filter(|f| f.is_dirty()).count();
        self.fields = Some(fields);

        let dirty = self.is_dirty();
        debug!(fields = self.len(), dirty, "tracker initialized");
        if dirty {
            self.emit(true);
        }
        Ok(dirty)
    }

    /// Re-read `field` from `model` and update dirty status.
    ///
    /// Listeners fire only when the aggregate status flips.
    pub fn notify_field_changed<M>(&mut self, model: &M, field: &str) -> Result<FieldUpdate, TrackerError>
    where
        M: FieldAccessible + ?Sized,
    {
        let fields = self.fields.as_mut().ok_or(TrackerError::Uninitialized)?;
        let entry = fields
            .get_mut(field)
            .ok_or_else(|| TrackerError::UnknownField(field.to_owned()))?;
        let value = model
            .get_field(field)
            .ok_or_else(|| TrackerError::UnknownField(field.to_owned()))?;

        let was_dirty = self.dirty_count > 0;
        let was_field_dirty = entry.is_dirty();
        entry.current = value;
        let field_dirty = entry.is_dirty();
        match (was_field_dirty, field_dirty) {
            (false, true) => self.dirty_count += 1,
            (true, false) => self.dirty_count -= 1,
            _ => {}
        }
        self.debug_check();

        let dirty = self.dirty_count > 0;
        let transitioned = dirty != was_dirty;
        debug!(field, field_dirty, dirty, transitioned, "field changed");
        if transitioned {
            self.emit(dirty);
        }
        Ok(FieldUpdate {
            field_dirty,
            dirty,
            transitioned,
        })
    }

    /// Re-baseline from the model's current values (after a save).
    ///
    /// No listener fires; the caller owns whatever follow-up a save implies.
    /// Returns whether the tracker was dirty before the reset.
    pub fn reset<M>(&mut self, model: &M) -> Result<bool, TrackerError>
    where
        M: FieldAccessible + ?Sized,
    {
        let fields = self.fields.as_mut().ok_or(TrackerError::Uninitialized)?;
        let was_dirty = self.dirty_count > 0;
        let snapshot = model.snapshot();
        for (name, tracked) in &mut *fields {
            if let Some(value) = snapshot.get(name) {
                tracked.baseline = value.clone();
                tracked.current = value.clone();
            } else {
                tracked.baseline = tracked.current.clone();
            }
        }
        self.dirty_count = 0;
        self.debug_check();
        Ok(was_dirty)
    }

    /// Drop every tracked field and return to the uninitialized state.
    /// Listeners stay attached and no event fires.
    pub fn clear(&mut self) {
        self.fields = None;
        self.dirty_count = 0;
    }

    /// Aggregate dirty status. `false` when uninitialized.
    pub fn is_dirty(&self) -> bool {
        self.dirty_count > 0
    }

    /// Whether a tracked field differs from its baseline.
    pub fn is_field_dirty(&self, field: &str) -> Option<bool> {
        self.fields.as_ref()?.get(field).map(TrackedField::is_dirty)
    }

    /// Names of all dirty fields, sorted.
    pub fn dirty_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .flat_map(|fields| fields.iter())
            .filter(|(_, f)| f.is_dirty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Baseline value of a tracked field.
    pub fn baseline_value(&self, field: &str) -> Option<&FieldValue> {
        self.fields.as_ref()?.get(field).map(|f| &f.baseline)
    }

    /// Current (last notified) values of every tracked field.
    pub fn current_snapshot(&self) -> FieldSnapshot {
        self.fields
            .iter()
            .flat_map(|fields| fields.iter())
            .map(|(name, f)| (name.clone(), f.current.clone()))
            .collect()
    }

    /// `true` once `initialize` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.fields.is_some()
    }

    /// Number of tracked fields.
    pub fn len(&self) -> usize {
        self.fields.as_ref().map_or(0, BTreeMap::len)
    }

    /// `true` when no fields are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a dirty-state listener. It receives the new aggregate status on
    /// every transition and stays attached until the handle is dropped.
    pub fn on_dirty_state_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut set = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let id = set.next_id;
        set.next_id += 1;
        set.entries.insert(id, Arc::new(callback));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    // Listeners run outside the lock so one may drop its own Subscription.
    fn emit(&self, dirty: bool) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(dirty);
        }
    }

    fn debug_check(&self) {
        debug_assert_eq!(
            self.dirty_count,
            self.fields
                .as_ref()
                .map_or(0, |f| f.values().filter(|t| t.is_dirty()).count()),
            "dirty count drifted from field data"
        );
    }
}

impl std::fmt::Debug for FieldDiffTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDiffTracker")
            .field("initialized", &self.is_initialized())
            .field("fields", &self.len())
            .field("dirty_count", &self.dirty_count)
            .finish_non_exhaustive()
    }
}
