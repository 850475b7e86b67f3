// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Editor-side glue: loads a record, recovers parked edits, tracks fields,
//! parks unsaved work in the session store and saves through the data service.
//!
//! While the editor is dirty every field change re-parks the model so the
//! parked copy always matches the screen. The exit guard and the session's
//! parked-editor slot are raised on the dirty transition, and raised again
//! whenever a dirty edit finds the slot no longer holds this editor (its
//! parked record expired in between).

use crate::field::{FieldError, FieldSnapshot, FieldValue};
use crate::ports::{DataService, Navigator, Record};
use crate::session::{EditSession, ParkedEditor};
use crate::store::{FormIdentity, StoreError};
use crate::tracker::{FieldDiffTracker, FieldUpdate, Subscription, TrackerError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Loading lifecycle of an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Not opened yet.
    #[default]
    New,
    /// Waiting on the data service.
    Loading,
    /// Record loaded and tracked.
    Loaded,
    /// The record could not be loaded.
    InError,
}

/// Error type for editor operations.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The data service has no record with this key.
    #[error("record `{0}` not found")]
    NotFound(String),
    /// A parked record key did not parse as the record's id type.
    #[error("invalid record key `{0}`")]
    InvalidRecordKey(String),
    /// Tracker misuse (editor not opened).
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    /// The model rejected a field write.
    #[error(transparent)]
    Field(#[from] FieldError),
    /// Parking the edit state failed. The edits are still held in memory.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The model could not be serialized for parking.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// An editing screen's state: one model, its tracker and its session.
pub struct EditorHost<R, D> {
    session: EditSession,
    data: D,
    form_kind: String,
    route: String,
    identity: Option<FormIdentity>,
    model: Option<R>,
    tracker: FieldDiffTracker,
    load_state: LoadState,
}

impl<R, D> EditorHost<R, D>
where
    R: Record,
    D: DataService<R>,
{
    /// Editor of kind `form_kind` (part of every parked identity).
    pub fn new(session: EditSession, data: D, form_kind: impl Into<String>) -> Self {
        Self {
            session,
            data,
            form_kind: form_kind.into(),
            route: String::new(),
            identity: None,
            model: None,
            tracker: FieldDiffTracker::new(),
            load_state: LoadState::New,
        }
    }

    /// Load record `id` shown at `route`, recovering any parked edits for it.
    ///
    /// Returns the dirty status after recovery. When the record is missing,
    /// any previously opened record is dropped and the editor goes inert.
    #[instrument(skip(self, route, id), fields(kind = %self.form_kind, id = %id))]
    pub async fn open(&mut self, route: impl Into<String>, id: R::Id) -> Result<bool, EditorError> {
        self.load_state = LoadState::Loading;
        let route = route.into();
        let Some(mut model) = self.data.get(&id).await else {
            self.load_state = LoadState::InError;
            self.model = None;
            self.identity = None;
            self.tracker.clear();
            warn!("record not found");
            return Err(EditorError::NotFound(id.to_string()));
        };
        self.route = route;
        let identity = FormIdentity::new(&self.form_kind, &id);

        let parked = self
            .session
            .with_store(|s| s.get(&identity).map(|r| r.data.clone()));
        let recovered = parked.and_then(|data| match serde_json::from_str::<FieldSnapshot>(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(error = %err, "parked edit state unreadable; ignoring it");
                None
            }
        });

        let dirty = self.tracker.initialize(Some(&mut model), recovered.as_ref())?;
        self.model = Some(model);
        self.identity = Some(identity.clone());
        self.load_state = LoadState::Loaded;
        if dirty {
            self.session.park(self.parked_editor(&identity, &id));
            self.session.set_exit_guard(true);
            info!(fields = ?self.tracker.dirty_fields(), "editor reopened with recovered edits");
        } else {
            if recovered.is_some() {
                // parked copy matched the record, so even a stale mirror
                // cannot bring back a dirty state
                if let Err(err) = self.session.with_store(|s| s.clear(&identity)) {
                    warn!(error = %err, "matching parked copy left in mirror");
                }
            }
            info!("editor opened");
        }
        Ok(dirty)
    }

    /// Reopen the editor described by `parked` (after a `Reentry` decision).
    pub async fn reenter(&mut self, parked: &ParkedEditor) -> Result<bool, EditorError> {
        let id = parked
            .record_key
            .parse::<R::Id>()
            .map_err(|_| EditorError::InvalidRecordKey(parked.record_key.clone()))?;
        self.open(parked.route.clone(), id).await
    }

    /// Write `value` into `field` and process the change.
    ///
    /// A field the model does not declare, or a value it rejects, is returned
    /// as [`EditorError::Field`] and leaves the editor untouched.
    pub fn edit(&mut self, field: &str, value: FieldValue) -> Result<Option<FieldUpdate>, EditorError> {
        let model = self.model.as_mut().ok_or(TrackerError::Uninitialized)?;
        model.set_field(field, value)?;
        self.field_changed(field)
    }

    /// Process a change the caller already applied through [`model_mut`](Self::model_mut).
    ///
    /// Unknown fields are logged and ignored (`Ok(None)`). A failure to park
    /// or clear the edit in the mirror is returned; the change itself is kept.
    pub fn field_changed(&mut self, field: &str) -> Result<Option<FieldUpdate>, EditorError> {
        let model = self.model.as_ref().ok_or(TrackerError::Uninitialized)?;
        let update = match self.tracker.notify_field_changed(model, field) {
            Ok(update) => update,
            Err(TrackerError::UnknownField(name)) => {
                warn!(field = %name, "change notification for untracked field ignored");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let Some(identity) = self.identity.clone() else {
            return Err(TrackerError::Uninitialized.into());
        };

        if update.dirty {
            let parked_here = self
                .session
                .parked_editor()
                .is_some_and(|p| p.identity == identity);
            if update.transitioned || !parked_here {
                if !update.transitioned {
                    info!(identity = %identity, "dirty editor re-parked");
                }
                let record_key = model.id().to_string();
                self.session.park(ParkedEditor {
                    identity: identity.clone(),
                    route: self.route.clone(),
                    record_key,
                });
                self.session.set_exit_guard(true);
            }
            let data = serde_json::to_string(&model.snapshot())?;
            self.session.with_store(|s| s.upsert(&identity, data))?;
        } else if update.transitioned {
            let cleared = self.session.with_store(|s| s.clear(&identity));
            self.session.unpark(&identity);
            self.session.set_exit_guard(false);
            debug!("editor back to clean");
            cleared?;
        }
        Ok(Some(update))
    }

    /// Commit the model through the data service.
    ///
    /// On success the tracker is re-baselined and the parked state dropped.
    /// When the service refuses, the editor stays dirty and `Ok(false)` is
    /// returned so the user can retry. [`EditorError::Store`] after a
    /// successful save means the record is committed but the mirror still
    /// holds the parked copy.
    #[instrument(skip(self), fields(kind = %self.form_kind))]
    pub async fn save(&mut self) -> Result<bool, EditorError> {
        let record = self.model.clone().ok_or(TrackerError::Uninitialized)?;
        if !self.data.save(&record).await {
            warn!("data service rejected save; edits kept");
            return Ok(false);
        }
        if let Some(model) = self.model.as_ref() {
            self.tracker.reset(model)?;
        }
        info!("record saved");
        self.drop_parked_state()?;
        Ok(true)
    }

    /// Leave the editor, discarding unsaved edits, and navigate to the
    /// configured exit URI.
    ///
    /// Navigation happens even when the mirror write fails; that failure is
    /// returned afterwards.
    pub fn exit(&mut self, navigator: &dyn Navigator) -> Result<(), EditorError> {
        let dropped = self.drop_parked_state();
        let uri = self.session.config().exit_uri.clone();
        info!(from = %navigator.current_uri(), to = %uri, "editor exit");
        navigator.navigate_to(&uri);
        dropped.map_err(EditorError::from)
    }

    /// Register a dirty-state listener (see [`FieldDiffTracker::on_dirty_state_changed`]).
    pub fn on_dirty_state_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.tracker.on_dirty_state_changed(callback)
    }

    /// The edited model, once opened.
    pub fn model(&self) -> Option<&R> {
        self.model.as_ref()
    }

    /// Mutable model access. Follow each write with [`field_changed`](Self::field_changed).
    pub fn model_mut(&mut self) -> Option<&mut R> {
        self.model.as_mut()
    }

    /// Aggregate dirty status.
    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    /// The field tracker.
    pub fn tracker(&self) -> &FieldDiffTracker {
        &self.tracker
    }

    /// Identity of the open record.
    pub fn identity(&self) -> Option<&FormIdentity> {
        self.identity.as_ref()
    }

    /// Loading lifecycle state.
    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// Route this editor was opened at.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The data service.
    pub fn data(&self) -> &D {
        &self.data
    }

    fn parked_editor(&self, identity: &FormIdentity, id: &R::Id) -> ParkedEditor {
        ParkedEditor {
            identity: identity.clone(),
            route: self.route.clone(),
            record_key: id.to_string(),
        }
    }

    fn drop_parked_state(&self) -> Result<(), StoreError> {
        let cleared = match &self.identity {
            Some(identity) => {
                let cleared = self.session.with_store(|s| s.clear(identity));
                self.session.unpark(identity);
                cleared.map(|_| ())
            }
            None => Ok(()),
        };
        self.session.set_exit_guard(false);
        cleared
    }
}

impl<R, D> std::fmt::Debug for EditorHost<R, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorHost")
            .field("form_kind", &self.form_kind)
            .field("route", &self.route)
            .field("identity", &self.identity)
            .field("load_state", &self.load_state)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
