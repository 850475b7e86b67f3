// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session-scoped store of parked edit state.
//!
//! One record per [`FormIdentity`]. Every operation first purges records older
//! than the retention window; there is no background timer.
//!
//! A store may mirror its records to a [`BlobStore`] so parked edits outlive
//! the process. Mirror writes that fail are logged at `error` and returned to
//! the caller; the in-memory change is kept either way. The mirror always
//! holds the full record set, so a failed write is retried by the next access
//! (or an explicit [`EditStateStore::flush`]) until it lands.

use crate::config::{BlobError, BlobStore, FormStateConfig};
use crate::ports::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};

/// Blob key used when mirroring records to a [`BlobStore`].
pub const EDIT_STATE_KEY: &str = "edit-state";

/// Default retention window for parked records.
pub const DEFAULT_RETENTION: Duration = Duration::minutes(15);

/// Stable identity of an editor: form kind plus record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormIdentity(String);

impl FormIdentity {
    /// Identity for the `kind` editor of record `record_key`.
    pub fn new(kind: &str, record_key: impl fmt::Display) -> Self {
        Self(format!("{kind}:{record_key}"))
    }

    /// Form kind part (everything before the first `:`).
    pub fn kind(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(kind, _)| kind)
    }

    /// Raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parked, unsaved edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditStateRecord {
    /// Editor this edit belongs to.
    pub form_identity: FormIdentity,
    /// When the record was last written.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Serialized field map of the model as of the last dirty edit.
    pub data: String,
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing blob store rejected a read or write.
    #[error("edit-state backing store failed: {0}")]
    Backing(#[from] BlobError),
    /// Records could not be encoded/decoded.
    #[error("edit-state encoding failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Keyed parked-edit store with lazy, access-triggered garbage collection.
pub struct EditStateStore {
    records: BTreeMap<FormIdentity, EditStateRecord>,
    retention: Duration,
    clock: Arc<dyn Clock>,
    backing: Option<Box<dyn BlobStore + Send>>,
    mirror_pending: bool,
}

impl Default for EditStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EditStateStore {
    /// In-memory store on the system clock with the default retention.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            retention: DEFAULT_RETENTION,
            clock: Arc::new(SystemClock),
            backing: None,
            mirror_pending: false,
        }
    }

    /// In-memory store using the configured retention window.
    pub fn from_config(config: &FormStateConfig) -> Self {
        Self::new().with_retention(config.retention())
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Mirror records to `backing` on every write.
    pub fn with_backing<B>(mut self, backing: B) -> Self
    where
        B: BlobStore + Send + 'static,
    {
        self.backing = Some(Box::new(backing));
        self
    }

    /// Reload mirrored records from the backing store, then collect garbage.
    /// A store without backing, or a backing store with nothing saved, is
    /// returned unchanged.
    pub fn restore(mut self) -> Result<Self, StoreError> {
        let Some(backing) = &self.backing else {
            return Ok(self);
        };
        let bytes = match backing.load_raw(EDIT_STATE_KEY) {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound) => return Ok(self),
            Err(err) => return Err(err.into()),
        };
        if !bytes.is_empty() {
            let records: Vec<EditStateRecord> = serde_json::from_slice(&bytes)?;
            for record in records {
                self.records.insert(record.form_identity.clone(), record);
            }
        }
        let purged = self.collect_garbage();
        info!(restored = self.records.len(), purged, "edit state restored");
        Ok(self)
    }

    /// Park `data` for `identity`, replacing any earlier record.
    ///
    /// The in-memory record is always written. An error means only the mirror
    /// write failed.
    pub fn upsert(&mut self, identity: &FormIdentity, data: impl Into<String>) -> Result<(), StoreError> {
        self.collect_garbage();
        let record = EditStateRecord {
            form_identity: identity.clone(),
            timestamp: self.clock.now(),
            data: data.into(),
        };
        self.records.insert(identity.clone(), record);
        debug!(identity = %identity, "edit state parked");
        self.mirror()
    }

    /// Parked record for `identity`, if any.
    ///
    /// A mirror write left pending by an earlier failure is retried first;
    /// a repeated failure is logged and stays pending.
    pub fn get(&mut self, identity: &FormIdentity) -> Option<&EditStateRecord> {
        self.collect_garbage();
        if self.mirror_pending && self.mirror().is_err() {
            warn!("parked edit state mirror still out of date");
        }
        self.records.get(identity)
    }

    /// Remove the record for `identity`. Returns whether one was removed.
    ///
    /// The in-memory record is always removed. An error means the mirror still
    /// holds it; the write stays pending so a later access or [`flush`](Self::flush)
    /// can drop it before a restore would bring it back.
    pub fn clear(&mut self, identity: &FormIdentity) -> Result<bool, StoreError> {
        self.collect_garbage();
        let removed = self.records.remove(identity).is_some();
        if removed {
            debug!(identity = %identity, "edit state cleared");
            self.mirror()?;
        } else if self.mirror_pending {
            self.mirror()?;
        }
        Ok(removed)
    }

    /// Retry a mirror write left pending by an earlier failure.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.mirror_pending {
            self.mirror()?;
        }
        Ok(())
    }

    /// `true` while the mirror is known to be out of date.
    pub fn mirror_pending(&self) -> bool {
        self.mirror_pending
    }

    /// Purge records older than the retention window. Returns how many went.
    pub fn collect_garbage(&mut self) -> usize {
        let Some(cutoff) = self.clock.now().checked_sub(self.retention) else {
            return 0;
        };
        let before = self.records.len();
        self.records.retain(|_, record| record.timestamp >= cutoff);
        let purged = before - self.records.len();
        if purged > 0 {
            debug!(purged, "expired edit state collected");
        }
        purged
    }

    /// Number of live records (no garbage collection).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when nothing is parked (no garbage collection).
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in identity order (no garbage collection).
    pub fn records(&self) -> impl Iterator<Item = &EditStateRecord> {
        self.records.values()
    }

    /// Configured retention window.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn mirror(&mut self) -> Result<(), StoreError> {
        let Some(backing) = &self.backing else {
            return Ok(());
        };
        let records: Vec<&EditStateRecord> = self.records.values().collect();
        let result = serde_json::to_vec(&records)
            .map_err(StoreError::from)
            .and_then(|bytes| backing.save_raw(EDIT_STATE_KEY, &bytes).map_err(StoreError::from));
        if let Err(err) = &result {
            error!(error = %err, "failed to persist parked edit state");
        }
        self.mirror_pending = result.is_err();
        result
    }
}

impl fmt::Debug for EditStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditStateStore")
            .field("records", &self.records.len())
            .field("retention", &self.retention)
            .field("backed", &self.backing.is_some())
            .finish_non_exhaustive()
    }
}
