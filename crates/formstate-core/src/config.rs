// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blob storage behind parked edit state and settings, plus the runtime
//! configuration.
//!
//! One [`BlobStore`] holds two kinds of blob: the [`FormStateConfig`] under
//! [`CONFIG_KEY`] and the mirrored edit-state records under
//! [`EDIT_STATE_KEY`](crate::store::EDIT_STATE_KEY).

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Key under which [`FormStateConfig`] is stored.
pub const CONFIG_KEY: &str = "formstate";

/// Where config and parked edits outlive the process.
///
/// `save_raw` replaces the whole blob: the edit-state mirror writes the full
/// record set each time, so a store never has to merge.
pub trait BlobStore {
    /// Bytes saved under `key`, or [`BlobError::NotFound`] if nothing was.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    /// Replace the bytes under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        (**self).load_raw(key)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        (**self).save_raw(key, data)
    }
}

/// Failure reading or writing a blob. Anything but `NotFound` on an
/// edit-state write is a persistence failure and reaches the editor.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Nothing saved under the key yet (first run, or config never written).
    #[error("blob not found")]
    NotFound,
    /// Filesystem failure in a file-backed store.
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored bytes are not the JSON the caller expects.
    #[error("blob decode error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Store-specific failure (invalid key, simulated fault, ...).
    #[error("blob store error: {0}")]
    Other(String),
}

/// Typed JSON access to a [`BlobStore`], used for [`FormStateConfig`].
pub struct SettingsService<S> {
    store: S,
}

impl<S> SettingsService<S> {
    /// Settings read from and written to `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Hand the store back, e.g. to reuse it as the edit-state mirror.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> SettingsService<S>
where
    S: BlobStore,
{
    /// Decode the JSON under `key`. A missing or empty blob is `Ok(None)`.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, BlobError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(BlobError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode `value` as pretty JSON (hand-editable) under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), BlobError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load [`FormStateConfig`], falling back to defaults when none is stored.
    pub fn load_config(&self) -> Result<FormStateConfig, BlobError> {
        Ok(self.load(CONFIG_KEY)?.unwrap_or_default())
    }
}

/// Runtime configuration for editors and the navigation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormStateConfig {
    /// Parked edit records older than this are garbage-collected.
    pub retention_minutes: u64,
    /// Where `EditorHost::exit` navigates to.
    pub exit_uri: String,
    /// Shown when a route resolves to nothing.
    pub fallback_message: String,
    /// Headline of the dirty-exit gate.
    pub dirty_exit_message: String,
    /// Label of the gate's discard action.
    pub discard_label: String,
    /// Label of the gate's reload action.
    pub reload_label: String,
}

impl Default for FormStateConfig {
    fn default() -> Self {
        Self {
            retention_minutes: 15,
            exit_uri: "/fetchdata".into(),
            fallback_message: "No Route or View Configured to Display".into(),
            dirty_exit_message: "You are exiting a form with unsaved data".into(),
            discard_label: "Exit and Clear Unsaved Data".into(),
            reload_label: "Reload Form".into(),
        }
    }
}

impl FormStateConfig {
    /// Retention window as a `time::Duration`. Saturates on absurd values.
    pub fn retention(&self) -> time::Duration {
        let seconds = self.retention_minutes.saturating_mul(60);
        time::Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}
