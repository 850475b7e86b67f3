// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Edit-state store mirrored to a blob store.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use formstate_core::store::EDIT_STATE_KEY;
use formstate_core::{EditStateRecord, EditStateStore, FormIdentity, StoreError};
use formstate_dry_tests::{InMemoryBlobStore, ManualClock};
use std::sync::Arc;
use time::Duration;

fn backed(blob: &InMemoryBlobStore, clock: &ManualClock) -> EditStateStore {
    EditStateStore::new()
        .with_clock(Arc::new(clock.clone()))
        .with_backing(blob.clone())
}

fn mirrored(blob: &InMemoryBlobStore) -> Vec<EditStateRecord> {
    serde_json::from_slice(&blob.get(EDIT_STATE_KEY).unwrap()).unwrap()
}

#[test]
fn every_write_is_mirrored() {
    let blob = InMemoryBlobStore::new();
    let clock = ManualClock::new();
    let mut store = backed(&blob, &clock);
    let a = FormIdentity::new("weather-editor", 1);
    let b = FormIdentity::new("weather-editor", 2);

    store.upsert(&a, "a").unwrap();
    store.upsert(&b, "b").unwrap();
    assert_eq!(mirrored(&blob).len(), 2);

    assert!(store.clear(&a).unwrap());
    let left = mirrored(&blob);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].form_identity, b);
    assert_eq!(blob.save_count(), 3);
}

#[test]
fn clearing_a_missing_record_does_not_touch_the_mirror() {
    let blob = InMemoryBlobStore::new();
    let mut store = backed(&blob, &ManualClock::new());
    assert!(!store.clear(&FormIdentity::new("weather-editor", 1)).unwrap());
    assert_eq!(blob.save_count(), 0);
}

#[test]
fn restore_reloads_live_records_only() {
    let blob = InMemoryBlobStore::new();
    let clock = ManualClock::new();
    let mut store = backed(&blob, &clock);
    let old = FormIdentity::new("weather-editor", 1);
    let fresh = FormIdentity::new("weather-editor", 2);
    store.upsert(&old, "old").unwrap();
    clock.advance(Duration::minutes(10));
    store.upsert(&fresh, "fresh").unwrap();
    drop(store);

    clock.advance(Duration::minutes(6));
    let mut restored = backed(&blob, &clock).restore().unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored.get(&fresh).unwrap().data, "fresh");
    assert!(restored.get(&old).is_none());
}

#[test]
fn restore_with_nothing_saved_is_empty() {
    let blob = InMemoryBlobStore::new();
    let store = backed(&blob, &ManualClock::new()).restore().unwrap();
    assert!(store.is_empty());
    assert_eq!(blob.load_count(), 1);
}

#[test]
fn restore_surfaces_backing_and_decode_failures() {
    let blob = InMemoryBlobStore::new();
    blob.set_fail_on_load(true);
    let err = backed(&blob, &ManualClock::new()).restore().unwrap_err();
    assert!(matches!(err, StoreError::Backing(_)));

    let garbled = InMemoryBlobStore::new();
    garbled.insert(EDIT_STATE_KEY, "not json");
    let err = backed(&garbled, &ManualClock::new()).restore().unwrap_err();
    assert!(matches!(err, StoreError::Serde(_)));
}

#[test]
fn failed_mirror_keeps_in_memory_record() {
    let blob = InMemoryBlobStore::new();
    let mut store = backed(&blob, &ManualClock::new());
    let id = FormIdentity::new("weather-editor", 1);
    blob.set_fail_on_save(true);

    assert!(matches!(store.upsert(&id, "x"), Err(StoreError::Backing(_))));
    assert_eq!(store.get(&id).unwrap().data, "x");
    assert!(store.mirror_pending());
}

#[test]
fn failed_clear_is_reported_and_retried_before_restore() {
    let blob = InMemoryBlobStore::new();
    let clock = ManualClock::new();
    let mut store = backed(&blob, &clock);
    let id = FormIdentity::new("weather-editor", 1);
    store.upsert(&id, "x").unwrap();

    blob.set_fail_on_save(true);
    assert!(matches!(store.clear(&id), Err(StoreError::Backing(_))));
    assert!(store.is_empty(), "in-memory record is gone either way");
    assert_eq!(mirrored(&blob).len(), 1, "mirror still holds the cleared record");
    assert!(matches!(store.flush(), Err(StoreError::Backing(_))));

    blob.set_fail_on_save(false);
    assert!(store.get(&id).is_none());
    assert!(!store.mirror_pending());
    assert!(mirrored(&blob).is_empty());

    let restored = backed(&blob, &clock).restore().unwrap();
    assert!(restored.is_empty());
}

#[test]
fn unbacked_store_restores_unchanged() {
    let mut store = EditStateStore::new();
    let id = FormIdentity::new("weather-editor", 1);
    store.upsert(&id, "x").unwrap();
    let mut store = store.restore().unwrap();
    assert!(store.get(&id).is_some());
}
