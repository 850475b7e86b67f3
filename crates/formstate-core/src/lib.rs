// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Editing services for form screens: per-field dirty tracking, parked edit
//! state that survives navigation, and the dirty-exit navigation gate.
//! Keeps UI/runtime adapters thin and framework-agnostic.
//!
//! # Modules
//!
//! - [`field`] - `FieldAccessible` contract and the `field_accessible!` macro
//! - [`tracker`] - baseline/current snapshot diffing with transition events
//! - [`store`] - keyed parked edit state with lazy garbage collection
//! - [`navigation`] - route resolution and the Direct/DirtyGate/Reentry machine
//! - [`host`] - editor glue that loads, tracks, parks, saves and exits
//! - [`session`] - explicit per-session context shared by editors and navigation
//! - [`ports`] - collaborator traits (exit guard, navigator, data service, clock)
//! - [`config`] - blob storage port and `FormStateConfig`
#![forbid(unsafe_code)]

pub mod config;
pub mod field;
pub mod host;
pub mod navigation;
pub mod ports;
pub mod session;
pub mod store;
pub mod tracker;

pub use config::{BlobError, BlobStore, FormStateConfig, SettingsService};
pub use field::{FieldAccessible, FieldError, FieldSnapshot, FieldValue};
pub use host::{EditorError, EditorHost, LoadState};
pub use navigation::{
    DirtyExitPrompt, GateChoice, Navigation, NavigationIntent, NavigationState,
    NavigationStateMachine, RenderOutcome, ResolvedRoute, RouteResolver, RouteTable,
};
pub use ports::{Clock, DataService, ExitGuard, Navigator, NoExitGuard, PortError, Record, SystemClock};
pub use session::{EditSession, ParkedEditor};
pub use store::{EditStateRecord, EditStateStore, FormIdentity, StoreError};
pub use tracker::{FieldDiffTracker, FieldUpdate, Subscription, TrackerError};
