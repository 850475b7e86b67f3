// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for formstate crates.
//!
//! # Modules
//!
//! - [`blob`] - In-memory blob store fake for testing without filesystem
//! - [`clock`] - Manually advanced clock for garbage-collection tests
//! - [`shell`] - Recording exit-guard and navigator ports
//! - [`weather`] - `WeatherForecast` sample model and its data service
#![forbid(unsafe_code)]

pub mod blob;
pub mod clock;
pub mod shell;
pub mod weather;

// Re-export commonly used items at crate root for convenience
pub use blob::InMemoryBlobStore;
pub use clock::ManualClock;
pub use shell::{RecordingExitGuard, RecordingNavigator};
pub use weather::{forecast_id, InMemoryForecastService, WeatherForecast, SUMMARIES};
