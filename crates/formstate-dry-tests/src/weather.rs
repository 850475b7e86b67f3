// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Weather forecast sample model and an in-memory data service for it.

use formstate_core::ports::{DataService, Record};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use time::{macros::date, Date, Duration};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary words used by the seeded forecasts.
pub const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// Deterministic id of the `n`th seeded forecast.
pub fn forecast_id(n: u128) -> Uuid {
    Uuid::from_u128(0xF0_0000 + n)
}

/// One day's forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherForecast {
    /// Record key.
    pub id: Uuid,
    /// Forecast day.
    pub date: Date,
    /// Temperature in Celsius.
    pub temperature_c: i32,
    /// One-word summary.
    pub summary: String,
}

impl WeatherForecast {
    /// Temperature in Fahrenheit (derived, not an editable field).
    #[allow(clippy::cast_possible_truncation)]
    pub fn temperature_f(&self) -> i32 {
        32 + (f64::from(self.temperature_c) / 0.5556) as i32
    }
}

// the id is the record key and is never edited
formstate_core::field_accessible!(WeatherForecast {
    "Date" => date,
    "TemperatureC" => temperature_c,
    "Summary" => summary,
});

impl Record for WeatherForecast {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// In-memory forecast service. Clones share the same records; every value
/// handed out is a copy.
#[derive(Clone, Default)]
pub struct InMemoryForecastService {
    records: Arc<RwLock<Vec<WeatherForecast>>>,
    reject_saves: Arc<AtomicBool>,
}

impl InMemoryForecastService {
    /// Service over `records`.
    pub fn with_records(records: Vec<WeatherForecast>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            reject_saves: Arc::default(),
        }
    }

    /// `count` forecasts starting 2026-03-02, ids from [`forecast_id`].
    /// The first is always "Mild" at 18°C.
    pub fn seeded(count: usize) -> Self {
        let start = date!(2026 - 03 - 02);
        let records = (0..count)
            .map(|i| {
                let n = u32::try_from(i).unwrap_or(u32::MAX);
                WeatherForecast {
                    id: forecast_id(u128::from(n) + 1),
                    date: start.saturating_add(Duration::days(i64::from(n))),
                    temperature_c: 18 + i32::try_from(n % 7).unwrap_or(0) * 3,
                    summary: SUMMARIES[(4 + i) % SUMMARIES.len()].to_owned(),
                }
            })
            .collect();
        Self::with_records(records)
    }

    /// Make `save` report failure without touching records.
    pub fn set_reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }
}

impl DataService<WeatherForecast> for InMemoryForecastService {
    async fn list(&self) -> Vec<WeatherForecast> {
        self.records.read().await.clone()
    }

    async fn get(&self, id: &Uuid) -> Option<WeatherForecast> {
        self.records.read().await.iter().find(|r| &r.id == id).cloned()
    }

    async fn save(&self, record: &WeatherForecast) -> bool {
        if self.reject_saves.load(Ordering::SeqCst) {
            return false;
        }
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(stored) => {
                stored.date = record.date;
                stored.temperature_c = record.temperature_c;
                stored.summary.clone_from(&record.summary);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use formstate_core::field::FieldAccessible;
    use serde_json::json;

    #[tokio::test]
    async fn seeded_first_record_is_mild() {
        let svc = InMemoryForecastService::seeded(3);
        let all = svc.list().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].summary, "Mild");
        assert_eq!(all[0].id, forecast_id(1));
        assert_eq!(all[1].date, date!(2026 - 03 - 03));
    }

    #[tokio::test]
    async fn returned_records_are_copies() {
        let svc = InMemoryForecastService::seeded(1);
        let mut copy = svc.get(&forecast_id(1)).await.unwrap();
        copy.summary = "Hot".into();
        assert_eq!(svc.get(&forecast_id(1)).await.unwrap().summary, "Mild");
    }

    #[tokio::test]
    async fn save_requires_existing_id() {
        let svc = InMemoryForecastService::seeded(1);
        let mut rec = svc.get(&forecast_id(1)).await.unwrap();
        rec.temperature_c = 40;
        assert!(svc.save(&rec).await);
        assert_eq!(svc.get(&forecast_id(1)).await.unwrap().temperature_c, 40);

        rec.id = forecast_id(99);
        assert!(!svc.save(&rec).await);
    }

    #[test]
    fn fields_exclude_key_and_derived_temperature() {
        let rec = WeatherForecast {
            id: forecast_id(1),
            date: date!(2026 - 03 - 02),
            temperature_c: 20,
            summary: "Mild".into(),
        };
        assert_eq!(rec.field_names(), &["Date", "TemperatureC", "Summary"]);
        assert_eq!(rec.get_field("Summary"), Some(json!("Mild")));
        assert!(rec.get_field("ID").is_none());
        assert!(rec.get_field("TemperatureF").is_none());
        assert_eq!(rec.temperature_f(), 67);
    }
}
