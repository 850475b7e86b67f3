// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end editor flows: open, edit, park, navigate, reload/discard, save.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use formstate_core::{
    EditSession, EditStateStore, EditorError, EditorHost, FormIdentity, FormStateConfig, GateChoice,
    LoadState, Navigation, NavigationIntent, NavigationState, NavigationStateMachine, RouteTable,
    StoreError,
};
use formstate_dry_tests::{
    forecast_id, InMemoryBlobStore, InMemoryForecastService, ManualClock, RecordingExitGuard,
    RecordingNavigator, WeatherForecast,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use time::Duration;

const KIND: &str = "weather-editor";

struct Fixture {
    session: EditSession,
    guard: RecordingExitGuard,
    clock: ManualClock,
    data: InMemoryForecastService,
}

fn fixture() -> Fixture {
    let guard = RecordingExitGuard::new();
    let clock = ManualClock::new();
    let store = EditStateStore::new().with_clock(Arc::new(clock.clone()));
    let session = EditSession::new(store, Arc::new(guard.clone()), FormStateConfig::default());
    Fixture {
        session,
        guard,
        clock,
        data: InMemoryForecastService::seeded(5),
    }
}

fn routes() -> RouteTable {
    RouteTable::new()
        .route("/", "Index")
        .route("/fetchdata", "FetchData")
        .route("/weather/edit/{id}", "WeatherEditor")
}

fn editor(f: &Fixture) -> EditorHost<WeatherForecast, InMemoryForecastService> {
    EditorHost::new(f.session.clone(), f.data.clone(), KIND)
}

fn edit_route() -> String {
    format!("/weather/edit/{}", forecast_id(1))
}

#[tokio::test]
async fn edit_navigate_away_and_reload_recovers_dirty_summary() {
    let f = fixture();
    let mut host = editor(&f);
    assert_eq!(host.load_state(), LoadState::New);
    assert!(!host.open(edit_route(), forecast_id(1)).await.unwrap());
    assert_eq!(host.load_state(), LoadState::Loaded);
    assert_eq!(host.model().unwrap().summary, "Mild");

    let update = host.edit("Summary", json!("Hot")).unwrap().unwrap();
    assert!(update.dirty && update.transitioned);
    let identity = FormIdentity::new(KIND, forecast_id(1));
    assert_eq!(f.session.with_store(|s| s.len()), 1);
    assert!(f.session.with_store(|s| s.get(&identity).is_some()));
    assert!(f.guard.enabled());
    drop(host);

    let mut nav = NavigationStateMachine::new(routes());
    let away = NavigationIntent::to("/fetchdata");
    let gated = nav.evaluate(&f.session, &away);
    assert_eq!(gated.state(), NavigationState::DirtyGate);

    let Navigation::Reentry { editor: parked, view } = nav.choose(&f.session, GateChoice::Reload, &away).unwrap() else {
        panic!("reload must re-enter the editor");
    };
    let route = view.route().unwrap();
    assert_eq!(route.component, "WeatherEditor");
    assert_eq!(route.params["id"], forecast_id(1).to_string());

    let mut reopened = editor(&f);
    assert!(reopened.reenter(&parked).await.unwrap());
    assert_eq!(reopened.model().unwrap().summary, "Hot");
    assert!(reopened.is_dirty());
    assert_eq!(reopened.tracker().dirty_fields(), vec!["Summary"]);
    assert_eq!(reopened.tracker().baseline_value("Summary"), Some(&json!("Mild")));
}

#[tokio::test]
async fn discard_at_gate_drops_parked_edit() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("TemperatureC", json!(41)).unwrap();
    drop(host);

    let mut nav = NavigationStateMachine::new(routes());
    let away = NavigationIntent::to("/fetchdata");
    assert_eq!(nav.evaluate(&f.session, &away).state(), NavigationState::DirtyGate);

    let decision = nav.choose(&f.session, GateChoice::Discard, &away).unwrap();
    let Navigation::Direct(outcome) = decision else {
        panic!("discard must go direct");
    };
    assert_eq!(outcome.route().unwrap().component, "FetchData");
    assert!(f.session.with_store(|s| s.is_empty()));
    assert!(!f.guard.enabled());

    let mut reopened = editor(&f);
    assert!(!reopened.open(edit_route(), forecast_id(1)).await.unwrap());
    assert_eq!(reopened.model().unwrap().temperature_c, 18);
}

#[tokio::test]
async fn later_edits_overwrite_the_parked_copy() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();
    host.edit("TemperatureC", json!(35)).unwrap();
    assert_eq!(f.session.with_store(|s| s.len()), 1);
    assert_eq!(f.guard.calls(), vec![true], "guard toggles only on transitions");
    drop(host);

    let mut reopened = editor(&f);
    assert!(reopened.open(edit_route(), forecast_id(1)).await.unwrap());
    let model = reopened.model().unwrap();
    assert_eq!((model.summary.as_str(), model.temperature_c), ("Hot", 35));
}

#[tokio::test]
async fn reverting_every_edit_clears_parked_state() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();
    let update = host.edit("Summary", json!("Mild")).unwrap().unwrap();
    assert!(!update.dirty && update.transitioned);
    assert!(f.session.with_store(|s| s.is_empty()));
    assert!(f.session.parked_editor().is_none());
    assert_eq!(f.guard.calls(), vec![true, false]);

    let mut nav = NavigationStateMachine::new(routes());
    let decision = nav.evaluate(&f.session, &NavigationIntent::to("/"));
    assert_eq!(decision.state(), NavigationState::Direct);
}

#[tokio::test]
async fn save_commits_and_rebaselines() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Balmy")).unwrap();

    assert!(host.save().await.unwrap());
    assert!(!host.is_dirty());
    assert!(f.session.with_store(|s| s.is_empty()));
    assert!(!f.guard.enabled());

    use formstate_core::DataService;
    assert_eq!(f.data.get(&forecast_id(1)).await.unwrap().summary, "Balmy");
}

#[tokio::test]
async fn rejected_save_keeps_edits_dirty() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Cool")).unwrap();
    f.data.set_reject_saves(true);

    assert!(!host.save().await.unwrap());
    assert!(host.is_dirty());
    assert!(f.session.with_store(|s| !s.is_empty()));
    assert!(f.guard.enabled());
}

#[tokio::test]
async fn exit_discards_and_navigates_to_exit_uri() {
    let f = fixture();
    let nav = RecordingNavigator::at(edit_route());
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();

    host.exit(&nav).unwrap();
    assert_eq!(nav.history(), vec![edit_route(), "/fetchdata".to_owned()]);
    assert!(f.session.with_store(|s| s.is_empty()));
    assert!(f.session.parked_editor().is_none());
    assert!(!f.guard.enabled());
}

#[tokio::test]
async fn missing_record_puts_editor_in_error() {
    let f = fixture();
    let mut host = editor(&f);
    let err = host.open("/weather/edit/x", forecast_id(77)).await.unwrap_err();
    assert!(matches!(err, EditorError::NotFound(_)));
    assert_eq!(host.load_state(), LoadState::InError);
    assert!(matches!(
        host.edit("Summary", json!("Hot")),
        Err(EditorError::Tracker(_))
    ));
}

#[tokio::test]
async fn untracked_field_notification_is_ignored() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    assert!(host.field_changed("TemperatureF").unwrap().is_none());
    assert!(!host.is_dirty());
}

#[tokio::test]
async fn direct_model_mutation_is_tracked_after_notification() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.model_mut().unwrap().temperature_c = -4;
    assert!(!host.is_dirty(), "nothing changes until notified");
    assert!(host.field_changed("TemperatureC").unwrap().unwrap().dirty);
}

#[tokio::test]
async fn expired_parked_edit_no_longer_gates() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();
    drop(host);

    f.clock.advance(Duration::minutes(16));
    let mut nav = NavigationStateMachine::new(routes());
    assert_eq!(
        nav.evaluate(&f.session, &NavigationIntent::to("/fetchdata")).state(),
        NavigationState::Direct
    );
    assert!(!f.guard.enabled());

    let mut reopened = editor(&f);
    assert!(!reopened.open(edit_route(), forecast_id(1)).await.unwrap());
    assert_eq!(reopened.model().unwrap().summary, "Mild");
}

#[tokio::test]
async fn editing_after_expiry_reparks_and_gates_again() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();

    f.clock.advance(Duration::minutes(16));
    let mut nav = NavigationStateMachine::new(routes());
    let away = NavigationIntent::to("/fetchdata");
    assert_eq!(nav.evaluate(&f.session, &away).state(), NavigationState::Direct);
    assert!(f.session.parked_editor().is_none());

    let update = host.edit("TemperatureC", json!(40)).unwrap().unwrap();
    assert!(update.dirty && !update.transitioned);
    let parked = f.session.parked_editor().unwrap();
    assert_eq!(parked.identity, FormIdentity::new(KIND, forecast_id(1)));
    assert_eq!(parked.route, edit_route());
    assert_eq!(f.guard.calls(), vec![true, false, true]);
    assert_eq!(nav.evaluate(&f.session, &away).state(), NavigationState::DirtyGate);

    host.edit("Summary", json!("Warm")).unwrap();
    assert_eq!(f.guard.calls().len(), 3, "still parked, no extra toggle");
}

#[tokio::test]
async fn failed_open_drops_the_previous_record() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();

    let err = host.open("/weather/edit/77", forecast_id(77)).await.unwrap_err();
    assert!(matches!(err, EditorError::NotFound(_)));
    assert_eq!(host.load_state(), LoadState::InError);
    assert!(host.model().is_none());
    assert!(host.identity().is_none());
    assert!(!host.tracker().is_initialized());
    assert!(matches!(
        host.edit("Summary", json!("Hot")),
        Err(EditorError::Tracker(_))
    ));
    assert!(f.session.parked_editor().is_none());
    assert!(f.session.with_store(|s| s.is_empty()));
}

#[tokio::test]
async fn discard_with_failing_mirror_is_reported_and_never_resurrects() {
    let blob = InMemoryBlobStore::new();
    let clock = ManualClock::new();
    let guard = RecordingExitGuard::new();
    let backed = || {
        EditStateStore::new()
            .with_clock(Arc::new(clock.clone()))
            .with_backing(blob.clone())
    };
    let data = InMemoryForecastService::seeded(1);
    let session = EditSession::new(backed(), Arc::new(guard.clone()), FormStateConfig::default());
    let mut host: EditorHost<WeatherForecast, _> = EditorHost::new(session.clone(), data.clone(), KIND);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();
    drop(host);

    blob.set_fail_on_save(true);
    let mut nav = NavigationStateMachine::new(routes());
    let away = NavigationIntent::to("/fetchdata");
    let err = nav.choose(&session, GateChoice::Discard, &away).unwrap_err();
    assert!(matches!(err, StoreError::Backing(_)));
    assert!(session.with_store(|s| s.is_empty()));
    assert!(session.parked_editor().is_none());
    assert!(!guard.enabled());
    assert_eq!(nav.evaluate(&session, &away).state(), NavigationState::Direct);

    blob.set_fail_on_save(false);
    session.with_store(|s| s.flush()).unwrap();

    let restarted = EditSession::new(backed().restore().unwrap(), Arc::new(guard), FormStateConfig::default());
    let mut reopened: EditorHost<WeatherForecast, _> = EditorHost::new(restarted, data, KIND);
    assert!(!reopened.open(edit_route(), forecast_id(1)).await.unwrap());
    assert_eq!(reopened.model().unwrap().summary, "Mild");
}

#[tokio::test]
async fn dirty_listener_sees_recovery_and_subscription_detaches_on_drop() {
    let f = fixture();
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    host.edit("Summary", json!("Hot")).unwrap();
    drop(host);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut reopened = editor(&f);
    let sink = Arc::clone(&seen);
    let sub = reopened.on_dirty_state_changed(move |dirty| sink.lock().unwrap().push(dirty));
    reopened.open(edit_route(), forecast_id(1)).await.unwrap();
    reopened.edit("Summary", json!("Mild")).unwrap();
    drop(sub);
    reopened.edit("Summary", json!("Hot")).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn failed_mirror_write_is_reported_but_edit_is_kept() {
    let blob = InMemoryBlobStore::new();
    let guard = RecordingExitGuard::new();
    let store = EditStateStore::new().with_backing(blob.clone());
    let session = EditSession::new(store, Arc::new(guard), FormStateConfig::default());
    let data = InMemoryForecastService::seeded(1);
    let mut host: EditorHost<WeatherForecast, _> = EditorHost::new(session.clone(), data, KIND);
    host.open(edit_route(), forecast_id(1)).await.unwrap();

    blob.set_fail_on_save(true);
    let err = host.edit("Summary", json!("Hot")).unwrap_err();
    assert!(matches!(err, EditorError::Store(_)));
    assert!(host.is_dirty());
    assert_eq!(host.model().unwrap().summary, "Hot");
    assert_eq!(session.with_store(|s| s.len()), 1);
}

#[tokio::test]
async fn exit_guard_failure_never_blocks_editing() {
    let f = fixture();
    f.guard.set_fail(true);
    let mut host = editor(&f);
    host.open(edit_route(), forecast_id(1)).await.unwrap();
    assert!(host.edit("Summary", json!("Hot")).unwrap().unwrap().dirty);
    assert!(host.save().await.unwrap());
    assert_eq!(f.guard.calls(), vec![true, false]);
}
