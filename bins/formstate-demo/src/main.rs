// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! formstate demo
//!
//! Walks one weather forecast through edit, park, dirty-exit gate and recovery.

use anyhow::{bail, Context, Result};
use clap::Parser;
use formstate_core::{
    DataService, EditSession, EditStateStore, EditorHost, FieldAccessible, FieldValue,
    FormStateConfig, GateChoice, Navigation, NavigationIntent, NavigationStateMachine, Navigator,
    RenderOutcome, RouteTable, SettingsService,
};
use formstate_dry_tests::{InMemoryForecastService, WeatherForecast};
use formstate_fs::FsBlobStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod shell;

use shell::{LogExitGuard, ShellNavigator};

const EDITOR_KIND: &str = "weather-editor";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Field of the first forecast to edit
    #[clap(long, default_value = "Summary")]
    field: String,

    /// New value (parsed as JSON, falling back to a plain string)
    #[clap(long, default_value = "Hot")]
    value: String,

    /// Answer to the dirty-exit prompt
    #[clap(long, value_enum, default_value_t = Choice::Reload)]
    choice: Choice,

    /// Save the recovered edits after reloading
    #[clap(long)]
    save: bool,

    /// Override the parked-edit retention window
    #[clap(long)]
    retention_minutes: Option<u64>,

    /// Keep config and parked edits as JSON files in this directory
    #[clap(long)]
    state_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Choice {
    Reload,
    Discard,
}

impl From<Choice> for GateChoice {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Reload => Self::Reload,
            Choice::Discard => Self::Discard,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let session = build_session(&args)?;
    let data = InMemoryForecastService::seeded(5);
    let routes = RouteTable::new()
        .route("/", "Index")
        .route("/fetchdata", "FetchData")
        .route("/weather/edit/{id}", "WeatherEditor");
    let mut nav = NavigationStateMachine::new(routes);
    let shell = ShellNavigator::at("/fetchdata");

    let forecasts = data.list().await;
    for f in &forecasts {
        println!("{}  {}  {:>3}C {:>3}F  {}", f.id, f.date, f.temperature_c, f.temperature_f(), f.summary);
    }
    let Some(first) = forecasts.first() else {
        bail!("no forecasts to edit");
    };

    let edit_uri = format!("/weather/edit/{}", first.id);
    shell.navigate_to(&edit_uri);
    let view = nav.evaluate(&session, &NavigationIntent::to(edit_uri.clone()));
    println!("\n{} -> {}", edit_uri, describe(&view));

    let mut editor: EditorHost<WeatherForecast, _> = EditorHost::new(session.clone(), data.clone(), EDITOR_KIND);
    let recovered = editor.open(edit_uri, first.id).await?;
    if recovered {
        println!("recovered parked edits: {:?}", editor.tracker().dirty_fields());
    }

    let value = parse_value(&args.value);
    let update = editor
        .edit(&args.field, value)
        .with_context(|| format!("editing {}", args.field))?;
    println!(
        "set {} = {}  (dirty: {}, fields: {:?})",
        args.field,
        args.value,
        update.is_some_and(|u| u.dirty),
        editor.tracker().dirty_fields()
    );
    drop(editor);

    let home = NavigationIntent::to("/");
    let decision = nav.evaluate(&session, &home);
    println!("\n/ -> {}", describe(&decision));
    if let Navigation::DirtyGate { prompt, .. } = &decision {
        println!("  [{}]  [{}]", prompt.discard_label, prompt.reload_label);
        let decision = nav
            .choose(&session, args.choice.into(), &home)
            .context("applying gate choice")?;
        println!("chose {:?} -> {}", args.choice, describe(&decision));

        if let Navigation::Reentry { editor: parked, .. } = decision {
            shell.navigate_to(&parked.route);
            let mut editor: EditorHost<WeatherForecast, _> =
                EditorHost::new(session.clone(), data.clone(), EDITOR_KIND);
            editor.reenter(&parked).await?;
            if let Some(model) = editor.model() {
                println!("reopened {} = {:?}", args.field, model.get_field(&args.field));
            }
            println!("dirty fields: {:?}", editor.tracker().dirty_fields());
            if args.save {
                let saved = editor.save().await?;
                println!("saved: {saved}, dirty: {}", editor.is_dirty());
            }
        }
    }

    info!(uri = %shell.current_uri(), parked = session.with_store(|s| s.len()), "demo finished");
    Ok(())
}

fn build_session(args: &Args) -> Result<EditSession> {
    let Some(dir) = &args.state_dir else {
        let mut config = FormStateConfig::default();
        if let Some(minutes) = args.retention_minutes {
            config.retention_minutes = minutes;
        }
        return Ok(EditSession::from_config(config, Arc::new(LogExitGuard)));
    };

    let settings = SettingsService::new(FsBlobStore::at(dir)?);
    let mut config = settings.load_config().context("loading config")?;
    if let Some(minutes) = args.retention_minutes {
        config.retention_minutes = minutes;
        settings.save(formstate_core::config::CONFIG_KEY, &config)?;
    }
    let store = EditStateStore::from_config(&config)
        .with_backing(settings.into_inner())
        .restore()
        .context("restoring parked edits")?;
    info!(dir = %dir.display(), parked = store.len(), "state directory opened");
    Ok(EditSession::new(store, Arc::new(LogExitGuard), config))
}

fn parse_value(raw: &str) -> FieldValue {
    serde_json::from_str(raw).unwrap_or_else(|_| FieldValue::String(raw.to_owned()))
}

fn describe(decision: &Navigation) -> String {
    match decision {
        Navigation::Direct(outcome) => format!("render {}", render(outcome)),
        Navigation::DirtyGate { prompt, editor, .. } => {
            format!("gate \"{}\" (editor {})", prompt.message, editor.identity)
        }
        Navigation::Reentry { editor, view } => {
            format!("re-enter {} via {}", editor.identity, render(view))
        }
    }
}

fn render(outcome: &RenderOutcome) -> String {
    match outcome {
        RenderOutcome::Component(route) => route.component.clone(),
        RenderOutcome::NothingConfigured { message, .. } => message.clone(),
    }
}
