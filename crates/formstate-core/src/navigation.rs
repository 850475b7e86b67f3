// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Navigation gate for editors with unsaved work.
//!
//! Every navigation or render request is evaluated fresh:
//!
//! | unsaved editor | reload pending | result      |
//! |----------------|----------------|-------------|
//! | no             | -              | `Direct`    |
//! | yes            | no             | `DirtyGate` |
//! | yes            | yes            | `Reentry`   |
//!
//! The one-shot reload flag is the only state carried between requests and is
//! consumed by the evaluation that reads it. Routes that resolve to nothing
//! render a fallback message instead of failing.

use crate::session::{EditSession, ParkedEditor};
use crate::store::StoreError;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A route matched to the component that renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Requested URI.
    pub uri: String,
    /// Component name registered for the route.
    pub component: String,
    /// Values captured from `{name}` template segments.
    pub params: BTreeMap<String, String>,
}

/// Maps URIs to components.
pub trait RouteResolver {
    /// Resolve `uri`, or `None` when nothing is registered for it.
    fn resolve(&self, uri: &str) -> Option<ResolvedRoute>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct RouteTemplate {
    segments: Vec<Segment>,
    component: String,
}

/// Minimal template route table: `/weather/edit/{id}` style paths, first
/// registered match wins, query strings and fragments are ignored.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteTemplate>,
}

impl RouteTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `template` for `component`.
    pub fn route(mut self, template: &str, component: impl Into<String>) -> Self {
        let segments = split_path(template)
            .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(seg.to_owned()),
            })
            .collect();
        self.routes.push(RouteTemplate {
            segments,
            component: component.into(),
        });
        self
    }
}

fn split_path(uri: &str) -> impl Iterator<Item = &str> {
    let path = uri.split(['?', '#']).next().unwrap_or_default();
    // absolute URIs: drop scheme and authority
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => path,
    };
    path.split('/').filter(|s| !s.is_empty())
}

impl RouteResolver for RouteTable {
    fn resolve(&self, uri: &str) -> Option<ResolvedRoute> {
        let parts: Vec<&str> = split_path(uri).collect();
        self.routes.iter().find_map(|route| {
            if route.segments.len() != parts.len() {
                return None;
            }
            let mut params = BTreeMap::new();
            for (segment, part) in route.segments.iter().zip(&parts) {
                match segment {
                    Segment::Literal(lit) if lit.eq_ignore_ascii_case(part) => {}
                    Segment::Literal(_) => return None,
                    Segment::Param(name) => {
                        params.insert(name.clone(), (*part).to_owned());
                    }
                }
            }
            Some(ResolvedRoute {
                uri: uri.to_owned(),
                component: route.component.clone(),
                params,
            })
        })
    }
}

/// A navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    /// Requested URI.
    pub target: String,
    /// Re-enter the parked dirty editor instead of gating.
    pub reload: bool,
}

impl NavigationIntent {
    /// Plain navigation to `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reload: false,
        }
    }

    /// Navigation that re-enters the parked editor.
    pub fn reenter(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reload: true,
        }
    }
}

/// Which way a request was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// Render the requested target.
    Direct,
    /// Render the dirty-exit confirmation instead of the target.
    DirtyGate,
    /// Render the parked editor instead of the target.
    Reentry,
}

/// What to put on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A resolved component.
    Component(ResolvedRoute),
    /// Nothing is registered for `uri`.
    NothingConfigured {
        /// The unresolved URI.
        uri: String,
        /// Fallback text to show.
        message: String,
    },
}

impl RenderOutcome {
    /// The resolved route, if any.
    pub fn route(&self) -> Option<&ResolvedRoute> {
        match self {
            Self::Component(route) => Some(route),
            Self::NothingConfigured { .. } => None,
        }
    }
}

/// Text of the dirty-exit confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyExitPrompt {
    /// Headline.
    pub message: String,
    /// Label of the discard action.
    pub discard_label: String,
    /// Label of the reload action.
    pub reload_label: String,
}

/// Decision for one navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Render the target.
    Direct(RenderOutcome),
    /// Ask the user before leaving unsaved work.
    DirtyGate {
        /// The request being held back.
        requested: NavigationIntent,
        /// Editor holding the unsaved work.
        editor: ParkedEditor,
        /// Confirmation text.
        prompt: DirtyExitPrompt,
    },
    /// Re-render the parked editor so it can recover its edits.
    Reentry {
        /// Editor to reopen.
        editor: ParkedEditor,
        /// What its route renders.
        view: RenderOutcome,
    },
}

impl Navigation {
    /// State this decision corresponds to.
    pub fn state(&self) -> NavigationState {
        match self {
            Self::Direct(_) => NavigationState::Direct,
            Self::DirtyGate { .. } => NavigationState::DirtyGate,
            Self::Reentry { .. } => NavigationState::Reentry,
        }
    }
}

/// User's answer at the dirty-exit gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChoice {
    /// Drop the unsaved edits and continue to the requested target.
    Discard,
    /// Go back to the editor with its edits recovered.
    Reload,
}

/// Direct / DirtyGate / Reentry decision machine.
#[derive(Debug)]
pub struct NavigationStateMachine<R> {
    resolver: R,
    reload_pending: bool,
}

impl<R: RouteResolver> NavigationStateMachine<R> {
    /// Machine resolving routes through `resolver`.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            reload_pending: false,
        }
    }

    /// Decide how to handle `intent`.
    pub fn evaluate(&mut self, session: &EditSession, intent: &NavigationIntent) -> Navigation {
        let reload = std::mem::take(&mut self.reload_pending) || intent.reload;
        let decision = match session.unsaved_editor() {
            None => Navigation::Direct(self.render(session, &intent.target)),
            Some(editor) if reload => {
                info!(identity = %editor.identity, "re-entering parked editor");
                let view = self.render(session, &editor.route);
                Navigation::Reentry { editor, view }
            }
            Some(editor) => {
                let config = session.config();
                Navigation::DirtyGate {
                    requested: intent.clone(),
                    editor,
                    prompt: DirtyExitPrompt {
                        message: config.dirty_exit_message.clone(),
                        discard_label: config.discard_label.clone(),
                        reload_label: config.reload_label.clone(),
                    },
                }
            }
        };
        debug!(uri = %intent.target, state = ?decision.state(), "navigation evaluated");
        decision
    }

    /// Apply the user's gate `choice` for the held-back `requested` navigation.
    ///
    /// A discard whose mirror write fails is returned as an error. The
    /// in-memory state is already clean at that point, so the caller may
    /// still [`evaluate`](Self::evaluate) the request once it has reported
    /// the failure.
    pub fn choose(
        &mut self,
        session: &EditSession,
        choice: GateChoice,
        requested: &NavigationIntent,
    ) -> Result<Navigation, StoreError> {
        match choice {
            GateChoice::Discard => {
                session.discard_parked()?;
            }
            GateChoice::Reload => self.reload_pending = true,
        }
        Ok(self.evaluate(session, requested))
    }

    /// `true` between a `Reload` choice and the evaluation that consumes it.
    pub fn reload_pending(&self) -> bool {
        self.reload_pending
    }

    /// The route resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn render(&self, session: &EditSession, uri: &str) -> RenderOutcome {
        match self.resolver.resolve(uri) {
            Some(route) => RenderOutcome::Component(route),
            None => {
                warn!(uri, "no route configured");
                RenderOutcome::NothingConfigured {
                    uri: uri.to_owned(),
                    message: session.config().fallback_message.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::config::FormStateConfig;
    use crate::ports::NoExitGuard;
    use crate::store::FormIdentity;
    use std::sync::Arc;

    fn table() -> RouteTable {
        RouteTable::new()
            .route("/", "Index")
            .route("/fetchdata", "FetchData")
            .route("/weather/edit/{id}", "WeatherEditor")
    }

    fn dirty_session() -> (EditSession, ParkedEditor) {
        let session = EditSession::from_config(FormStateConfig::default(), Arc::new(NoExitGuard));
        let editor = ParkedEditor {
            identity: FormIdentity::new("weather", 1),
            route: "/weather/edit/1".into(),
            record_key: "1".into(),
        };
        session.with_store(|s| s.upsert(&editor.identity, "{}")).unwrap();
        session.park(editor.clone());
        (session, editor)
    }

    #[test]
    fn route_table_matches_templates_and_captures_params() {
        let t = table();
        let r = t.resolve("https://localhost:5001/weather/edit/abc?tab=2").unwrap();
        assert_eq!(r.component, "WeatherEditor");
        assert_eq!(r.params.get("id").map(String::as_str), Some("abc"));
        assert_eq!(t.resolve("/").unwrap().component, "Index");
        assert_eq!(t.resolve("/FetchData/").unwrap().component, "FetchData");
        assert!(t.resolve("/weather/edit").is_none());
        assert!(t.resolve("/counter").is_none());
    }

    #[test]
    fn clean_session_goes_direct() {
        let session = EditSession::from_config(FormStateConfig::default(), Arc::new(NoExitGuard));
        let mut nav = NavigationStateMachine::new(table());
        let decision = nav.evaluate(&session, &NavigationIntent::to("/fetchdata"));
        assert_eq!(decision.state(), NavigationState::Direct);
        let Navigation::Direct(outcome) = decision else { unreachable!() };
        assert_eq!(outcome.route().unwrap().component, "FetchData");
    }

    #[test]
    fn unresolved_route_renders_fallback() {
        let session = EditSession::from_config(FormStateConfig::default(), Arc::new(NoExitGuard));
        let mut nav = NavigationStateMachine::new(table());
        let decision = nav.evaluate(&session, &NavigationIntent::to("/nowhere"));
        assert_eq!(
            decision,
            Navigation::Direct(RenderOutcome::NothingConfigured {
                uri: "/nowhere".into(),
                message: "No Route or View Configured to Display".into(),
            })
        );
    }

    #[test]
    fn dirty_session_is_gated_with_prompt() {
        let (session, editor) = dirty_session();
        let mut nav = NavigationStateMachine::new(table());
        let intent = NavigationIntent::to("/fetchdata");
        match nav.evaluate(&session, &intent) {
            Navigation::DirtyGate {
                requested,
                editor: gated,
                prompt,
            } => {
                assert_eq!(requested, intent);
                assert_eq!(gated, editor);
                assert_eq!(prompt.reload_label, "Reload Form");
            }
            other => panic!("expected gate, got {other:?}"),
        }
    }

    #[test]
    fn discard_clears_state_and_goes_direct() {
        let (session, editor) = dirty_session();
        let mut nav = NavigationStateMachine::new(table());
        let intent = NavigationIntent::to("/fetchdata");
        nav.evaluate(&session, &intent);

        let decision = nav.choose(&session, GateChoice::Discard, &intent).unwrap();
        assert_eq!(decision.state(), NavigationState::Direct);
        assert!(session.with_store(|s| s.get(&editor.identity).is_none()));
        assert_eq!(nav.evaluate(&session, &intent).state(), NavigationState::Direct);
    }

    #[test]
    fn reload_reenters_once_then_gates_again() {
        let (session, editor) = dirty_session();
        let mut nav = NavigationStateMachine::new(table());
        let intent = NavigationIntent::to("/fetchdata");

        match nav.choose(&session, GateChoice::Reload, &intent).unwrap() {
            Navigation::Reentry { editor: e, view } => {
                assert_eq!(e, editor);
                assert_eq!(view.route().unwrap().component, "WeatherEditor");
            }
            other => panic!("expected reentry, got {other:?}"),
        }
        assert!(!nav.reload_pending());
        assert_eq!(nav.evaluate(&session, &intent).state(), NavigationState::DirtyGate);
    }

    #[test]
    fn explicit_reload_intent_reenters() {
        let (session, _) = dirty_session();
        let mut nav = NavigationStateMachine::new(table());
        let decision = nav.evaluate(&session, &NavigationIntent::reenter("/fetchdata"));
        assert_eq!(decision.state(), NavigationState::Reentry);
    }

    #[test]
    fn pending_reload_is_dropped_when_nothing_is_parked() {
        let session = EditSession::from_config(FormStateConfig::default(), Arc::new(NoExitGuard));
        let mut nav = NavigationStateMachine::new(table());
        let decision = nav
            .choose(&session, GateChoice::Reload, &NavigationIntent::to("/"))
            .unwrap();
        assert_eq!(decision.state(), NavigationState::Direct);
        assert!(!nav.reload_pending());
    }
}
