use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::capabilities::{decode_token, Api, Capabilities, TokenStore};
use crate::error::{AppError, ErrorKind};
use crate::event::{Event, KvOutcome};
use crate::model::{Model, ScreenState};
use crate::screens::{
    self, AssistantState, AuthFormState, Ctx, DashboardState, Followup, LeaderboardState,
    PdfState, PlansState, StudyItemsEvent, StudyItemsState, TasksState,
};
use crate::session::{Route, RouteDecision};
use crate::view::ViewModel;

const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";

#[derive(Default)]
pub struct App;

impl App {
    /// Routes a navigation request through the session gate.
    fn navigate(route: Route, model: &mut Model, caps: &Capabilities) {
        match model.session.gate(route) {
            RouteDecision::Suspend => {
                debug!(route = route.path(), "navigation deferred until session resolves");
                model.requested_route = Some(route);
            }
            RouteDecision::Allow(target) => Self::mount(target, model, caps),
            RouteDecision::Redirect(target) => {
                debug!(from = route.path(), to = target.path(), "navigation redirected");
                Self::mount(target, model, caps);
            }
        }
    }

    /// Replaces the active screen with fresh state and kicks off its loads.
    fn mount(route: Route, model: &mut Model, caps: &Capabilities) {
        if model.route == Some(route) {
            return;
        }
        model.route = Some(route);
        model.feedback.clear_error();

        model.screen = match route {
            Route::Login => ScreenState::Login(AuthFormState::default()),
            Route::Register => ScreenState::Register(AuthFormState::default()),
            Route::Dashboard => ScreenState::Dashboard(DashboardState::default()),
            Route::Tasks => ScreenState::Tasks(TasksState::default()),
            Route::Plans => ScreenState::Plans(PlansState::default()),
            Route::StudyItems => {
                ScreenState::StudyItems(StudyItemsState::new(model.config.draft_ttl_ms))
            }
            Route::Leaderboard => ScreenState::Leaderboard(LeaderboardState::default()),
            Route::AiAssistant => ScreenState::Assistant(AssistantState::default()),
            Route::PdfSummarizer => ScreenState::Pdf(PdfState::default()),
        };
        info!(route = route.path(), "screen mounted");

        let Model {
            ref config,
            ref session,
            ref mut screen,
            ref mut feedback,
            now_ms,
            ..
        } = *model;
        let mut ctx = Ctx {
            api: Api::new(&caps.http, config, session),
            feedback,
            config,
            now_ms,
        };
        match screen {
            ScreenState::Dashboard(state) => screens::dashboard::mount(state, &mut ctx),
            ScreenState::Tasks(state) => screens::tasks::mount(state, &mut ctx),
            ScreenState::Plans(state) => screens::plans::mount(state, &mut ctx),
            ScreenState::StudyItems(state) => screens::study_items::mount(state, &mut ctx),
            ScreenState::Leaderboard(state) => screens::leaderboard::mount(state, &mut ctx),
            ScreenState::None
            | ScreenState::Login(_)
            | ScreenState::Register(_)
            | ScreenState::Assistant(_)
            | ScreenState::Pdf(_) => {}
        }
    }

    /// Hands a screen event to the active screen. Events addressed to a
    /// screen that is no longer mounted are dropped.
    fn dispatch(event: Event, model: &mut Model, caps: &Capabilities) -> Followup {
        let name = event.name();
        let Model {
            ref config,
            ref session,
            ref mut screen,
            ref mut feedback,
            now_ms,
            ..
        } = *model;
        let mut ctx = Ctx {
            api: Api::new(&caps.http, config, session),
            feedback,
            config,
            now_ms,
        };

        match (event, screen) {
            (Event::Auth(e), ScreenState::Login(state) | ScreenState::Register(state)) => {
                screens::auth_forms::update(e, state, &mut ctx)
            }
            (Event::Dashboard(e), ScreenState::Dashboard(state)) => {
                screens::dashboard::update(e, state, &mut ctx)
            }
            (Event::Tasks(e), ScreenState::Tasks(state)) => {
                screens::tasks::update(e, state, &mut ctx)
            }
            (Event::Plans(e), ScreenState::Plans(state)) => {
                screens::plans::update(e, state, &mut ctx)
            }
            (Event::StudyItems(e), ScreenState::StudyItems(state)) => {
                screens::study_items::update(e, state, &mut ctx)
            }
            (Event::Leaderboard(e), ScreenState::Leaderboard(state)) => {
                screens::leaderboard::update(e, state, &mut ctx)
            }
            (Event::Assistant(e), ScreenState::Assistant(state)) => {
                screens::assistant::update(e, state, &mut ctx)
            }
            (Event::Pdf(e), ScreenState::Pdf(state)) => screens::pdf::update(e, state, &mut ctx),
            _ => {
                debug!(event = name, "event for inactive screen ignored");
                Followup::None
            }
        }
    }

    fn follow(followup: Followup, model: &mut Model, caps: &Capabilities) {
        match followup {
            Followup::None => {}
            Followup::Navigate(route) => Self::navigate(route, model, caps),
            Followup::LoggedIn(token) => Self::logged_in(token, model, caps),
            Followup::SessionExpired => {
                warn!("session rejected by api");
                Self::end_session(model, caps);
                Self::navigate(Route::Login, model, caps);
                model.set_error(AppError::new(ErrorKind::Authentication, SESSION_EXPIRED));
            }
        }
    }

    fn logged_in(token: SecretString, model: &mut Model, caps: &Capabilities) {
        if let Err(e) = TokenStore::new(&caps.kv).save(&token, Event::TokenPersisted) {
            warn!(error = %e, "token not persisted");
        }
        model.session.login(token);
        info!("session started");
        Self::navigate(Route::Dashboard, model, caps);
    }

    fn end_session(model: &mut Model, caps: &Capabilities) {
        model.session.logout();
        if let Err(e) = TokenStore::new(&caps.kv).clear(Event::TokenCleared) {
            warn!(error = %e, "token not cleared");
        }
    }

    fn restore_session(result: KvOutcome, model: &mut Model, caps: &Capabilities) {
        let (token, error) = decode_token(result);
        if let Some(e) = &error {
            warn!(error = %e, "stored token unreadable, starting signed out");
        }
        if !model.session.resolve_bootstrap(token) {
            debug!("duplicate session restore ignored");
            return;
        }
        info!(
            authenticated = model.session.is_authenticated(),
            "session resolved"
        );

        let route = model.requested_route.take().unwrap_or(Route::Dashboard);
        Self::navigate(route, model, caps);
    }

    fn log_kv_outcome(op: &'static str, result: &KvOutcome) {
        match result {
            Ok(_) => debug!(op, "secure storage updated"),
            Err(e) => warn!(op, error = %e, "secure storage write failed"),
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            user = event.is_user_initiated(),
            "update"
        );

        match event {
            Event::Noop => return,

            Event::AppStarted {
                api_base_url,
                now_ms,
            } => {
                model.advance_clock(now_ms);
                if let Some(url) = api_base_url {
                    match model.config.clone().with_base_url(&url) {
                        Ok(config) => model.config = config,
                        Err(e) => warn!(error = %e, "api base url rejected, keeping default"),
                    }
                }
                if model.session.begin_bootstrap() {
                    if let Err(e) = TokenStore::new(&caps.kv).load(Event::SessionRestored) {
                        warn!(error = %e, "token lookup not started");
                        Self::restore_session(Ok(None), model, caps);
                    }
                }
            }

            Event::SessionRestored(result) => Self::restore_session(result, model, caps),

            Event::TokenPersisted(result) => {
                Self::log_kv_outcome("persist_token", &result);
                return;
            }
            Event::TokenCleared(result) => {
                Self::log_kv_outcome("clear_token", &result);
                return;
            }

            Event::TimerTick { now_ms } => {
                model.advance_clock(now_ms);
                let mut changed = model.expire_feedback();
                if let ScreenState::StudyItems(state) = &mut model.screen {
                    changed |= screens::study_items::tick(state, model.now_ms);
                }
                if !changed {
                    return;
                }
            }

            Event::Navigate { path } => {
                let route = Route::from_path(&path).unwrap_or_else(|| {
                    debug!(%path, "unknown path, falling back to dashboard");
                    Route::Dashboard
                });
                Self::navigate(route, model, caps);
            }

            Event::LogoutRequested => {
                info!("logout requested");
                Self::end_session(model, caps);
                Self::navigate(Route::Login, model, caps);
            }

            Event::DismissError => model.feedback.clear_error(),
            Event::DismissToast => model.feedback.clear_toast(),

            screen_event => {
                if let Event::StudyItems(
                    StudyItemsEvent::AddDraft { now_ms }
                    | StudyItemsEvent::ConfirmDraft { now_ms }
                    | StudyItemsEvent::DraftTimerFired { now_ms, .. },
                ) = &screen_event
                {
                    model.advance_clock(*now_ms);
                }
                let followup = Self::dispatch(screen_event, model, caps);
                Self::follow(followup, model, caps);
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}
