use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Process start. The persisted token has not been read yet.
    #[default]
    Bootstrapping,
    Authenticated,
    Unauthenticated,
}

/// Process-wide authentication state. It is derived from the persisted token
/// and only changes through `resolve_bootstrap`, `login` and `logout`.
#[derive(Default)]
pub struct Session {
    status: SessionStatus,
    token: Option<SecretString>,
    bootstrap_started: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("token_present", &self.token.is_some())
            .field("bootstrap_started", &self.bootstrap_started)
            .finish()
    }
}

impl Session {
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, SessionStatus::Bootstrapping)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, SessionStatus::Authenticated)
    }

    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Returns `true` the first time only; bootstrap runs once per load.
    pub fn begin_bootstrap(&mut self) -> bool {
        if self.bootstrap_started {
            return false;
        }
        self.bootstrap_started = true;
        true
    }

    /// Settles the initial status from whatever the token store returned.
    /// `None` covers both "no token" and "store unavailable".
    pub fn resolve_bootstrap(&mut self, token: Option<String>) -> bool {
        if !self.is_loading() {
            return false;
        }

        match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                self.token = Some(SecretString::new(token));
                self.status = SessionStatus::Authenticated;
            }
            None => {
                self.token = None;
                self.status = SessionStatus::Unauthenticated;
            }
        }
        true
    }

    /// The token is trusted as-is; the API is the judge of its validity.
    pub fn login(&mut self, token: SecretString) {
        self.token = Some(token);
        self.status = SessionStatus::Authenticated;
    }

    pub fn logout(&mut self) {
        self.token = None;
        self.status = SessionStatus::Unauthenticated;
    }

    #[must_use]
    pub fn bearer_header(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }

    #[must_use]
    pub fn gate(&self, route: Route) -> RouteDecision {
        match self.status {
            SessionStatus::Bootstrapping => RouteDecision::Suspend,
            SessionStatus::Unauthenticated if route.is_protected() => {
                RouteDecision::Redirect(Route::Login)
            }
            SessionStatus::Authenticated if !route.is_protected() => {
                RouteDecision::Redirect(Route::Dashboard)
            }
            _ => RouteDecision::Allow(route),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Tasks,
    Plans,
    StudyItems,
    Leaderboard,
    AiAssistant,
    PdfSummarizer,
}

impl Route {
    pub const ALL: [Self; 9] = [
        Self::Login,
        Self::Register,
        Self::Dashboard,
        Self::Tasks,
        Self::Plans,
        Self::StudyItems,
        Self::Leaderboard,
        Self::AiAssistant,
        Self::PdfSummarizer,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Dashboard => "/dashboard",
            Self::Tasks => "/tasks",
            Self::Plans => "/plans",
            Self::StudyItems => "/study-items",
            Self::Leaderboard => "/leaderboard",
            Self::AiAssistant => "/ai-assistant",
            Self::PdfSummarizer => "/pdf-summarizer",
        }
    }

    /// `/` maps to the dashboard. Unknown paths map to nothing.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Some(Self::Dashboard);
        }
        Self::ALL.into_iter().find(|r| r.path() == trimmed)
    }

    #[must_use]
    pub const fn is_protected(self) -> bool {
        !matches!(self, Self::Login | Self::Register)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteDecision {
    /// Bootstrap has not resolved; make no navigation decision yet.
    Suspend,
    Allow(Route),
    Redirect(Route),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_suspends_while_loading() {
        let session = Session::default();
        assert!(session.is_loading());
        for route in Route::ALL {
            assert_eq!(session.gate(route), RouteDecision::Suspend);
        }
    }

    #[test]
    fn test_unauthenticated_is_sent_to_login() {
        let mut session = Session::default();
        session.resolve_bootstrap(None);

        assert_eq!(session.gate(Route::Tasks), RouteDecision::Redirect(Route::Login));
        assert_eq!(session.gate(Route::Register), RouteDecision::Allow(Route::Register));
    }

    #[test]
    fn test_authenticated_proceeds() {
        let mut session = Session::default();
        session.resolve_bootstrap(Some("tok".into()));

        assert_eq!(session.gate(Route::Plans), RouteDecision::Allow(Route::Plans));
        assert_eq!(session.gate(Route::Login), RouteDecision::Redirect(Route::Dashboard));
        assert_eq!(session.bearer_header().as_deref(), Some("Bearer tok"));
    }

    #[test]
    fn test_blank_token_fails_closed() {
        let mut session = Session::default();
        session.resolve_bootstrap(Some("  ".into()));
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[test]
    fn test_bootstrap_runs_once() {
        let mut session = Session::default();
        assert!(session.begin_bootstrap());
        assert!(!session.begin_bootstrap());

        assert!(session.resolve_bootstrap(None));
        session.login(SecretString::new("tok".into()));
        assert!(!session.resolve_bootstrap(None));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_logout_clears_token() {
        let mut session = Session::default();
        session.login(SecretString::new("tok".into()));
        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.bearer_header().is_none());
    }

    #[test]
    fn test_debug_output_hides_token() {
        let mut session = Session::default();
        session.login(SecretString::new("very-secret".into()));
        assert!(!format!("{session:?}").contains("very-secret"));
    }

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::from_path("/"), Some(Route::Dashboard));
        assert_eq!(Route::from_path(""), Some(Route::Dashboard));
        assert_eq!(Route::from_path("/study-items/"), Some(Route::StudyItems));
        assert_eq!(Route::from_path("/tasks?x=1"), Some(Route::Tasks));
        assert_eq!(Route::from_path("/nope"), None);
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }
}
