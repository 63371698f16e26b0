use crux_kv::error::KeyValueError;
use serde::{Deserialize, Serialize};

use crate::screens::{
    AssistantEvent, AuthEvent, DashboardEvent, LeaderboardEvent, PdfEvent, PlansEvent,
    StudyItemsEvent, TasksEvent,
};

pub type KvOutcome = Result<Option<Vec<u8>>, KeyValueError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Event {
    Noop,

    /// First event after launch. `api_base_url` overrides the compiled-in
    /// default when the shell provides one.
    AppStarted {
        api_base_url: Option<String>,
        now_ms: u64,
    },
    /// Periodic tick carrying the shell's wall clock.
    TimerTick {
        now_ms: u64,
    },
    Navigate {
        path: String,
    },
    LogoutRequested,
    DismissError,
    DismissToast,

    Auth(AuthEvent),
    Dashboard(DashboardEvent),
    Tasks(TasksEvent),
    Plans(PlansEvent),
    StudyItems(StudyItemsEvent),
    Leaderboard(LeaderboardEvent),
    Assistant(AssistantEvent),
    Pdf(PdfEvent),

    #[serde(skip)]
    SessionRestored(KvOutcome),
    #[serde(skip)]
    TokenPersisted(KvOutcome),
    #[serde(skip)]
    TokenCleared(KvOutcome),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted { .. } => "app_started",
            Self::TimerTick { .. } => "timer_tick",
            Self::Navigate { .. } => "navigate",
            Self::LogoutRequested => "logout_requested",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
            Self::Auth(e) => e.name(),
            Self::Dashboard(e) => e.name(),
            Self::Tasks(e) => e.name(),
            Self::Plans(e) => e.name(),
            Self::StudyItems(e) => e.name(),
            Self::Leaderboard(e) => e.name(),
            Self::Assistant(e) => e.name(),
            Self::Pdf(e) => e.name(),
            Self::SessionRestored(_) => "session_restored",
            Self::TokenPersisted(_) => "token_persisted",
            Self::TokenCleared(_) => "token_cleared",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::Navigate { .. }
                | Self::LogoutRequested
                | Self::DismissError
                | Self::DismissToast
                | Self::Auth(
                    AuthEvent::SubmitLogin | AuthEvent::SubmitRegister
                )
                | Self::Tasks(
                    TasksEvent::Create
                        | TasksEvent::Complete { .. }
                        | TasksEvent::Delete { .. }
                        | TasksEvent::SaveEdit
                )
                | Self::Plans(
                    PlansEvent::Create | PlansEvent::Delete { .. } | PlansEvent::SaveEdit
                )
                | Self::StudyItems(
                    StudyItemsEvent::AddDraft { .. }
                        | StudyItemsEvent::ConfirmDraft { .. }
                        | StudyItemsEvent::CancelDraft
                        | StudyItemsEvent::Complete { .. }
                        | StudyItemsEvent::Delete { .. }
                )
                | Self::Assistant(AssistantEvent::Ask)
                | Self::Pdf(PdfEvent::Upload)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;

    #[test]
    fn test_nested_names() {
        assert_eq!(Event::Tasks(TasksEvent::Load).name(), "tasks_load");
        assert_eq!(Event::TimerTick { now_ms: 0 }.name(), "timer_tick");
        assert_eq!(Event::SessionRestored(Ok(None)).name(), "session_restored");
    }

    #[test]
    fn test_user_initiated() {
        assert!(Event::Tasks(TasksEvent::Delete { id: EntityId::Server(1) }).is_user_initiated());
        assert!(Event::LogoutRequested.is_user_initiated());
        assert!(!Event::TimerTick { now_ms: 0 }.is_user_initiated());
        assert!(!Event::Tasks(TasksEvent::Load).is_user_initiated());
    }

    #[test]
    fn test_shell_events_deserialize() {
        let event: Event = serde_json::from_str(r#"{"Navigate":{"path":"/tasks"}}"#).unwrap();
        assert!(matches!(event, Event::Navigate { path } if path == "/tasks"));
    }
}
