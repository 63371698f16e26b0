//! Per-route controllers.
//!
//! Each screen owns its state exclusively and is rebuilt from scratch whenever
//! its route is mounted. Handlers get a [`Ctx`] with the API client and the
//! feedback slot, and hand anything that reaches beyond the screen (session
//! changes, navigation) back to the app as a [`Followup`].

pub mod assistant;
pub mod auth_forms;
pub mod dashboard;
pub mod leaderboard;
pub mod pdf;
pub mod plans;
pub mod study_items;
pub mod tasks;

pub use self::assistant::{AssistantEvent, AssistantState, ChatMessage, ChatRole};
pub use self::auth_forms::{AuthEvent, AuthFormState};
pub use self::dashboard::{DashboardEvent, DashboardState};
pub use self::leaderboard::{LeaderboardEvent, LeaderboardState};
pub use self::pdf::{PdfEvent, PdfState};
pub use self::plans::{PlansEvent, PlansState};
pub use self::study_items::{StudyItemsEvent, StudyItemsState};
pub use self::tasks::{TasksEvent, TasksState};

use crux_http::HttpError;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::capabilities::{Api, ApiError, ApiResponse};
use crate::config::ApiConfig;
use crate::error::AppError;
use crate::model::{CreatedResponse, Entity, EntityId, Feedback};
use crate::optimistic::{MutationError, MutationId, OptimisticList, Reconcile, ReconcilePolicy};
use crate::session::Route;

pub struct Ctx<'a> {
    pub api: Api<'a>,
    pub feedback: &'a mut Feedback,
    pub config: &'a ApiConfig,
    pub now_ms: u64,
}

impl Ctx<'_> {
    pub fn fail(&mut self, error: impl Into<AppError>) {
        self.feedback.set_error(error.into(), self.now_ms);
    }

    /// Clears the error banner and shows a success toast.
    pub fn succeed(&mut self, toast: &str) {
        self.feedback.clear_error();
        self.feedback
            .show_toast(toast, self.now_ms, self.config.toast_display_ms);
    }

    /// Surfaces a failed authenticated call. A 401 means the API no longer
    /// accepts the token, which ends the session.
    pub fn report(&mut self, op: &'static str, error: &HttpError, fallback: &str) -> Followup {
        let app_error = AppError::from_http(error, fallback);
        warn!(op, error = %error, code = app_error.code(), "remote call failed");

        let expired = app_error.is_session_expired();
        self.fail(app_error);
        if expired {
            Followup::SessionExpired
        } else {
            Followup::None
        }
    }

    /// A request could not even be built.
    pub fn unsent(&mut self, op: &'static str, error: ApiError) {
        warn!(op, error = %error, "request not sent");
        self.fail(error);
    }
}

/// What the app has to do after a screen handled an event.
#[derive(Debug, Default)]
pub enum Followup {
    #[default]
    None,
    Navigate(Route),
    LoggedIn(SecretString),
    SessionExpired,
}

/// Outcome of a mutation response as seen by the owning screen.
#[derive(Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The mutation id is no longer tracked.
    Stale,
    Committed { refetch: bool },
    Reverted,
}

/// Orders the list loads of one screen. Only the response to the most recently
/// issued load is applied; anything older was overtaken by a later refetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSequence {
    latest: u64,
}

impl LoadSequence {
    /// The number the next load will carry.
    #[must_use]
    pub const fn upcoming(&self) -> u64 {
        self.latest + 1
    }

    /// Records that the load numbered `seq` was sent.
    pub fn issued(&mut self, seq: u64) {
        self.latest = self.latest.max(seq);
    }

    #[must_use]
    pub const fn is_latest(&self, seq: u64) -> bool {
        seq == self.latest
    }
}

/// User-facing strings for one mutation kind.
#[derive(Debug, Clone, Copy)]
pub struct MutationCopy {
    pub op: &'static str,
    pub success: &'static str,
    pub failure: &'static str,
}

/// Commits or reverts an in-flight mutation from its response.
pub fn settle<T: Entity>(
    list: &mut OptimisticList<T>,
    policy: &ReconcilePolicy,
    mutation_id: &MutationId,
    result: &ApiResponse<Vec<u8>>,
    copy: MutationCopy,
    ctx: &mut Ctx<'_>,
) -> (Settlement, Followup) {
    match result {
        Ok(response) => {
            if let Some(server_id) = response
                .body()
                .and_then(|body| CreatedResponse::server_id(body.as_slice()))
            {
                list.assign_server_id(mutation_id, server_id);
            }
            let Some(settled) = list.commit(mutation_id) else {
                debug!(op = copy.op, %mutation_id, "response for unknown mutation ignored");
                return (Settlement::Stale, Followup::None);
            };
            ctx.succeed(copy.success);
            let refetch = policy.for_kind(settled.kind) == Reconcile::Refetch;
            debug!(op = copy.op, entity = %settled.entity_id, refetch, "mutation committed");
            (Settlement::Committed { refetch }, Followup::None)
        }
        Err(e) => {
            let Some(settled) = list.revert(mutation_id) else {
                debug!(op = copy.op, %mutation_id, "failure for unknown mutation ignored");
                return (Settlement::Stale, Followup::None);
            };
            warn!(op = copy.op, entity = %settled.entity_id, "mutation rolled back");
            (Settlement::Reverted, ctx.report(copy.op, e, copy.failure))
        }
    }
}

/// The server id of an entity about to be mutated. Entities still waiting for
/// their create to land have none yet.
pub fn persisted_id(id: &EntityId, ctx: &mut Ctx<'_>) -> Option<i64> {
    let server_id = id.server_id();
    if server_id.is_none() {
        debug!(%id, "mutation of unsaved entity rejected");
        ctx.fail(MutationError::NotPersisted { id: id.clone() });
    }
    server_id
}

/// Rolls back a mutation whose request never left the core.
pub fn revert_unsent<T: Entity>(
    list: &mut OptimisticList<T>,
    mutation_id: &MutationId,
    op: &'static str,
    error: ApiError,
    ctx: &mut Ctx<'_>,
) {
    list.revert(mutation_id);
    ctx.unsent(op, error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_load_applies() {
        let mut loads = LoadSequence::default();
        let first = loads.upcoming();
        loads.issued(first);
        assert!(loads.is_latest(first));

        let second = loads.upcoming();
        loads.issued(second);
        assert!(!loads.is_latest(first));
        assert!(loads.is_latest(second));
    }

    #[test]
    fn test_unsent_load_keeps_previous_current() {
        let mut loads = LoadSequence::default();
        let first = loads.upcoming();
        loads.issued(first);

        let _unsent = loads.upcoming();
        assert!(loads.is_latest(first));
    }
}
