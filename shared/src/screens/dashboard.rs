use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Ctx, Followup};
use crate::capabilities::ApiResponse;
use crate::event::Event;
use crate::model::{DashboardSummary, LeaderboardEntry};

const LOAD_FAILED: &str = "Failed to load dashboard data";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum DashboardEvent {
    Load,

    #[serde(skip)]
    SummaryLoaded(Box<ApiResponse<DashboardSummary>>),
    #[serde(skip)]
    LeadersLoaded(Box<ApiResponse<Vec<LeaderboardEntry>>>),
}

impl DashboardEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "dashboard_load",
            Self::SummaryLoaded(_) => "dashboard_summary_loaded",
            Self::LeadersLoaded(_) => "dashboard_leaders_loaded",
        }
    }
}

#[derive(Debug, Default)]
pub struct DashboardState {
    pub summary: Option<DashboardSummary>,
    pub top_users: Vec<LeaderboardEntry>,
    pub summary_loading: bool,
    pub leaders_loading: bool,
}

impl DashboardState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.summary_loading || self.leaders_loading
    }
}

pub fn mount(state: &mut DashboardState, ctx: &mut Ctx<'_>) {
    load(state, ctx);
}

fn load(state: &mut DashboardState, ctx: &mut Ctx<'_>) {
    match ctx
        .api
        .dashboard(|result| Event::Dashboard(DashboardEvent::SummaryLoaded(Box::new(result))))
    {
        Ok(()) => state.summary_loading = true,
        Err(e) => ctx.unsent("dashboard", e),
    }
    match ctx
        .api
        .leaderboard(|result| Event::Dashboard(DashboardEvent::LeadersLoaded(Box::new(result))))
    {
        Ok(()) => state.leaders_loading = true,
        Err(e) => ctx.unsent("leaderboard", e),
    }
}

pub fn update(event: DashboardEvent, state: &mut DashboardState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        DashboardEvent::Load => load(state, ctx),

        DashboardEvent::SummaryLoaded(result) => {
            state.summary_loading = false;
            match *result {
                Ok(mut response) => {
                    let summary = response.take_body().unwrap_or_default();
                    info!(
                        streak = summary.streak.current_streak,
                        pending = summary.progress.pending_tasks,
                        "dashboard loaded"
                    );
                    state.summary = Some(summary);
                }
                Err(e) => return ctx.report("dashboard", &e, LOAD_FAILED),
            }
        }

        DashboardEvent::LeadersLoaded(result) => {
            state.leaders_loading = false;
            match *result {
                Ok(mut response) => {
                    let mut leaders = response.take_body().unwrap_or_default();
                    leaders.truncate(ctx.config.dashboard_leaderboard_size);
                    state.top_users = leaders;
                }
                Err(e) => return ctx.report("leaderboard", &e, LOAD_FAILED),
            }
        }
    }

    Followup::None
}
