use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Ctx, Followup};
use crate::capabilities::ApiResponse;
use crate::event::Event;
use crate::model::LeaderboardEntry;

pub const PODIUM_SIZE: usize = 3;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum LeaderboardEvent {
    Load,

    #[serde(skip)]
    Loaded(Box<ApiResponse<Vec<LeaderboardEntry>>>),
}

impl LeaderboardEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "leaderboard_load",
            Self::Loaded(_) => "leaderboard_loaded",
        }
    }
}

#[derive(Debug, Default)]
pub struct LeaderboardState {
    pub entries: Vec<LeaderboardEntry>,
    pub is_loading: bool,
}

impl LeaderboardState {
    /// First three places, then everyone else.
    #[must_use]
    pub fn split_podium(&self) -> (&[LeaderboardEntry], &[LeaderboardEntry]) {
        self.entries.split_at(self.entries.len().min(PODIUM_SIZE))
    }
}

pub fn mount(state: &mut LeaderboardState, ctx: &mut Ctx<'_>) {
    load(state, ctx);
}

fn load(state: &mut LeaderboardState, ctx: &mut Ctx<'_>) {
    match ctx
        .api
        .leaderboard(|result| Event::Leaderboard(LeaderboardEvent::Loaded(Box::new(result))))
    {
        Ok(()) => state.is_loading = true,
        Err(e) => ctx.unsent("leaderboard", e),
    }
}

pub fn update(event: LeaderboardEvent, state: &mut LeaderboardState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        LeaderboardEvent::Load => load(state, ctx),
        LeaderboardEvent::Loaded(result) => {
            state.is_loading = false;
            match *result {
                Ok(mut response) => {
                    let mut entries = response.take_body().unwrap_or_default();
                    entries.sort_by_key(|e| e.rank);
                    info!(count = entries.len(), "leaderboard loaded");
                    state.entries = entries;
                }
                Err(e) => return ctx.report("leaderboard", &e, "Failed to load leaderboard"),
            }
        }
    }

    Followup::None
}
