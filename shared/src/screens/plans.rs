use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    persisted_id, revert_unsent, settle, Ctx, Followup, LoadSequence, MutationCopy, Settlement,
};
use crate::capabilities::ApiResponse;
use crate::error::ValidationError;
use crate::event::Event;
use crate::model::{EntityId, Plan, PlanRequest};
use crate::optimistic::{InsertAt, MutationId, MutationKind, OptimisticList, ReconcilePolicy};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum PlansEvent {
    Load,
    TitleChanged(String),
    DescriptionChanged(String),
    Create,
    Delete { id: EntityId },
    StartEdit { id: EntityId },
    EditTitleChanged(String),
    EditDescriptionChanged(String),
    SaveEdit,
    CancelEdit,

    #[serde(skip)]
    Loaded {
        seq: u64,
        result: Box<ApiResponse<Vec<Plan>>>,
    },
    #[serde(skip)]
    Mutated {
        mutation_id: MutationId,
        kind: MutationKind,
        result: Box<ApiResponse<Vec<u8>>>,
    },
}

impl PlansEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "plans_load",
            Self::TitleChanged(_) => "plans_title_changed",
            Self::DescriptionChanged(_) => "plans_description_changed",
            Self::Create => "plans_create",
            Self::Delete { .. } => "plans_delete",
            Self::StartEdit { .. } => "plans_start_edit",
            Self::EditTitleChanged(_) => "plans_edit_title_changed",
            Self::EditDescriptionChanged(_) => "plans_edit_description_changed",
            Self::SaveEdit => "plans_save_edit",
            Self::CancelEdit => "plans_cancel_edit",
            Self::Loaded { .. } => "plans_loaded",
            Self::Mutated { .. } => "plans_mutated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanForm {
    pub title: String,
    pub description: String,
}

impl PlanForm {
    /// The request body, or `None` when the title is blank.
    fn to_request(&self) -> Option<PlanRequest> {
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }
        Some(PlanRequest {
            title: title.to_string(),
            description: self.description.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingPlan {
    pub id: EntityId,
    pub form: PlanForm,
}

#[derive(Debug, Default)]
pub struct PlansState {
    pub list: OptimisticList<Plan>,
    pub form: PlanForm,
    pub editing: Option<EditingPlan>,
    pub loads: LoadSequence,
    pub is_loading: bool,
    pub is_submitting: bool,
}

const fn copy_for(kind: MutationKind) -> MutationCopy {
    match kind {
        MutationKind::Create => MutationCopy {
            op: "create_plan",
            success: "Plan created!",
            failure: "Failed to create plan",
        },
        MutationKind::Update | MutationKind::Complete => MutationCopy {
            op: "update_plan",
            success: "Plan updated!",
            failure: "Update failed",
        },
        MutationKind::Delete => MutationCopy {
            op: "delete_plan",
            success: "Plan deleted!",
            failure: "Delete failed",
        },
    }
}

fn mutated(
    mutation_id: MutationId,
    kind: MutationKind,
) -> impl FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static {
    move |result| {
        Event::Plans(PlansEvent::Mutated {
            mutation_id,
            kind,
            result: Box::new(result),
        })
    }
}

fn description_of(request: &PlanRequest) -> Option<String> {
    (!request.description.is_empty()).then(|| request.description.clone())
}

pub fn mount(state: &mut PlansState, ctx: &mut Ctx<'_>) {
    load(state, ctx);
}

fn load(state: &mut PlansState, ctx: &mut Ctx<'_>) {
    let seq = state.loads.upcoming();
    match ctx.api.list_plans(move |result| {
        Event::Plans(PlansEvent::Loaded {
            seq,
            result: Box::new(result),
        })
    }) {
        Ok(()) => {
            state.loads.issued(seq);
            state.is_loading = true;
        }
        Err(e) => ctx.unsent("list_plans", e),
    }
}

pub fn update(event: PlansEvent, state: &mut PlansState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        PlansEvent::Load => load(state, ctx),

        PlansEvent::TitleChanged(title) => state.form.title = title,
        PlansEvent::DescriptionChanged(description) => state.form.description = description,

        PlansEvent::Create => create(state, ctx),

        PlansEvent::Delete { id } => {
            let Some(server_id) = persisted_id(&id, ctx) else {
                return Followup::None;
            };
            let mutation_id = match state.list.apply_remove(&id) {
                Ok(mutation_id) => mutation_id,
                Err(e) => {
                    debug!(%id, error = %e, "delete rejected");
                    ctx.fail(e);
                    return Followup::None;
                }
            };
            if state.editing.as_ref().is_some_and(|e| e.id == id) {
                state.editing = None;
            }
            if let Err(e) = ctx
                .api
                .delete_plan(server_id, mutated(mutation_id.clone(), MutationKind::Delete))
            {
                revert_unsent(&mut state.list, &mutation_id, "delete_plan", e, ctx);
            }
        }

        PlansEvent::StartEdit { id } => match state.list.get(&id) {
            Some(plan) => {
                state.editing = Some(EditingPlan {
                    id,
                    form: PlanForm {
                        title: plan.title.clone(),
                        description: plan.description.clone().unwrap_or_default(),
                    },
                });
            }
            None => debug!(%id, "edit of unknown plan ignored"),
        },

        PlansEvent::EditTitleChanged(title) => {
            if let Some(editing) = state.editing.as_mut() {
                editing.form.title = title;
            }
        }

        PlansEvent::EditDescriptionChanged(description) => {
            if let Some(editing) = state.editing.as_mut() {
                editing.form.description = description;
            }
        }

        PlansEvent::SaveEdit => save_edit(state, ctx),

        PlansEvent::CancelEdit => state.editing = None,

        PlansEvent::Loaded { seq, result } => {
            if !state.loads.is_latest(seq) {
                debug!(seq, "superseded plan list ignored");
                return Followup::None;
            }
            state.is_loading = false;
            match *result {
                Ok(mut response) => {
                    let plans = response.take_body().unwrap_or_default();
                    info!(count = plans.len(), "plans loaded");
                    state.list.replace_all(plans);
                }
                Err(e) => return ctx.report("list_plans", &e, "Failed to load plans"),
            }
        }

        PlansEvent::Mutated {
            mutation_id,
            kind,
            result,
        } => {
            if kind == MutationKind::Create {
                state.is_submitting = false;
            }
            let (settlement, followup) = settle(
                &mut state.list,
                &ReconcilePolicy::PLANS,
                &mutation_id,
                &result,
                copy_for(kind),
                ctx,
            );
            if matches!(settlement, Settlement::Committed { refetch: true }) {
                load(state, ctx);
            }
            return followup;
        }
    }

    Followup::None
}

fn create(state: &mut PlansState, ctx: &mut Ctx<'_>) {
    let Some(request) = state.form.to_request() else {
        ctx.fail(ValidationError::EmptyPlanTitle);
        return;
    };
    if state.is_submitting {
        debug!("create ignored while another is in flight");
        return;
    }

    let temp = Plan {
        id: EntityId::local(),
        title: request.title.clone(),
        description: description_of(&request),
        owner_id: None,
    };
    let mutation_id = match state.list.apply_create(temp, InsertAt::Back) {
        Ok(mutation_id) => mutation_id,
        Err(e) => {
            ctx.fail(e);
            return;
        }
    };

    match ctx
        .api
        .create_plan(&request, mutated(mutation_id.clone(), MutationKind::Create))
    {
        Ok(()) => {
            state.form = PlanForm::default();
            state.is_submitting = true;
        }
        Err(e) => revert_unsent(&mut state.list, &mutation_id, "create_plan", e, ctx),
    }
}

fn save_edit(state: &mut PlansState, ctx: &mut Ctx<'_>) {
    let Some(editing) = state.editing.as_ref() else {
        return;
    };
    let Some(request) = editing.form.to_request() else {
        ctx.fail(ValidationError::EmptyPlanTitle);
        return;
    };
    let id = editing.id.clone();
    let Some(server_id) = persisted_id(&id, ctx) else {
        return;
    };

    let title = request.title.clone();
    let description = description_of(&request);
    let mutation_id = match state.list.apply_update(&id, MutationKind::Update, |p| {
        p.title = title;
        p.description = description;
    }) {
        Ok(mutation_id) => mutation_id,
        Err(e) => {
            debug!(%id, error = %e, "update rejected");
            ctx.fail(e);
            return;
        }
    };
    state.editing = None;

    if let Err(e) = ctx.api.update_plan(
        server_id,
        &request,
        mutated(mutation_id.clone(), MutationKind::Update),
    ) {
        revert_unsent(&mut state.list, &mutation_id, "update_plan", e, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_yields_no_request() {
        let form = PlanForm {
            title: "   ".into(),
            description: "Chapters 1-3".into(),
        };
        assert!(form.to_request().is_none());
    }

    #[test]
    fn test_missing_description_is_sent_empty() {
        let form = PlanForm {
            title: " Exam prep ".into(),
            description: String::new(),
        };
        let request = form.to_request().unwrap();
        assert_eq!(request.title, "Exam prep");
        assert_eq!(request.description, "");
        assert_eq!(description_of(&request), None);
    }
}
