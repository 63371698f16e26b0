use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    persisted_id, revert_unsent, settle, Ctx, Followup, LoadSequence, MutationCopy, Settlement,
};
use crate::capabilities::ApiResponse;
use crate::error::ValidationError;
use crate::event::Event;
use crate::model::{EntityId, Task};
use crate::optimistic::{InsertAt, MutationId, MutationKind, OptimisticList, ReconcilePolicy};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum TasksEvent {
    Load,
    NewTitleChanged(String),
    Create,
    Complete { id: EntityId },
    Delete { id: EntityId },
    StartEdit { id: EntityId },
    EditTitleChanged(String),
    SaveEdit,
    CancelEdit,

    #[serde(skip)]
    Loaded {
        seq: u64,
        result: Box<ApiResponse<Vec<Task>>>,
    },
    #[serde(skip)]
    Mutated {
        mutation_id: MutationId,
        kind: MutationKind,
        result: Box<ApiResponse<Vec<u8>>>,
    },
}

impl TasksEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "tasks_load",
            Self::NewTitleChanged(_) => "tasks_new_title_changed",
            Self::Create => "tasks_create",
            Self::Complete { .. } => "tasks_complete",
            Self::Delete { .. } => "tasks_delete",
            Self::StartEdit { .. } => "tasks_start_edit",
            Self::EditTitleChanged(_) => "tasks_edit_title_changed",
            Self::SaveEdit => "tasks_save_edit",
            Self::CancelEdit => "tasks_cancel_edit",
            Self::Loaded { .. } => "tasks_loaded",
            Self::Mutated { .. } => "tasks_mutated",
        }
    }
}

/// Scratch copy of the one task being edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingTask {
    pub id: EntityId,
    pub title: String,
}

#[derive(Debug, Default)]
pub struct TasksState {
    pub list: OptimisticList<Task>,
    pub new_title: String,
    pub editing: Option<EditingTask>,
    pub loads: LoadSequence,
    pub is_loading: bool,
    pub is_submitting: bool,
}

const fn copy_for(kind: MutationKind) -> MutationCopy {
    match kind {
        MutationKind::Create => MutationCopy {
            op: "create_task",
            success: "Task created successfully!",
            failure: "Failed to create task",
        },
        MutationKind::Update => MutationCopy {
            op: "update_task",
            success: "Task updated!",
            failure: "Failed to update task",
        },
        MutationKind::Complete => MutationCopy {
            op: "complete_task",
            success: "Task marked as completed!",
            failure: "Failed to complete task",
        },
        MutationKind::Delete => MutationCopy {
            op: "delete_task",
            success: "Task deleted!",
            failure: "Failed to delete task",
        },
    }
}

fn mutated(
    mutation_id: MutationId,
    kind: MutationKind,
) -> impl FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static {
    move |result| {
        Event::Tasks(TasksEvent::Mutated {
            mutation_id,
            kind,
            result: Box::new(result),
        })
    }
}

pub fn mount(state: &mut TasksState, ctx: &mut Ctx<'_>) {
    load(state, ctx);
}

fn load(state: &mut TasksState, ctx: &mut Ctx<'_>) {
    let seq = state.loads.upcoming();
    match ctx.api.list_tasks(move |result| {
        Event::Tasks(TasksEvent::Loaded {
            seq,
            result: Box::new(result),
        })
    }) {
        Ok(()) => {
            state.loads.issued(seq);
            state.is_loading = true;
        }
        Err(e) => ctx.unsent("list_tasks", e),
    }
}

pub fn update(event: TasksEvent, state: &mut TasksState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        TasksEvent::Load => load(state, ctx),

        TasksEvent::NewTitleChanged(title) => state.new_title = title,

        TasksEvent::Create => create(state, ctx),

        TasksEvent::Complete { id } => {
            if state.list.get(&id).is_some_and(|t| t.completed) {
                debug!(%id, "task already completed");
                return Followup::None;
            }
            let Some(server_id) = persisted_id(&id, ctx) else {
                return Followup::None;
            };
            let mutation_id = match state
                .list
                .apply_update(&id, MutationKind::Complete, |t| t.completed = true)
            {
                Ok(mutation_id) => mutation_id,
                Err(e) => {
                    debug!(%id, error = %e, "complete rejected");
                    ctx.fail(e);
                    return Followup::None;
                }
            };
            if let Err(e) = ctx.api.complete_task(
                server_id,
                mutated(mutation_id.clone(), MutationKind::Complete),
            ) {
                revert_unsent(&mut state.list, &mutation_id, "complete_task", e, ctx);
            }
        }

        TasksEvent::Delete { id } => {
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
                .delete_task(server_id, mutated(mutation_id.clone(), MutationKind::Delete))
            {
                revert_unsent(&mut state.list, &mutation_id, "delete_task", e, ctx);
            }
        }

        TasksEvent::StartEdit { id } => match state.list.get(&id) {
            Some(task) => {
                state.editing = Some(EditingTask {
                    id,
                    title: task.title.clone(),
                });
            }
            None => debug!(%id, "edit of unknown task ignored"),
        },

        TasksEvent::EditTitleChanged(title) => {
            if let Some(editing) = state.editing.as_mut() {
                editing.title = title;
            }
        }

        TasksEvent::SaveEdit => save_edit(state, ctx),

        TasksEvent::CancelEdit => state.editing = None,

        TasksEvent::Loaded { seq, result } => {
            if !state.loads.is_latest(seq) {
                debug!(seq, "superseded task list ignored");
                return Followup::None;
            }
            state.is_loading = false;
            match *result {
                Ok(mut response) => {
                    let tasks = response.take_body().unwrap_or_default();
                    info!(count = tasks.len(), "tasks loaded");
                    state.list.replace_all(tasks);
                }
                Err(e) => return ctx.report("list_tasks", &e, "Failed to load tasks"),
            }
        }

        TasksEvent::Mutated {
            mutation_id,
            kind,
            result,
        } => {
            if kind == MutationKind::Create {
                state.is_submitting = false;
            }
            let (settlement, followup) = settle(
                &mut state.list,
                &ReconcilePolicy::TASKS,
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

fn create(state: &mut TasksState, ctx: &mut Ctx<'_>) {
    let title = state.new_title.trim().to_string();
    if title.is_empty() {
        ctx.fail(ValidationError::EmptyTaskTitle);
        return;
    }
    if state.is_submitting {
        debug!("create ignored while another is in flight");
        return;
    }

    let temp = Task {
        id: EntityId::local(),
        title: title.clone(),
        completed: false,
        completed_date: None,
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
        .create_task(&title, mutated(mutation_id.clone(), MutationKind::Create))
    {
        Ok(()) => {
            state.new_title.clear();
            state.is_submitting = true;
        }
        Err(e) => revert_unsent(&mut state.list, &mutation_id, "create_task", e, ctx),
    }
}

fn save_edit(state: &mut TasksState, ctx: &mut Ctx<'_>) {
    let Some(editing) = state.editing.as_ref() else {
        return;
    };
    let title = editing.title.trim().to_string();
    if title.is_empty() {
        ctx.fail(ValidationError::EmptyTitle);
        return;
    }
    let id = editing.id.clone();
    let Some(server_id) = persisted_id(&id, ctx) else {
        return;
    };

    let mutation_id = match state
        .list
        .apply_update(&id, MutationKind::Update, |t| t.title = title.clone())
    {
        Ok(mutation_id) => mutation_id,
        Err(e) => {
            debug!(%id, error = %e, "update rejected");
            ctx.fail(e);
            return;
        }
    };
    state.editing = None;

    if let Err(e) = ctx.api.update_task(
        server_id,
        &title,
        mutated(mutation_id.clone(), MutationKind::Update),
    ) {
        revert_unsent(&mut state.list, &mutation_id, "update_task", e, ctx);
    }
}
