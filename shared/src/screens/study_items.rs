//! Study items screen: a type-filtered list plus a time-boxed draft that has to
//! be confirmed before anything is created.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    persisted_id, revert_unsent, settle, Ctx, Followup, LoadSequence, MutationCopy, Settlement,
};
use crate::capabilities::ApiResponse;
use crate::draft::DraftController;
use crate::event::Event;
use crate::model::{CreateStudyItemRequest, EntityId, StudyItem, StudyItemType};
use crate::optimistic::{InsertAt, MutationId, MutationKind, OptimisticList, ReconcilePolicy};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum StudyItemsEvent {
    Load,
    SelectTab(StudyItemType),
    TitleChanged(String),
    DescriptionChanged(String),
    TypeChanged(StudyItemType),
    /// `now_ms` is the shell's clock when the user acted; the draft deadline
    /// counts from it.
    AddDraft { now_ms: u64 },
    ConfirmDraft { now_ms: u64 },
    CancelDraft,
    /// The shell's one-shot timer for the pending draft went off.
    DraftTimerFired { generation: u64, now_ms: u64 },
    Complete { id: EntityId },
    Delete { id: EntityId },

    #[serde(skip)]
    Loaded {
        seq: u64,
        item_type: StudyItemType,
        result: Box<ApiResponse<Vec<StudyItem>>>,
    },
    #[serde(skip)]
    Mutated {
        mutation_id: MutationId,
        kind: MutationKind,
        result: Box<ApiResponse<Vec<u8>>>,
    },
}

impl StudyItemsEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "study_items_load",
            Self::SelectTab(_) => "study_items_select_tab",
            Self::TitleChanged(_) => "study_items_title_changed",
            Self::DescriptionChanged(_) => "study_items_description_changed",
            Self::TypeChanged(_) => "study_items_type_changed",
            Self::AddDraft { .. } => "study_items_add_draft",
            Self::ConfirmDraft { .. } => "study_items_confirm_draft",
            Self::CancelDraft => "study_items_cancel_draft",
            Self::DraftTimerFired { .. } => "study_items_draft_timer_fired",
            Self::Complete { .. } => "study_items_complete",
            Self::Delete { .. } => "study_items_delete",
            Self::Loaded { .. } => "study_items_loaded",
            Self::Mutated { .. } => "study_items_mutated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyItemForm {
    pub title: String,
    pub description: String,
    pub item_type: StudyItemType,
}

#[derive(Debug)]
pub struct StudyItemsState {
    pub tab: StudyItemType,
    /// Server copy of the active tab's items, as the API filters by type. A
    /// create of the other type can sit here until its refetch lands, so the
    /// view filters by `tab`.
    pub list: OptimisticList<StudyItem>,
    pub form: StudyItemForm,
    pub drafts: DraftController,
    pub loads: LoadSequence,
    pub is_loading: bool,
}

impl StudyItemsState {
    #[must_use]
    pub fn new(draft_ttl_ms: u64) -> Self {
        Self {
            tab: StudyItemType::Task,
            list: OptimisticList::new(),
            form: StudyItemForm::default(),
            drafts: DraftController::new(draft_ttl_ms),
            loads: LoadSequence::default(),
            is_loading: false,
        }
    }

    /// Items of the active tab, in display order.
    pub fn visible(&self) -> impl Iterator<Item = &StudyItem> {
        self.list.items().iter().filter(|i| i.item_type == self.tab)
    }
}

const fn copy_for(kind: MutationKind) -> MutationCopy {
    match kind {
        MutationKind::Create | MutationKind::Update => MutationCopy {
            op: "create_study_item",
            success: "Item saved!",
            failure: "Failed to save item",
        },
        MutationKind::Complete => MutationCopy {
            op: "complete_study_item",
            success: "Item completed!",
            failure: "Failed to complete task",
        },
        MutationKind::Delete => MutationCopy {
            op: "delete_study_item",
            success: "Item deleted!",
            failure: "Failed to delete item",
        },
    }
}

fn mutated(
    mutation_id: MutationId,
    kind: MutationKind,
) -> impl FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static {
    move |result| {
        Event::StudyItems(StudyItemsEvent::Mutated {
            mutation_id,
            kind,
            result: Box::new(result),
        })
    }
}

pub fn mount(state: &mut StudyItemsState, ctx: &mut Ctx<'_>) {
    load(state, ctx);
}

fn load(state: &mut StudyItemsState, ctx: &mut Ctx<'_>) {
    let item_type = state.tab;
    let seq = state.loads.upcoming();
    match ctx.api.list_study_items(item_type, move |result| {
        Event::StudyItems(StudyItemsEvent::Loaded {
            seq,
            item_type,
            result: Box::new(result),
        })
    }) {
        Ok(()) => {
            state.loads.issued(seq);
            state.is_loading = true;
        }
        Err(e) => ctx.unsent("list_study_items", e),
    }
}

/// Clock advanced without a timer callback; the deadline still holds.
pub fn tick(state: &mut StudyItemsState, now_ms: u64) -> bool {
    let expired = state.drafts.expire(now_ms);
    if expired {
        debug!("draft expired");
    }
    expired || state.drafts.current(now_ms).is_some()
}

pub fn update(event: StudyItemsEvent, state: &mut StudyItemsState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        StudyItemsEvent::Load => load(state, ctx),

        StudyItemsEvent::SelectTab(tab) => {
            if state.tab != tab {
                state.tab = tab;
                load(state, ctx);
            }
        }

        StudyItemsEvent::TitleChanged(title) => state.form.title = title,
        StudyItemsEvent::DescriptionChanged(description) => state.form.description = description,
        StudyItemsEvent::TypeChanged(item_type) => state.form.item_type = item_type,

        StudyItemsEvent::AddDraft { .. } => {
            let form = &state.form;
            match state.drafts.add(
                &form.title,
                Some(form.description.as_str()),
                form.item_type,
                ctx.now_ms,
            ) {
                Ok(draft) => {
                    debug!(expires_at_ms = draft.expires_at_ms, "draft pending");
                    state.form = StudyItemForm {
                        item_type: state.form.item_type,
                        ..StudyItemForm::default()
                    };
                    ctx.feedback.clear_error();
                }
                Err(e) => {
                    debug!(error = %e, "draft rejected");
                    ctx.fail(e);
                }
            }
        }

        StudyItemsEvent::ConfirmDraft { .. } => confirm_draft(state, ctx),

        StudyItemsEvent::CancelDraft => {
            if state.drafts.cancel() {
                debug!("draft cancelled");
            }
        }

        StudyItemsEvent::DraftTimerFired { generation, .. } => {
            if state.drafts.on_timer_fired(generation, ctx.now_ms) {
                debug!(generation, "draft expired");
            }
        }

        StudyItemsEvent::Complete { id } => {
            let Some(item) = state.list.get(&id) else {
                debug!(%id, "complete of unknown item ignored");
                return Followup::None;
            };
            if !item.item_type.supports_completion() || item.completed {
                debug!(%id, "item cannot be completed");
                return Followup::None;
            }
            let Some(server_id) = persisted_id(&id, ctx) else {
                return Followup::None;
            };
            let mutation_id = match state
                .list
                .apply_update(&id, MutationKind::Complete, |i| i.completed = true)
            {
                Ok(mutation_id) => mutation_id,
                Err(e) => {
                    debug!(%id, error = %e, "complete rejected");
                    ctx.fail(e);
                    return Followup::None;
                }
            };
            if let Err(e) = ctx.api.complete_study_item(
                server_id,
                mutated(mutation_id.clone(), MutationKind::Complete),
            ) {
                revert_unsent(&mut state.list, &mutation_id, "complete_study_item", e, ctx);
            }
        }

        StudyItemsEvent::Delete { id } => {
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
            if let Err(e) = ctx.api.delete_study_item(
                server_id,
                mutated(mutation_id.clone(), MutationKind::Delete),
            ) {
                revert_unsent(&mut state.list, &mutation_id, "delete_study_item", e, ctx);
            }
        }

        StudyItemsEvent::Loaded {
            seq,
            item_type,
            result,
        } => {
            // A tab switch issues a new load, so lists for the previous tab
            // are superseded too.
            if !state.loads.is_latest(seq) {
                debug!(seq, %item_type, "superseded item list ignored");
                return Followup::None;
            }
            state.is_loading = false;
            match *result {
                Ok(mut response) => {
                    let items = response.take_body().unwrap_or_default();
                    info!(count = items.len(), %item_type, "study items loaded");
                    state.list.replace_all(items);
                }
                Err(e) => return ctx.report("list_study_items", &e, "Failed to load items"),
            }
        }

        StudyItemsEvent::Mutated {
            mutation_id,
            kind,
            result,
        } => {
            let (settlement, followup) = settle(
                &mut state.list,
                &ReconcilePolicy::STUDY_ITEMS,
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

/// Promotes the pending draft: shown at once under a local id, then created
/// remotely and reconciled like any other create.
fn confirm_draft(state: &mut StudyItemsState, ctx: &mut Ctx<'_>) {
    let draft = match state.drafts.confirm(ctx.now_ms) {
        Ok(draft) => draft,
        Err(e) => {
            debug!(error = %e, "confirm rejected");
            ctx.fail(e);
            return;
        }
    };

    let temp = StudyItem {
        id: EntityId::local(),
        title: draft.title.clone(),
        description: draft.description.clone(),
        item_type: draft.item_type,
        completed: false,
    };
    let mutation_id = match state.list.apply_create(temp, InsertAt::Front) {
        Ok(mutation_id) => mutation_id,
        Err(e) => {
            ctx.fail(e);
            return;
        }
    };

    if state.tab != draft.item_type {
        state.tab = draft.item_type;
        load(state, ctx);
    }

    let request = CreateStudyItemRequest {
        title: draft.title,
        description: draft.description,
        item_type: draft.item_type,
    };
    if let Err(e) = ctx
        .api
        .create_study_item(&request, mutated(mutation_id.clone(), MutationKind::Create))
    {
        revert_unsent(&mut state.list, &mutation_id, "create_study_item", e, ctx);
    }
}
