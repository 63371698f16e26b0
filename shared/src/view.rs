//! Render-ready projection of the model. Nothing here holds secrets: the
//! token and form passwords never leave the core.

use serde::{Deserialize, Serialize};

use crate::model::{
    DashboardSummary, EntityId, LeaderboardEntry, Model, ScreenState, StudyItemType,
};
use crate::screens::{
    AssistantState, AuthFormState, ChatMessage, DashboardState, LeaderboardState, PdfState,
    PlansState, StudyItemsState, TasksState,
};
use crate::session::Route;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub route: Option<Route>,
    pub path: Option<String>,
    pub session: SessionView,
    pub screen: ScreenView,
    pub error: Option<ErrorView>,
    pub toast: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionView {
    pub is_authenticated: bool,
    pub is_loading: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorView {
    pub message: String,
    pub code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ScreenView {
    /// Bootstrap is still resolving; show a loading indicator and nothing else.
    Blank,
    Login(AuthFormView),
    Register(AuthFormView),
    Dashboard(DashboardView),
    Tasks(TasksView),
    Plans(PlansView),
    StudyItems(StudyItemsView),
    Leaderboard(LeaderboardView),
    Assistant(AssistantView),
    Pdf(PdfView),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthFormView {
    pub email: String,
    pub is_submitting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardView {
    pub summary: Option<DashboardSummary>,
    pub top_users: Vec<LeaderboardEntry>,
    pub is_loading: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRow {
    pub id: EntityId,
    pub title: String,
    pub completed: bool,
    pub completed_date: Option<String>,
    /// A mutation for this row is in flight; its controls are disabled.
    pub is_pending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TasksView {
    pub tasks: Vec<TaskRow>,
    pub new_title: String,
    pub editing: Option<EditingView>,
    pub is_loading: bool,
    pub is_submitting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditingView {
    pub id: EntityId,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanRow {
    pub id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub is_pending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlansView {
    pub plans: Vec<PlanRow>,
    pub title: String,
    pub description: String,
    pub editing: Option<EditingView>,
    pub is_loading: bool,
    pub is_submitting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyItemRow {
    pub id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub item_type: StudyItemType,
    pub completed: bool,
    pub can_complete: bool,
    pub is_pending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftView {
    pub title: String,
    pub description: Option<String>,
    pub item_type: StudyItemType,
    pub expires_at_ms: u64,
    pub remaining_secs: u64,
    /// Echo this back in `DraftTimerFired` when the one-shot timer goes off.
    pub timer_generation: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyItemsView {
    pub tab: StudyItemType,
    pub items: Vec<StudyItemRow>,
    pub title: String,
    pub description: String,
    pub item_type: StudyItemType,
    pub draft: Option<DraftView>,
    pub is_loading: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardView {
    pub podium: Vec<LeaderboardEntry>,
    pub rest: Vec<LeaderboardEntry>,
    pub is_loading: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantView {
    pub messages: Vec<ChatMessage>,
    pub question: String,
    pub is_asking: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PdfView {
    pub file_name: Option<String>,
    pub file_size: Option<usize>,
    pub summary: Option<String>,
    pub is_uploading: bool,
    pub success: bool,
}

impl ViewModel {
    #[must_use]
    pub fn from_model(model: &Model) -> Self {
        let session = SessionView {
            is_authenticated: model.session.is_authenticated(),
            is_loading: model.session.is_loading(),
        };

        let screen = if session.is_loading {
            ScreenView::Blank
        } else {
            screen_view(model)
        };

        Self {
            route: model.route,
            path: model.route.map(|r| r.path().to_string()),
            session,
            screen,
            error: model.feedback.error.as_ref().map(|banner| ErrorView {
                message: banner.error.message.clone(),
                code: banner.error.code().to_string(),
            }),
            toast: model.feedback.toast.as_ref().map(|t| t.message.clone()),
        }
    }
}

fn screen_view(model: &Model) -> ScreenView {
    match &model.screen {
        ScreenState::None => ScreenView::Blank,
        ScreenState::Login(form) => ScreenView::Login(auth_view(form)),
        ScreenState::Register(form) => ScreenView::Register(auth_view(form)),
        ScreenState::Dashboard(state) => ScreenView::Dashboard(dashboard_view(state)),
        ScreenState::Tasks(state) => ScreenView::Tasks(tasks_view(state)),
        ScreenState::Plans(state) => ScreenView::Plans(plans_view(state)),
        ScreenState::StudyItems(state) => {
            ScreenView::StudyItems(study_items_view(state, model.now_ms))
        }
        ScreenState::Leaderboard(state) => ScreenView::Leaderboard(leaderboard_view(state)),
        ScreenState::Assistant(state) => ScreenView::Assistant(assistant_view(state)),
        ScreenState::Pdf(state) => ScreenView::Pdf(pdf_view(state)),
    }
}

fn auth_view(form: &AuthFormState) -> AuthFormView {
    AuthFormView {
        email: form.email.clone(),
        is_submitting: form.is_submitting,
    }
}

fn dashboard_view(state: &DashboardState) -> DashboardView {
    DashboardView {
        summary: state.summary.clone(),
        top_users: state.top_users.clone(),
        is_loading: state.is_loading(),
    }
}

fn tasks_view(state: &TasksState) -> TasksView {
    TasksView {
        tasks: state
            .list
            .items()
            .iter()
            .map(|t| TaskRow {
                id: t.id.clone(),
                title: t.title.clone(),
                completed: t.completed,
                completed_date: t.completed_date.clone(),
                is_pending: state.list.is_busy(&t.id),
            })
            .collect(),
        new_title: state.new_title.clone(),
        editing: state.editing.as_ref().map(|e| EditingView {
            id: e.id.clone(),
            title: e.title.clone(),
            description: None,
        }),
        is_loading: state.is_loading,
        is_submitting: state.is_submitting,
    }
}

fn plans_view(state: &PlansState) -> PlansView {
    PlansView {
        plans: state
            .list
            .items()
            .iter()
            .map(|p| PlanRow {
                id: p.id.clone(),
                title: p.title.clone(),
                description: p.description.clone(),
                is_pending: state.list.is_busy(&p.id),
            })
            .collect(),
        title: state.form.title.clone(),
        description: state.form.description.clone(),
        editing: state.editing.as_ref().map(|e| EditingView {
            id: e.id.clone(),
            title: e.form.title.clone(),
            description: Some(e.form.description.clone()),
        }),
        is_loading: state.is_loading,
        is_submitting: state.is_submitting,
    }
}

fn study_items_view(state: &StudyItemsState, now_ms: u64) -> StudyItemsView {
    let timer_generation = state.drafts.generation();
    let draft = state.drafts.current(now_ms).map(|d| DraftView {
        title: d.title.clone(),
        description: d.description.clone(),
        item_type: d.item_type,
        expires_at_ms: d.expires_at_ms,
        remaining_secs: d.remaining_ms(now_ms).div_ceil(1_000),
        timer_generation,
    });

    StudyItemsView {
        tab: state.tab,
        items: state
            .visible()
            .map(|i| {
                let is_pending = state.list.is_busy(&i.id);
                StudyItemRow {
                    id: i.id.clone(),
                    title: i.title.clone(),
                    description: i.description.clone(),
                    item_type: i.item_type,
                    completed: i.completed,
                    can_complete: i.item_type.supports_completion()
                        && !i.completed
                        && !is_pending,
                    is_pending,
                }
            })
            .collect(),
        title: state.form.title.clone(),
        description: state.form.description.clone(),
        item_type: state.form.item_type,
        draft,
        is_loading: state.is_loading,
    }
}

fn leaderboard_view(state: &LeaderboardState) -> LeaderboardView {
    let (podium, rest) = state.split_podium();
    LeaderboardView {
        podium: podium.to_vec(),
        rest: rest.to_vec(),
        is_loading: state.is_loading,
    }
}

fn assistant_view(state: &AssistantState) -> AssistantView {
    AssistantView {
        messages: state.messages.clone(),
        question: state.question.clone(),
        is_asking: state.is_asking(),
    }
}

fn pdf_view(state: &PdfState) -> PdfView {
    PdfView {
        file_name: state.file.as_ref().map(|f| f.name.clone()),
        file_size: state.file.as_ref().map(crate::model::SelectedFile::size),
        summary: state.summary.clone(),
        is_uploading: state.is_uploading(),
        success: state.success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StudyItem, Task};
    use crate::optimistic::{InsertAt, OptimisticList};

    #[test]
    fn test_blank_while_bootstrapping() {
        let model = Model::default();
        let view = ViewModel::from_model(&model);
        assert!(view.session.is_loading);
        assert_eq!(view.screen, ScreenView::Blank);
        assert!(view.error.is_none());
    }

    #[test]
    fn test_pending_rows_are_flagged() {
        let mut state = TasksState {
            list: OptimisticList::from_items(vec![Task {
                id: EntityId::Server(1),
                title: "Read".into(),
                completed: false,
                completed_date: None,
                owner_id: None,
            }]),
            ..TasksState::default()
        };
        state
            .list
            .apply_create(
                Task {
                    id: EntityId::Local("tmp".into()),
                    title: "Write".into(),
                    completed: false,
                    completed_date: None,
                    owner_id: None,
                },
                InsertAt::Back,
            )
            .unwrap();

        let view = tasks_view(&state);
        assert_eq!(view.tasks.len(), 2);
        assert!(!view.tasks[0].is_pending);
        assert!(view.tasks[1].is_pending);
    }

    #[test]
    fn test_study_items_filtered_by_tab() {
        let mut state = StudyItemsState::new(60_000);
        state.list.replace_all(vec![
            StudyItem {
                id: EntityId::Server(1),
                title: "Chapter 1".into(),
                description: None,
                item_type: StudyItemType::Task,
                completed: false,
            },
            StudyItem {
                id: EntityId::Server(2),
                title: "Week plan".into(),
                description: None,
                item_type: StudyItemType::Plan,
                completed: false,
            },
        ]);
        state
            .drafts
            .add("Chapter 2", None, StudyItemType::Task, 1_000)
            .unwrap();

        let view = study_items_view(&state, 1_500);
        assert_eq!(view.items.len(), 1);
        assert!(view.items[0].can_complete);
        let draft = view.draft.unwrap();
        assert_eq!(draft.remaining_secs, 60);
        assert_eq!(draft.expires_at_ms, 61_000);

        assert!(study_items_view(&state, 61_000).draft.is_none());
    }
}
