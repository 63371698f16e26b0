use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::screens::{
    AssistantState, AuthFormState, DashboardState, LeaderboardState, PdfState, PlansState,
    StudyItemsState, TasksState,
};
use crate::session::{Route, Session};

/// Server ids are integers. Entities inserted optimistically before the server
/// has assigned one carry a local id that is never sent over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Server(i64),
    Local(String),
}

impl EntityId {
    #[must_use]
    pub fn local() -> Self {
        Self::Local(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub const fn server_id(&self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(id) => write!(f, "local-{id}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Server(id)
    }
}

/// Anything held in an optimistic list.
pub trait Entity: Clone + fmt::Debug + PartialEq {
    fn id(&self) -> &EntityId;
    fn set_id(&mut self, id: EntityId);
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<String>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl Entity for Task {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl Entity for Plan {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StudyItemType {
    #[default]
    Task,
    Plan,
}

impl StudyItemType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Plan => "plan",
        }
    }

    #[must_use]
    pub const fn supports_completion(self) -> bool {
        matches!(self, Self::Task)
    }
}

impl fmt::Display for StudyItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StudyItem {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: StudyItemType,
    #[serde(default)]
    pub completed: bool,
}

impl Entity for StudyItem {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

// Request and response bodies.

/// Body of a successful create. Tasks and plans answer with `task_id` or
/// `plan_id`; study items echo the whole row.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreatedResponse {
    #[serde(alias = "task_id", alias = "plan_id")]
    pub id: i64,
}

impl CreatedResponse {
    /// The server id in a create response body, if there is one.
    #[must_use]
    pub fn server_id(body: &[u8]) -> Option<i64> {
        serde_json::from_slice::<Self>(body).ok().map(|created| created.id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlanRequest {
    pub title: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateStudyItemRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: StudyItemType,
}

/// Credentials never appear in `Debug` output.
#[derive(Serialize, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Some deployments answer registration with a token, others only with a message.
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RegisterResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Debug for RegisterResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterResponse")
            .field("access_token_present", &self.access_token.is_some())
            .field("message", &self.message)
            .finish()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PdfSummaryResponse {
    pub summary: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ProgressSummary {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub pending_tasks: u32,
    pub completion_percentage: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct StreakSummary {
    pub current_streak: u32,
    #[serde(default)]
    pub last_completed_date: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct PlansSummary {
    pub total_plans: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DashboardSummary {
    pub progress: ProgressSummary,
    pub streak: StreakSummary,
    #[serde(default)]
    pub plans: PlansSummary,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user: String,
    pub streak: u32,
}

/// A PDF picked by the user, handed over by the shell.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

// Transient UI feedback.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBanner {
    pub error: AppError,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, created_at_ms: u64, duration_ms: u64) -> Self {
        Self {
            message: message.into(),
            created_at_ms,
            duration_ms,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) >= self.duration_ms
    }
}

/// Screen-level state owned by whichever route is active. Navigating away
/// drops it.
#[derive(Debug, Default)]
pub enum ScreenState {
    #[default]
    None,
    Login(AuthFormState),
    Register(AuthFormState),
    Dashboard(DashboardState),
    Tasks(TasksState),
    Plans(PlansState),
    StudyItems(StudyItemsState),
    Leaderboard(LeaderboardState),
    Assistant(AssistantState),
    Pdf(PdfState),
}

/// The error banner and toast currently on screen.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Feedback {
    pub error: Option<ErrorBanner>,
    pub toast: Option<ToastMessage>,
}

impl Feedback {
    pub fn set_error(&mut self, error: AppError, now_ms: u64) {
        self.error = Some(ErrorBanner {
            error,
            created_at_ms: now_ms,
        });
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, now_ms: u64, duration_ms: u64) {
        self.toast = Some(ToastMessage::new(message, now_ms, duration_ms));
    }

    pub fn clear_toast(&mut self) {
        self.toast = None;
    }

    /// Drops banners whose display time has run out. Returns whether anything changed.
    pub fn expire(&mut self, now_ms: u64, error_display_ms: u64) -> bool {
        let mut changed = false;

        if let Some(banner) = &self.error {
            if now_ms.saturating_sub(banner.created_at_ms) >= error_display_ms {
                self.error = None;
                changed = true;
            }
        }
        if let Some(toast) = &self.toast {
            if toast.is_expired(now_ms) {
                self.toast = None;
                changed = true;
            }
        }

        changed
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: ApiConfig,
    pub session: Session,
    pub route: Option<Route>,
    /// Route asked for before the session was resolved.
    pub requested_route: Option<Route>,
    pub screen: ScreenState,
    /// Logical clock, advanced by the shell's timer ticks.
    pub now_ms: u64,
    pub feedback: Feedback,
}

impl Model {
    pub fn advance_clock(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn set_error(&mut self, error: AppError) {
        self.feedback.set_error(error, self.now_ms);
    }

    pub fn expire_feedback(&mut self) -> bool {
        self.feedback.expire(self.now_ms, self.config.error_display_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_entity_id_deserializes_server_ids() {
        let task: Task =
            serde_json::from_str(r#"{"id":7,"title":"Read","completed":false,"completed_date":null,"owner_id":1}"#)
                .unwrap();
        assert_eq!(task.id, EntityId::Server(7));
        assert_eq!(task.id.server_id(), Some(7));
    }

    #[test]
    fn test_local_ids_are_unique() {
        let a = EntityId::local();
        let b = EntityId::local();
        assert_ne!(a, b);
        assert!(a.is_local());
        assert_eq!(a.server_id(), None);
    }

    #[test]
    fn test_created_response_id_field_variants() {
        assert_eq!(
            CreatedResponse::server_id(br#"{"message":"Task created","task_id":9}"#),
            Some(9)
        );
        assert_eq!(
            CreatedResponse::server_id(br#"{"message":"Study plan created","plan_id":3}"#),
            Some(3)
        );
        assert_eq!(
            CreatedResponse::server_id(br#"{"id":4,"title":"Ch. 1","type":"task"}"#),
            Some(4)
        );
        assert_eq!(CreatedResponse::server_id(b""), None);
        assert_eq!(CreatedResponse::server_id(br#"{"message":"ok"}"#), None);
    }

    #[test]
    fn test_study_item_type_field_name() {
        let item: StudyItem =
            serde_json::from_str(r#"{"id":1,"title":"Ch. 2","type":"plan","completed":false}"#)
                .unwrap();
        assert_eq!(item.item_type, StudyItemType::Plan);
        assert!(!item.item_type.supports_completion());

        let body = serde_json::to_value(CreateStudyItemRequest {
            title: "Ch. 3".into(),
            description: None,
            item_type: StudyItemType::Task,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"title": "Ch. 3", "type": "task"}));
    }

    #[test]
    fn test_dashboard_summary_parses() {
        let summary: DashboardSummary = serde_json::from_str(
            r#"{"progress":{"total_tasks":4,"completed_tasks":1,"pending_tasks":3,"completion_percentage":25.0},
                "streak":{"current_streak":2,"last_completed_date":"2024-05-01"},
                "plans":{"total_plans":3}}"#,
        )
        .unwrap();
        assert_eq!(summary.progress.pending_tasks, 3);
        assert_eq!(summary.streak.current_streak, 2);
        assert_eq!(summary.plans.total_plans, 3);
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let creds = Credentials {
            email: "a@b.c".into(),
            password: "hunter22".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter22"));

        let token = TokenResponse {
            access_token: "abc.def".into(),
            token_type: Some("bearer".into()),
        };
        assert!(!format!("{token:?}").contains("abc.def"));
    }

    #[test]
    fn test_feedback_expiry() {
        let mut model = Model::default();
        model.advance_clock(1_000);
        model.set_error(AppError::new(ErrorKind::Network, "Failed to load tasks"));
        model
            .feedback
            .show_toast("Task deleted!", model.now_ms, model.config.toast_display_ms);

        model.advance_clock(3_999);
        assert!(!model.expire_feedback());
        assert!(model.feedback.error.is_some());

        model.advance_clock(4_000);
        assert!(model.expire_feedback());
        assert_eq!(model.feedback, Feedback::default());
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let mut model = Model::default();
        model.advance_clock(5_000);
        model.advance_clock(4_000);
        assert_eq!(model.now_ms, 5_000);
    }
}
