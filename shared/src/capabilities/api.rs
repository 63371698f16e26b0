//! Typed calls against the study-tracking API.
//!
//! Every request goes out through the `Http` capability with an absolute URL
//! built from `ApiConfig`, and carries the bearer token whenever the session
//! holds one. Callers supply the event the response is wrapped in.

use crux_http::http::headers::{AUTHORIZATION, CONTENT_TYPE};
use crux_http::http::mime;
use crux_http::{Http, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ApiConfig, ConfigError, PDF_CONTENT_TYPE};
use crate::error::{AppError, ErrorKind};
use crate::event::Event;
use crate::model::{
    AskRequest, AskResponse, CreateStudyItemRequest, Credentials, DashboardSummary,
    LeaderboardEntry, Plan, PlanRequest, PdfSummaryResponse, RegisterResponse, SelectedFile,
    StudyItem, StudyItemType, Task, TitleRequest, TokenResponse,
};
use crate::session::Session;

pub type ApiResponse<T> = crux_http::Result<crux_http::Response<T>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not encode request body: {0}")]
    Encode(String),
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Config(e) => e.into(),
            ApiError::Encode(reason) => AppError::new(ErrorKind::Internal, "Could not send request")
                .with_context("reason", reason),
        }
    }
}

pub struct Api<'a> {
    http: &'a Http<Event>,
    config: &'a ApiConfig,
    session: &'a Session,
}

impl<'a> Api<'a> {
    #[must_use]
    pub const fn new(http: &'a Http<Event>, config: &'a ApiConfig, session: &'a Session) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    fn authorized<T>(&self, builder: RequestBuilder<Event, T>) -> RequestBuilder<Event, T>
    where
        T: 'static,
    {
        match self.session.bearer_header() {
            Some(bearer) => builder.header(AUTHORIZATION, bearer),
            None => builder,
        }
    }

    fn get_json<T, F>(&self, url: String, make_event: F)
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(ApiResponse<T>) -> Event + Send + 'static,
    {
        self.authorized(self.http.get(url))
            .expect_json::<T>()
            .send(make_event);
    }

    // --- Auth ---

    /// `POST /auth/login` as an OAuth2 password form.
    pub fn login<F>(&self, credentials: &Credentials, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<TokenResponse>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint("/auth/login")?;
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &credentials.email)
            .append_pair("password", &credentials.password)
            .finish();

        self.http
            .post(url)
            .body_string(form)
            .content_type(mime::FORM)
            .expect_json::<TokenResponse>()
            .send(make_event);
        Ok(())
    }

    pub fn register<F>(&self, credentials: &Credentials, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<RegisterResponse>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint("/auth/register")?;
        self.http
            .post(url)
            .body_json(credentials)
            .map_err(|e| ApiError::Encode(e.to_string()))?
            .expect_json::<RegisterResponse>()
            .send(make_event);
        Ok(())
    }

    // --- Tasks ---

    pub fn list_tasks<F>(&self, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<Task>>) -> Event + Send + 'static,
    {
        self.get_json(self.config.endpoint("/tasks")?, make_event);
        Ok(())
    }

    pub fn create_task<F>(&self, title: &str, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let body = TitleRequest {
            title: title.to_string(),
        };
        self.send_json(self.http.post(self.config.endpoint("/tasks")?), &body, make_event)
    }

    pub fn update_task<F>(&self, id: i64, title: &str, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/tasks/{id}"))?;
        let body = TitleRequest {
            title: title.to_string(),
        };
        self.send_json(self.http.put(url), &body, make_event)
    }

    pub fn complete_task<F>(&self, id: i64, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/tasks/{id}/complete"))?;
        self.authorized(self.http.patch(url)).send(make_event);
        Ok(())
    }

    pub fn delete_task<F>(&self, id: i64, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/tasks/{id}"))?;
        self.authorized(self.http.delete(url)).send(make_event);
        Ok(())
    }

    // --- Plans ---

    pub fn list_plans<F>(&self, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<Plan>>) -> Event + Send + 'static,
    {
        self.get_json(self.config.endpoint("/plans")?, make_event);
        Ok(())
    }

    pub fn create_plan<F>(&self, body: &PlanRequest, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        self.send_json(self.http.post(self.config.endpoint("/plans")?), body, make_event)
    }

    pub fn update_plan<F>(&self, id: i64, body: &PlanRequest, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/plans/{id}"))?;
        self.send_json(self.http.put(url), body, make_event)
    }

    pub fn delete_plan<F>(&self, id: i64, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/plans/{id}"))?;
        self.authorized(self.http.delete(url)).send(make_event);
        Ok(())
    }

    // --- Study items ---

    pub fn list_study_items<F>(&self, item_type: StudyItemType, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<StudyItem>>) -> Event + Send + 'static,
    {
        let url = self
            .config
            .endpoint_with_query("/study-items", &[("type", item_type.as_str())])?;
        self.get_json(url, make_event);
        Ok(())
    }

    pub fn create_study_item<F>(
        &self,
        body: &CreateStudyItemRequest,
        make_event: F,
    ) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        self.send_json(self.http.post(self.config.endpoint("/study-items")?), body, make_event)
    }

    pub fn complete_study_item<F>(&self, id: i64, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/study-items/{id}/complete"))?;
        self.authorized(self.http.patch(url)).send(make_event);
        Ok(())
    }

    pub fn delete_study_item<F>(&self, id: i64, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint(&format!("/study-items/{id}"))?;
        self.authorized(self.http.delete(url)).send(make_event);
        Ok(())
    }

    // --- Read-only summaries ---

    pub fn dashboard<F>(&self, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<DashboardSummary>) -> Event + Send + 'static,
    {
        self.get_json(self.config.endpoint("/dashboard")?, make_event);
        Ok(())
    }

    pub fn leaderboard<F>(&self, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<Vec<LeaderboardEntry>>) -> Event + Send + 'static,
    {
        self.get_json(self.config.endpoint("/leaderboard")?, make_event);
        Ok(())
    }

    // --- AI ---

    pub fn ask<F>(&self, question: &str, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<AskResponse>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint("/ai/ask")?;
        let body = AskRequest {
            question: question.to_string(),
        };
        self.authorized(self.http.post(url))
            .body_json(&body)
            .map_err(|e| ApiError::Encode(e.to_string()))?
            .expect_json::<AskResponse>()
            .send(make_event);
        Ok(())
    }

    /// `POST /pdf/summarize` as `multipart/form-data` with a single `file` part.
    pub fn summarize_pdf<F>(&self, file: &SelectedFile, make_event: F) -> Result<(), ApiError>
    where
        F: FnOnce(ApiResponse<PdfSummaryResponse>) -> Event + Send + 'static,
    {
        let url = self.config.endpoint("/pdf/summarize")?;
        let boundary = format!("studytrack-{}", Uuid::new_v4().simple());
        let body = multipart_file_body(&boundary, "file", file);

        self.authorized(self.http.post(url))
            .body_bytes(body)
            .header(
                CONTENT_TYPE,
                format!("{}; boundary={boundary}", mime::MULTIPART_FORM),
            )
            .expect_json::<PdfSummaryResponse>()
            .send(make_event);
        Ok(())
    }

    fn send_json<B, F>(
        &self,
        builder: RequestBuilder<Event>,
        body: &B,
        make_event: F,
    ) -> Result<(), ApiError>
    where
        B: serde::Serialize,
        F: FnOnce(ApiResponse<Vec<u8>>) -> Event + Send + 'static,
    {
        self.authorized(builder)
            .body_json(body)
            .map_err(|e| ApiError::Encode(e.to_string()))?
            .send(make_event);
        Ok(())
    }
}

fn multipart_file_body(boundary: &str, field: &str, file: &SelectedFile) -> Vec<u8> {
    let filename = file.name.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(file.bytes.len() + 256);

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {PDF_CONTENT_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(&file.bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
