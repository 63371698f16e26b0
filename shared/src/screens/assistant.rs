use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{Ctx, Followup};
use crate::capabilities::ApiResponse;
use crate::error::ValidationError;
use crate::event::Event;
use crate::model::AskResponse;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum AssistantEvent {
    QuestionChanged(String),
    Ask,
    Clear,

    #[serde(skip)]
    Answered {
        request_id: String,
        result: Box<ApiResponse<AskResponse>>,
    },
}

impl AssistantEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::QuestionChanged(_) => "assistant_question_changed",
            Self::Ask => "assistant_ask",
            Self::Clear => "assistant_clear",
            Self::Answered { .. } => "assistant_answered",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
        }
    }
}

#[derive(Debug, Clone)]
struct InFlightQuestion {
    request_id: String,
    message_id: String,
    question: String,
}

#[derive(Debug, Default)]
pub struct AssistantState {
    pub messages: Vec<ChatMessage>,
    pub question: String,
    in_flight: Option<InFlightQuestion>,
}

impl AssistantState {
    #[must_use]
    pub const fn is_asking(&self) -> bool {
        self.in_flight.is_some()
    }
}

pub fn update(event: AssistantEvent, state: &mut AssistantState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        AssistantEvent::QuestionChanged(question) => state.question = question,

        AssistantEvent::Ask => ask(state, ctx),

        AssistantEvent::Clear => {
            state.messages.clear();
            state.in_flight = None;
        }

        AssistantEvent::Answered { request_id, result } => {
            let in_flight = match state.in_flight.take() {
                Some(q) if q.request_id == request_id => q,
                other => {
                    state.in_flight = other;
                    debug!(%request_id, "answer for abandoned question ignored");
                    return Followup::None;
                }
            };

            match *result {
                Ok(mut response) => {
                    let answer = response.take_body().map(|r| r.answer).unwrap_or_default();
                    state
                        .messages
                        .push(ChatMessage::new(ChatRole::Assistant, answer));
                    ctx.feedback.clear_error();
                }
                Err(e) => {
                    state.messages.retain(|m| m.id != in_flight.message_id);
                    if state.question.trim().is_empty() {
                        state.question = in_flight.question;
                    }
                    return ctx.report("ask", &e, "Failed to get answer from AI");
                }
            }
        }
    }

    Followup::None
}

fn ask(state: &mut AssistantState, ctx: &mut Ctx<'_>) {
    if state.in_flight.is_some() {
        debug!("question ignored while another is in flight");
        return;
    }
    let question = state.question.trim().to_string();
    if question.is_empty() {
        ctx.fail(ValidationError::EmptyQuestion);
        return;
    }

    let request_id = Uuid::new_v4().to_string();
    let reply_to = request_id.clone();
    if let Err(e) = ctx.api.ask(&question, move |result| {
        Event::Assistant(AssistantEvent::Answered {
            request_id: reply_to,
            result: Box::new(result),
        })
    }) {
        ctx.unsent("ask", e);
        return;
    }

    let message = ChatMessage::new(ChatRole::User, question.clone());
    state.in_flight = Some(InFlightQuestion {
        request_id,
        message_id: message.id.clone(),
        question,
    });
    state.messages.push(message);
    state.question.clear();
}
