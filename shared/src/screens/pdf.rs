use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Ctx, Followup};
use crate::capabilities::ApiResponse;
use crate::config::PDF_CONTENT_TYPE;
use crate::error::ValidationError;
use crate::event::Event;
use crate::model::{PdfSummaryResponse, SelectedFile};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum PdfEvent {
    FileSelected(SelectedFile),
    Upload,
    Reset,

    #[serde(skip)]
    Summarized {
        request_id: String,
        result: Box<ApiResponse<PdfSummaryResponse>>,
    },
}

impl PdfEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FileSelected(_) => "pdf_file_selected",
            Self::Upload => "pdf_upload",
            Self::Reset => "pdf_reset",
            Self::Summarized { .. } => "pdf_summarized",
        }
    }
}

#[derive(Debug, Default)]
pub struct PdfState {
    pub file: Option<SelectedFile>,
    pub summary: Option<String>,
    pub success: bool,
    in_flight: Option<String>,
}

impl PdfState {
    #[must_use]
    pub const fn is_uploading(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Local checks run before a file is accepted for upload.
pub fn validate_file(file: &SelectedFile, max_bytes: usize) -> Result<(), ValidationError> {
    let content_type = file.content_type.split(';').next().unwrap_or_default().trim();
    if !content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
        return Err(ValidationError::NotAPdf);
    }
    if file.size() > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.size(),
            max: max_bytes,
        });
    }
    Ok(())
}

pub fn update(event: PdfEvent, state: &mut PdfState, ctx: &mut Ctx<'_>) -> Followup {
    match event {
        PdfEvent::FileSelected(file) => {
            if let Err(e) = validate_file(&file, ctx.config.max_pdf_bytes) {
                debug!(size = file.size(), error = %e, "file rejected");
                state.file = None;
                ctx.fail(e);
                return Followup::None;
            }
            state.file = Some(file);
            state.summary = None;
            state.success = false;
            ctx.feedback.clear_error();
        }

        PdfEvent::Upload => upload(state, ctx),

        PdfEvent::Reset => {
            *state = PdfState::default();
            ctx.feedback.clear_error();
        }

        PdfEvent::Summarized { request_id, result } => {
            if state.in_flight.as_deref() != Some(request_id.as_str()) {
                debug!(%request_id, "summary for abandoned upload ignored");
                return Followup::None;
            }
            state.in_flight = None;

            match *result {
                Ok(mut response) => {
                    let summary = response.take_body().map(|r| r.summary).unwrap_or_default();
                    info!(chars = summary.len(), "pdf summarized");
                    state.summary = Some(summary);
                    state.success = true;
                    ctx.feedback.clear_error();
                }
                Err(e) => {
                    state.summary = None;
                    state.success = false;
                    return ctx.report("summarize_pdf", &e, "Failed to summarize PDF. Please try again.");
                }
            }
        }
    }

    Followup::None
}

fn upload(state: &mut PdfState, ctx: &mut Ctx<'_>) {
    if state.in_flight.is_some() {
        debug!("upload ignored while another is in flight");
        return;
    }
    let Some(file) = state.file.as_ref() else {
        ctx.fail(ValidationError::NoFileSelected);
        return;
    };

    let request_id = Uuid::new_v4().to_string();
    let reply_to = request_id.clone();
    match ctx.api.summarize_pdf(file, move |result| {
        Event::Pdf(PdfEvent::Summarized {
            request_id: reply_to,
            result: Box::new(result),
        })
    }) {
        Ok(()) => {
            state.in_flight = Some(request_id);
            state.summary = None;
            state.success = false;
        }
        Err(e) => ctx.unsent("summarize_pdf", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_PDF_BYTES;

    fn file(content_type: &str, size: usize) -> SelectedFile {
        SelectedFile {
            name: "notes.pdf".into(),
            content_type: content_type.into(),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn test_pdf_within_limit_is_accepted() {
        assert_eq!(validate_file(&file("application/pdf", 1024), MAX_PDF_BYTES), Ok(()));
        assert_eq!(validate_file(&file("application/pdf", MAX_PDF_BYTES), MAX_PDF_BYTES), Ok(()));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert_eq!(
            validate_file(&file("image/png", 10), MAX_PDF_BYTES),
            Err(ValidationError::NotAPdf)
        );
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let err = validate_file(&file("application/pdf", MAX_PDF_BYTES + 1), MAX_PDF_BYTES).unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 10MB");
    }
}
