//! HTTP-facing error type. Every handler returns `Result<_, ApiError>`, so a
//! failure always reaches the browser as `{ success: false, error, ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::evaluator::EvaluationError;
use crate::extract::ResponseParseError;
use crate::prompts::PromptError;
use crate::providers::ProviderError;
use crate::util::trunc_for_log;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request field(s).
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    /// The LLM provider answered non-2xx; its status and body are passed through.
    #[error("Anfrage an den KI-Anbieter fehlgeschlagen (HTTP {status})")]
    Upstream { status: u16, details: Value },

    /// The provider could not be reached or did not answer in time.
    #[error("KI-Anbieter nicht erreichbar: {reason}")]
    Unreachable { status: u16, reason: String },

    #[error("Die Antwort der KI konnte nicht verstanden werden")]
    ResponseParse(#[from] ResponseParseError),

    /// Detail is logged server-side only.
    #[error("Interner Serverfehler")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { status, .. } | ApiError::Unreachable { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::ResponseParse(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        let (details, raw_response) = match self {
            ApiError::Upstream { status, details } => {
                warn!(target: "provider", status, "Upstream provider error forwarded");
                (Some(details), None)
            }
            ApiError::ResponseParse(e) => {
                warn!(target: "provider", reason = %e.reason, "Model response could not be parsed");
                (None, Some(e.raw_prefix))
            }
            ApiError::Internal(detail) => {
                error!(target: "mathe_tutor", detail = %trunc_for_log(&detail, 2000), "Internal error while handling request");
                (None, None)
            }
            _ => (None, None),
        };

        let body = ErrorBody { success: false, error: message, details, raw_response };
        (status, Json(body)).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream { status, details } => ApiError::Upstream { status, details },
            ProviderError::Timeout(_) => {
                ApiError::Unreachable { status: StatusCode::GATEWAY_TIMEOUT.as_u16(), reason: err.to_string() }
            }
            ProviderError::Network(_) => {
                ApiError::Unreachable { status: StatusCode::BAD_GATEWAY.as_u16(), reason: err.to_string() }
            }
            ProviderError::InvalidResponse(_) => ApiError::Internal(err.to_string()),
            ProviderError::NoContent { reason, raw } => ApiError::ResponseParse(ResponseParseError::new(reason, &raw)),
        }
    }
}

impl From<PromptError> for ApiError {
    fn from(err: PromptError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err.field_errors().keys().map(|k| camel_case(k)).collect();
        fields.sort();
        ApiError::Validation(format!("Ungültige oder fehlende Felder: {}", fields.join(", ")))
    }
}

/// Wire name of a struct field (`api_key` → `apiKey`).
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
