use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fieldsift_core::FieldsiftError;
use serde_json::json;

/// Handler error, rendered as `{"error": ...}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    MissingParam(&'static str),
    Extraction(FieldsiftError),
}

impl ApiError {
    pub fn message(&self) -> String {
        match self {
            ApiError::MissingParam(name) => format!("missing required query parameter: {}", name),
            ApiError::Extraction(err) => err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParam(_) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(err) => match err {
                FieldsiftError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                FieldsiftError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                FieldsiftError::UpstreamError { .. } | FieldsiftError::Http(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<FieldsiftError> for ApiError {
    fn from(err: FieldsiftError) -> Self {
        ApiError::Extraction(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = match &self {
            ApiError::Extraction(FieldsiftError::UpstreamError { status: upstream }) => {
                json!({ "error": message, "upstream_status": upstream })
            }
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
