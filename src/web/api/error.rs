use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{predict::PredictError, web::auth::PermissionError};

pub enum ApiError {
    Permission(PermissionError),
    Validation(String),
    NotFound(&'static str),
    Predict(PredictError),
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        ApiError::Permission(e)
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::InvalidParameters(msg) => ApiError::Validation(msg),
            _ => ApiError::Predict(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Permission(e) => e.into_response(),
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message("validation_failed", &msg)),
            )
                .into_response(),
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(what))).into_response()
            }
            ApiError::Predict(e) => {
                let (status, error) = match &e {
                    PredictError::NoStationPosition => {
                        (StatusCode::CONFLICT, "no_station_position")
                    }
                    PredictError::EmptySelection => (StatusCode::CONFLICT, "empty_selection"),
                    PredictError::InvalidElements { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_elements")
                    }
                    PredictError::Propagation(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "propagation_failed")
                    }
                    PredictError::InvalidParameters(_) => {
                        (StatusCode::BAD_REQUEST, "validation_failed")
                    }
                    PredictError::DirectoryNotFound(_) | PredictError::FileRead(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "catalog_error")
                    }
                };
                (
                    status,
                    Json(ErrorResponse::with_message(error, &e.to_string())),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}
