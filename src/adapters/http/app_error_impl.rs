use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        if self.is_retryable() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = ?self, "Request rejected");
        }

        match self {
            AppError::StoreUnavailable => error_resp(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::StoreUnavailable,
                None,
            ),
            AppError::InvalidPlan(plan_type) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidPlan,
                Some(format!("Unknown plan type: {plan_type}")),
            ),
            AppError::BadToken(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::BadToken, Some(msg))
            }
            AppError::PromoInvalid(reason) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::PromoInvalid,
                Some(reason.as_str().to_string()),
            ),
            AppError::InvalidSignature => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidSignature, None)
            }
            AppError::Unauthorized => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
