use crate::models::ErrorResponse;
use axum::{http::StatusCode, Json};
use services::invitation::ports::InvitationStatus;
use services::ServiceError;
use tracing::error;

/// Map domain errors to HTTP status codes and the JSON error body
pub fn error_response(err: ServiceError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        ServiceError::OrganisationNotFound
        | ServiceError::PositionNotFound
        | ServiceError::MemberNotFound
        | ServiceError::InvitationNotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(err.to_string(), "not_found".to_string())),
        ),
        ServiceError::PermissionDenied(msg) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(msg, "forbidden".to_string())),
        ),
        ServiceError::InvalidArgument(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(msg, "bad_request".to_string())),
        ),
        ServiceError::Conflict(msg) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(msg, "conflict".to_string())),
        ),
        ServiceError::Internal(msg) => {
            error!("Internal service error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "Internal server error".to_string(),
                    "internal_server_error".to_string(),
                )),
            )
        }
    }
}

/// Parse an optional invitation status filter from query parameters
pub fn parse_status_filter(
    status: Option<&str>,
) -> Result<Option<InvitationStatus>, (StatusCode, Json<ErrorResponse>)> {
    match status {
        None => Ok(None),
        Some(value) => InvitationStatus::parse(value).map(Some).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    format!("Unknown invitation status '{value}'"),
                    "bad_request".to_string(),
                )),
            )
        }),
    }
}
