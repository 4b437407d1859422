use crate::models::ErrorResponse;
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode, Json};
use services::UserId;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller, taken from the `x-user-id` header.
///
/// Session authentication happens at the gateway; by the time a request
/// reaches this service the user id header is trusted.
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub UserId);

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(|id| Requester(UserId(id)))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(
                        format!("Missing or invalid {USER_ID_HEADER} header"),
                        "unauthorized".to_string(),
                    )),
                )
            })
    }
}
