/// Domain errors surfaced by the guildmaster services.
///
/// The HTTP layer maps these onto status codes (404/403/400/409/500); the
/// services themselves never panic on a business-rule violation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Organisation not found")]
    OrganisationNotFound,

    #[error("Position not found")]
    PositionNotFound,

    #[error("Organisation member not found")]
    MemberNotFound,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Wrap a repository failure as an internal error with an operation label
    pub fn internal(operation: &str, err: impl std::fmt::Display) -> Self {
        ServiceError::Internal(format!("{operation}: {err}"))
    }
}
