use rand::Rng;

pub const INVITE_TOKEN_LENGTH: usize = 12;

/// Generate a random alphanumeric invitation token.
///
/// Tokens are not checked for uniqueness; the keyspace makes collisions
/// negligible for the volumes this service handles.
pub fn generate_invite_token() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..INVITE_TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Infrastructure failures surfaced by the repository ports, shared across
/// every domain. Business-rule violations live in `ServiceError`; this
/// taxonomy only carries what the storage layer can report.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("'{0}' does not exist")]
    NotFound(String),
    #[error("A row with this identity already exists")]
    AlreadyExists,
    #[error("Required column missing: {0}")]
    RequiredFieldMissing(String),
    #[error("Referenced row does not exist: {0}")]
    ForeignKeyViolation(String),
    #[error("Stored-data validation failed: {0}")]
    ValidationFailed(String),
    #[error("Dependent rows prevent deletion: {0}")]
    DependencyExists(String),
    #[error("Transaction conflict")]
    TransactionConflict,
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Database authentication failed")]
    AuthenticationFailed,
    #[error("Connection pool failure: {0}")]
    PoolError(#[source] anyhow::Error),
    #[error("Database operation failed: {0}")]
    DatabaseError(#[source] anyhow::Error),
    #[error("Row conversion failed: {0}")]
    DataConversionError(#[source] anyhow::Error),
}

/// True when the underlying repository failure was a uniqueness violation.
/// Used to translate storage-level conflicts (e.g. two concurrent invitation
/// creations racing past the pre-check) into the same domain outcome as the
/// pre-check itself.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RepositoryError>(),
        Some(RepositoryError::AlreadyExists)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_tokens_are_twelve_alphanumeric_chars() {
        let token = generate_invite_token();
        assert_eq!(token.len(), INVITE_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn unique_violations_are_detected_through_anyhow() {
        let err = anyhow::Error::from(RepositoryError::AlreadyExists);
        assert!(is_unique_violation(&err));

        let other = anyhow::anyhow!("some other failure");
        assert!(!is_unique_violation(&other));
    }
}
