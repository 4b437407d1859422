use services::common::RepositoryError;
use services::directory::ports::UserId;
use services::member::ports::Member;
use services::organisation::ports::OrganisationId;
use services::permission::Permission;
use tokio_postgres::error::SqlState;

/// Convert an org_member row to the domain snapshot
pub fn row_to_member(row: &tokio_postgres::Row) -> Member {
    Member {
        organisation_id: OrganisationId(row.get("organisation_id")),
        user_id: UserId(row.get("user_id")),
        position_id: row.get("position_id"),
        member_since: row.get("member_since"),
    }
}

/// Decode the aggregated permission_ids column into the permission catalogue
pub fn decode_permissions(codes: Vec<i32>) -> Result<Vec<Permission>, RepositoryError> {
    codes
        .into_iter()
        .map(|code| {
            Permission::from_code(code).ok_or_else(|| {
                RepositoryError::DataConversionError(anyhow::anyhow!(
                    "Unknown permission code {code} in position permission set"
                ))
            })
        })
        .collect()
}

/// Translate a tokio_postgres failure into the shared repository taxonomy.
/// Constraint violations keep their SQL-state meaning so the services can
/// turn them back into domain outcomes (duplicate invite, missing parent).
pub fn map_db_error(err: tokio_postgres::Error) -> RepositoryError {
    if err.is_closed() {
        return RepositoryError::ConnectionFailed("connection closed".to_string());
    }

    let Some(db_err) = err.as_db_error() else {
        return RepositoryError::DatabaseError(err.into());
    };
    let message = db_err.message().to_string();

    match *db_err.code() {
        SqlState::UNIQUE_VIOLATION => RepositoryError::AlreadyExists,
        SqlState::FOREIGN_KEY_VIOLATION => RepositoryError::ForeignKeyViolation(message),
        SqlState::NOT_NULL_VIOLATION => RepositoryError::RequiredFieldMissing(message),
        SqlState::CHECK_VIOLATION => RepositoryError::ValidationFailed(message),
        SqlState::RESTRICT_VIOLATION => RepositoryError::DependencyExists(message),

        SqlState::T_R_SERIALIZATION_FAILURE | SqlState::T_R_DEADLOCK_DETECTED => {
            RepositoryError::TransactionConflict
        }

        SqlState::INVALID_PASSWORD | SqlState::INVALID_AUTHORIZATION_SPECIFICATION => {
            RepositoryError::AuthenticationFailed
        }
        SqlState::CONNECTION_EXCEPTION
        | SqlState::CONNECTION_DOES_NOT_EXIST
        | SqlState::CONNECTION_FAILURE => RepositoryError::ConnectionFailed(message),

        ref code => RepositoryError::DatabaseError(anyhow::anyhow!(
            "database error ({}): {message}",
            code.code()
        )),
    }
}
