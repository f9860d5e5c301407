//! PostgreSQL-backed invitation store.
//!
//! Status transitions are single `UPDATE ... WHERE status = 'pending'`
//! statements and use counts are bumped with conditional increments, so two
//! writers racing on one row can never both succeed.

use sqlx::PgPool;

use grantflow_core::{AppError, AppResult};

mod access_requests;
mod invitations;
mod links;
mod records;
mod rows;


/// PostgreSQL implementation of every invitation repository port.
#[derive(Clone)]
pub struct PostgresInvitationStore {
    pool: PgPool,
}

impl PostgresInvitationStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(error: sqlx::Error, conflict: &str, action: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(conflict.to_owned());
    }

    AppError::Internal(format!("failed to {action}: {error}"))
}

fn to_db_count(value: u32, field: &str) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|_| AppError::Validation(format!("{field} exceeds supported range")))
}

fn to_db_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
