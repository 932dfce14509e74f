use sqlx::{PgConnection, PgPool};

use crate::{app_error::AppError, domain::entities::user::UserId};

pub mod habit;
pub mod payment;
pub mod promo_code;
pub mod subscription;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }
}

/// Users are created on first contact; the messenger owns their identity.
pub(crate) async fn ensure_user(conn: &mut PgConnection, user_id: UserId) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Creates the user row if needed and locks it for the rest of the
/// transaction. Every entitlement change goes through this first, so
/// concurrent changes for one user serialize. Returns `is_premium`.
pub(crate) async fn lock_user(conn: &mut PgConnection, user_id: UserId) -> Result<bool, sqlx::Error> {
    ensure_user(&mut *conn, user_id).await?;
    sqlx::query_scalar("SELECT is_premium FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

/// Name of the violated unique constraint, if that is what `err` is.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Some(db_err.constraint().unwrap_or_default())
        }
        _ => None,
    }
}

/// Maps a unique violation to a caller error with `message`. Any other
/// error goes through the usual conversion.
pub(crate) fn on_unique_violation(err: sqlx::Error, message: &str) -> AppError {
    if unique_violation(&err).is_some() {
        AppError::InvalidInput(message.to_string())
    } else {
        err.into()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            // Expected constraint conflicts are handled where they can occur.
            // Anything reaching here stays retryable.
            sqlx::Error::Database(db_err) => {
                tracing::error!(
                    error = ?err,
                    kind = ?db_err.kind(),
                    constraint = ?db_err.constraint(),
                    "Database error"
                );
                AppError::StoreUnavailable
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::StoreUnavailable
            }
        }
    }
}
