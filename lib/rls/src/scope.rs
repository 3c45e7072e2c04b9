//! Transaction-scoped acting-user context for row-level security.
//!
//! The acting user is stored with `set_config(.., .., true)`, the bindable
//! form of `SET LOCAL`: it is visible only inside the transaction and is
//! discarded at commit or rollback, so a pooled connection never carries one
//! request's identity into the next.

use crate::predicate::CURRENT_USER_SETTING;
use futures::future::BoxFuture;
use lexcase_core::UserId;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument, warn};

/// An open transaction whose policies evaluate as one user.
///
/// Dropping the session without [`commit`](Self::commit) rolls it back.
pub struct RlsSession {
    tx: Transaction<'static, Postgres>,
    user_id: UserId,
}

impl RlsSession {
    /// Begins a transaction and binds it to `user_id`.
    #[instrument(skip(pool))]
    pub async fn begin(pool: &PgPool, user_id: UserId) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(CURRENT_USER_SETTING)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
        debug!("rls session started");
        Ok(Self { tx, user_id })
    }

    /// Returns the acting user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the connection to run scoped queries on.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Commits the work done in this session.
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    /// Rolls back the work done in this session.
    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

/// Runs `f` inside a transaction scoped to `user_id`.
///
/// Commits when `f` succeeds. When `f` fails the transaction is rolled back
/// and `f`'s error is returned; a failed rollback is only logged.
///
/// ```ignore
/// let rows = with_user_rls(&pool, user_id, |conn| {
///     Box::pin(async move {
///         sqlx::query_scalar::<_, i64>("SELECT id FROM expedientes")
///             .fetch_all(conn)
///             .await
///     })
/// })
/// .await?;
/// ```
pub async fn with_user_rls<T, E, F>(pool: &PgPool, user_id: UserId, f: F) -> Result<T, E>
where
    E: From<sqlx::Error>,
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
{
    let mut session = RlsSession::begin(pool, user_id).await?;
    match f(session.conn()).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = session.rollback().await {
                warn!(user_id = %user_id, error = %rollback, "rollback after failed scoped work also failed");
            }
            Err(e)
        }
    }
}
