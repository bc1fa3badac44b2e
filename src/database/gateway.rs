use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};

/// Per-request storage handle.
///
/// Owns exactly one connection checked out of the shared pool. The handle is
/// owned by its environment, never shared across invocations, and returns the
/// connection to the pool when the environment is torn down.
pub struct Db {
    conn: PoolConnection<Postgres>,
}

impl Db {
    pub async fn connect(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let conn = pool.acquire().await?;
        Ok(Self { conn })
    }

    /// The underlying connection, for parameterized sqlx queries
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Run `body` inside a transaction on this connection.
    ///
    /// Commits on success; rolls back and re-raises on any failure from the
    /// body, whatever its kind. Nesting is not supported - one transaction
    /// may be open per environment at a time.
    pub async fn transaction<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        E: From<sqlx::Error>,
        F: for<'c> FnOnce(&'c mut Db) -> BoxFuture<'c, Result<T, E>>,
    {
        sqlx::query("BEGIN").execute(self.conn()).await?;

        match body(self).await {
            Ok(value) => {
                sqlx::query("COMMIT").execute(self.conn()).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(self.conn()).await {
                    tracing::error!("rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}
