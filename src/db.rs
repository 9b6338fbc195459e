use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Executor;

/// Every pooled connection runs at READ COMMITTED: a mutation re-reads the
/// values it changes after locking the payroll row and must see the latest
/// committed amounts, not the snapshot taken at its first read.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET SESSION TRANSACTION ISOLATION LEVEL READ COMMITTED")
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
