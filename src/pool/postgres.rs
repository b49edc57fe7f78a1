use std::future::Future;

use bb8::ManageConnection;
use tokio_postgres::{Client, Config, NoTls};

/// bb8 manager for Postgres clients. Each pooled entry owns a client whose
/// background connection task is spawned onto the runtime at connect time.
pub struct PostgresManager {
    config: Config,
}

impl PostgresManager {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ManageConnection for PostgresManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let config = self.config.clone();
        async move {
            let (client, connection) = config.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    tracing::debug!("postgres connection task ended: {err}");
                }
            });
            Ok(client)
        }
    }

    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        // A closed client must not be handed out again.
        conn.is_closed()
    }
}
