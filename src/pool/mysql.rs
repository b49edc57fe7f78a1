use std::future::Future;

use bb8::ManageConnection;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts};

/// Pooled MySQL connection plus a liveness flag.
///
/// `mysql_async` has no `is_closed` probe, so the driver marks the wrapper
/// broken when it observes a connection-level error; `has_broken` then lets
/// bb8 discard the connection instead of handing it out again.
pub struct MySqlConnection {
    pub(crate) conn: Conn,
    broken: bool,
}

impl MySqlConnection {
    pub(crate) fn mark_broken(&mut self) {
        self.broken = true;
    }
}

/// bb8 manager for MySQL connections.
///
/// `mysql_async` ships its own pool, but wrapping raw connections in bb8
/// keeps lifecycle policy (min idle, max lifetime, test-before-acquire)
/// uniform across backends.
pub struct MySqlManager {
    opts: Opts,
}

impl MySqlManager {
    #[must_use]
    pub fn new(opts: Opts) -> Self {
        Self { opts }
    }
}

impl ManageConnection for MySqlManager {
    type Connection = MySqlConnection;
    type Error = mysql_async::Error;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let opts = self.opts.clone();
        async move {
            let conn = Conn::new(opts).await?;
            Ok(MySqlConnection {
                conn,
                broken: false,
            })
        }
    }

    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.conn.query_drop("SELECT 1").await }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.broken
    }
}
