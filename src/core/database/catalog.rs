//! The catalog seam between tool handlers and PostgreSQL.
//!
//! Handlers ask a [`Catalog`] for a [`CatalogSession`], run their statements
//! on it and close it. The production implementation opens one fresh
//! connection per session inside a read-only transaction; tests substitute
//! an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, Postgres};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::credentials::{CredentialsConfig, PgCredentials, resolve_credentials};
use super::error::DatabaseError;
use super::query::{BindValue, SchemaName, SqlQuery};
use super::row::row_to_record;
use crate::core::json::Record;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// A source of read-only database sessions.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Schema the serving tables live in.
    fn schema(&self) -> &SchemaName;

    /// Open a new session.
    async fn session(&self) -> Result<Box<dyn CatalogSession>, DatabaseError>;
}

/// A single read-only unit of work.
#[async_trait]
pub trait CatalogSession: Send {
    async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Record>, DatabaseError>;

    async fn fetch_optional(&mut self, query: &SqlQuery) -> Result<Option<Record>, DatabaseError> {
        Ok(self.fetch_all(query).await?.into_iter().next())
    }

    /// Roll back and release the session. Failures are logged, not returned.
    async fn close(self: Box<Self>);
}

/// PostgreSQL-backed catalog.
///
/// Credentials are resolved once, on first use or through [`PgCatalog::resolve`],
/// and the resulting connect options are reused for every session.
pub struct PgCatalog {
    credentials: CredentialsConfig,
    schema: SchemaName,
    connect_timeout: Duration,
    resolved: OnceCell<(PgCredentials, PgConnectOptions)>,
}

impl PgCatalog {
    pub fn new(credentials: CredentialsConfig, schema: SchemaName, connect_timeout: Duration) -> Self {
        Self {
            credentials,
            schema,
            connect_timeout,
            resolved: OnceCell::new(),
        }
    }

    /// Resolve credentials eagerly so that misconfiguration fails at startup.
    pub async fn resolve(&self) -> Result<(), DatabaseError> {
        let (creds, _) = self.connect_options().await?;
        info!(
            "Database target: {}:{}/{} (schema {})",
            creds.host, creds.port, creds.dbname, self.schema
        );
        Ok(())
    }

    async fn connect_options(&self) -> Result<&(PgCredentials, PgConnectOptions), DatabaseError> {
        self.resolved
            .get_or_try_init(|| async {
                let creds = resolve_credentials(&self.credentials).await?;
                let options = PgConnectOptions::new()
                    .host(&creds.host)
                    .port(creds.port)
                    .database(&creds.dbname)
                    .username(&creds.user)
                    .password(&creds.password)
                    .application_name(env!("CARGO_PKG_NAME"));
                Ok((creds, options))
            })
            .await
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    fn schema(&self) -> &SchemaName {
        &self.schema
    }

    async fn session(&self) -> Result<Box<dyn CatalogSession>, DatabaseError> {
        let (creds, options) = self.connect_options().await?;

        let mut conn = tokio::time::timeout(self.connect_timeout, options.connect())
            .await
            .map_err(|_| DatabaseError::ConnectTimeout {
                host: creds.host.clone(),
                port: creds.port,
                seconds: self.connect_timeout.as_secs(),
            })??;

        sqlx::query("BEGIN READ ONLY").execute(&mut conn).await?;
        debug!("Opened read-only session");

        Ok(Box::new(PgSession { conn }))
    }
}

struct PgSession {
    conn: PgConnection,
}

fn build_query(query: &SqlQuery) -> Query<'_, Postgres, PgArguments> {
    query
        .binds
        .iter()
        .fold(sqlx::query(&query.sql), |q, bind| match bind {
            BindValue::Text(s) => q.bind(s.clone()),
            BindValue::Integer(i) => q.bind(*i),
            BindValue::TextArray(values) => q.bind(values.clone()),
        })
}

#[async_trait]
impl CatalogSession for PgSession {
    async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Record>, DatabaseError> {
        debug!(sql = %query.sql, binds = query.binds.len(), "Executing statement");
        let rows = build_query(query).fetch_all(&mut self.conn).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn close(self: Box<Self>) {
        let mut conn = self.conn;
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut conn).await {
            warn!("Rollback on session close failed: {}", e);
        }
        if let Err(e) = conn.close().await {
            warn!("Closing connection failed: {}", e);
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory catalog for handler tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct FakeState {
        responses: Vec<(String, Vec<Record>)>,
        executed: Vec<SqlQuery>,
        sessions_opened: usize,
        sessions_closed: usize,
    }

    /// Returns canned rows for the first registered needle found in the SQL text.
    #[derive(Clone, Default)]
    pub struct FakeCatalog {
        schema: SchemaName,
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, sql_contains: &str, rows: Vec<Record>) -> Self {
            self.state
                .lock()
                .unwrap()
                .responses
                .push((sql_contains.to_string(), rows));
            self
        }

        pub fn executed(&self) -> Vec<SqlQuery> {
            self.state.lock().unwrap().executed.clone()
        }

        pub fn sessions(&self) -> (usize, usize) {
            let state = self.state.lock().unwrap();
            (state.sessions_opened, state.sessions_closed)
        }
    }

    struct FakeSession {
        state: Arc<Mutex<FakeState>>,
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        fn schema(&self) -> &SchemaName {
            &self.schema
        }

        async fn session(&self) -> Result<Box<dyn CatalogSession>, DatabaseError> {
            self.state.lock().unwrap().sessions_opened += 1;
            Ok(Box::new(FakeSession {
                state: self.state.clone(),
            }))
        }
    }

    #[async_trait]
    impl CatalogSession for FakeSession {
        async fn fetch_all(&mut self, query: &SqlQuery) -> Result<Vec<Record>, DatabaseError> {
            let mut state = self.state.lock().unwrap();
            state.executed.push(query.clone());
            Ok(state
                .responses
                .iter()
                .find(|(needle, _)| query.sql.contains(needle.as_str()))
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }

        async fn close(self: Box<Self>) {
            self.state.lock().unwrap().sessions_closed += 1;
        }
    }
}
