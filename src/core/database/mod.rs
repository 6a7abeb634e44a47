//! PostgreSQL access for the tool handlers.
//!
//! - [`credentials`]: env / secret based credential resolution
//! - [`query`]: validated identifiers and parameterized statements
//! - [`row`]: conversion of result rows into JSON-safe records
//! - [`catalog`]: the session seam handlers talk to

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod query;
pub mod row;

pub use catalog::{Catalog, CatalogSession, DEFAULT_CONNECT_TIMEOUT_SECS, PgCatalog};
pub use credentials::{CredentialsConfig, PgCredentials};
pub use error::DatabaseError;
pub use query::{BindValue, SchemaName, SqlQuery, Table, escape_like};
