//! Connection credential resolution.
//!
//! Credentials come either from the `PG*` environment variables or from a
//! JSON secret in AWS Secrets Manager named by `SECRET_ARN`. The secret wins
//! when both are configured.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::error::DatabaseError;

pub const DEFAULT_PORT: u16 = 5432;

/// Raw credential settings as read from the environment.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Secrets Manager secret id or ARN.
    pub secret_arn: Option<String>,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("secret_arn", &self.secret_arn)
            .finish()
    }
}

impl CredentialsConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            host: var("PGHOST"),
            port: var("PGPORT").and_then(|p| p.trim().parse().ok()),
            dbname: var("PGDATABASE"),
            user: var("PGUSER"),
            password: var("PGPASSWORD"),
            secret_arn: var("SECRET_ARN"),
        }
    }
}

/// Complete credentials, ready to build connect options from.
#[derive(Clone, PartialEq, Eq)]
pub struct PgCredentials {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for PgCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl PgCredentials {
    /// Build credentials from optional parts, failing on any missing field.
    fn from_parts(
        host: Option<String>,
        port: Option<u16>,
        dbname: Option<String>,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Self, DatabaseError> {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, name: &'static str| {
            let value = value.filter(|v| !v.is_empty());
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let host = require(host, "host");
        let dbname = require(dbname, "dbname");
        let user = require(user, "user");
        let password = require(password, "password");

        if !missing.is_empty() {
            return Err(DatabaseError::missing_credentials(format!(
                "{} not set. Set PGHOST, PGDATABASE, PGUSER, PGPASSWORD or SECRET_ARN",
                missing.join(", ")
            )));
        }

        Ok(Self {
            host,
            port: port.unwrap_or(DEFAULT_PORT),
            dbname,
            user,
            password,
        })
    }
}

/// Parse the JSON body of a database secret.
///
/// Accepts `username` or `user`, and a port given as a number or a string.
pub fn credentials_from_secret_json(secret: &str) -> Result<PgCredentials, DatabaseError> {
    let value: Value = serde_json::from_str(secret)
        .map_err(|e| DatabaseError::secret(format!("secret is not valid JSON: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| DatabaseError::secret("secret is not a JSON object"))?;

    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    let port = match obj.get("port") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(
            n.as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| DatabaseError::secret(format!("invalid port {}", n)))?,
        ),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<u16>()
                .map_err(|_| DatabaseError::secret(format!("invalid port '{}'", s)))?,
        ),
        Some(other) => return Err(DatabaseError::secret(format!("invalid port {}", other))),
    };

    PgCredentials::from_parts(
        text("host"),
        port,
        text("dbname"),
        text("username").or_else(|| text("user")),
        text("password"),
    )
}

/// Resolve the configured credential source into complete credentials.
pub async fn resolve_credentials(config: &CredentialsConfig) -> Result<PgCredentials, DatabaseError> {
    if let Some(secret_id) = &config.secret_arn {
        info!("Resolving database credentials from secret {}", secret_id);
        let secret = fetch_secret(secret_id).await?;
        return credentials_from_secret_json(&secret);
    }

    PgCredentials::from_parts(
        config.host.clone(),
        config.port,
        config.dbname.clone(),
        config.user.clone(),
        config.password.clone(),
    )
}

#[cfg(feature = "secrets-manager")]
async fn fetch_secret(secret_id: &str) -> Result<String, DatabaseError> {
    use aws_config::BehaviorVersion;

    let shared_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let client = aws_sdk_secretsmanager::Client::new(&shared_config);

    let response = client
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .map_err(|e| DatabaseError::secret(format!("failed to fetch {}: {}", secret_id, e)))?;

    response
        .secret_string()
        .map(str::to_string)
        .ok_or_else(|| DatabaseError::secret(format!("secret {} has no string value", secret_id)))
}

#[cfg(not(feature = "secrets-manager"))]
async fn fetch_secret(secret_id: &str) -> Result<String, DatabaseError> {
    Err(DatabaseError::secret(format!(
        "SECRET_ARN={} is set but the server was built without the secrets-manager feature",
        secret_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_config() -> CredentialsConfig {
        CredentialsConfig {
            host: Some("db.internal".into()),
            port: None,
            dbname: Some("bio".into()),
            user: Some("reader".into()),
            password: Some("hunter2".into()),
            secret_arn: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_from_env_defaults_port() {
        let creds = resolve_credentials(&env_config()).await.unwrap();
        assert_eq!(creds.port, DEFAULT_PORT);
        assert_eq!(creds.host, "db.internal");
    }

    #[tokio::test]
    async fn test_resolve_reports_missing_fields() {
        let mut config = env_config();
        config.password = None;
        config.host = None;
        let err = resolve_credentials(&config).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("host"));
        assert!(msg.contains("password"));
    }

    #[test]
    fn test_secret_json_accepts_username_and_string_port() {
        let creds = credentials_from_secret_json(
            r#"{"host":"h","port":"6543","dbname":"d","username":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(creds.port, 6543);
        assert_eq!(creds.user, "u");
    }

    #[test]
    fn test_secret_json_accepts_user_and_numeric_port() {
        let creds = credentials_from_secret_json(
            r#"{"host":"h","port":5433,"dbname":"d","user":"u2","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(creds.port, 5433);
        assert_eq!(creds.user, "u2");
    }

    #[test]
    fn test_secret_json_rejects_bad_input() {
        assert!(credentials_from_secret_json("not json").is_err());
        assert!(credentials_from_secret_json(r#"{"host":"h"}"#).is_err());
        assert!(
            credentials_from_secret_json(
                r#"{"host":"h","port":"x","dbname":"d","user":"u","password":"p"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let debug_str = format!("{:?}", env_config());
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));

        let creds = PgCredentials::from_parts(
            Some("h".into()),
            None,
            Some("d".into()),
            Some("u".into()),
            Some("s3cret".into()),
        )
        .unwrap();
        assert!(!format!("{:?}", creds).contains("s3cret"));
    }
}
