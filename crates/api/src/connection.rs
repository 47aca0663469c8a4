//! Startup resolution of the database connection.
//!
//! Resolvers are tried in order. A resolver whose inputs are absent
//! returns `Ok(None)` and the next one is asked; a resolver whose inputs
//! are present but unusable returns an error, which stops startup.

use std::str::FromStr;

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::config::ConfigError;

const DEFAULT_PG_PORT: u16 = 5432;

/// One way of producing database connect options.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    async fn resolve(&self) -> Result<Option<PgConnectOptions>, ConfigError>;
}

/// Evaluate `resolvers` in order and return the first connect options
/// produced.
pub async fn resolve_connect_options(
    resolvers: &[Box<dyn ConnectionResolver>],
) -> Result<PgConnectOptions, ConfigError> {
    for resolver in resolvers {
        match resolver.resolve().await? {
            Some(options) => {
                tracing::info!(source = resolver.name(), "Resolved database connection");
                return Ok(options);
            }
            None => {
                tracing::debug!(source = resolver.name(), "Connection source not configured");
            }
        }
    }
    Err(ConfigError::NoConnectionSource)
}

/// Build the production resolver chain from the process environment:
/// `DATABASE_URL` first, then Secrets Manager.
///
/// The AWS client is only constructed when a secret reference is
/// configured, so local runs never touch the AWS credential chain.
pub async fn default_resolvers() -> Result<Vec<Box<dyn ConnectionResolver>>, ConfigError> {
    let lookup = |key: &str| std::env::var(key).ok();

    let mut resolvers: Vec<Box<dyn ConnectionResolver>> =
        vec![Box::new(DatabaseUrlResolver::new(lookup("DATABASE_URL")))];

    if let Some(reference) = SecretReference::from_lookup(lookup)? {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_secretsmanager::Client::new(&aws);
        resolvers.push(Box::new(SecretsManagerResolver::new(reference, client)));
    }

    Ok(resolvers)
}

// ---------------------------------------------------------------------------
// DATABASE_URL
// ---------------------------------------------------------------------------

/// Resolves a plain connection string, typically the local Docker database.
pub struct DatabaseUrlResolver {
    url: Option<String>,
}

impl DatabaseUrlResolver {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url: url.filter(|u| !u.trim().is_empty()),
        }
    }
}

#[async_trait]
impl ConnectionResolver for DatabaseUrlResolver {
    fn name(&self) -> &'static str {
        "DATABASE_URL"
    }

    async fn resolve(&self) -> Result<Option<PgConnectOptions>, ConfigError> {
        let Some(url) = &self.url else {
            return Ok(None);
        };
        PgConnectOptions::from_str(url.trim())
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var: "DATABASE_URL",
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Secrets Manager
// ---------------------------------------------------------------------------

/// Where the managed database lives and which secret holds its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub secret_id: String,
    pub host: String,
    pub database: String,
    /// Explicit `DB_PORT`; otherwise the secret's port, otherwise 5432.
    pub port: Option<u16>,
}

impl SecretReference {
    /// Read `DB_SECRET_ARN`, `DB_CLUSTER_ENDPOINT`, `DB_NAME` and `DB_PORT`.
    ///
    /// Returns `Ok(None)` when no secret ARN is configured. An ARN without
    /// the endpoint or database name is a misconfiguration.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(secret_id) = present("DB_SECRET_ARN") else {
            return Ok(None);
        };
        let host = present("DB_CLUSTER_ENDPOINT").ok_or_else(|| {
            ConfigError::Missing("DB_CLUSTER_ENDPOINT must be set when DB_SECRET_ARN is set".into())
        })?;
        let database = present("DB_NAME").ok_or_else(|| {
            ConfigError::Missing("DB_NAME must be set when DB_SECRET_ARN is set".into())
        })?;
        let port = present("DB_PORT")
            .map(|raw| {
                raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                    var: "DB_PORT",
                    reason: format!("'{raw}': {e}"),
                })
            })
            .transpose()?;

        Ok(Some(Self {
            secret_id,
            host,
            database,
            port,
        }))
    }
}

/// Source of secret strings, implemented for the Secrets Manager client.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn secret_string(&self, secret_id: &str) -> Result<String, ConfigError>;
}

#[async_trait]
impl SecretSource for aws_sdk_secretsmanager::Client {
    async fn secret_string(&self, secret_id: &str) -> Result<String, ConfigError> {
        let output = self
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| ConfigError::Secret(format!("{secret_id}: {}", DisplayErrorContext(&e))))?;

        output
            .secret_string
            .ok_or_else(|| ConfigError::Secret(format!("{secret_id} has no string value")))
    }
}

/// Credential fields of a managed database secret. Other keys the
/// provider stores alongside (engine, host, dbname) are ignored.
#[derive(Deserialize)]
struct DatabaseSecret {
    username: String,
    password: String,
    #[serde(default)]
    port: Option<u16>,
}

/// Resolves connect options from a secret plus the cluster endpoint.
pub struct SecretsManagerResolver<S> {
    reference: SecretReference,
    source: S,
}

impl<S: SecretSource> SecretsManagerResolver<S> {
    pub fn new(reference: SecretReference, source: S) -> Self {
        Self { reference, source }
    }
}

#[async_trait]
impl<S: SecretSource> ConnectionResolver for SecretsManagerResolver<S> {
    fn name(&self) -> &'static str {
        "DB_SECRET_ARN"
    }

    async fn resolve(&self) -> Result<Option<PgConnectOptions>, ConfigError> {
        let raw = self.source.secret_string(&self.reference.secret_id).await?;
        let secret: DatabaseSecret = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::Secret(format!(
                "{} is not a database credential document: {e}",
                self.reference.secret_id
            ))
        })?;

        let port = self
            .reference
            .port
            .or(secret.port)
            .unwrap_or(DEFAULT_PG_PORT);

        let options = PgConnectOptions::new()
            .host(&self.reference.host)
            .port(port)
            .username(&secret.username)
            .password(&secret.password)
            .database(&self.reference.database);

        Ok(Some(options))
    }
}
