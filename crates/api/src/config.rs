use axum::http::HeaderValue;

/// Store checkouts give up well before the request timeout so an outage
/// surfaces as 503 rather than 408.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

/// Error raised while reading configuration at startup. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Missing(String),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Failed to read database secret: {0}")]
    Secret(String),

    #[error(
        "No database connection configured: set DATABASE_URL, or DB_SECRET_ARN \
         together with DB_CLUSTER_ENDPOINT and DB_NAME"
    )]
    NoConnectionSource,
}

/// Server configuration loaded from environment variables.
///
/// Database connection settings are resolved separately, see
/// [`crate::connection`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins. A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Runtime environment tag (`ENV`, default: `development`).
    pub environment: String,
    /// Log every SQL statement.
    pub db_echo: bool,
    /// Upper bound on pooled database connections (default: `5`).
    pub db_max_connections: u32,
    /// Seconds to wait for a pooled connection before the store is
    /// reported unavailable (default: `3`). Always below
    /// `request_timeout_secs`.
    pub db_acquire_timeout_secs: u64,
    /// Apply migrations before serving (default: `false`).
    pub run_migrations: bool,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                                  |
    /// |---------------------------|------------------------------------------|
    /// | `HOST`                    | `0.0.0.0`                                |
    /// | `PORT`                    | `8000`                                   |
    /// | `CORS_ORIGINS`            | `*`                                      |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                     |
    /// | `ENV`                     | `development`                            |
    /// | `DB_ECHO`                 | `true` when `ENV` is `development`/`dev` |
    /// | `DB_MAX_CONNECTIONS`      | `5`                                      |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `3`                                      |
    /// | `RUN_MIGRATIONS`          | `false`                                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or("PORT", lookup("PORT"), 8000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in cors_origins.iter().filter(|o| o.as_str() != "*") {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
                var: "CORS_ORIGINS",
                reason: format!("'{origin}': {e}"),
            })?;
        }

        let request_timeout_secs =
            parse_or("REQUEST_TIMEOUT_SECS", lookup("REQUEST_TIMEOUT_SECS"), 30u64)?;

        let environment = lookup("ENV").unwrap_or_else(|| "development".into());
        let echo_default = matches!(environment.as_str(), "development" | "dev");
        let db_echo = match lookup("DB_ECHO") {
            Some(raw) => parse_bool("DB_ECHO", &raw)?,
            None => echo_default,
        };

        let db_max_connections =
            parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5u32)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                reason: "must be at least 1".into(),
            });
        }

        let db_acquire_timeout_secs = parse_or(
            "DB_ACQUIRE_TIMEOUT_SECS",
            lookup("DB_ACQUIRE_TIMEOUT_SECS"),
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;
        if db_acquire_timeout_secs == 0 || db_acquire_timeout_secs >= request_timeout_secs {
            return Err(ConfigError::Invalid {
                var: "DB_ACQUIRE_TIMEOUT_SECS",
                reason: format!(
                    "must be at least 1 and below REQUEST_TIMEOUT_SECS ({request_timeout_secs})"
                ),
            });
        }

        let run_migrations = match lookup("RUN_MIGRATIONS") {
            Some(raw) => parse_bool("RUN_MIGRATIONS", &raw)?,
            None => false,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            environment,
            db_echo,
            db_max_connections,
            db_acquire_timeout_secs,
            run_migrations,
        })
    }

    /// Whether CORS is open to every origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert!(config.allows_any_origin());
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.environment, "development");
        assert!(config.db_echo);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_acquire_timeout_secs, 3);
        assert!(!config.run_migrations);
    }

    #[test]
    fn echo_defaults_off_outside_development() {
        let config = load(&[("ENV", "prod")]).unwrap();
        assert!(!config.db_echo);

        let config = load(&[("ENV", "dev")]).unwrap();
        assert!(config.db_echo);
    }

    #[test]
    fn explicit_echo_wins() {
        let config = load(&[("ENV", "prod"), ("DB_ECHO", "true")]).unwrap();
        assert!(config.db_echo);

        let config = load(&[("DB_ECHO", "0")]).unwrap();
        assert!(!config.db_echo);
    }

    #[test]
    fn cors_origins_split_and_trimmed() {
        let config = load(&[(
            "CORS_ORIGINS",
            "https://a.example.com, https://b.example.com,,",
        )])
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn invalid_port_is_fatal() {
        assert_matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
    }

    #[test]
    fn zero_pool_size_rejected() {
        assert_matches!(
            load(&[("DB_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::Invalid { var: "DB_MAX_CONNECTIONS", .. })
        );
    }

    #[test]
    fn acquire_timeout_must_stay_below_request_timeout() {
        assert_matches!(
            load(&[("DB_ACQUIRE_TIMEOUT_SECS", "30")]),
            Err(ConfigError::Invalid { var: "DB_ACQUIRE_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            load(&[("REQUEST_TIMEOUT_SECS", "2"), ("DB_ACQUIRE_TIMEOUT_SECS", "3")]),
            Err(ConfigError::Invalid { var: "DB_ACQUIRE_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            load(&[("DB_ACQUIRE_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { var: "DB_ACQUIRE_TIMEOUT_SECS", .. })
        );

        let config =
            load(&[("REQUEST_TIMEOUT_SECS", "10"), ("DB_ACQUIRE_TIMEOUT_SECS", "9")]).unwrap();
        assert_eq!(config.db_acquire_timeout_secs, 9);
    }

    #[test]
    fn garbage_boolean_rejected() {
        assert_matches!(
            load(&[("RUN_MIGRATIONS", "maybe")]),
            Err(ConfigError::Invalid { var: "RUN_MIGRATIONS", .. })
        );
    }

    #[test]
    fn invalid_cors_origin_rejected() {
        assert_matches!(
            load(&[("CORS_ORIGINS", "https://ok.example.com,bad\norigin")]),
            Err(ConfigError::Invalid { var: "CORS_ORIGINS", .. })
        );
    }
}
