use std::collections::HashSet;
use std::env::var;
use std::time::Duration;

use axum::http::HeaderValue;
use dotenvy::dotenv;
use thiserror::Error;

use crate::routes::Endpoint;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("unknown endpoint {0:?} in PROTECTED_ROUTES")]
    UnknownEndpoint(String),

    #[error("invalid origin {0:?} in ALLOWED_ORIGINS")]
    InvalidOrigin(String),
}

/// Endpoints that require a valid `token` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoutes(HashSet<Endpoint>);

impl ProtectedRoutes {
    /// No endpoint is guarded.
    pub fn none() -> Self {
        Self(HashSet::new())
    }

    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.0.contains(&endpoint)
    }

    pub fn insert(&mut self, endpoint: Endpoint) {
        self.0.insert(endpoint);
    }

    pub fn remove(&mut self, endpoint: Endpoint) {
        self.0.remove(&endpoint);
    }

    /// Parse a comma-separated list of endpoint names, e.g. `create_player,delete_player`.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                Endpoint::from_name(name).ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()))
            })
            .collect::<Result<HashSet<_>, _>>()
            .map(Self)
    }
}

impl Default for ProtectedRoutes {
    fn default() -> Self {
        Self(HashSet::from([
            Endpoint::CreatePlayer,
            Endpoint::GetPlayer,
            Endpoint::UpdatePlayer,
            Endpoint::DeletePlayer,
        ]))
    }
}

impl FromIterator<Endpoint> for ProtectedRoutes {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    /// Env: PORT (default: 5000)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "leaderboard.db")
    pub database_path: String,

    /// Secret used to sign session tokens
    /// Env: ACCESS_TOKEN_SECRET (required)
    pub access_token_secret: String,

    /// Session token lifetime
    /// Env: TOKEN_TTL_SECS (default: 3600)
    pub token_ttl: Duration,

    /// Origins allowed to make credentialed cross-origin requests
    /// Env: ALLOWED_ORIGINS, comma separated
    /// (default: "http://localhost:5173,https://bigfinancetask.web.app")
    pub allowed_origins: Vec<HeaderValue>,

    /// Endpoints behind the auth guard
    /// Env: PROTECTED_ROUTES, comma separated endpoint names
    /// (default: "create_player,get_player,update_player,delete_player")
    pub protected_routes: ProtectedRoutes,

    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 1048576 = 1MB)
    pub request_body_limit: usize,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv(); //for debugging mostly
        let defaults = Self::default();

        let access_token_secret = var("ACCESS_TOKEN_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("ACCESS_TOKEN_SECRET"))?;

        let allowed_origins = match var("ALLOWED_ORIGINS") {
            Ok(list) => parse_origins(&list)?,
            Err(_) => defaults.allowed_origins,
        };

        let protected_routes = match var("PROTECTED_ROUTES") {
            Ok(list) => ProtectedRoutes::parse(&list)?,
            Err(_) => defaults.protected_routes,
        };

        Ok(Self {
            port: env_or_default("PORT", defaults.port),
            database_path: env_or_default_string("DATABASE_PATH", &defaults.database_path),
            access_token_secret,
            token_ttl: Duration::from_secs(env_or_default("TOKEN_TTL_SECS", 3600)),
            allowed_origins,
            protected_routes,
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", defaults.request_body_limit),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            database_path: "leaderboard.db".to_string(),
            access_token_secret: "development-secret".to_string(),
            token_ttl: Duration::from_secs(3600),
            allowed_origins: vec![
                HeaderValue::from_static("http://localhost:5173"),
                HeaderValue::from_static("https://bigfinancetask.web.app"),
            ],
            protected_routes: ProtectedRoutes::default(),
            request_body_limit: 1024 * 1024, // 1 MB
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Parse a comma-separated origin list
pub fn parse_origins(list: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
        })
        .collect()
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.database_path, "leaderboard.db");
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.request_body_limit, 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:5173", "https://bigfinancetask.web.app"]
        );
    }

    #[test]
    fn test_default_protected_routes() {
        let protected = ProtectedRoutes::default();
        assert!(protected.contains(Endpoint::CreatePlayer));
        assert!(protected.contains(Endpoint::GetPlayer));
        assert!(protected.contains(Endpoint::UpdatePlayer));
        assert!(protected.contains(Endpoint::DeletePlayer));
        assert!(!protected.contains(Endpoint::ListPlayers));
        assert!(!protected.contains(Endpoint::CreateUser));
        assert!(!protected.contains(Endpoint::PlayerByRank));
    }

    #[test]
    fn test_parse_protected_routes() {
        let protected = ProtectedRoutes::parse(" create_player, delete_player ,").unwrap();
        assert_eq!(
            protected,
            [Endpoint::CreatePlayer, Endpoint::DeletePlayer].into_iter().collect()
        );

        assert_eq!(ProtectedRoutes::parse("").unwrap(), ProtectedRoutes::none());
    }

    #[test]
    fn test_parse_protected_routes_rejects_unknown() {
        assert!(matches!(
            ProtectedRoutes::parse("create_player,drop_tables"),
            Err(ConfigError::UnknownEndpoint(name)) if name == "drop_tables"
        ));
    }

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins("http://localhost:5173, https://example.web.app").unwrap();
        assert_eq!(origins, vec!["http://localhost:5173", "https://example.web.app"]);

        assert!(matches!(
            parse_origins("http://ok.test,bad\norigin"),
            Err(ConfigError::InvalidOrigin(_))
        ));
    }
}
