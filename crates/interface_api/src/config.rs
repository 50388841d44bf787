//! API configuration
//!
//! `ApiConfig` comes from `API_*` environment variables with defaults for
//! anything unset. `ServiceProperties` is the separate key/value property
//! file read once at startup; it never fails the service.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use config::Source;
use serde::Deserialize;
use tracing::{debug, warn};

use core_kernel::CoreError;
use domain_priorauth::DEFAULT_MAX_MERGE_RETRIES;
use infra_db::DatabaseConfig;

/// Property naming the externally visible base URL of the service
pub const BASE_URL_PROPERTY: &str = "baseUrl";

/// Which submission tracker backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerBackend {
    Memory,
    Postgres,
}

impl FromStr for TrackerBackend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(TrackerBackend::Memory),
            "postgres" | "postgresql" => Ok(TrackerBackend::Postgres),
            other => Err(CoreError::configuration(format!("unknown tracker backend: {}", other))),
        }
    }
}

impl fmt::Display for TrackerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerBackend::Memory => f.write_str("memory"),
            TrackerBackend::Postgres => f.write_str("postgres"),
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Path of the key/value property file
    pub properties_file: String,
    /// Rules document to load; the embedded default table when unset
    pub rules_file: Option<String>,
    pub tracker_backend: TrackerBackend,
    /// Only read when `tracker_backend` is `postgres`
    pub database_url: String,
    pub database_max_connections: u32,
    /// How long a merge waits for another writer of the same claim
    pub database_lock_timeout_ms: u64,
    /// Per-request deadline; expired requests get 408
    pub request_timeout_secs: u64,
    pub max_merge_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_json: false,
            properties_file: "config.properties".to_string(),
            rules_file: None,
            tracker_backend: TrackerBackend::Memory,
            database_url: "postgres://localhost/prior_auth".to_string(),
            database_max_connections: 10,
            database_lock_timeout_ms: 5_000,
            request_timeout_secs: 30,
            max_merge_retries: DEFAULT_MAX_MERGE_RETRIES,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Pool settings of the PostgreSQL tracker
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.database_max_connections)
            .lock_timeout(Duration::from_millis(self.database_lock_timeout_ms))
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns true if diagnostic mode was requested
///
/// Either the first command-line argument is `debug` or the `debug`
/// environment variable is `true`, both case-insensitive.
pub fn debug_mode_requested(args: &[String], debug_env: Option<&str>) -> bool {
    let from_args = args
        .first()
        .map(|arg| arg.eq_ignore_ascii_case("debug"))
        .unwrap_or(false);
    let from_env = debug_env
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    from_args || from_env
}

/// Key/value properties read from a local file
///
/// Lookups are case-insensitive. A missing file, an unreadable file or a
/// missing key all read as `None`.
#[derive(Debug, Clone, Default)]
pub struct ServiceProperties {
    values: HashMap<String, String>,
}

impl ServiceProperties {
    /// Loads properties from a `key=value` file
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no property file, using empty properties");
            return Self::default();
        }

        let loaded = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Ini))
            .build()
            .and_then(|c| c.collect());

        match loaded {
            Ok(table) => {
                let values = table
                    .into_iter()
                    .filter_map(|(key, value)| value.into_string().ok().map(|v| (key, v)))
                    .collect();
                Self { values }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "property file unreadable, using empty properties");
                Self::default()
            }
        }
    }

    /// Builds properties from pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The configured base URL, without a trailing slash
    pub fn base_url(&self) -> Option<&str> {
        self.get(BASE_URL_PROPERTY)
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.tracker_backend, TrackerBackend::Memory);
        assert_eq!(config.max_merge_retries, DEFAULT_MAX_MERGE_RETRIES);
        assert!(config.rules_file.is_none());
    }

    #[test]
    fn test_database_config_follows_api_config() {
        let config = ApiConfig {
            database_url: "postgres://db/tracker".to_string(),
            database_max_connections: 4,
            database_lock_timeout_ms: 750,
            ..ApiConfig::default()
        };

        let db = config.database_config();
        assert_eq!(db.url, "postgres://db/tracker");
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.lock_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_tracker_backend_parse() {
        assert_eq!("Postgres".parse::<TrackerBackend>().unwrap(), TrackerBackend::Postgres);
        assert_eq!("memory".parse::<TrackerBackend>().unwrap(), TrackerBackend::Memory);

        let error = "redis".parse::<TrackerBackend>().unwrap_err();
        assert!(matches!(error, CoreError::Configuration(_)));
    }

    #[test]
    fn test_debug_mode() {
        assert!(debug_mode_requested(&["DEBUG".to_string()], None));
        assert!(debug_mode_requested(&[], Some("True")));
        assert!(!debug_mode_requested(&["serve".to_string()], Some("false")));
        assert!(!debug_mode_requested(&[], None));
    }

    #[test]
    fn test_missing_property_file_is_empty() {
        let properties = ServiceProperties::load("/nonexistent/config.properties");
        assert!(properties.get(BASE_URL_PROPERTY).is_none());
        assert!(properties.base_url().is_none());
    }

    #[test]
    fn test_property_file_is_read() {
        let path = std::env::temp_dir().join(format!("prior-auth-{}.properties", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "baseUrl=http://localhost:8080/fhir/").unwrap();
        drop(file);

        let properties = ServiceProperties::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(properties.base_url(), Some("http://localhost:8080/fhir"));
        assert!(properties.get("missing").is_none());
    }

    #[test]
    fn test_lookup_ignores_case() {
        let properties = ServiceProperties::from_pairs([("baseurl", "http://x")]);
        assert_eq!(properties.get("baseUrl"), Some("http://x"));
    }
}
