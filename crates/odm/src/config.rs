//! Configuration for the ODM and its Elasticsearch connection.
//!
//! [`OdmConfig`] can be deserialized with serde (every field has a default),
//! built programmatically, or read from the environment with
//! [`OdmConfig::from_env`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ELASTIC_HOSTS` | http://localhost:9200 | Comma-separated node URLs |
//! | `ELASTIC_USERNAME` | | Basic auth username |
//! | `ELASTIC_PASSWORD` | | Basic auth password |
//! | `ELASTIC_API_KEY` | | Encoded API key (takes precedence over basic auth) |
//! | `ELASTIC_CLOUD_ID` | | Elastic Cloud deployment id |
//! | `ELASTIC_SSL_VERIFICATION` | true | Verify TLS certificates |
//! | `ELASTIC_REQUEST_TIMEOUT_MS` | 30000 | Request timeout |
//! | `ELASTIC_RETRY_ON_FAILURE` | true | Retry transient failures |
//! | `ELASTIC_MAX_RETRIES` | 3 | Maximum retry attempts |
//! | `ELASTIC_INDEX_PREFIX` | app_ | Prefix for every index name |
//! | `ELASTIC_SOFT_DELETES` | true | Filter out `_deleted_at` documents |
//! | `ELASTIC_BULK_SIZE` | 1000 | Documents per bulk request |
//! | `ELASTIC_LOG_QUERIES` | false | Log compiled request bodies |
//! | `ELASTIC_SLOW_QUERY_MS` | 1000 | Slow query warning threshold |
//!
//! # Example
//!
//! ```rust
//! use elastic_odm::config::OdmConfig;
//!
//! let config = OdmConfig {
//!     index_prefix: "blog_".to_string(),
//!     soft_deletes: false,
//!     ..Default::default()
//! };
//! assert_eq!(config.prefixed_index("posts"), "blog_posts");
//! ```

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Authentication for the Elasticsearch connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Base64-encoded API key (`id:api_key`).
    ApiKey {
        /// The encoded key.
        encoded: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Connection settings for the Elasticsearch gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Elastic Cloud id. When set, `hosts` is ignored.
    #[serde(default)]
    pub cloud_id: Option<String>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retry transport failures and transient server errors (default: true).
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,

    /// Maximum number of retries per request (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries in milliseconds, doubled per attempt (default: 100).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_hosts() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            auth: None,
            cloud_id: None,
            disable_certificate_validation: false,
            request_timeout_ms: default_request_timeout_ms(),
            retry_on_failure: true,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Index settings applied when a model's index is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefaults {
    /// Number of primary shards (default: 1).
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,

    /// Number of replica shards (default: 0).
    #[serde(default)]
    pub number_of_replicas: u32,
}

fn default_shards() -> u32 {
    1
}

impl Default for IndexDefaults {
    fn default() -> Self {
        Self {
            number_of_shards: default_shards(),
            number_of_replicas: 0,
        }
    }
}

/// When written documents become visible to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Refresh the affected shards immediately.
    True,
    /// Wait for the next scheduled refresh before returning.
    #[default]
    WaitFor,
    /// Do not refresh; documents appear after the refresh interval.
    False,
}

impl RefreshPolicy {
    /// Parses the policy names used in configuration files and env vars.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(RefreshPolicy::True),
            "wait_for" => Some(RefreshPolicy::WaitFor),
            "false" => Some(RefreshPolicy::False),
            _ => None,
        }
    }
}

/// Query logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log every compiled request body at debug level (default: false).
    #[serde(default)]
    pub log_queries: bool,

    /// Searches slower than this are logged as warnings (default: 1000).
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
}

fn default_slow_query_threshold_ms() -> u64 {
    1000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_queries: false,
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
        }
    }
}

/// Top-level ODM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdmConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Prefix added to every model index name (default: `"app_"`).
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Hide documents carrying `_deleted_at` unless asked for (default: true).
    #[serde(default = "default_true")]
    pub soft_deletes: bool,

    /// Documents per bulk request (default: 1000).
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,

    /// Settings for newly created indices.
    #[serde(default)]
    pub default_settings: IndexDefaults,

    /// Refresh behaviour for writes.
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,

    /// Query logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Page size used by `paginate` callers that do not pick one (default: 15).
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
}

/// Characters Elasticsearch rejects in index names.
const INVALID_INDEX_CHARS: &[char] = &[' ', '"', '*', '\\', '<', '|', ',', '>', '/', '?', '#'];

fn default_index_prefix() -> String {
    "app_".to_string()
}

fn default_bulk_size() -> usize {
    1000
}

fn default_page_size() -> u64 {
    15
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            index_prefix: default_index_prefix(),
            soft_deletes: true,
            bulk_size: default_bulk_size(),
            default_settings: IndexDefaults::default(),
            refresh_policy: RefreshPolicy::default(),
            logging: LoggingConfig::default(),
            default_page_size: default_page_size(),
        }
    }
}

impl OdmConfig {
    /// Creates configuration from `ELASTIC_*` environment variables.
    ///
    /// Unset variables keep their defaults; an unparsable environment falls
    /// back to [`OdmConfig::default`].
    pub fn from_env() -> Self {
        EnvConfig::try_parse_from(["elastic-odm"])
            .map(Self::from)
            .unwrap_or_default()
    }

    /// Returns `name` with the index prefix applied once.
    pub fn prefixed_index(&self, name: &str) -> String {
        if self.index_prefix.is_empty() || name.starts_with(&self.index_prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.index_prefix, name)
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.connection.cloud_id.is_none() && self.connection.hosts.is_empty() {
            errors.push("At least one host or a cloud id is required".to_string());
        }

        if self.connection.request_timeout_ms == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.bulk_size == 0 {
            errors.push("Bulk size cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_settings.number_of_shards == 0 {
            errors.push("Number of shards cannot be 0".to_string());
        }

        if self
            .index_prefix
            .chars()
            .any(|c| c.is_ascii_uppercase() || INVALID_INDEX_CHARS.contains(&c))
        {
            errors.push(format!(
                "Index prefix '{}' contains characters not allowed in index names",
                self.index_prefix
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for tests.
    pub fn for_testing() -> Self {
        Self {
            connection: ConnectionConfig {
                retry_on_failure: false,
                max_retries: 0,
                request_timeout_ms: 5000,
                ..Default::default()
            },
            index_prefix: String::new(),
            refresh_policy: RefreshPolicy::True,
            logging: LoggingConfig {
                log_queries: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Environment-variable view of [`OdmConfig`].
#[derive(Debug, Clone, Parser)]
#[command(name = "elastic-odm")]
#[command(about = "Elasticsearch object-document mapper")]
struct EnvConfig {
    /// Node URLs.
    #[arg(
        long,
        env = "ELASTIC_HOSTS",
        value_delimiter = ',',
        default_value = "http://localhost:9200"
    )]
    hosts: Vec<String>,

    /// Basic auth username.
    #[arg(long, env = "ELASTIC_USERNAME")]
    username: Option<String>,

    /// Basic auth password.
    #[arg(long, env = "ELASTIC_PASSWORD")]
    password: Option<String>,

    /// Encoded API key.
    #[arg(long, env = "ELASTIC_API_KEY")]
    api_key: Option<String>,

    /// Elastic Cloud id.
    #[arg(long, env = "ELASTIC_CLOUD_ID")]
    cloud_id: Option<String>,

    /// Verify TLS certificates.
    #[arg(long, env = "ELASTIC_SSL_VERIFICATION", default_value_t = true, action = clap::ArgAction::Set)]
    ssl_verification: bool,

    /// Request timeout in milliseconds.
    #[arg(long, env = "ELASTIC_REQUEST_TIMEOUT_MS", default_value = "30000")]
    request_timeout_ms: u64,

    /// Retry transient failures.
    #[arg(long, env = "ELASTIC_RETRY_ON_FAILURE", default_value_t = true, action = clap::ArgAction::Set)]
    retry_on_failure: bool,

    /// Maximum retry attempts.
    #[arg(long, env = "ELASTIC_MAX_RETRIES", default_value = "3")]
    max_retries: u32,

    /// Prefix for every index name.
    #[arg(long, env = "ELASTIC_INDEX_PREFIX", default_value = "app_")]
    index_prefix: String,

    /// Filter out soft-deleted documents.
    #[arg(long, env = "ELASTIC_SOFT_DELETES", default_value_t = true, action = clap::ArgAction::Set)]
    soft_deletes: bool,

    /// Documents per bulk request.
    #[arg(long, env = "ELASTIC_BULK_SIZE", default_value = "1000")]
    bulk_size: usize,

    /// Refresh policy for writes (true, wait_for, false).
    #[arg(long, env = "ELASTIC_REFRESH_POLICY", default_value = "wait_for")]
    refresh_policy: String,

    /// Log compiled request bodies.
    #[arg(long, env = "ELASTIC_LOG_QUERIES", default_value_t = false, action = clap::ArgAction::Set)]
    log_queries: bool,

    /// Slow query warning threshold in milliseconds.
    #[arg(long, env = "ELASTIC_SLOW_QUERY_MS", default_value = "1000")]
    slow_query_threshold_ms: u64,
}

impl From<EnvConfig> for OdmConfig {
    fn from(env: EnvConfig) -> Self {
        let auth = match (env.api_key, env.username, env.password) {
            (Some(encoded), _, _) => Some(ElasticsearchAuth::ApiKey { encoded }),
            (None, Some(username), password) => Some(ElasticsearchAuth::Basic {
                username,
                password: password.unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            connection: ConnectionConfig {
                hosts: env.hosts,
                auth,
                cloud_id: env.cloud_id,
                disable_certificate_validation: !env.ssl_verification,
                request_timeout_ms: env.request_timeout_ms,
                retry_on_failure: env.retry_on_failure,
                max_retries: env.max_retries,
                retry_backoff_ms: default_retry_backoff_ms(),
            },
            index_prefix: env.index_prefix,
            soft_deletes: env.soft_deletes,
            bulk_size: env.bulk_size,
            default_settings: IndexDefaults::default(),
            refresh_policy: RefreshPolicy::parse(&env.refresh_policy).unwrap_or_default(),
            logging: LoggingConfig {
                log_queries: env.log_queries,
                slow_query_threshold_ms: env.slow_query_threshold_ms,
            },
            default_page_size: default_page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OdmConfig::default();
        assert_eq!(config.index_prefix, "app_");
        assert!(config.soft_deletes);
        assert_eq!(config.bulk_size, 1000);
        assert_eq!(config.default_settings.number_of_shards, 1);
        assert_eq!(config.default_settings.number_of_replicas, 0);
        assert_eq!(config.refresh_policy, RefreshPolicy::WaitFor);
        assert_eq!(config.logging.slow_query_threshold_ms, 1000);
        assert_eq!(config.connection.max_retries, 3);
        assert_eq!(config.connection.hosts, vec!["http://localhost:9200"]);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: OdmConfig = serde_json::from_value(serde_json::json!({
            "index_prefix": "shop_",
            "connection": { "hosts": ["https://es.internal:9200"] },
            "refresh_policy": "false"
        }))
        .unwrap();

        assert_eq!(config.index_prefix, "shop_");
        assert_eq!(config.connection.hosts, vec!["https://es.internal:9200"]);
        assert_eq!(config.connection.request_timeout_ms, 30000);
        assert_eq!(config.refresh_policy, RefreshPolicy::False);
        assert!(config.soft_deletes);
    }

    #[test]
    fn test_prefixed_index_applied_once() {
        let config = OdmConfig::default();
        assert_eq!(config.prefixed_index("users"), "app_users");
        assert_eq!(config.prefixed_index("app_users"), "app_users");

        let unprefixed = OdmConfig::for_testing();
        assert_eq!(unprefixed.prefixed_index("users"), "users");
    }

    #[test]
    fn test_validate() {
        assert!(OdmConfig::default().validate().is_ok());

        let config = OdmConfig {
            bulk_size: 0,
            index_prefix: "Bad Prefix".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_env_config_from_args() {
        let env = EnvConfig::try_parse_from([
            "elastic-odm",
            "--hosts",
            "http://a:9200,http://b:9200",
            "--api-key",
            "c2VjcmV0",
            "--soft-deletes",
            "false",
            "--refresh-policy",
            "true",
        ])
        .unwrap();
        let config = OdmConfig::from(env);

        assert_eq!(config.connection.hosts, vec!["http://a:9200", "http://b:9200"]);
        assert_eq!(
            config.connection.auth,
            Some(ElasticsearchAuth::ApiKey {
                encoded: "c2VjcmV0".to_string()
            })
        );
        assert!(!config.soft_deletes);
        assert_eq!(config.refresh_policy, RefreshPolicy::True);
    }

    #[test]
    fn test_refresh_policy_parse() {
        assert_eq!(RefreshPolicy::parse("WAIT_FOR"), Some(RefreshPolicy::WaitFor));
        assert_eq!(RefreshPolicy::parse("sometimes"), None);
    }
}
