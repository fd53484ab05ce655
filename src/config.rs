//! Configuration management for the toolset service.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolsetError};
use crate::ratelimit::{RouteRules, StoreFailurePolicy};

/// Prefix for environment variable overrides, e.g. `TOOLSET_SERVER__BIND_ADDR`.
pub const ENV_PREFIX: &str = "TOOLSET";

/// Main configuration for the toolset service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsetConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// SEO override configuration
    #[serde(default)]
    pub seo: SeoConfig,

    /// Administrative endpoints
    #[serde(default)]
    pub admin: AdminConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Directory holding the rendered tool pages
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            pages_dir: default_pages_dir(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("pages")
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Redis URL for a shared counter store; in-process counters when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Behaviour when the counter store fails
    #[serde(default)]
    pub failure_policy: StoreFailurePolicy,

    /// How often expired in-process counters are dropped
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// Fixed client address used instead of the real one (local debugging)
    #[serde(default)]
    pub debug_remote_ip: Option<String>,

    /// Per-route rate limits
    #[serde(default)]
    pub routes: RouteRules,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            failure_policy: StoreFailurePolicy::default(),
            purge_interval_secs: default_purge_interval(),
            debug_remote_ip: None,
            routes: RouteRules::default(),
        }
    }
}

fn default_purge_interval() -> u64 {
    60
}

/// SEO override configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoConfig {
    /// YAML file holding override records; in-memory only when unset
    #[serde(default)]
    pub overrides_path: Option<PathBuf>,

    /// Largest HTML body that will be buffered for rewriting
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            overrides_path: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Administrative endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for the SEO admin endpoints; disabled when unset
    #[serde(default)]
    pub token: Option<String>,
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,

    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl ToolsetConfig {
    /// Load configuration from an optional YAML file, then apply
    /// `TOOLSET_*` environment overrides (`__` separates sections).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ToolsetError::Config(e.to_string()))
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ToolsetError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_defaults() {
        let config = ToolsetConfig::default();
        assert_eq!(config.server.bind_addr.port(), 8000);
        assert_eq!(config.rate_limiting.failure_policy, StoreFailurePolicy::FirstHit);
        assert!(config.rate_limiting.routes.is_empty());
        assert!(config.admin.token.is_none());
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
server:
  bind_addr: "0.0.0.0:9000"
  pages_dir: /srv/toolset/pages
rate_limiting:
  failure_policy: reject
  routes:
    - path: /email-headers/
      rate: 100/d
    - path: /ip-lookup/
      rate: 5/m
seo:
  overrides_path: /srv/toolset/seo.yaml
admin:
  token: s3cret
"#;
        let config = ToolsetConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_addr.port(), 9000);
        assert_eq!(config.rate_limiting.failure_policy, StoreFailurePolicy::Reject);
        assert_eq!(config.rate_limiting.routes.len(), 2);
        assert_eq!(
            config.rate_limiting.routes.find("/ip-lookup/").unwrap().limit(),
            5
        );
        assert_eq!(config.seo.max_body_bytes, 2 * 1024 * 1024);
        assert_eq!(config.admin.token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_invalid_route_rate_is_config_error() {
        let yaml = "rate_limiting:\n  routes:\n    - path: /x/\n      rate: 5/fortnight\n";
        assert!(matches!(
            ToolsetConfig::from_yaml(yaml),
            Err(ToolsetError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolset.yaml");
        std::fs::write(&path, "logging:\n  json: true\n").unwrap();

        let config = assert_ok!(ToolsetConfig::load(Some(&path)));
        assert!(config.logging.json);
        assert_eq!(config.server.pages_dir, PathBuf::from("pages"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ToolsetConfig::load(Some(&dir.path().join("absent.yaml"))).is_err());
    }
}
