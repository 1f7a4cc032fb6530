//! Configuration file support for pollerd
//!
//! Loads and validates the daemon configuration from TOML.
//! Default location: /etc/pollerd/pollerd.toml

use crate::error::ConfigError;
use poller_snmp::SessionOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pollerd/pollerd.toml";

/// SNMP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnmpConfig {
    /// Agent UDP port
    #[serde(default = "default_snmp_port")]
    pub port: u16,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_snmp_timeout")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_snmp_retries")]
    pub retries: u32,

    /// Double the timeout on every retry
    #[serde(default = "default_true")]
    pub exponential_timeout: bool,
}

/// Schema module search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Directories searched for `<MODULE>.yaml`
    #[serde(default = "default_schema_paths")]
    pub paths: Vec<PathBuf>,

    /// Modules loaded at startup (imports follow automatically)
    #[serde(default = "default_schema_modules")]
    pub modules: Vec<String>,
}

/// Credentials per target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_community")]
    pub default_community: String,

    /// Community overrides keyed by target
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    #[default]
    Redis,
    Stdin,
}

/// Work queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub kind: QueueKind,

    /// Redis connection URL
    #[serde(default = "default_queue_url")]
    pub url: String,

    /// Queue (list) name
    #[serde(default = "default_queue_name")]
    pub name: String,
}

/// Backoff applied before a failed order is handed back to the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_base")]
    pub base_delay_ms: u64,

    /// Upper bound of the random delay added to the base
    #[serde(default = "default_retry_jitter")]
    pub jitter_ms: u64,
}

/// Where result records go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// JSON lines on stdout
    Stdout,
    /// JSON lines appended to a file
    File { path: PathBuf },
    /// JSON POST per record
    Http {
        url: String,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
}

/// Complete pollerd configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub debug: bool,

    /// Index maps older than this are rebuilt
    #[serde(default = "default_max_map_age")]
    pub max_map_age_secs: u64,

    #[serde(default)]
    pub snmp: SnmpConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Required
    #[serde(default)]
    pub sink: Option<SinkConfig>,
}

fn default_workers() -> usize {
    5
}

fn default_max_map_age() -> u64 {
    3600
}

fn default_snmp_port() -> u16 {
    poller_snmp::DEFAULT_PORT
}

fn default_snmp_timeout() -> u64 {
    3000
}

fn default_snmp_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_schema_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("/usr/share/pollerd/schema")]
}

fn default_schema_modules() -> Vec<String> {
    ["SNMPv2-MIB", "IF-MIB", "ENTITY-MIB"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_community() -> String {
    "public".to_string()
}

fn default_queue_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_queue_name() -> String {
    "pollerd".to_string()
}

fn default_retry_base() -> u64 {
    1000
}

fn default_retry_jitter() -> u64 {
    9000
}

fn default_http_timeout() -> u64 {
    10
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            port: default_snmp_port(),
            timeout_ms: default_snmp_timeout(),
            retries: default_snmp_retries(),
            exponential_timeout: default_true(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            paths: default_schema_paths(),
            modules: default_schema_modules(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            default_community: default_community(),
            hosts: BTreeMap::new(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kind: QueueKind::default(),
            url: default_queue_url(),
            name: default_queue_name(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_retry_base(),
            jitter_ms: default_retry_jitter(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            debug: false,
            max_map_age_secs: default_max_map_age(),
            snmp: SnmpConfig::default(),
            schema: SchemaConfig::default(),
            inventory: InventoryConfig::default(),
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            sink: None,
        }
    }
}

impl SnmpConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            port: self.port,
            timeout: Duration::from_millis(self.timeout_ms),
            retries: self.retries,
            exponential_timeout: self.exponential_timeout,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

impl PollerConfig {
    /// Loads configuration from `path`; a missing file yields defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Checks ranges and required sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        if self.snmp.timeout_ms == 0 {
            return Err(ConfigError::invalid("snmp.timeout_ms", "must be > 0"));
        }
        if self.schema.modules.is_empty() {
            return Err(ConfigError::invalid("schema.modules", "no modules configured"));
        }
        if self.inventory.default_community.is_empty() {
            return Err(ConfigError::invalid(
                "inventory.default_community",
                "must not be empty",
            ));
        }
        match &self.sink {
            None => return Err(ConfigError::invalid("sink", "no sink configured")),
            Some(SinkConfig::Http { url, .. }) if url.is_empty() => {
                return Err(ConfigError::invalid("sink.url", "must not be empty"))
            }
            Some(SinkConfig::Http { timeout_secs: 0, .. }) => {
                return Err(ConfigError::invalid("sink.timeout_secs", "must be > 0"))
            }
            _ => {}
        }
        if self.queue.kind == QueueKind::Redis && self.queue.name.is_empty() {
            return Err(ConfigError::invalid("queue.name", "must not be empty"));
        }
        Ok(())
    }

    pub fn max_map_age(&self) -> Duration {
        Duration::from_secs(self.max_map_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_map_age(), Duration::from_secs(3600));
        assert_eq!(config.snmp.port, 161);
        assert_eq!(config.inventory.default_community, "public");
        assert_eq!(config.queue.kind, QueueKind::Redis);
        assert_eq!(config.retry.base_delay(), Duration::from_secs(1));
        assert_eq!(config.retry.jitter(), Duration::from_secs(9));
        assert!(config.sink.is_none());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml = r#"
workers = 16
debug = true
max_map_age_secs = 600

[snmp]
timeout_ms = 1500
retries = 3

[schema]
paths = ["/opt/schema"]
modules = ["IF-MIB"]

[inventory]
default_community = "secret"

[inventory.hosts]
"10.0.0.1" = "router-ro"

[queue]
kind = "stdin"

[sink]
kind = "http"
url = "http://collector:8080/api/v1/metrics"
"#;
        let config = PollerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.workers, 16);
        assert!(config.debug);
        assert_eq!(config.max_map_age_secs, 600);
        assert_eq!(config.snmp.timeout_ms, 1500);
        assert_eq!(config.snmp.port, 161);
        assert_eq!(config.schema.paths, vec![PathBuf::from("/opt/schema")]);
        assert_eq!(config.inventory.hosts.get("10.0.0.1").unwrap(), "router-ro");
        assert_eq!(config.queue.kind, QueueKind::Stdin);
        assert_eq!(config.queue.name, "pollerd");
        assert_eq!(
            config.sink,
            Some(SinkConfig::Http {
                url: "http://collector:8080/api/v1/metrics".to_string(),
                timeout_secs: 10,
            })
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_session_options() {
        let config = PollerConfig::from_toml_str("[snmp]\nport = 1161\nexponential_timeout = false\n")
            .unwrap();
        let options = config.snmp.session_options();
        assert_eq!(options.port, 1161);
        assert_eq!(options.timeout, Duration::from_secs(3));
        assert_eq!(options.retries, 1);
        assert!(!options.exponential_timeout);
    }

    #[test]
    fn test_missing_sink_is_invalid() {
        let config = PollerConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "sink"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = PollerConfig {
            sink: Some(SinkConfig::Stdout),
            ..PollerConfig::default()
        };
        config.validate().unwrap();

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 1;
        config.snmp.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = PollerConfig::load_or_default("/nonexistent/pollerd.toml").unwrap();
        assert_eq!(config, PollerConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "workers = 2\n[sink]\nkind = \"file\"\npath = \"/var/log/pollerd.jsonl\"").unwrap();
        let config = PollerConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(
            config.sink,
            Some(SinkConfig::File {
                path: PathBuf::from("/var/log/pollerd.jsonl")
            })
        );
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "workers = \"many\"").unwrap();
        let err = PollerConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_shipped_config() {
        let config =
            PollerConfig::from_toml_str(include_str!("../../../config/pollerd.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.inventory.hosts.get("192.0.2.1").map(String::as_str), Some("s3cret"));
        assert!(matches!(config.sink, Some(SinkConfig::Http { timeout_secs: 10, .. })));
    }
}
