//! Configuration loading for mtpanel.
//!
//! Configuration is loaded from a TOML file (default: `panel.toml`). Every
//! section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest accepted cleanup interval in seconds.
pub const MIN_CLEANUP_INTERVAL_SECS: u64 = 15;

/// Lowest accepted public IP refresh interval in seconds.
pub const MIN_PUBLIC_IP_REFRESH_SECS: u64 = 60;

/// Root configuration for mtpanel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Persisted state configuration.
    pub storage: StorageConfig,
    /// Relay secret and share link configuration.
    pub proxy: ProxyConfig,
    /// External reload configuration.
    pub reload: ReloadConfig,
    /// Cleanup task configuration.
    pub cleanup: CleanupConfig,
    /// Public IP lookup configuration.
    pub public_ip: PublicIpConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API (default: 0.0.0.0:3000).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Bearer token required on `/api/*` routes.
    pub admin_token: Option<String>,
}

/// Persisted state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `clients.json` and `state.json` (default: data).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Relay secret and share link configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Generated relay configuration artifact.
    #[serde(default = "default_secrets_file")]
    pub secrets_file: PathBuf,
    /// Maximum number of secrets written to the relay (default: 16).
    #[serde(default = "default_max_secrets")]
    pub max_secrets: usize,
    /// Disguise host for fake-TLS credentials created without one.
    #[serde(default = "default_fake_tls_host")]
    pub default_fake_tls_host: String,
    /// Public hostname used in share links (default: detected public IP).
    pub public_host: Option<String>,
    /// Public port used in share links (default: 3443).
    #[serde(default = "default_public_port")]
    pub public_port: u16,
}

/// External reload configuration.
///
/// The reload runs `<program> compose -p <project> -f <compose_file> up -d
/// --force-recreate <service>` inside `stack_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadConfig {
    /// Run the reload after writing the artifact (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Container CLI (default: docker).
    #[serde(default = "default_program")]
    pub program: String,
    /// Working directory of the reload command.
    #[serde(default = "default_stack_dir")]
    pub stack_dir: PathBuf,
    /// Compose file passed with `-f`.
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    /// Compose project name passed with `-p`.
    #[serde(default = "default_project")]
    pub project: String,
    /// Relay service to recreate.
    #[serde(default = "default_service")]
    pub service: String,
    /// Reload timeout in seconds (default: 120).
    #[serde(default = "default_reload_timeout")]
    pub timeout_secs: u64,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 60, floor: 15).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Public IP lookup configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicIpConfig {
    /// Enable lookups (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Refresh interval in seconds (default: 900, floor: 60).
    #[serde(default = "default_public_ip_refresh")]
    pub refresh_secs: u64,
    /// Per-provider request timeout in seconds (default: 5).
    #[serde(default = "default_public_ip_timeout")]
    pub request_timeout_secs: u64,
    /// Providers in priority order.
    #[serde(default = "default_ip_providers")]
    pub providers: Vec<IpProviderConfig>,
}

/// One public IP lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IpProviderConfig {
    /// Endpoint URL.
    pub url: String,
    /// Response body format.
    #[serde(default)]
    pub format: IpResponseFormat,
}

/// How a provider returns the address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpResponseFormat {
    /// `{"ip": "..."}`
    Json,
    /// The address as the whole body.
    #[default]
    Text,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_secrets_file() -> PathBuf {
    PathBuf::from("/opt/stack/proxy/mtproxy.env")
}

fn default_max_secrets() -> usize {
    16
}

fn default_fake_tls_host() -> String {
    "google.com".to_string()
}

fn default_public_port() -> u16 {
    3443
}

fn default_true() -> bool {
    true
}

fn default_program() -> String {
    "docker".to_string()
}

fn default_stack_dir() -> PathBuf {
    PathBuf::from("/opt/stack")
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("/opt/stack/docker-compose.yml")
}

fn default_project() -> String {
    "mtprotouipanel".to_string()
}

fn default_service() -> String {
    "mtproxy".to_string()
}

fn default_reload_timeout() -> u64 {
    120
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_public_ip_refresh() -> u64 {
    900 // 15 minutes
}

fn default_public_ip_timeout() -> u64 {
    5
}

fn default_ip_providers() -> Vec<IpProviderConfig> {
    vec![
        IpProviderConfig {
            url: "https://api.ipify.org?format=json".to_string(),
            format: IpResponseFormat::Json,
        },
        IpProviderConfig {
            url: "https://ifconfig.me/ip".to_string(),
            format: IpResponseFormat::Text,
        },
        IpProviderConfig {
            url: "https://icanhazip.com".to_string(),
            format: IpResponseFormat::Text,
        },
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            admin_token: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            secrets_file: default_secrets_file(),
            max_secrets: default_max_secrets(),
            default_fake_tls_host: default_fake_tls_host(),
            public_host: None,
            public_port: default_public_port(),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_program(),
            stack_dir: default_stack_dir(),
            compose_file: default_compose_file(),
            project: default_project(),
            service: default_service(),
            timeout_secs: default_reload_timeout(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: true,
        }
    }
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_secs: default_public_ip_refresh(),
            request_timeout_secs: default_public_ip_timeout(),
            providers: default_ip_providers(),
        }
    }
}

impl StorageConfig {
    /// Path of the persisted client collection.
    pub fn clients_file(&self) -> PathBuf {
        self.data_dir.join("clients.json")
    }

    /// Path of the persisted process state.
    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

impl ProxyConfig {
    /// Secret cap with a floor of one.
    pub fn effective_max_secrets(&self) -> usize {
        self.max_secrets.max(1)
    }

    /// Configured public host, ignoring blank values.
    pub fn public_host(&self) -> Option<&str> {
        self.public_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

impl ReloadConfig {
    /// Reload timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CleanupConfig {
    /// Cleanup interval with the minimum floor applied.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_CLEANUP_INTERVAL_SECS))
    }
}

impl PublicIpConfig {
    /// Refresh interval with the minimum floor applied.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(MIN_PUBLIC_IP_REFRESH_SECS))
    }

    /// Per-provider request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
