//! Server configuration.
//!
//! Configuration is layered:
//! - Built-in defaults
//! - TOML file (`SOCKROUTE_CONFIG`, or the first of the default paths)
//! - Environment variables (`SOCKROUTE_*`, `__` separates sections)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
const ENV_PREFIX: &str = "SOCKROUTE";

/// Environment variable naming an explicit config file.
const CONFIG_PATH_VAR: &str = "SOCKROUTE_CONFIG";

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "sockroute.toml",
    "/etc/sockroute/sockroute.toml",
    "~/.config/sockroute/sockroute.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Close a connection after this long without inbound traffic.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_idle_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl HeartbeatConfig {
    /// The idle timeout as a duration.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Config {
    /// Load configuration from the first config file found, with environment
    /// overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// an environment override has the wrong type.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::locate())
    }

    /// Find the config file to use, if any.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(shellexpand::tilde(&path).as_ref()));
        }

        DEFAULT_CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let base = match &path {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&base).context("Failed to stage configuration")?)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load configuration from a specific file, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.transport.websocket_path, "/ws");
        assert_eq!(config.limits.max_message_size, 64 * 1024);
        assert_eq!(config.heartbeat.idle_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_config_bind_addr() {
        let config = Config::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 8080);

        let bad = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [limits]
            max_connections = 50000

            [heartbeat]
            idle_timeout_ms = 5000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits.max_connections, 50000);
        assert_eq!(config.limits.max_message_size, 64 * 1024);
        assert_eq!(config.heartbeat.idle_timeout_ms, 5000);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_config_from_file() {
        let path = std::env::temp_dir().join(format!("sockroute-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "port = 7000\n[transport]\nwebsocket_path = \"/socket\"\n[metrics]\nenabled = false\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.transport.websocket_path, "/socket");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::from_file("/nonexistent/sockroute.toml").is_err());
        assert!(Config::load_from(Some("/nonexistent/sockroute.toml".into())).is_err());
    }

    #[test]
    fn test_load_from_layers_file_over_defaults() {
        let path =
            std::env::temp_dir().join(format!("sockroute-layered-{}.toml", std::process::id()));
        std::fs::write(&path, "port = 7100\n[limits]\nmax_connections = 3\n").unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.port, 7100);
        assert_eq!(config.limits.max_connections, 3);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.transport.websocket_path, "/ws");
    }
}
