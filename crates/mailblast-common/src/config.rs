//! Configuration for Mailblast

use crate::types::{ContentMode, SenderProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "MAILBLAST_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote campaign service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sender defaults for new campaigns
    #[serde(default)]
    pub defaults: SenderDefaults,
}

/// Remote campaign service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix of every endpoint
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Transport timeout in seconds. `0` waits indefinitely.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ServiceConfig {
    /// Full URL of an endpoint path such as `/send-emails`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            path
        )
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("mailblast/{}", env!("CARGO_PKG_VERSION"))
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Sender settings a fresh campaign starts from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderDefaults {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub use_ssl: bool,

    #[serde(default)]
    pub use_starttls: bool,

    #[serde(default)]
    pub html: bool,
}

impl Default for SenderDefaults {
    fn default() -> Self {
        Self {
            port: default_port(),
            use_ssl: true,
            use_starttls: false,
            html: false,
        }
    }
}

impl SenderDefaults {
    /// An empty sender profile carrying these defaults
    pub fn profile(&self) -> SenderProfile {
        SenderProfile {
            port: self.port,
            use_ssl: self.use_ssl,
            use_starttls: self.use_starttls,
            content_mode: if self.html {
                ContentMode::Html
            } else {
                ContentMode::Plain
            },
            ..SenderProfile::default()
        }
    }
}

fn default_port() -> u16 {
    465
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from `$MAILBLAST_CONFIG` or the default locations,
    /// falling back to built-in defaults
    pub fn load() -> crate::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let paths = [
            PathBuf::from("./mailblast.toml"),
            PathBuf::from("/etc/mailblast/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                debug!("Loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://localhost:5000");
        assert_eq!(config.service.timeout_secs, 300);
        assert_eq!(config.logging.format, "text");

        let profile = config.defaults.profile();
        assert_eq!(profile.port, 465);
        assert!(profile.use_ssl);
        assert!(!profile.use_starttls);
        assert!(profile.host.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[service]
base_url = "https://mail-tools.internal/"
timeout_secs = 60

[logging]
level = "debug"
format = "json"

[defaults]
port = 587
use_ssl = false
use_starttls = true
html = true
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.service.timeout_secs, 60);
        assert_eq!(config.service.api_prefix, "/api");
        assert_eq!(config.logging.level, "debug");

        let profile = config.defaults.profile();
        assert_eq!(profile.port, 587);
        assert!(profile.use_starttls);
        assert_eq!(profile.content_mode, ContentMode::Html);
    }

    #[test]
    fn test_endpoint_joins_prefix() {
        let service = ServiceConfig {
            base_url: "https://mail-tools.internal/".to_string(),
            ..ServiceConfig::default()
        };
        assert_eq!(
            service.endpoint("/send-emails"),
            "https://mail-tools.internal/api/send-emails"
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service]\nbase_url = \"http://10.0.0.5:5000\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.service.base_url, "http://10.0.0.5:5000");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service\nbase_url = ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
