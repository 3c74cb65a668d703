use anyhow::Context;
use clover_egress::ForwarderConfig;
use clover_ingress::AdminCredentials;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `memory`, `sqlite://...` or `postgres://...`
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub forwarder: ForwarderConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// No password means the admin routes are open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_false")]
    pub log_sql_queries: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            admin: AdminConfig::default(),
            forwarder: ForwarderConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_sql_queries: false,
        }
    }
}

impl AdminConfig {
    /// Credentials for the basic-auth gate, if a password is configured
    pub fn credentials(&self) -> Option<AdminCredentials> {
        self.password
            .as_ref()
            .filter(|password| !password.is_empty())
            .map(|password| AdminCredentials::new(self.username.clone(), password.clone()))
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CLOVER_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("CLOVER_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => eprintln!("Warning: Invalid CLOVER_PORT '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("CLOVER_DATABASE_URL") {
            self.database_url = val;
        }

        if let Ok(val) = std::env::var("CLOVER_ADMIN_USERNAME") {
            self.admin.username = val;
        }

        if let Ok(val) = std::env::var("CLOVER_ADMIN_PASSWORD") {
            self.admin.password = Some(val);
        }

        if let Ok(val) = std::env::var("CLOVER_LOG_LEVEL") {
            self.logging.level = val;
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_database_url() -> String {
    "sqlite://clover.db".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_ttl_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
