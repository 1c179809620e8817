use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub neo4j: Neo4jConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the process-model database
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jConfig {
    pub user: String,
    /// Plain password. Ignored when `password_env` names a set variable.
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password (may come from `.env`)
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default = "default_neo4j_host")]
    pub host: String,
    #[serde(default = "default_neo4j_port")]
    pub port: u16,
    /// Database name; the server default database when unset
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_neo4j_host() -> String {
    "127.0.0.1".to_string()
}

fn default_neo4j_port() -> u16 {
    7687
}

fn default_max_connections() -> usize {
    16
}

fn default_http_host() -> String {
    "localhost".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in PROCGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("PROCGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Settings are checked for presence only; reachability is left to the driver.
    fn validate(&self) -> Result<()> {
        if self.neo4j.user.trim().is_empty() {
            anyhow::bail!("neo4j.user must not be empty");
        }

        if self.neo4j.host.trim().is_empty() {
            anyhow::bail!("neo4j.host must not be empty");
        }

        if self.neo4j.port == 0 {
            anyhow::bail!("neo4j.port must be greater than 0");
        }

        if self.neo4j.max_connections == 0 {
            anyhow::bail!("neo4j.max_connections must be greater than 0");
        }

        self.neo4j.resolve_password()?;

        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_server.host, self.http_server.port)
    }
}

impl Neo4jConfig {
    /// Bolt URI built from host and port
    pub fn uri(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }

    /// Password from `password_env` if that variable is set, else the inline value
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(var) = &self.password_env {
            if let Ok(value) = std::env::var(var) {
                return Ok(value);
            }
        }
        match &self.password {
            Some(password) => Ok(password.clone()),
            None => match &self.password_env {
                Some(var) => anyhow::bail!(
                    "Environment variable {} not set. Set it in your .env file or set neo4j.password in config.toml.",
                    var
                ),
                None => anyhow::bail!("neo4j.password or neo4j.password_env must be set"),
            },
        }
    }
}
