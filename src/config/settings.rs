use std::collections::HashMap;
use std::env;
use std::fmt;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub run_mode: RunMode,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

/// Deployment mode, taken from `RUN_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => RunMode::Production,
            _ => RunMode::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        *self == RunMode::Production
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(RunMode::parse(&raw))
    }
}

/// When transport encryption is forced on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Always force `sslmode=require`, whatever the URL says
    #[default]
    Always,
    /// Force `sslmode=require` in production only; otherwise honour the URL
    ByEnvironment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string (`DATABASE_URL`)
    #[serde(default)]
    pub url: Option<String>,
    /// Refuse to start without a connection string
    #[serde(default = "default_require_url")]
    pub require_url: bool,
    #[serde(default)]
    pub tls: TlsPolicy,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Seconds to wait for a connection from the pool
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    /// Seconds before an idle connection is closed
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

fn default_require_url() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    30
}

fn default_idle_timeout() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    /// Schema searched for base tables
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_required_tables")]
    pub required_tables: Vec<String>,
    /// Table used for the insert/delete write check
    #[serde(default = "default_write_check_table")]
    pub write_check_table: String,
    /// Treat missing tables as a failure
    #[serde(default)]
    pub strict: bool,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_required_tables() -> Vec<String> {
    vec![
        "users".to_string(),
        "transactions".to_string(),
        "budgets".to_string(),
    ]
}

fn default_write_check_table() -> String {
    "users".to_string()
}

impl Settings {
    /// Load settings from `.env`, config files and the process environment.
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        Self::from_env(env::vars().collect())
    }

    /// Load settings from config files and the given variables only.
    pub fn from_env(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let run_mode = vars
            .get("RUN_MODE")
            .map(|m| RunMode::parse(m))
            .unwrap_or_default();

        // An empty DATABASE_URL counts as unset
        let database_url = vars
            .get("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let builder = Config::builder()
            // Start with default values
            .set_default("run_mode", run_mode.as_str())?
            .set_default("database.require_url", true)?
            .set_default("database.tls", "always")?
            .set_default("database.pool_size", 10)?
            .set_default("database.connect_timeout_seconds", 30)?
            .set_default("database.idle_timeout_seconds", 10)?
            .set_default("verify.schema", "public")?
            .set_default("verify.required_tables", default_required_tables())?
            .set_default("verify.write_check_table", "users")?
            .set_default("verify.strict", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // DBCHECK_DATABASE__POOL_SIZE, DBCHECK_VERIFY__STRICT, etc.
            .add_source(
                Environment::with_prefix("DBCHECK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("verify.required_tables")
                    .source(Some(vars)),
            )
            .set_override("run_mode", run_mode.as_str())?
            .set_override_option("database.url", database_url)?;

        builder.build()?.try_deserialize()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            require_url: default_require_url(),
            tls: TlsPolicy::default(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            required_tables: default_required_tables(),
            write_check_table: default_write_check_table(),
            strict: false,
        }
    }
}
