use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for HerbTrace
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HerbTraceConfig {
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Label id generation for manufacturer assignments
    pub labels: LabelConfig,
    /// Content gateway used to render evidence links
    pub gateway: GatewayConfig,
    /// Bootstrap administrator account
    pub admin: AdminConfig,
    /// Database settings (optional, memory store when absent)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LabelConfig {
    /// Label prefix, e.g. `LBL` in `LBL-<batch>-1234`
    pub prefix: String,
    /// Number of random digits in the suffix
    pub digits: u32,
    /// Draws before giving up on finding an unused label
    pub max_attempts: u32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            prefix: "LBL".to_string(),
            digits: 4,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Public gateway base URL
    pub public_url: String,
    /// Local gateway base URL, used instead of the public one when `prefer_local` is set
    pub local_url: Option<String>,
    pub prefer_local: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            public_url: "https://ipfs.io/ipfs".to_string(),
            local_url: Some("http://127.0.0.1:8080/ipfs".to_string()),
            prefer_local: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdminConfig {
    pub actor_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
    /// Optimistic write attempts before reporting contention
    pub max_write_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://.herbtrace/herbtrace.db".to_string(),
            max_connections: 10,
            auto_migrate: true,
            max_write_attempts: 16,
        }
    }
}

impl Default for HerbTraceConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            labels: LabelConfig::default(),
            gateway: GatewayConfig::default(),
            admin: AdminConfig {
                actor_id: "admin".to_string(),
                display_name: "Administrator".to_string(),
            },
            database: None,
        }
    }
}

impl HerbTraceConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (herbtrace.toml, .herbtrace-rc)
    /// 3. Environment variables (prefixed with HERBTRACE_, sections split by `__`)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("herbtrace.toml").exists() {
            builder = builder.add_source(File::with_name("herbtrace"));
        }

        if Path::new(".herbtrace-rc").exists() {
            builder = builder.add_source(
                File::with_name(".herbtrace-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("HERBTRACE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let herbtrace_config: HerbTraceConfig = config.try_deserialize()?;
        herbtrace_config.validate()?;
        Ok(herbtrace_config)
    }

    /// Reject settings the lifecycle engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.labels.prefix.trim().is_empty() {
            anyhow::bail!("labels.prefix must not be empty");
        }
        if !(1..=9).contains(&self.labels.digits) {
            anyhow::bail!("labels.digits must be between 1 and 9, got {}", self.labels.digits);
        }
        if self.labels.max_attempts == 0 {
            anyhow::bail!("labels.max_attempts must be at least 1");
        }
        if let Some(db) = &self.database {
            if db.max_write_attempts == 0 {
                anyhow::bail!("database.max_write_attempts must be at least 1");
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<HerbTraceConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = HerbTraceConfig::load_env_file();
        HerbTraceConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static HerbTraceConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
