use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    /// Path to the warehouse database file.
    pub database: String,
    /// Upper bound on a single connect-and-execute round trip, in seconds.
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "azure" or "ollama"
    /// Deployment name (azure) or model name (ollama).
    pub deployment: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub warehouse: WarehouseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the warehouse database file
    #[arg(long)]
    pub database: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .set_default("warehouse.database", "warehouse.duckdb")?
            .set_default("warehouse.connect_timeout_secs", 30i64)?
            .set_default("web.host", "0.0.0.0")?
            .set_default("web.port", 8001i64)?
            .set_default("llm.backend", "azure")?
            .set_default("llm.deployment", "gpt-4o")?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/fabric-analytics/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Environment variables win over file values, e.g.
        // FABRIC__LLM__API_KEY, FABRIC__WAREHOUSE__DATABASE
        config_builder =
            config_builder.add_source(Environment::with_prefix("FABRIC").separator("__"));

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.warehouse.database = database.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            warehouse: WarehouseConfig {
                database: "warehouse.duckdb".to_string(),
                connect_timeout_secs: 30,
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8001,
            },
            llm: LlmConfig {
                backend: "azure".to_string(),
                deployment: "gpt-4o".to_string(),
                api_key: None,
                api_url: None,
                api_version: None,
            },
        }
    }
}
