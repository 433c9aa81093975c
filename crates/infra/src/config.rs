//! Configuration loading and representation.
//!
//! Sources, later ones overriding earlier ones:
//! 1. `.env` in the working directory (loaded into the process environment)
//! 2. `config.yaml` in the working directory, if present
//! 3. the file named by the `path` argument or `CATALOG_CONFIG`
//! 4. `CATALOG__<SECTION>__<KEY>` environment variables
//! 5. the short overrides `HTTP_ADDRESS`, `SQS_URL`, `SQS_REGION`, `DATABASE_URL`

use std::time::Duration;

use ::config::{Config as ConfigLib, ConfigBuilder, Environment, File, FileFormat};
use ::config::builder::DefaultState;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use structopt::StructOpt;
use thiserror::Error;

use crate::consumer::ConsumerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config";
pub const CONFIG_ENV_VAR: &str = "CATALOG_CONFIG";
pub const CONFIG_ENV_PREFIX: &str = "CATALOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub listen_address: String,
    /// Upper bound on the graceful shutdown wait.
    pub graceful_timeout_ms: u64,
    pub body_limit_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_owned(),
            graceful_timeout_ms: 10_000,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl HttpSettings {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }

    fn check(&self, problems: &mut Vec<String>) {
        if self.listen_address.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!("http.listen_address {:?} is not a socket address", self.listen_address));
        }
        if self.body_limit_bytes == 0 {
            problems.push("http.body_limit_bytes must be positive".to_owned());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub queue_url: String,
    pub region: String,
    /// Overrides the endpoint derived from `queue_url`.
    pub endpoint_url: Option<String>,
    pub max_messages: u32,
    pub wait_time_seconds: u64,
    pub retry_delay_ms: u64,
    pub handler_timeout_ms: u64,
    pub delete_timeout_ms: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            region: "us-east-1".to_owned(),
            endpoint_url: None,
            max_messages: 10,
            wait_time_seconds: 20,
            retry_delay_ms: 5_000,
            handler_timeout_ms: 30_000,
            delete_timeout_ms: 10_000,
        }
    }
}

impl BrokerSettings {
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig::default()
            .with_max_messages(self.max_messages)
            .with_wait_time(Duration::from_secs(self.wait_time_seconds))
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_handler_timeout(Duration::from_millis(self.handler_timeout_ms))
            .with_delete_timeout(Duration::from_millis(self.delete_timeout_ms))
    }

    fn check(&self, problems: &mut Vec<String>) {
        if self.queue_url.trim().is_empty() {
            problems.push("broker.queue_url is required".to_owned());
        }
        if self.region.trim().is_empty() {
            problems.push("broker.region is required".to_owned());
        }
        if !(1..=10).contains(&self.max_messages) {
            problems.push("broker.max_messages must be between 1 and 10".to_owned());
        }
        if self.wait_time_seconds > 20 {
            problems.push("broker.wait_time_seconds must be at most 20".to_owned());
        }
        for (name, value) in [
            ("broker.retry_delay_ms", self.retry_delay_ms),
            ("broker.handler_timeout_ms", self.handler_timeout_ms),
            ("broker.delete_timeout_ms", self.delete_timeout_ms),
        ] {
            if value == 0 {
                problems.push(format!("{name} must be positive"));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostgresSettings {
    pub dsn: String,
    pub max_connections: u32,
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
    pub acquire_timeout_ms: u64,
    pub auto_migrate: bool,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 10,
            connect_retries: 5,
            retry_delay_ms: 2_000,
            acquire_timeout_ms: 5_000,
            auto_migrate: true,
        }
    }
}

impl PostgresSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    fn check(&self, problems: &mut Vec<String>) {
        if self.dsn.trim().is_empty() {
            problems.push("postgres.dsn is required".to_owned());
        }
        if self.max_connections == 0 {
            problems.push("postgres.max_connections must be positive".to_owned());
        }
    }
}

/// A service's full configuration.
pub trait ServiceSettings: DeserializeOwned {
    fn validate(&self) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductsServiceConfig {
    pub http: HttpSettings,
    pub broker: BrokerSettings,
    pub postgres: PostgresSettings,
}

impl ServiceSettings for ProductsServiceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        self.http.check(&mut problems);
        self.broker.check(&mut problems);
        self.postgres.check(&mut problems);
        into_result(problems)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationsServiceConfig {
    pub http: HttpSettings,
    pub broker: BrokerSettings,
}

impl ServiceSettings for NotificationsServiceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        self.http.check(&mut problems);
        self.broker.check(&mut problems);
        into_result(problems)
    }
}

fn into_result(problems: Vec<String>) -> Result<(), ConfigError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}

/// Load and validate a service configuration from files and environment.
pub fn load<T: ServiceSettings>(path: Option<&str>) -> Result<T, ConfigError> {
    let _ = dotenvy::dotenv();

    let mut builder = ConfigLib::builder()
        .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

    if let Some(config_path) = path {
        builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
    } else if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
        builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
    }

    let builder = builder.add_source(
        Environment::with_prefix(CONFIG_ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    finish(with_short_overrides(builder)?)
}

/// Command line shared by both services.
#[derive(Debug, Clone, Default, StructOpt)]
pub struct CliOptions {
    /// YAML configuration file layered over `config.yaml`
    #[structopt(short = "c", long = "config", env = "CATALOG_CONFIG")]
    pub config: Option<String>,
}

/// Load and validate a configuration from a YAML string only.
pub fn from_yaml_str<T: ServiceSettings>(yaml: &str) -> Result<T, ConfigError> {
    finish(ConfigLib::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
}

fn with_short_overrides(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    Ok(builder
        .set_override_option("http.listen_address", env("HTTP_ADDRESS"))?
        .set_override_option("broker.queue_url", env("SQS_URL"))?
        .set_override_option("broker.region", env("SQS_REGION"))?
        .set_override_option("postgres.dsn", env("DATABASE_URL"))?)
}

fn finish<T: ServiceSettings>(builder: ConfigBuilder<DefaultState>) -> Result<T, ConfigError> {
    let settings: T = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
