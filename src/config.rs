use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// One Redis replica the pool rotates over
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: u8,
    #[serde(default = "default_weight")]
    pub weight: u8,
    #[serde(default)]
    pub dialer: Option<DialerConfig>,
    #[serde(default)]
    pub worker: Option<WorkerConfig>,
    #[serde(default)]
    pub connection_pool: Option<ConnectionPoolConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct DialerConfig {
    #[serde(default = "default_dial_timeout_secs")]
    pub timeout_secs: u8,
    #[serde(default = "default_keep_alive_mins")]
    pub keep_alive_mins: u8,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dial_timeout_secs(),
            keep_alive_mins: default_keep_alive_mins(),
        }
    }
}

/// Settings for the background status worker
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_interval_ms")]
    pub interval_ms: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_worker_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_idle: u32,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_idle: 0,
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Upper bound for a single health probe
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    6379
}
fn default_weight() -> u8 {
    1
}
fn default_dial_timeout_secs() -> u8 {
    1
}
fn default_keep_alive_mins() -> u8 {
    5
}
fn default_worker_interval_ms() -> u16 {
    1000
}
fn default_max_connections() -> u32 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_max_lifetime_secs() -> u64 {
    3600
}
fn default_probe_timeout_ms() -> u64 {
    500
}

pub const MAX_DB: u8 = 15;
pub const WEIGHT_RANGE: (u8, u8) = (1, 10);
pub const DIAL_TIMEOUT_RANGE_SECS: (u8, u8) = (1, 10);
pub const KEEP_ALIVE_RANGE_MINS: (u8, u8) = (1, 10);
pub const WORKER_INTERVAL_RANGE_MS: (u16, u16) = (100, 60000);

/// Everything needed to dial one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub addr: String,
    pub username: String,
    pub password: String,
    pub db: u8,
    pub dial_timeout: Duration,
    pub keep_alive: Duration,
}

impl EndpointConfig {
    /// Endpoint at `host:port` with every other field at its default
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            db: 0,
            weight: default_weight(),
            dialer: None,
            worker: None,
            connection_pool: None,
        }
    }

    pub fn with_weight(mut self, weight: u8) -> Self {
        self.weight = weight;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn dialer_or_default(&self) -> DialerConfig {
        self.dialer.unwrap_or_default()
    }

    pub fn worker_or_default(&self) -> WorkerConfig {
        self.worker.unwrap_or_default()
    }

    pub fn connection_pool_or_default(&self) -> ConnectionPoolConfig {
        self.connection_pool.clone().unwrap_or_default()
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let dialer = self.dialer_or_default();
        ConnectOptions {
            addr: self.address(),
            username: self.username.clone(),
            password: self.password.clone(),
            db: self.db,
            dial_timeout: Duration::from_secs(dialer.timeout_secs as u64),
            keep_alive: Duration::from_secs(dialer.keep_alive_mins as u64 * 60),
        }
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let addr = self.address();
        if self.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "Endpoint host must not be empty".to_string(),
            ));
        }
        if self.db > MAX_DB {
            return Err(ConfigError::ValidationError(format!(
                "Endpoint '{}' db {} is out of range 0..={}",
                addr, self.db, MAX_DB
            )));
        }
        check_range(&addr, "weight", self.weight, WEIGHT_RANGE)?;
        if let Some(dialer) = &self.dialer {
            check_range(
                &addr,
                "dialer timeout_secs",
                dialer.timeout_secs,
                DIAL_TIMEOUT_RANGE_SECS,
            )?;
            check_range(
                &addr,
                "dialer keep_alive_mins",
                dialer.keep_alive_mins,
                KEEP_ALIVE_RANGE_MINS,
            )?;
        }
        if let Some(worker) = &self.worker {
            check_range(
                &addr,
                "worker interval_ms",
                worker.interval_ms,
                WORKER_INTERVAL_RANGE_MS,
            )?;
        }
        if let Some(pool) = &self.connection_pool {
            if pool.max_connections == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Endpoint '{}' connection_pool max_connections must be at least 1",
                    addr
                )));
            }
            if pool.min_idle > pool.max_connections {
                return Err(ConfigError::ValidationError(format!(
                    "Endpoint '{}' connection_pool min_idle {} exceeds max_connections {}",
                    addr, pool.min_idle, pool.max_connections
                )));
            }
        }
        Ok(())
    }
}

fn check_range<T>(addr: &str, field: &str, value: T, (min, max): (T, T)) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::ValidationError(format!(
            "Endpoint '{}' {} {} is out of range {}..={}",
            addr, field, value, min, max
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(path.to_string()))
            }
            Err(e) => return Err(ConfigError::IoError(e.to_string())),
        };

        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string (useful for testing)
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one endpoint must be configured".to_string(),
            ));
        }
        for endpoint in &self.endpoints {
            endpoint.validate()?;
        }
        if self.probe.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "probe timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Shortest worker interval across all endpoints
    pub fn status_interval(&self) -> Duration {
        let ms = self
            .endpoints
            .iter()
            .map(|e| e.worker_or_default().interval_ms)
            .min()
            .unwrap_or_else(default_worker_interval_ms);
        Duration::from_millis(ms as u64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
