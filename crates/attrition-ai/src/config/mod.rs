use crate::scoring::{ExplanationPolicy, RecordLimit, ScoringMode};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub artifacts: ArtifactConfig,
    pub explanation: ExplanationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "8000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");
        let log_format = LogFormat::from_str(&var_or("APP_LOG_FORMAT", "compact"));

        let artifacts = ArtifactConfig {
            model_path: PathBuf::from(var_or("APP_MODEL_PATH", "models/model.json")),
            pipeline_path: PathBuf::from(var_or("APP_PIPELINE_PATH", "models/pipeline.json")),
            dataset_path: PathBuf::from(var_or("APP_DATASET_PATH", "employee.csv")),
        };

        let top_k_features = parse_count("APP_TOP_FEATURES", &var_or("APP_TOP_FEATURES", "5"))?;
        let raw_records = var_or("APP_TOP_RECORDS", "5");
        let top_n_records =
            raw_records
                .parse::<RecordLimit>()
                .map_err(|_| ConfigError::InvalidCount {
                    var: "APP_TOP_RECORDS",
                    value: raw_records.clone(),
                })?;
        if top_n_records == RecordLimit::Top(0) {
            return Err(ConfigError::InvalidCount {
                var: "APP_TOP_RECORDS",
                value: raw_records,
            });
        }

        let explanation = ExplanationConfig {
            top_k_features,
            top_n_records,
            batch_zero_filter: parse_flag(
                "APP_BATCH_ZERO_FILTER",
                &var_or("APP_BATCH_ZERO_FILTER", "false"),
            )?,
            on_demand_zero_filter: parse_flag(
                "APP_PREDICT_ZERO_FILTER",
                &var_or("APP_PREDICT_ZERO_FILTER", "true"),
            )?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            artifacts,
            explanation,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_count(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidCount {
            var,
            value: raw.to_string(),
        }),
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: raw.to_string(),
        }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Output shape for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Locations of the serialized model, preprocessing pipeline, and startup dataset.
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub model_path: PathBuf,
    pub pipeline_path: PathBuf,
    pub dataset_path: PathBuf,
}

/// Default explanation sizes and the zero-value filter policy per scoring mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationConfig {
    pub top_k_features: usize,
    pub top_n_records: RecordLimit,
    pub batch_zero_filter: bool,
    pub on_demand_zero_filter: bool,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            top_k_features: 5,
            top_n_records: RecordLimit::Top(5),
            batch_zero_filter: false,
            on_demand_zero_filter: true,
        }
    }
}

impl ExplanationConfig {
    pub fn policy(&self, mode: ScoringMode) -> ExplanationPolicy {
        let zero_value_filter = match mode {
            ScoringMode::Batch => self.batch_zero_filter,
            ScoringMode::OnDemand => self.on_demand_zero_filter,
        };

        ExplanationPolicy {
            top_k_features: self.top_k_features,
            top_n_records: self.top_n_records,
            zero_value_filter,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCount { var: &'static str, value: String },
    InvalidFlag { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCount { var, value } => {
                write!(f, "{var} must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidFlag { var, value } => {
                write!(f, "{var} must be true or false, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCount { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
