use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

use crate::acceptance::{
    AcceptanceConfig, Principal, DEFAULT_VOTING_WINDOW_HOURS, MAX_VOTING_WINDOW_HOURS,
};

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
    pub accreditation: AccreditationSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let chairman =
            env::var("ACCREDITATION_CHAIRMAN").unwrap_or_else(|_| "chairman".to_string());
        if chairman.trim().is_empty() {
            return Err(ConfigError::EmptyChairman);
        }

        let voting_window_hours = match env::var("ACCREDITATION_VOTING_WINDOW_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| (1..=MAX_VOTING_WINDOW_HOURS).contains(hours))
                .ok_or(ConfigError::InvalidVotingWindow { value: raw })?,
            Err(_) => DEFAULT_VOTING_WINDOW_HOURS,
        };

        let ledger_path = env::var("ACCREDITATION_LEDGER_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            accreditation: AccreditationSettings {
                chairman: chairman.trim().to_string(),
                voting_window_hours,
                ledger_path,
            },
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Accreditation process parameters fixed at startup.
#[derive(Debug, Clone)]
pub struct AccreditationSettings {
    pub chairman: String,
    pub voting_window_hours: i64,
    /// JSON file backing the ledger; in-memory when absent.
    pub ledger_path: Option<PathBuf>,
}

impl AccreditationSettings {
    pub fn acceptance_config(&self) -> AcceptanceConfig {
        AcceptanceConfig::new(Principal::new(self.chairman.clone()))
            .with_voting_window(Duration::hours(self.voting_window_hours))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    EmptyChairman,
    InvalidVotingWindow { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::EmptyChairman => {
                write!(f, "ACCREDITATION_CHAIRMAN must name a principal")
            }
            ConfigError::InvalidVotingWindow { value } => write!(
                f,
                "ACCREDITATION_VOTING_WINDOW_HOURS must be between 1 and {MAX_VOTING_WINDOW_HOURS} hours (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::EmptyChairman
            | ConfigError::InvalidVotingWindow { .. } => None,
        }
    }
}
