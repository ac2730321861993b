use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::passes::domain::{OperatorAccount, ParkingSettings};

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
    pub parking: ParkingConfig,
    pub operator: OperatorConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "5005".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let parking = ParkingConfig {
            max_duration_hours: positive_env("PARKING_MAX_DURATION_HOURS", 4)?,
            max_active_slots: numeric_env("PARKING_MAX_ACTIVE_SLOTS", 3)?,
            sweep_interval_secs: positive_env("PARKING_SWEEP_INTERVAL_SECS", 60)?,
        };

        let operator = OperatorConfig {
            id: env::var("OPERATOR_ID").unwrap_or_else(|_| "admin".to_string()),
            password: env::var("OPERATOR_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            parking,
            operator,
        })
    }
}

fn numeric_env(variable: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(variable) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
    }
}

fn positive_env(variable: &'static str, default: u32) -> Result<u32, ConfigError> {
    let value = numeric_env(variable, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidNumber { variable });
    }
    Ok(value)
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

/// Seed values for the parking pool and the sweep cadence.
#[derive(Debug, Clone, Copy)]
pub struct ParkingConfig {
    pub max_duration_hours: u32,
    pub max_active_slots: u32,
    pub sweep_interval_secs: u32,
}

impl ParkingConfig {
    pub fn settings(&self) -> ParkingSettings {
        ParkingSettings {
            max_duration_hours: self.max_duration_hours,
            max_active_slots: self.max_active_slots,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.sweep_interval_secs))
    }
}

/// Operator account used by the credential port.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub id: String,
    pub password: String,
}

impl OperatorConfig {
    pub fn account(&self) -> OperatorAccount {
        OperatorAccount {
            id: self.id.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("PARKING_MAX_DURATION_HOURS");
        env::remove_var("PARKING_MAX_ACTIVE_SLOTS");
        env::remove_var("PARKING_SWEEP_INTERVAL_SECS");
        env::remove_var("OPERATOR_ID");
        env::remove_var("OPERATOR_PASSWORD");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.port, 5005);
        assert_eq!(config.parking.max_duration_hours, 4);
        assert_eq!(config.parking.max_active_slots, 3);
        assert_eq!(config.parking.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.operator.id, "admin");
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PARKING_SWEEP_INTERVAL_SECS", "0");
        let result = AppConfig::load();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber {
                variable: "PARKING_SWEEP_INTERVAL_SECS"
            })
        ));
        env::remove_var("PARKING_SWEEP_INTERVAL_SECS");
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 5005));
        env::remove_var("APP_HOST");
    }
}
