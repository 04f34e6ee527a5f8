use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;
const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

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
    pub notifications: NotificationConfig,
    pub workflow: WorkflowConfig,
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

        let channel_capacity = match env::var("NOTIFY_CHANNEL_CAPACITY") {
            Ok(raw) => parse_positive(&raw).ok_or(ConfigError::InvalidChannelCapacity)?,
            Err(_) => DEFAULT_CHANNEL_CAPACITY,
        };
        let email_high_priority = match env::var("NOTIFY_EMAIL_HIGH_PRIORITY") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                name: "NOTIFY_EMAIL_HIGH_PRIORITY",
            })?,
            Err(_) => true,
        };

        let cron_secret = env::var("CRON_SECRET")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let upload_max_bytes = match env::var("UPLOAD_MAX_BYTES") {
            Ok(raw) => parse_positive(&raw).ok_or(ConfigError::InvalidUploadLimit)?,
            Err(_) => DEFAULT_UPLOAD_MAX_BYTES,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            notifications: NotificationConfig {
                channel_capacity,
                email_high_priority,
            },
            workflow: WorkflowConfig {
                cron_secret,
                upload_max_bytes,
            },
        })
    }
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|value| *value > 0)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
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

/// Fan-out settings for the in-process notification bus.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub channel_capacity: usize,
    pub email_high_priority: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            email_high_priority: true,
        }
    }
}

/// Knobs for the forwarding and onboarding workflow endpoints.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub cron_secret: Option<String>,
    pub upload_max_bytes: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidChannelCapacity,
    InvalidFlag { name: &'static str },
    InvalidUploadLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidChannelCapacity => {
                write!(f, "NOTIFY_CHANNEL_CAPACITY must be a positive integer")
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/yes/no/on/off/1/0")
            }
            ConfigError::InvalidUploadLimit => {
                write!(f, "UPLOAD_MAX_BYTES must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidChannelCapacity
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidUploadLimit => None,
        }
    }
}
