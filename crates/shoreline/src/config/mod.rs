use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::cleanup::compose::RecruitmentStrategy;
use crate::workflows::cleanup::recommend::RecommendationStrategy;

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
    pub storage: StorageConfig,
    pub detector: DetectorConfig,
    pub assist: AssistConfig,
    pub pipeline: PipelineConfig,
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

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let confidence = match env::var("DETECTOR_CONFIDENCE") {
            Ok(raw) => raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|value| (0.0..=1.0).contains(value))
                .ok_or(ConfigError::InvalidConfidence)?,
            Err(_) => DetectorConfig::DEFAULT_CONFIDENCE,
        };
        let fixture = optional_var("DETECTOR_FIXTURE").map(PathBuf::from);

        let recommendation = match optional_var("RECOMMENDATION_STRATEGY") {
            Some(value) => RecommendationStrategy::from_env_value(&value).ok_or(
                ConfigError::InvalidStrategy {
                    variable: "RECOMMENDATION_STRATEGY",
                    value,
                },
            )?,
            None => RecommendationStrategy::Assisted,
        };
        let recruitment = match optional_var("RECRUITMENT_STRATEGY") {
            Some(value) => RecruitmentStrategy::from_env_value(&value).ok_or(
                ConfigError::InvalidStrategy {
                    variable: "RECRUITMENT_STRATEGY",
                    value,
                },
            )?,
            None => RecruitmentStrategy::Assisted,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                upload_dir: PathBuf::from(upload_dir),
            },
            detector: DetectorConfig {
                confidence,
                fixture,
            },
            assist: AssistConfig {
                endpoint: optional_var("ASSIST_ENDPOINT"),
                api_key: optional_var("ASSIST_API_KEY"),
            },
            pipeline: PipelineConfig {
                recommendation,
                recruitment,
            },
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where uploaded and annotated images are written.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

/// Detection backend parameters.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub confidence: f32,
    pub fixture: Option<PathBuf>,
}

impl DetectorConfig {
    pub const DEFAULT_CONFIDENCE: f32 = 0.25;
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence: Self::DEFAULT_CONFIDENCE,
            fixture: None,
        }
    }
}

/// Connection settings for the AI-assist gateway. No endpoint means offline.
#[derive(Debug, Clone, Default)]
pub struct AssistConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Deployment-selectable strategies for the analysis pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub recommendation: RecommendationStrategy,
    pub recruitment: RecruitmentStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recommendation: RecommendationStrategy::Assisted,
            recruitment: RecruitmentStrategy::Assisted,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidConfidence,
    InvalidStrategy {
        variable: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidConfidence => {
                write!(f, "DETECTOR_CONFIDENCE must be a number between 0 and 1")
            }
            ConfigError::InvalidStrategy { variable, value } => {
                write!(f, "{variable} does not accept '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidConfidence
            | ConfigError::InvalidStrategy { .. } => None,
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
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "UPLOAD_DIR",
            "DETECTOR_CONFIDENCE",
            "DETECTOR_FIXTURE",
            "RECOMMENDATION_STRATEGY",
            "RECRUITMENT_STRATEGY",
            "ASSIST_ENDPOINT",
            "ASSIST_API_KEY",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert!((config.detector.confidence - 0.25).abs() < f32::EPSILON);
        assert!(config.detector.fixture.is_none());
        assert!(config.assist.endpoint.is_none());
        assert_eq!(
            config.pipeline.recommendation,
            RecommendationStrategy::Assisted
        );
        assert_eq!(config.pipeline.recruitment, RecruitmentStrategy::Assisted);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_confidence_outside_unit_range() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DETECTOR_CONFIDENCE", "1.5");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidConfidence)
        ));
        reset_env();
    }

    #[test]
    fn parses_strategy_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RECOMMENDATION_STRATEGY", "default");
        env::set_var("RECRUITMENT_STRATEGY", "Template");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.pipeline.recommendation, RecommendationStrategy::Default);
        assert_eq!(config.pipeline.recruitment, RecruitmentStrategy::Template);

        env::set_var("RECRUITMENT_STRATEGY", "poetry");
        match AppConfig::load() {
            Err(ConfigError::InvalidStrategy { variable, value }) => {
                assert_eq!(variable, "RECRUITMENT_STRATEGY");
                assert_eq!(value, "poetry");
            }
            other => panic!("expected invalid strategy, got {other:?}"),
        }
        reset_env();
    }
}
