use crate::infrastructure::config::PlannerConfig;
use crate::infrastructure::error::InfraError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl From<&PlannerConfig> for LoggingConfig {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            filter: config.log_level.clone(),
            json: config.log_json,
        }
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|error| InfraError::InvalidConfig(format!("logging already initialized: {error}")))?;
    tracing::info!(level = %config.filter, json = config.json, "logging initialized");
    Ok(())
}

/// Logs to the test harness writer. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
