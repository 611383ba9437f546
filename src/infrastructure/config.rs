use crate::domain::models::PomodoroSettings;
use crate::domain::pomodoro::PomodoroConfig;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const PLANNER_JSON: &str = "planner.json";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerConfig {
    pub schema: u64,
    pub store_base_url: String,
    pub store_token: Option<String>,
    pub sweep_interval_seconds: u64,
    pub sweep_user_ids: Vec<i64>,
    pub log_level: String,
    pub log_json: bool,
    pub pomodoro: PomodoroDefaults,
}

/// Raw `pomodoro` block. Missing fields take the built-in value and out of
/// range values are caught by `PlannerConfig::pomodoro_fallback`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroDefaults {
    pub work_duration: i64,
    pub short_break: i64,
    pub long_break: i64,
    pub cycles_before_long_break: i64,
}

impl Default for PomodoroDefaults {
    fn default() -> Self {
        PomodoroDefaults::from(PomodoroConfig::DEFAULT)
    }
}

impl From<PomodoroConfig> for PomodoroDefaults {
    fn from(config: PomodoroConfig) -> Self {
        Self {
            work_duration: i64::from(config.work_duration),
            short_break: i64::from(config.short_break),
            long_break: i64::from(config.long_break),
            cycles_before_long_break: i64::from(config.cycles_before_long_break),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            store_base_url: "http://127.0.0.1:8000/api".to_string(),
            store_token: None,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            sweep_user_ids: Vec::new(),
            log_level: "info".to_string(),
            log_json: false,
            pomodoro: PomodoroDefaults::default(),
        }
    }
}

impl PlannerConfig {
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    pub fn pomodoro_fallback(&self) -> PomodoroConfig {
        let settings = PomodoroSettings {
            work_duration: Some(self.pomodoro.work_duration),
            short_break: Some(self.pomodoro.short_break),
            long_break: Some(self.pomodoro.long_break),
            cycles_before_long_break: Some(self.pomodoro.cycles_before_long_break),
            current_cycle: None,
        };
        let resolved = PomodoroConfig::resolve(&settings, PomodoroConfig::DEFAULT);
        if resolved.used_fallback {
            warn!(
                configured = ?self.pomodoro,
                "invalid pomodoro defaults in planner.json, using built-in values"
            );
        }
        resolved.config
    }
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(PLANNER_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&PlannerConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_config(config_dir: &Path) -> Result<PlannerConfig, InfraError> {
    let path = config_dir.join(PLANNER_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }

    let config: PlannerConfig = serde_json::from_value(parsed)?;
    if config.store_base_url.trim().is_empty() {
        return Err(InfraError::InvalidConfig(format!(
            "storeBaseUrl must not be empty in {}",
            path.display()
        )));
    }
    Ok(config)
}
