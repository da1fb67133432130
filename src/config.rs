use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest schedule interval a worker accepts (one day)
pub const MAX_WORKER_INTERVAL_SECS: u64 = 86_400;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub value_filter: ValueFilterConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkersConfig {
    /// Snapshot ingestion interval (default: 300s)
    #[serde(default = "default_ingestion_interval")]
    pub ingestion_interval_secs: u64,
    /// Match analysis interval (default: 120s)
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u64,
    /// Alert rule evaluation tick (default: 60s)
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,
    /// Aggregate worker health check (default: 120s)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    /// Pause between stop and start on restart
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Consecutive failures before a worker alert becomes CRITICAL
    #[serde(default = "default_escalate_after")]
    pub escalate_after_failures: u32,
}

fn default_ingestion_interval() -> u64 {
    300
}

fn default_analysis_interval() -> u64 {
    120
}

fn default_alert_interval() -> u64 {
    60
}

fn default_health_check_interval() -> u64 {
    120
}

fn default_restart_delay_ms() -> u64 {
    2000
}

fn default_escalate_after() -> u32 {
    3
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            ingestion_interval_secs: default_ingestion_interval(),
            analysis_interval_secs: default_analysis_interval(),
            alert_interval_secs: default_alert_interval(),
            health_check_interval_secs: default_health_check_interval(),
            restart_delay_ms: default_restart_delay_ms(),
            escalate_after_failures: default_escalate_after(),
        }
    }
}

/// Acceptance thresholds of the value filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueFilterConfig {
    pub min_expected_value: f64,
    pub min_confidence: f64,
    pub min_sample_size: u32,
    pub max_kelly: f64,
    pub max_risk_score: f64,
    pub min_historical_accuracy: f64,
}

impl Default for ValueFilterConfig {
    fn default() -> Self {
        Self {
            min_expected_value: 0.05,
            min_confidence: 0.60,
            min_sample_size: 50,
            max_kelly: 0.25,
            max_risk_score: 0.8,
            min_historical_accuracy: 0.55,
        }
    }
}

/// Named bound on multi-leg combination size and risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub name: String,
    /// 2..=4
    pub max_legs: usize,
    pub min_mean_confidence: f64,
    pub max_risk_score: f64,
}

impl RiskTier {
    pub fn new(name: &str, max_legs: usize, min_mean_confidence: f64, max_risk_score: f64) -> Self {
        Self {
            name: name.to_string(),
            max_legs,
            min_mean_confidence,
            max_risk_score,
        }
    }

    pub fn defaults() -> Vec<RiskTier> {
        vec![
            RiskTier::new("conservative", 2, 0.70, 0.10),
            RiskTier::new("balanced", 3, 0.60, 0.20),
            RiskTier::new("aggressive", 4, 0.55, 0.30),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Legs come only from predictions above this confidence
    pub min_leg_confidence: f64,
    /// Monte-Carlo trials per combination
    pub simulations: usize,
    /// Minimum simulated EV for an eligible combination
    pub min_expected_value: f64,
    /// Fixed RNG seed; entropy-seeded when unset
    pub seed: Option<u64>,
    pub tiers: Vec<RiskTier>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_leg_confidence: 0.55,
            simulations: 1000,
            min_expected_value: 0.05,
            seed: None,
            tiers: RiskTier::defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Track record assumed until the store has settled signals
    pub prior_accuracy: f64,
    pub prior_sample_size: u32,
    /// Analysis window around now
    pub lookback_hours: i64,
    pub lookahead_hours: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prior_accuracy: 0.65,
            prior_sample_size: 100,
            lookback_hours: 24,
            lookahead_hours: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub history_capacity: usize,
    pub default_cooldown_secs: u64,
    /// Fraction of failed worker cycles
    pub max_error_rate: f64,
    pub min_accuracy: f64,
    pub max_channel_failure_rate: f64,
    pub max_active_matches: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            default_cooldown_secs: 300,
            max_error_rate: 0.10,
            min_accuracy: 0.60,
            max_channel_failure_rate: 0.20,
            max_active_matches: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    /// Snapshot feed returning a JSON array of matches
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Local JSON file used when no url is set
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
}

fn default_models_dir() -> String {
    "./models".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    /// Status server port; disabled when unset
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("storage.models_dir", "./models")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(format!(
                    "{}.toml",
                    std::env::var("BETSIGNAL_ENV").unwrap_or_else(|_| "development".to_string())
                )))
                .required(false),
            )
            // Override with environment variables (BETSIGNAL_TELEGRAM__BOT_TOKEN, etc.)
            .add_source(
                Environment::with_prefix("BETSIGNAL")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let w = &self.workers;
        for (name, secs) in [
            ("ingestion_interval_secs", w.ingestion_interval_secs),
            ("analysis_interval_secs", w.analysis_interval_secs),
            ("alert_interval_secs", w.alert_interval_secs),
            ("health_check_interval_secs", w.health_check_interval_secs),
        ] {
            if secs == 0 || secs > MAX_WORKER_INTERVAL_SECS {
                errors.push(format!(
                    "workers.{name} must be between 1 and {MAX_WORKER_INTERVAL_SECS}"
                ));
            }
        }

        let v = &self.value_filter;
        if v.max_kelly <= 0.0 || v.max_kelly > 1.0 {
            errors.push("value_filter.max_kelly must be in (0, 1]".to_string());
        }
        for (name, value) in [
            ("min_confidence", v.min_confidence),
            ("max_risk_score", v.max_risk_score),
            ("min_historical_accuracy", v.min_historical_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("value_filter.{name} must be in [0, 1]"));
            }
        }

        let s = &self.strategy;
        if s.simulations == 0 {
            errors.push("strategy.simulations must be positive".to_string());
        }
        if s.tiers.is_empty() {
            errors.push("strategy.tiers must not be empty".to_string());
        }
        for tier in &s.tiers {
            if !(2..=4).contains(&tier.max_legs) {
                errors.push(format!(
                    "strategy tier {} max_legs must be between 2 and 4",
                    tier.name
                ));
            }
        }

        if self.pipeline.lookback_hours < 0 || self.pipeline.lookahead_hours < 0 {
            errors.push("pipeline lookback/lookahead must not be negative".to_string());
        }

        if self.alerts.history_capacity == 0 {
            errors.push("alerts.history_capacity must be positive".to_string());
        }

        if self.telegram.bot_token.is_some() != self.telegram.chat_id.is_some() {
            errors.push("telegram.bot_token and telegram.chat_id must be set together".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
