use serde::Deserialize;

use crate::error::{AttributionError, CoreResult};
use crate::types::AttributionModel;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ATTRIBUTION__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Parameters every attribution computation receives explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributionConfig {
    #[serde(default = "default_window_days")]
    pub attribution_window_days: u32,
    #[serde(default = "default_half_life_days")]
    pub time_decay_half_life_days: f64,
    #[serde(default = "default_model")]
    pub model: AttributionModel,
    #[serde(default = "default_minor_digits")]
    pub currency_minor_digits: u32,
    #[serde(default = "default_variance_threshold_pct")]
    pub variance_threshold_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_partition_size")]
    pub partition_size: usize,
}

// Default functions
fn default_window_days() -> u32 {
    30
}
fn default_half_life_days() -> f64 {
    7.0
}
fn default_model() -> AttributionModel {
    AttributionModel::Linear
}
fn default_minor_digits() -> u32 {
    2
}
fn default_variance_threshold_pct() -> f64 {
    20.0
}
fn default_workers() -> usize {
    4
}
fn default_partition_size() -> usize {
    64
}

/// Largest supported number of currency minor digits.
pub const MAX_MINOR_DIGITS: u32 = 6;

/// Longest supported attribution window, roughly a century.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            attribution_window_days: default_window_days(),
            time_decay_half_life_days: default_half_life_days(),
            model: default_model(),
            currency_minor_digits: default_minor_digits(),
            variance_threshold_pct: default_variance_threshold_pct(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            partition_size: default_partition_size(),
        }
    }
}

impl AttributionConfig {
    pub fn with_window_days(mut self, days: u32) -> Self {
        self.attribution_window_days = days;
        self
    }

    pub fn with_half_life_days(mut self, days: f64) -> Self {
        self.time_decay_half_life_days = days;
        self
    }

    pub fn with_model(mut self, model: AttributionModel) -> Self {
        self.model = model;
        self
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.attribution_window_days))
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.attribution_window_days > MAX_WINDOW_DAYS {
            return Err(AttributionError::Config(format!(
                "attribution_window_days must be at most {}, got {}",
                MAX_WINDOW_DAYS, self.attribution_window_days
            )));
        }
        if !self.time_decay_half_life_days.is_finite() || self.time_decay_half_life_days <= 0.0 {
            return Err(AttributionError::Config(format!(
                "time_decay_half_life_days must be positive, got {}",
                self.time_decay_half_life_days
            )));
        }
        if self.currency_minor_digits > MAX_MINOR_DIGITS {
            return Err(AttributionError::Config(format!(
                "currency_minor_digits must be at most {}, got {}",
                MAX_MINOR_DIGITS, self.currency_minor_digits
            )));
        }
        if !self.variance_threshold_pct.is_finite() || self.variance_threshold_pct < 0.0 {
            return Err(AttributionError::Config(format!(
                "variance_threshold_pct must be non-negative, got {}",
                self.variance_threshold_pct
            )));
        }
        Ok(())
    }
}

impl BatchConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.workers == 0 || self.partition_size == 0 {
            return Err(AttributionError::Config(
                "batch workers and partition_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ATTRIBUTION")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.attribution.validate()?;
        self.batch.validate()
    }
}
