//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety
//!
//! Command-line flags are applied on top of the loaded configuration by the binary.

use crate::pricing::{ModelPrice, DEFAULT_MODEL};
use crate::sweep::{DEFAULT_MIN_UNITS, DEFAULT_STEP};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Capacity sweep configuration
    pub sweep: SweepConfig,

    /// Overflow pricing configuration
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub min_units: u64,
    pub max_units: u64,
    pub step: u64,
    /// Tokens per minute provided by one reserved unit
    pub capacity_per_unit: u64,
    /// Currency per reserved unit per month, before discount
    pub unit_monthly_price: f64,
    /// Negotiated discount on the unit price, in percent
    #[serde(default)]
    pub discount_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub default_model: String,
    pub fetch_remote: bool,
    /// Per-model overrides, prices per 1,000 tokens
    #[serde(default)]
    pub models: HashMap<String, ModelPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub json_pretty: bool,
    pub currency_symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            fetch_remote: false,
            models: HashMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "ERROR".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            sweep: SweepConfig {
                min_units: DEFAULT_MIN_UNITS,
                max_units: 100,
                step: DEFAULT_STEP,
                capacity_per_unit: 2_500,
                unit_monthly_price: 260.0,
                discount_pct: 0.0,
            },
            pricing: PricingConfig::default(),
            output: OutputConfig {
                json_pretty: true,
                currency_symbol: "$".to_string(),
            },
            paths: PathsConfig {
                log_directory: PathBuf::from("logs"),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file if it exists
        let config_paths = [
            PathBuf::from("ptu-planner.toml"),
            PathBuf::from(".ptu-planner.toml"),
            dirs::config_dir()
                .map(|d| d.join("ptu-planner").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from an explicit file, then apply env overrides and validate
    pub fn load_with_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Sweep overrides
        if let Ok(val) = env::var("PTU_MIN_UNITS") {
            self.sweep.min_units = val.parse().context("Invalid PTU_MIN_UNITS")?;
        }
        if let Ok(val) = env::var("PTU_MAX_UNITS") {
            self.sweep.max_units = val.parse().context("Invalid PTU_MAX_UNITS")?;
        }
        if let Ok(val) = env::var("PTU_STEP") {
            self.sweep.step = val.parse().context("Invalid PTU_STEP")?;
        }
        if let Ok(val) = env::var("PTU_CAPACITY_PER_UNIT") {
            self.sweep.capacity_per_unit = val.parse().context("Invalid PTU_CAPACITY_PER_UNIT")?;
        }
        if let Ok(val) = env::var("PTU_UNIT_MONTHLY_PRICE") {
            self.sweep.unit_monthly_price =
                val.parse().context("Invalid PTU_UNIT_MONTHLY_PRICE")?;
        }
        if let Ok(val) = env::var("PTU_DISCOUNT_PCT") {
            self.sweep.discount_pct = val.parse().context("Invalid PTU_DISCOUNT_PCT")?;
        }

        // Pricing overrides
        if let Ok(val) = env::var("PTU_DEFAULT_MODEL") {
            self.pricing.default_model = val;
        }

        // Path overrides
        if let Ok(val) = env::var("PTU_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sweep.step == 0 {
            return Err(anyhow::anyhow!("Sweep step must be greater than 0"));
        }

        if self.sweep.max_units < self.sweep.min_units {
            warn!(
                min_units = self.sweep.min_units,
                max_units = self.sweep.max_units,
                "Sweep range is empty, only the pay-per-token baseline will be simulated"
            );
        }

        if self.sweep.capacity_per_unit == 0 {
            return Err(anyhow::anyhow!("Capacity per unit must be greater than 0"));
        }

        if !self.sweep.unit_monthly_price.is_finite() || self.sweep.unit_monthly_price < 0.0 {
            return Err(anyhow::anyhow!(
                "Unit monthly price must be a non-negative number, got {}",
                self.sweep.unit_monthly_price
            ));
        }

        if !(0.0..=100.0).contains(&self.sweep.discount_pct) {
            return Err(anyhow::anyhow!(
                "Unit discount must be between 0 and 100 percent, got {}",
                self.sweep.discount_pct
            ));
        }

        for (model, price) in &self.pricing.models {
            let valid = |p: f64| p.is_finite() && p >= 0.0;
            if !valid(price.input_per_1k) || !valid(price.output_per_1k) {
                return Err(anyhow::anyhow!("Invalid pricing for model {}", model));
            }
        }

        if self.sweep.max_units.saturating_sub(self.sweep.min_units) / self.sweep.step > 10_000 {
            warn!(
                min_units = self.sweep.min_units,
                max_units = self.sweep.max_units,
                step = self.sweep.step,
                "Sweep range is very large, analysis may be slow"
            );
        }

        // Only file logging needs the log directory
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}
