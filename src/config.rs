use anyhow::{Context, Result};
use chrono::{Duration, NaiveTime};
use serde::Deserialize;
use std::fs;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub paper_trading: PaperTradingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub dry_run: bool,
    pub database_path: String,
    pub data_path: String,
}

/// Named strategy presets. The two differ in the long threshold and in which
/// universe filters are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyVariant {
    Psychsignal,
    Sentdex,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub variant: StrategyVariant,
    pub long_threshold: Option<f64>,
    pub short_threshold: Option<f64>,
    pub quantiles: Option<usize>,
    #[serde(default)]
    pub filters: FilterOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterOverrides {
    pub require_base_universe: Option<bool>,
    pub exclude_near_earnings: Option<bool>,
    pub earnings_window_days: Option<u32>,
    pub exclude_acquisition_targets: Option<bool>,
    pub require_fresh_signal: Option<bool>,
    pub max_signal_age_days: Option<u32>,
}

/// Fully resolved universe filter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParams {
    pub require_base_universe: bool,
    pub exclude_near_earnings: bool,
    pub earnings_window_days: u32,
    pub exclude_acquisition_targets: bool,
    pub require_fresh_signal: bool,
    pub max_signal_age_days: u32,
}

/// Fully resolved, validated strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub variant: StrategyVariant,
    pub long_threshold: f64,
    pub short_threshold: f64,
    pub quantiles: usize,
    pub filters: FilterParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_session_open")]
    pub session_open: NaiveTime,
    #[serde(default = "default_session_close")]
    pub session_close: NaiveTime,
    #[serde(default = "default_rebalance_offset")]
    pub rebalance_offset_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            session_open: default_session_open(),
            session_close: default_session_close(),
            rebalance_offset_minutes: default_rebalance_offset(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperTradingConfig {
    #[serde(default = "default_balance")]
    pub initial_balance_usd: f64,
    #[serde(default)]
    pub commission_per_trade: f64,
    #[serde(default)]
    pub slippage_pct: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PaperTradingConfig {
    fn default() -> Self {
        Self {
            initial_balance_usd: default_balance(),
            commission_per_trade: 0.0,
            slippage_pct: 0.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_path")]
    pub csv_log_path: String,
    #[serde(default)]
    pub prometheus_enabled: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_path(),
            prometheus_enabled: false,
        }
    }
}

fn default_session_open() -> NaiveTime { NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default() }
fn default_session_close() -> NaiveTime { NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default() }
fn default_rebalance_offset() -> i64 { 60 }
fn default_balance() -> f64 { 100_000.0 }
fn default_csv_path() -> String { "daily_records.csv".to_string() }

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Long threshold {long} must be above short threshold {short}")]
    OverlappingThresholds { long: f64, short: f64 },

    #[error("Threshold is not a finite number: {0}")]
    NonFiniteThreshold(f64),

    #[error("Quantile count must be at least 1")]
    ZeroQuantiles,

    #[error("Rebalance time {0} is not inside the trading session")]
    RebalanceOutsideSession(NaiveTime),

    #[error("Rebalance offset of {0} minutes is out of range")]
    RebalanceOffsetOutOfRange(i64),

    #[error("Initial balance must be positive: {0}")]
    InvalidBalance(f64),
}

impl StrategyVariant {
    pub fn preset(self) -> StrategyParams {
        match self {
            StrategyVariant::Psychsignal => StrategyParams {
                variant: self,
                long_threshold: 2.5,
                short_threshold: -2.0,
                quantiles: 2,
                filters: FilterParams {
                    require_base_universe: true,
                    exclude_near_earnings: true,
                    earnings_window_days: 2,
                    exclude_acquisition_targets: true,
                    require_fresh_signal: true,
                    max_signal_age_days: 1,
                },
            },
            StrategyVariant::Sentdex => StrategyParams {
                variant: self,
                long_threshold: 4.0,
                short_threshold: -2.0,
                quantiles: 2,
                filters: FilterParams {
                    require_base_universe: true,
                    exclude_near_earnings: false,
                    earnings_window_days: 2,
                    exclude_acquisition_targets: false,
                    require_fresh_signal: false,
                    max_signal_age_days: 1,
                },
            },
        }
    }
}

impl StrategyConfig {
    /// Apply overrides on top of the variant preset and validate the result.
    pub fn resolve(&self) -> Result<StrategyParams, ConfigError> {
        let mut params = self.variant.preset();

        if let Some(long) = self.long_threshold {
            params.long_threshold = long;
        }
        if let Some(short) = self.short_threshold {
            params.short_threshold = short;
        }
        if let Some(quantiles) = self.quantiles {
            params.quantiles = quantiles;
        }

        let f = &self.filters;
        let p = &mut params.filters;
        p.require_base_universe = f.require_base_universe.unwrap_or(p.require_base_universe);
        p.exclude_near_earnings = f.exclude_near_earnings.unwrap_or(p.exclude_near_earnings);
        p.earnings_window_days = f.earnings_window_days.unwrap_or(p.earnings_window_days);
        p.exclude_acquisition_targets =
            f.exclude_acquisition_targets.unwrap_or(p.exclude_acquisition_targets);
        p.require_fresh_signal = f.require_fresh_signal.unwrap_or(p.require_fresh_signal);
        p.max_signal_age_days = f.max_signal_age_days.unwrap_or(p.max_signal_age_days);

        params.validate()?;
        Ok(params)
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for threshold in [self.long_threshold, self.short_threshold] {
            if !threshold.is_finite() {
                return Err(ConfigError::NonFiniteThreshold(threshold));
            }
        }
        if self.long_threshold <= self.short_threshold {
            return Err(ConfigError::OverlappingThresholds {
                long: self.long_threshold,
                short: self.short_threshold,
            });
        }
        if self.quantiles == 0 {
            return Err(ConfigError::ZeroQuantiles);
        }
        Ok(())
    }
}

impl ScheduleConfig {
    /// Wall-clock time of the daily rebalance.
    pub fn rebalance_time(&self) -> Result<NaiveTime, ConfigError> {
        let offset = Duration::try_minutes(self.rebalance_offset_minutes)
            .ok_or(ConfigError::RebalanceOffsetOutOfRange(self.rebalance_offset_minutes))?;
        let (at, wrapped) = self.session_open.overflowing_add_signed(offset);

        if wrapped != 0 || at < self.session_open || at >= self.session_close {
            return Err(ConfigError::RebalanceOutsideSession(at));
        }
        Ok(at)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.resolve()?;
        self.schedule.rebalance_time()?;
        if !(self.paper_trading.initial_balance_usd > 0.0) {
            return Err(ConfigError::InvalidBalance(self.paper_trading.initial_balance_usd));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub data_path: Option<String>,
    pub dry_run: Option<bool>,
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            config_path: std::env::var("LONGSHORT_CONFIG")
                .unwrap_or_else(|_| "config.toml".to_string()),
            data_path: std::env::var("LONGSHORT_DATA_PATH").ok(),
            dry_run: std::env::var("DRY_RUN").ok().and_then(|v| parse_flag("DRY_RUN", &v)),
        })
    }
}

/// Accepts the usual spellings of an on/off environment flag.
fn parse_flag(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring {}={:?}: expected true/false, 1/0, yes/no or on/off", name, value);
            None
        }
    }
}
