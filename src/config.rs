use crate::report::ReportMetric;
use anyhow::{anyhow, Context, Result};
use log::debug;
use std::collections::HashMap;
use std::path::Path;

pub const INITIAL_CASH_KEY: &str = "BACKTEST_INITIAL_CASH";
pub const SLIPPAGE_KEY: &str = "TRADE_SLIPPAGE_RATE";
pub const DOWNSIDE_RISK_KEY: &str = "DOWNSIDE_RISK";
pub const INSTRUMENTS_KEY: &str = "BACKTEST_INSTRUMENTS";
pub const WINDOWS_KEY: &str = "REPORT_WINDOWS_YEARS";
pub const METRICS_KEY: &str = "REPORT_METRICS";

const SETTING_KEYS: [&str; 6] = [
    INITIAL_CASH_KEY,
    SLIPPAGE_KEY,
    DOWNSIDE_RISK_KEY,
    INSTRUMENTS_KEY,
    WINDOWS_KEY,
    METRICS_KEY,
];

/// Parameters of a single simulation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub simulation: SimulationConfig,
    pub downside_risk: f64,
    /// Empty means every price column in the time series.
    pub instruments: Vec<String>,
    pub windows_years: Vec<u32>,
    pub metrics: Vec<ReportMetric>,
}

impl BacktestSettings {
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let initial_cash = require_setting_f64(settings, INITIAL_CASH_KEY, Some(0.0), None)?;
        if initial_cash <= 0.0 {
            return Err(anyhow!(
                "Setting {} must be > 0 (value: {})",
                INITIAL_CASH_KEY,
                initial_cash
            ));
        }
        let slippage = require_setting_f64(settings, SLIPPAGE_KEY, Some(0.0), None)?;
        if slippage >= 1.0 {
            return Err(anyhow!(
                "Setting {} must be < 1 (value: {})",
                SLIPPAGE_KEY,
                slippage
            ));
        }
        let downside_risk = match optional_setting(settings, DOWNSIDE_RISK_KEY) {
            Some(_) => require_setting_f64(settings, DOWNSIDE_RISK_KEY, None, None)?,
            None => 0.0,
        };
        let instruments = optional_setting(settings, INSTRUMENTS_KEY)
            .map(split_list)
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect();
        let windows_years = require_setting_u32_list(settings, WINDOWS_KEY)?;
        let metrics = match optional_setting(settings, METRICS_KEY) {
            Some(raw) => split_list(raw)
                .into_iter()
                .map(ReportMetric::parse)
                .collect::<Result<Vec<_>>>()?,
            None => ReportMetric::ALL.to_vec(),
        };

        Ok(Self {
            simulation: SimulationConfig {
                initial_cash,
                slippage,
            },
            downside_risk,
            instruments,
            windows_years,
            metrics,
        })
    }
}

/// Collects recognised settings from the process environment, then overlays a dotenv-style
/// file when one is given.
pub fn load_settings_map(settings_file: Option<&Path>) -> Result<HashMap<String, String>> {
    let mut settings: HashMap<String, String> = std::env::vars()
        .filter(|(key, _)| SETTING_KEYS.contains(&key.as_str()))
        .collect();

    if let Some(path) = settings_file {
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to open settings file {}", path.display()))?;
        for entry in entries {
            let (key, value) = entry
                .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
            debug!("Setting {} loaded from {}", key, path.display());
            settings.insert(key, value);
        }
    }

    Ok(settings)
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn require_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    optional_setting(settings, key).ok_or_else(|| anyhow!("Missing required setting {}", key))
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.trim()
        .trim_matches(|c| c == '[' || c == ']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn require_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<f64> {
    let raw = require_setting(settings, key)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(anyhow!(
                "Setting {} must be >= {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(value)
}

fn require_setting_u32_list(settings: &HashMap<String, String>, key: &str) -> Result<Vec<u32>> {
    let raw = require_setting(settings, key)?;
    let mut values = Vec::new();

    for entry in split_list(raw) {
        let value = entry.parse::<u32>().map_err(|_| {
            anyhow!(
                "Setting {} must be a list of non-negative integers (value: {})",
                key,
                raw
            )
        })?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(anyhow!(
            "Setting {} must contain at least one number (value: {})",
            key,
            raw
        ));
    }

    Ok(values)
}
