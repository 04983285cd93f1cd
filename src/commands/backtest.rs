use crate::backtester::Backtester;
use crate::config::{load_settings_map, BacktestSettings};
use crate::market_data::TimeSeriesTable;
use crate::report::{build_report, render_text, BacktestReport};
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

/// Environment, then the settings file, then `overrides` (typically CLI flags).
pub fn load_settings(
    settings_file: Option<&Path>,
    overrides: &[(&str, String)],
) -> Result<BacktestSettings> {
    let mut settings = load_settings_map(settings_file)?;
    for (key, value) in overrides {
        settings.insert((*key).to_string(), value.clone());
    }
    BacktestSettings::from_settings_map(&settings)
}

pub fn run(
    data_file: &Path,
    settings: &BacktestSettings,
    json_output: Option<&Path>,
) -> Result<BacktestReport> {
    info!("Loading time series from {}", data_file.display());
    let table = TimeSeriesTable::load_csv(data_file, &settings.instruments)?;

    let run = Backtester::new(settings.simulation)
        .run(&table)
        .with_context(|| format!("Backtest over {} failed", data_file.display()))?;
    let report = build_report(&run, &settings.windows_years, settings.downside_risk)?;

    print!("{}", render_text(&report, &settings.metrics));

    if let Some(path) = json_output {
        fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(report)
}
