use crate::backtester::BacktestRun;
use crate::error::PerformanceError;
use crate::models::{AccountValuePoint, Execution, MetricValue, RollingPoint};
use crate::performance::{average_rolling, PerformanceWindow};
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const REPORT_HEADER: &str = "--------------BACKTEST REPORT--------------";
const REPORT_SEPARATOR: &str = "###############################################";
const REPORT_FOOTER: &str = "--------------END------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportMetric {
    AnnualizedReturn,
    SharpeRatio,
    SortinoRatio,
    MaxDrawdown,
    Volatility,
}

impl ReportMetric {
    pub const ALL: [ReportMetric; 5] = [
        ReportMetric::AnnualizedReturn,
        ReportMetric::SharpeRatio,
        ReportMetric::SortinoRatio,
        ReportMetric::MaxDrawdown,
        ReportMetric::Volatility,
    ];

    /// Accepts `sharpe_ratio`, `sharpe-ratio` or `Sharpe Ratio`.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "annualized_return" => Ok(Self::AnnualizedReturn),
            "sharpe_ratio" | "sharpe" => Ok(Self::SharpeRatio),
            "sortino_ratio" | "sortino" => Ok(Self::SortinoRatio),
            "max_drawdown" => Ok(Self::MaxDrawdown),
            "volatility" => Ok(Self::Volatility),
            _ => Err(anyhow!("Unknown report metric '{}'", raw.trim())),
        }
    }

    /// Settings-file spelling.
    pub fn key(self) -> &'static str {
        match self {
            Self::AnnualizedReturn => "annualized_return",
            Self::SharpeRatio => "sharpe_ratio",
            Self::SortinoRatio => "sortino_ratio",
            Self::MaxDrawdown => "max_drawdown",
            Self::Volatility => "volatility",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AnnualizedReturn => "Annualized Return",
            Self::SharpeRatio => "Sharpe Ratio",
            Self::SortinoRatio => "Sortino Ratio",
            Self::MaxDrawdown => "Max Drawdown",
            Self::Volatility => "Volatility",
        }
    }
}

/// Statistics for one trailing window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMetrics {
    pub years: u32,
    pub window_length: usize,
    pub annualized_return: f64,
    pub sharpe: MetricValue,
    pub sortino: MetricValue,
    pub average_rolling_sharpe: MetricValue,
    pub average_rolling_sortino: MetricValue,
    pub max_drawdown: f64,
    pub volatility: MetricValue,
    pub rolling_sharpe: Vec<RollingPoint>,
    pub rolling_sortino: Vec<RollingPoint>,
}

impl WindowMetrics {
    pub fn compute(
        returns: &[f64],
        years: u32,
        downside_risk: f64,
    ) -> Result<Self, PerformanceError> {
        let window = PerformanceWindow::new(returns, years)?;
        let rolling_sharpe = window.rolling_sharpe()?;
        let rolling_sortino = window.rolling_sortino(downside_risk)?;

        Ok(Self {
            years,
            window_length: window.window_length(),
            annualized_return: window.annualized_return()?,
            sharpe: window.sharpe(),
            sortino: window.sortino(downside_risk),
            average_rolling_sharpe: average_rolling(&rolling_sharpe),
            average_rolling_sortino: average_rolling(&rolling_sortino),
            max_drawdown: window.max_drawdown(),
            volatility: window.volatility(),
            rolling_sharpe,
            rolling_sortino,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedWindow {
    pub years: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub final_cash: f64,
    pub final_account_value: f64,
    pub holdings: BTreeMap<String, f64>,
    pub history: Vec<AccountValuePoint>,
    pub executions: Vec<Execution>,
    pub returns: Vec<f64>,
    pub cumulative_returns: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub windows: Vec<WindowMetrics>,
    pub skipped_windows: Vec<SkippedWindow>,
}

impl BacktestReport {
    pub fn window(&self, years: u32) -> Option<&WindowMetrics> {
        self.windows.iter().find(|window| window.years == years)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Full-history curves plus one set of statistics per requested trailing window. Windows
/// longer than the available history are skipped and listed with the reason.
pub fn build_report(
    run: &BacktestRun,
    windows_years: &[u32],
    downside_risk: f64,
) -> Result<BacktestReport, PerformanceError> {
    let full = PerformanceWindow::full_history(&run.returns)?;
    let returns = run.returns.as_slice();

    let computed: Vec<(u32, Result<WindowMetrics, PerformanceError>)> = windows_years
        .par_iter()
        .map(|&years| (years, WindowMetrics::compute(returns, years, downside_risk)))
        .collect();

    let mut windows = Vec::new();
    let mut skipped_windows = Vec::new();
    for (years, outcome) in computed {
        match outcome {
            Ok(metrics) => windows.push(metrics),
            Err(error) => {
                warn!("Skipping T{}Y window: {}", years, error);
                skipped_windows.push(SkippedWindow {
                    years,
                    reason: error.to_string(),
                });
            }
        }
    }
    info!(
        "Computed {} of {} trailing window(s) over {} period(s)",
        windows.len(),
        windows_years.len(),
        returns.len()
    );

    Ok(BacktestReport {
        final_cash: run.portfolio.cash(),
        final_account_value: run.portfolio.account_value(),
        holdings: run.portfolio.holdings(),
        history: run.history().to_vec(),
        executions: run.executions.clone(),
        returns: run.returns.clone(),
        cumulative_returns: full.cumulative_returns(),
        drawdown: full.drawdown(),
        windows,
        skipped_windows,
    })
}

/// Plain-text summary: one block per metric, one line per computed window.
pub fn render_text(report: &BacktestReport, metrics: &[ReportMetric]) -> String {
    let mut lines = vec![REPORT_HEADER.to_string()];
    for metric in metrics {
        lines.extend(
            report
                .windows
                .iter()
                .map(|window| metric_line(*metric, window)),
        );
        lines.push(REPORT_SEPARATOR.to_string());
    }
    lines.extend(
        report
            .skipped_windows
            .iter()
            .map(|skipped| format!("T{}Y skipped: {}", skipped.years, skipped.reason)),
    );
    lines.push(REPORT_FOOTER.to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn metric_line(metric: ReportMetric, window: &WindowMetrics) -> String {
    let years = window.years;
    let label = metric.label();
    match metric {
        ReportMetric::AnnualizedReturn => {
            format!("T{}Y {}: {:.2}%", years, label, window.annualized_return)
        }
        ReportMetric::SharpeRatio => format!(
            "T{}Y Average Annualized {}: {}",
            years, label, window.average_rolling_sharpe
        ),
        ReportMetric::SortinoRatio => format!(
            "T{}Y Average Annualized {}: {}",
            years, label, window.average_rolling_sortino
        ),
        ReportMetric::MaxDrawdown => format!("T{}Y {}: {:.2}%", years, label, window.max_drawdown),
        ReportMetric::Volatility => match window.volatility {
            MetricValue::Defined(value) => format!("T{}Y {}: {:.2}%", years, label, value),
            MetricValue::Undefined => format!("T{}Y {}: undefined", years, label),
        },
    }
}
