use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use portfolio_backtest::commands::{backtest, generate_signals};
use portfolio_backtest::config::{INITIAL_CASH_KEY, METRICS_KEY, SLIPPAGE_KEY, WINDOWS_KEY};
use portfolio_backtest::report::ReportMetric;
use portfolio_backtest::signals::SignalParams;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portfolio-backtest")]
#[command(about = "Signal-driven multi-instrument portfolio backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate trading from a price/signal CSV and print the performance report
    Backtest {
        /// Time series CSV with `Date,<inst>...,<inst>_signal...` columns
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Dotenv-style settings file, overrides the process environment
        #[arg(long = "settings-file", value_name = "PATH")]
        settings_file: Option<PathBuf>,
        /// Write the full report as JSON
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
        /// Starting cash
        #[arg(long)]
        initial_cash: Option<f64>,
        /// Proportional slippage applied to every fill
        #[arg(long)]
        slippage: Option<f64>,
        /// Comma separated trailing window lengths in years
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        windows: Vec<u32>,
        /// Metrics to print (defaults to all)
        #[arg(long, value_enum, value_delimiter = ',', num_args = 1..)]
        metrics: Vec<ReportMetric>,
    },
    /// Write double Bollinger band signal columns for a price CSV
    GenerateSignals {
        /// Price CSV with a `Date` column
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Destination CSV
        #[arg(short, long = "output", value_name = "PATH")]
        output: PathBuf,
        /// Moving-average window
        #[arg(long, default_value_t = 20)]
        window: usize,
        /// Inner band width in deviations
        #[arg(long, default_value_t = 1.0)]
        inner: f64,
        /// Outer band width in deviations
        #[arg(long, default_value_t = 2.0)]
        outer: f64,
        /// Instruments to generate for (defaults to every price column)
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        instruments: Vec<String>,
    },
}

fn main() -> Result<()> {
    let Cli { command } = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting portfolio-backtest. Simulated results only, not financial advice.");

    match command {
        Commands::Backtest {
            data_file,
            settings_file,
            output,
            initial_cash,
            slippage,
            windows,
            metrics,
        } => {
            let overrides = backtest_overrides(initial_cash, slippage, &windows, &metrics);
            let settings = backtest::load_settings(settings_file.as_deref(), &overrides)?;
            backtest::run(&data_file, &settings, output.as_deref())?;
        }
        Commands::GenerateSignals {
            data_file,
            output,
            window,
            inner,
            outer,
            instruments,
        } => {
            let params = SignalParams {
                window,
                inner_width: inner,
                outer_width: outer,
            };
            generate_signals::run(&data_file, &output, &instruments, &params)?;
        }
    }

    Ok(())
}

fn backtest_overrides(
    initial_cash: Option<f64>,
    slippage: Option<f64>,
    windows: &[u32],
    metrics: &[ReportMetric],
) -> Vec<(&'static str, String)> {
    let mut overrides = Vec::new();
    if let Some(cash) = initial_cash {
        overrides.push((INITIAL_CASH_KEY, cash.to_string()));
    }
    if let Some(rate) = slippage {
        overrides.push((SLIPPAGE_KEY, rate.to_string()));
    }
    if !windows.is_empty() {
        let joined: Vec<String> = windows.iter().map(u32::to_string).collect();
        overrides.push((WINDOWS_KEY, joined.join(",")));
    }
    if !metrics.is_empty() {
        let joined: Vec<&str> = metrics.iter().map(|metric| metric.key()).collect();
        overrides.push((METRICS_KEY, joined.join(",")));
    }
    overrides
}
