use chrono::{Duration, NaiveDate};
use portfolio_backtest::commands::{backtest, generate_signals};
use portfolio_backtest::config::{
    BacktestSettings, SimulationConfig, INITIAL_CASH_KEY, SLIPPAGE_KEY, WINDOWS_KEY,
};
use portfolio_backtest::market_data::TimeSeriesTable;
use portfolio_backtest::models::{MetricValue, SignalAction};
use portfolio_backtest::report::ReportMetric;
use portfolio_backtest::signals::SignalParams;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn settings(initial_cash: f64, slippage: f64, windows_years: Vec<u32>) -> BacktestSettings {
    BacktestSettings {
        simulation: SimulationConfig {
            initial_cash,
            slippage,
        },
        downside_risk: 0.0,
        instruments: Vec::new(),
        windows_years,
        metrics: ReportMetric::ALL.to_vec(),
    }
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Two instruments over `days` consecutive calendar days with a multiplicative random walk
/// and random signals.
fn random_market_csv(seed: u64, days: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    let mut prices = [100.0_f64, 40.0_f64];
    let mut csv = String::from("Date,AAA,BBB,AAA_signal,BBB_signal\n");

    for day in 0..days {
        for price in prices.iter_mut() {
            *price *= 1.0 + rng.gen_range(-0.02..0.021);
        }
        let signals: Vec<i32> = (0..2).map(|_| rng.gen_range(-1..=1)).collect();
        writeln!(
            csv,
            "{},{:.4},{:.4},{},{}",
            (start + Duration::days(day as i64)).format("%Y-%m-%d"),
            prices[0],
            prices[1],
            signals[0],
            signals[1]
        )
        .unwrap();
    }
    csv
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn round_trip_trade_realizes_profit() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "scenario.csv",
        "Date,A,B,A_signal,B_signal\n2020-01-02,100,50,1,0\n2020-01-03,110,50,-1,0\n",
    );
    let output = dir.path().join("report.json");

    let report = backtest::run(&data, &settings(10_000.0, 0.0, vec![1]), Some(&output)).unwrap();

    assert_eq!(report.final_cash, 11_000.0);
    assert_eq!(report.final_account_value, 11_000.0);
    assert_eq!(report.holdings.get("A"), Some(&0.0));
    assert_eq!(report.returns[0], 0.0);
    assert!((report.returns[1] - 1_000.0 / 11_000.0).abs() < 1e-12);
    assert_eq!(report.executions.len(), 2);
    assert!(report.windows.is_empty());
    assert_eq!(report.skipped_windows[0].years, 1);

    let json = read_json(&output);
    assert_eq!(json["finalAccountValue"], 11_000.0);
    assert_eq!(json["history"][0]["cash"], 0.0);
    assert_eq!(json["history"][0]["assetValue"], 10_000.0);
    assert_eq!(json["executions"][0]["side"], "buy");
    assert_eq!(json["executions"][1]["side"], "sell");
    assert_eq!(json["skippedWindows"][0]["years"], 1);
}

#[test]
fn slippage_can_drive_cash_negative() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "slippage.csv",
        "Date,A,B,A_signal,B_signal\n2020-01-02,100,50,1,0\n",
    );

    let report = backtest::run(&data, &settings(10_000.0, 0.01, vec![1]), None).unwrap();

    assert!((report.final_cash - -100.0).abs() < 1e-9);
    assert_eq!(report.holdings.get("A"), Some(&100.0));
    assert!((report.final_account_value - 9_900.0).abs() < 1e-9);
}

#[test]
fn missing_price_for_active_signal_aborts_the_run() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "gap.csv",
        "Date,A,B,A_signal,B_signal\n2020-01-02,100,50,0,0\n2020-01-03,,50,1,0\n",
    );

    let err = backtest::run(&data, &settings(1_000.0, 0.0, vec![1]), None).unwrap_err();
    assert!(format!("{:#}", err).contains("missing price for A"));
}

#[test]
fn malformed_signal_cells_hold() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let data = write_file(
        &dir,
        "malformed.csv",
        "Date,A,A_signal\n2020-01-02,100,2\n2020-01-03,100,abc\n2020-01-06,100,\n",
    );

    let report = backtest::run(&data, &settings(1_000.0, 0.0, vec![1]), None).unwrap();
    assert!(report.executions.is_empty());
    assert_eq!(report.final_cash, 1_000.0);
    assert!(report.returns.iter().all(|r| *r == 0.0));
}

#[test]
fn multi_year_report_computes_only_covered_windows() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let data = write_file(&dir, "market.csv", &random_market_csv(7, 600));
    let output = dir.path().join("report.json");

    let report =
        backtest::run(&data, &settings(50_000.0, 0.001, vec![1, 2, 5]), Some(&output)).unwrap();

    assert_eq!(
        report.windows.iter().map(|w| w.years).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(report.skipped_windows.len(), 1);
    assert_eq!(report.skipped_windows[0].years, 5);
    assert_eq!(report.returns.len(), 600);
    assert_eq!(report.history.len(), 600);

    for point in &report.history {
        assert!((point.account_value - (point.cash + point.asset_value)).abs() < 1e-6);
    }
    assert_eq!(report.cumulative_returns[0], 1.0);
    assert!(report.cumulative_returns.iter().all(|c| *c >= 0.0));
    assert!(report.drawdown.iter().all(|d| *d <= 0.0));
    for window in &report.windows {
        assert!((0.0..=100.0).contains(&window.max_drawdown));
        assert_eq!(window.window_length, window.years as usize * 252);
        assert!(matches!(window.volatility, MetricValue::Defined(v) if v > 0.0));
    }

    let json = read_json(&output);
    assert_eq!(json["windows"].as_array().unwrap().len(), 2);
    assert_eq!(json["returns"].as_array().unwrap().len(), 600);
    assert_eq!(json["windows"][0]["rollingSharpe"][0]["kind"], "warmup");
}

#[test]
fn generated_signals_feed_the_backtest() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    let mut price = 20.0_f64;
    let mut csv = String::from("Date,XYZ\n");
    for day in 0..300 {
        price *= 1.0 + rng.gen_range(-0.03..0.031);
        writeln!(
            csv,
            "{},{:.4}",
            (start + Duration::days(day)).format("%Y-%m-%d"),
            price
        )
        .unwrap();
    }
    let prices = write_file(&dir, "prices.csv", &csv);
    let signalled = dir.path().join("signals.csv");

    let table =
        generate_signals::run(&prices, &signalled, &[], &SignalParams::default()).unwrap();
    let id = table.instrument_id("XYZ").unwrap();
    // 20 prices for the first average, 20 averages for its first deviation.
    assert!(table.rows()[..38]
        .iter()
        .all(|row| row.signal(id) == SignalAction::Hold));

    let header = fs::read_to_string(&signalled).unwrap();
    assert!(header.starts_with("Date,XYZ,XYZ_signal"));

    let reloaded = TimeSeriesTable::load_csv(&signalled, &[]).unwrap();
    assert_eq!(reloaded.instruments(), ["XYZ".to_string()]);
    assert_eq!(reloaded.rows(), table.rows());

    let report = backtest::run(&signalled, &settings(10_000.0, 0.0, vec![1]), None).unwrap();
    assert_eq!(report.windows.len(), 1);
    assert_eq!(report.returns.len(), 300);
}

#[test]
fn settings_file_and_overrides_layer_in_order() {
    ensure_test_env();
    let dir = TempDir::new().unwrap();
    let settings_file = write_file(
        &dir,
        "backtest.env",
        &format!(
            "{}=2500\n{}=0.002\n{}=1,3\nREPORT_METRICS=sharpe_ratio\n",
            INITIAL_CASH_KEY, SLIPPAGE_KEY, WINDOWS_KEY
        ),
    );

    let loaded = backtest::load_settings(
        Some(&settings_file),
        &[(INITIAL_CASH_KEY, "9000".to_string())],
    )
    .unwrap();

    assert_eq!(loaded.simulation.initial_cash, 9_000.0);
    assert_eq!(loaded.simulation.slippage, 0.002);
    assert_eq!(loaded.windows_years, vec![1, 3]);
    assert_eq!(loaded.metrics, vec![ReportMetric::SharpeRatio]);

    let invalid = backtest::load_settings(
        Some(&settings_file),
        &[(SLIPPAGE_KEY, "1.5".to_string())],
    );
    assert!(invalid.is_err());
}
