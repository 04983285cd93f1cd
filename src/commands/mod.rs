pub mod backtest;
pub mod generate_signals;
