use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MarketDataError {
    #[error("time series has no `{0}` column")]
    MissingDateColumn(String),
    #[error("no price column found for instrument {0}")]
    MissingPriceColumn(String),
    #[error("row {row}: could not parse date `{value}` (expected YYYY-MM-DD)")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: could not parse price `{value}` for {instrument}")]
    InvalidPriceCell {
        row: usize,
        instrument: String,
        value: String,
    },
    #[error("row dated {date} has {actual} values, expected {expected}")]
    RowWidthMismatch {
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },
    #[error("dates out of order: {current} follows {previous}")]
    DatesOutOfOrder {
        previous: NaiveDate,
        current: NaiveDate,
    },
    #[error("unknown instrument {0}")]
    UnknownInstrument(String),
    #[error("time series declares no instruments")]
    NoInstruments,
}

#[derive(Debug, Error, PartialEq)]
pub enum BacktestError {
    #[error("time series is empty")]
    EmptySeries,
    #[error("missing price for {instrument} on {date}")]
    MissingPrice { instrument: String, date: NaiveDate },
    #[error("invalid price {price} for {instrument} on {date}")]
    InvalidPrice {
        instrument: String,
        date: NaiveDate,
        price: f64,
    },
    #[error("account value is zero on {date}; period return is undefined")]
    ZeroAccountValue { date: NaiveDate },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PerformanceError {
    #[error("return series is empty")]
    EmptySeries,
    #[error("insufficient data: window needs more than {required} periods, series has {available}")]
    InsufficientData { required: usize, available: usize },
    #[error("metric requires a trailing window of at least one year")]
    ZeroWindow,
}
