use crate::error::MarketDataError;
use crate::models::{InstrumentId, SignalAction};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const DATE_COLUMN: &str = "Date";
pub const SIGNAL_SUFFIX: &str = "_signal";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Prices and signals for one date, indexed by `InstrumentId`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRow {
    pub date: NaiveDate,
    pub prices: Vec<Option<f64>>,
    pub signals: Vec<SignalAction>,
}

impl PeriodRow {
    pub fn price(&self, id: InstrumentId) -> Option<f64> {
        self.prices.get(id.index()).copied().flatten()
    }

    pub fn signal(&self, id: InstrumentId) -> SignalAction {
        self.signals
            .get(id.index())
            .copied()
            .unwrap_or(SignalAction::Hold)
    }
}

/// Column positions for one instrument inside a CSV header.
#[derive(Debug, Clone, Copy)]
struct InstrumentColumns {
    price: usize,
    signal: Option<usize>,
}

/// Time-ordered table of prices and signals, one row per period.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    instruments: Vec<String>,
    rows: Vec<PeriodRow>,
}

impl TimeSeriesTable {
    pub fn new(instruments: Vec<String>, rows: Vec<PeriodRow>) -> Result<Self, MarketDataError> {
        if instruments.is_empty() {
            return Err(MarketDataError::NoInstruments);
        }

        let width = instruments.len();
        let mut previous: Option<NaiveDate> = None;
        for row in &rows {
            for actual in [row.prices.len(), row.signals.len()] {
                if actual != width {
                    return Err(MarketDataError::RowWidthMismatch {
                        date: row.date,
                        expected: width,
                        actual,
                    });
                }
            }
            if let Some(previous) = previous {
                if row.date < previous {
                    return Err(MarketDataError::DatesOutOfOrder {
                        previous,
                        current: row.date,
                    });
                }
            }
            previous = Some(row.date);
        }

        Ok(Self { instruments, rows })
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn instrument_id(&self, name: &str) -> Result<InstrumentId, MarketDataError> {
        self.instruments
            .iter()
            .position(|candidate| candidate == name)
            .map(InstrumentId)
            .ok_or_else(|| MarketDataError::UnknownInstrument(name.to_string()))
    }

    pub fn instrument_ids(&self) -> impl Iterator<Item = InstrumentId> {
        (0..self.instruments.len()).map(InstrumentId)
    }

    pub fn rows(&self) -> &[PeriodRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn prices_for(&self, id: InstrumentId) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.price(id)).collect()
    }

    /// Replaces one instrument's signal column. Extra values are ignored, missing ones become hold.
    pub fn set_signals(&mut self, id: InstrumentId, signals: &[SignalAction]) {
        for (index, row) in self.rows.iter_mut().enumerate() {
            if let Some(slot) = row.signals.get_mut(id.index()) {
                *slot = signals.get(index).copied().unwrap_or(SignalAction::Hold);
            }
        }
    }

    pub fn load_csv(path: &Path, instruments: &[String]) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open time series file {}", path.display()))?;
        let table = Self::from_csv_reader(file, instruments)
            .with_context(|| format!("Failed to load time series from {}", path.display()))?;
        info!(
            "Loaded {} rows for {} instrument(s) from {}",
            table.len(),
            table.instruments.len(),
            path.display()
        );
        Ok(table)
    }

    /// Reads `Date,<inst>...,<inst>_signal...`. An empty `instruments` list means every
    /// non-date, non-signal column is an instrument.
    pub fn from_csv_reader<R: Read>(reader: R, instruments: &[String]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers().context("Failed to read CSV header")?.clone();

        let date_index = headers
            .iter()
            .position(|name| name.eq_ignore_ascii_case(DATE_COLUMN))
            .ok_or_else(|| MarketDataError::MissingDateColumn(DATE_COLUMN.to_string()))?;

        let instruments: Vec<String> = if instruments.is_empty() {
            headers
                .iter()
                .enumerate()
                .filter(|(index, name)| *index != date_index && !name.ends_with(SIGNAL_SUFFIX))
                .map(|(_, name)| name.to_string())
                .collect()
        } else {
            instruments.to_vec()
        };

        let columns = resolve_columns(&headers, &instruments)?;
        let unsignalled: Vec<&str> = instruments
            .iter()
            .zip(&columns)
            .filter(|(_, cols)| cols.signal.is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        if !unsignalled.is_empty() {
            warn!(
                "No signal column for {}; treating every period as hold",
                unsignalled.join(", ")
            );
        }

        let mut rows = Vec::new();
        let mut malformed_signals = 0usize;
        for (row_number, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Failed to read CSV row {}", row_number + 1))?;
            let raw_date = record.get(date_index).unwrap_or("");
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
                MarketDataError::InvalidDate {
                    row: row_number + 1,
                    value: raw_date.to_string(),
                }
            })?;

            let mut prices = Vec::with_capacity(columns.len());
            let mut signals = Vec::with_capacity(columns.len());
            for (instrument, cols) in instruments.iter().zip(&columns) {
                let raw_price = record.get(cols.price).unwrap_or("");
                let price = if raw_price.is_empty() {
                    None
                } else {
                    Some(raw_price.parse::<f64>().map_err(|_| {
                        MarketDataError::InvalidPriceCell {
                            row: row_number + 1,
                            instrument: instrument.clone(),
                            value: raw_price.to_string(),
                        }
                    })?)
                };
                prices.push(price);

                let signal = match cols.signal {
                    None => SignalAction::Hold,
                    Some(index) => {
                        let raw = record.get(index).unwrap_or("");
                        match raw.parse::<f64>().ok().and_then(SignalAction::from_raw_strict) {
                            Some(action) => action,
                            None => {
                                malformed_signals += 1;
                                SignalAction::Hold
                            }
                        }
                    }
                };
                signals.push(signal);
            }

            rows.push(PeriodRow {
                date,
                prices,
                signals,
            });
        }

        if malformed_signals > 0 {
            warn!(
                "{} signal cell(s) outside {{-1, 0, 1}} were treated as hold",
                malformed_signals
            );
        }

        Ok(Self::new(instruments, rows)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file {}", path.display()))?;
        self.to_csv_writer(file)
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(self.instruments.iter().cloned());
        header.extend(
            self.instruments
                .iter()
                .map(|name| format!("{}{}", name, SIGNAL_SUFFIX)),
        );
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.date.format(DATE_FORMAT).to_string()];
            record.extend(
                row.prices
                    .iter()
                    .map(|price| price.map(|value| value.to_string()).unwrap_or_default()),
            );
            record.extend(row.signals.iter().map(|signal| signal.as_raw().to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn resolve_columns(
    headers: &csv::StringRecord,
    instruments: &[String],
) -> Result<Vec<InstrumentColumns>, MarketDataError> {
    instruments
        .iter()
        .map(|instrument| {
            let price = headers
                .iter()
                .position(|name| name == instrument)
                .ok_or_else(|| MarketDataError::MissingPriceColumn(instrument.clone()))?;
            let signal_name = format!("{}{}", instrument, SIGNAL_SUFFIX);
            let signal = headers.iter().position(|name| name == signal_name);
            Ok(InstrumentColumns { price, signal })
        })
        .collect()
}
