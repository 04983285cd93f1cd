use crate::indicators::{calculate_bollinger_bands, BollingerBand};
use crate::market_data::TimeSeriesTable;
use crate::models::{InstrumentId, SignalAction};
use anyhow::{anyhow, Result};
use log::{debug, info};

/// Double Bollinger band parameters: one moving-average window and two band widths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParams {
    pub window: usize,
    pub inner_width: f64,
    pub outer_width: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            window: 20,
            inner_width: 1.0,
            outer_width: 2.0,
        }
    }
}

impl SignalParams {
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(anyhow!(
                "Signal window must be at least 2 (value: {})",
                self.window
            ));
        }
        if !(self.inner_width.is_finite() && self.outer_width.is_finite()) {
            return Err(anyhow!("Band widths must be finite"));
        }
        if self.inner_width < 0.0 || self.inner_width >= self.outer_width {
            return Err(anyhow!(
                "Band widths must satisfy 0 <= inner < outer (inner: {}, outer: {})",
                self.inner_width,
                self.outer_width
            ));
        }
        Ok(())
    }
}

/// Buy while the price sits between the inner and outer upper bands, sell while it sits
/// between the outer and inner lower bands, hold otherwise. Periods without a full band
/// history or without a price hold.
pub fn double_bollinger_signals(prices: &[Option<f64>], params: &SignalParams) -> Vec<SignalAction> {
    let inner = calculate_bollinger_bands(prices, params.window, params.inner_width);
    let outer = calculate_bollinger_bands(prices, params.window, params.outer_width);

    prices
        .iter()
        .zip(inner.iter().zip(outer.iter()))
        .map(|(price, bands)| match (price, bands) {
            (Some(price), (Some(inner), Some(outer))) => classify(*price, inner, outer),
            _ => SignalAction::Hold,
        })
        .collect()
}

fn classify(price: f64, inner: &BollingerBand, outer: &BollingerBand) -> SignalAction {
    if inner.upper < price && price < outer.upper {
        SignalAction::Buy
    } else if outer.lower < price && price < inner.lower {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    }
}

/// Overwrites the signal columns of `instruments` (all when empty). Returns the number of
/// non-hold signals written.
pub fn apply_double_bollinger(
    table: &mut TimeSeriesTable,
    instruments: &[String],
    params: &SignalParams,
) -> Result<usize> {
    params.validate()?;

    let ids: Vec<InstrumentId> = if instruments.is_empty() {
        table.instrument_ids().collect()
    } else {
        instruments
            .iter()
            .map(|name| table.instrument_id(name))
            .collect::<Result<_, _>>()?
    };

    let mut active = 0;
    for id in ids {
        let signals = double_bollinger_signals(&table.prices_for(id), params);
        let written = signals
            .iter()
            .filter(|signal| **signal != SignalAction::Hold)
            .count();
        debug!(
            "{}: {} non-hold signal(s) over {} period(s)",
            table.instruments()[id.index()],
            written,
            signals.len()
        );
        table.set_signals(id, &signals);
        active += written;
    }

    info!(
        "Generated double Bollinger signals (window {}, widths {}/{}): {} active",
        params.window, params.inner_width, params.outer_width, active
    );
    Ok(active)
}
