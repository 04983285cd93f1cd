use crate::models::{AccountValuePoint, InstrumentId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Cash, per-instrument holdings and the account value recorded once per period.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: f64,
    asset_value: f64,
    instruments: Vec<String>,
    holdings: Vec<f64>,
    history: Vec<AccountValuePoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64, instruments: &[String]) -> Self {
        Self {
            cash: initial_cash,
            asset_value: 0.0,
            instruments: instruments.to_vec(),
            holdings: vec![0.0; instruments.len()],
            history: Vec::new(),
        }
    }

    /// `cash += delta`. May go negative when slippage is charged on a full-cash buy.
    pub fn adjust_cash(&mut self, delta: f64) {
        self.cash += delta;
    }

    pub fn set_asset_value(&mut self, value: f64) {
        self.asset_value = value;
    }

    /// Appends `(date, cash + asset_value)`. Call once per period after both are final.
    pub fn record_period(&mut self, date: NaiveDate) {
        debug_assert!(
            self.history.last().map_or(true, |last| last.date < date),
            "account history dates must strictly increase"
        );
        self.history.push(AccountValuePoint {
            date,
            cash: self.cash,
            asset_value: self.asset_value,
            account_value: self.cash + self.asset_value,
        });
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn asset_value(&self) -> f64 {
        self.asset_value
    }

    pub fn account_value(&self) -> f64 {
        self.cash + self.asset_value
    }

    pub fn holding(&self, id: InstrumentId) -> f64 {
        self.holdings.get(id.index()).copied().unwrap_or(0.0)
    }

    pub(crate) fn set_holding(&mut self, id: InstrumentId, quantity: f64) {
        debug_assert!(quantity >= 0.0, "holdings are long-only");
        if let Some(slot) = self.holdings.get_mut(id.index()) {
            *slot = quantity;
        }
    }

    pub fn holdings(&self) -> BTreeMap<String, f64> {
        self.instruments
            .iter()
            .cloned()
            .zip(self.holdings.iter().copied())
            .collect()
    }

    pub fn history(&self) -> &[AccountValuePoint] {
        &self.history
    }
}
