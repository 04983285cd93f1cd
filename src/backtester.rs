use crate::account::Portfolio;
use crate::config::SimulationConfig;
use crate::error::BacktestError;
use crate::market_data::{PeriodRow, TimeSeriesTable};
use crate::models::{AccountValuePoint, Execution, ExecutionSide, InstrumentId, SignalAction};
use log::{debug, info};

/// Result of one simulation: the final ledger, the fills and the per-period return series.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub portfolio: Portfolio,
    pub executions: Vec<Execution>,
    pub returns: Vec<f64>,
}

impl BacktestRun {
    pub fn history(&self) -> &[AccountValuePoint] {
        self.portfolio.history()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PeriodActivity {
    sells: usize,
    buys: usize,
    lot_rejections: usize,
}

pub struct Backtester {
    config: SimulationConfig,
}

impl Backtester {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, table: &TimeSeriesTable) -> Result<BacktestRun, BacktestError> {
        if table.is_empty() {
            return Err(BacktestError::EmptySeries);
        }

        let instrument_ids: Vec<InstrumentId> = table.instrument_ids().collect();
        let mut portfolio = Portfolio::new(self.config.initial_cash, table.instruments());
        let mut executions = Vec::new();
        let mut totals = PeriodActivity::default();

        // Rows sharing a date collapse into one period; the last row wins.
        for rows in table.rows().chunk_by(|a, b| a.date == b.date) {
            let Some(row) = rows.last() else {
                continue;
            };
            let activity = self.process_period(
                &mut portfolio,
                &mut executions,
                table.instruments(),
                &instrument_ids,
                row,
            )?;
            totals.sells += activity.sells;
            totals.buys += activity.buys;
            totals.lot_rejections += activity.lot_rejections;
        }

        let returns = period_returns(portfolio.history())?;

        info!(
            "Simulated {} period(s): {} sell(s), {} buy(s), {} buy(s) rejected by lot filter; final account value {:.2}",
            portfolio.history().len(),
            totals.sells,
            totals.buys,
            totals.lot_rejections,
            portfolio.account_value()
        );

        Ok(BacktestRun {
            portfolio,
            executions,
            returns,
        })
    }

    fn process_period(
        &self,
        portfolio: &mut Portfolio,
        executions: &mut Vec<Execution>,
        instruments: &[String],
        instrument_ids: &[InstrumentId],
        row: &PeriodRow,
    ) -> Result<PeriodActivity, BacktestError> {
        let mut activity = PeriodActivity::default();

        for &id in instrument_ids {
            if row.signal(id) != SignalAction::Hold {
                Self::require_price(row, id, instruments)?;
            }
        }

        // Sells settle before any buy so freed cash and zeroed holdings are visible to the buy pass.
        for &id in instrument_ids {
            if row.signal(id) != SignalAction::Sell {
                continue;
            }
            let quantity = portfolio.holding(id);
            if quantity == 0.0 {
                continue;
            }
            let price = Self::require_price(row, id, instruments)?;
            let proceeds = price * quantity * (1.0 - self.config.slippage);
            portfolio.adjust_cash(proceeds);
            portfolio.set_holding(id, 0.0);
            activity.sells += 1;
            debug!(
                "{} sell {} x{:.4} @ {:.4} -> cash {:+.2}",
                row.date, instruments[id.index()], quantity, price, proceeds
            );
            executions.push(Execution {
                date: row.date,
                instrument: instruments[id.index()].clone(),
                side: ExecutionSide::Sell,
                quantity,
                price,
                cash_delta: proceeds,
            });
        }

        let candidates: Vec<InstrumentId> = instrument_ids
            .iter()
            .copied()
            .filter(|&id| row.signal(id) == SignalAction::Buy && portfolio.holding(id) == 0.0)
            .collect();

        if portfolio.cash() > 0.0 && !candidates.is_empty() {
            // Every candidate gets the same slice of the pre-buy cash; rejected slices stay in cash.
            let allocation = portfolio.cash() / candidates.len() as f64;
            for id in candidates {
                let price = Self::require_price(row, id, instruments)?;
                let quantity = allocation / price;
                if quantity <= 1.0 {
                    activity.lot_rejections += 1;
                    debug!(
                        "{} buy {} rejected: allocation {:.2} buys {:.4} unit(s) @ {:.4}",
                        row.date,
                        instruments[id.index()],
                        allocation,
                        quantity,
                        price
                    );
                    continue;
                }
                let cost = allocation * (1.0 + self.config.slippage);
                portfolio.set_holding(id, quantity);
                portfolio.adjust_cash(-cost);
                activity.buys += 1;
                debug!(
                    "{} buy {} x{:.4} @ {:.4} -> cash {:+.2}",
                    row.date,
                    instruments[id.index()],
                    quantity,
                    price,
                    -cost
                );
                executions.push(Execution {
                    date: row.date,
                    instrument: instruments[id.index()].clone(),
                    side: ExecutionSide::Buy,
                    quantity,
                    price,
                    cash_delta: -cost,
                });
            }
        }

        let mut asset_value = 0.0;
        for &id in instrument_ids {
            let quantity = portfolio.holding(id);
            if quantity == 0.0 {
                continue;
            }
            asset_value += quantity * Self::require_price(row, id, instruments)?;
        }
        portfolio.set_asset_value(asset_value);
        portfolio.record_period(row.date);

        Ok(activity)
    }

    fn require_price(
        row: &PeriodRow,
        id: InstrumentId,
        instruments: &[String],
    ) -> Result<f64, BacktestError> {
        let instrument = || instruments[id.index()].clone();
        match row.price(id) {
            None => Err(BacktestError::MissingPrice {
                instrument: instrument(),
                date: row.date,
            }),
            Some(price) if !price.is_finite() || price <= 0.0 => {
                Err(BacktestError::InvalidPrice {
                    instrument: instrument(),
                    date: row.date,
                    price,
                })
            }
            Some(price) => Ok(price),
        }
    }
}

/// `(V[t] - V[t-1]) / V[t]` for every period after the first, front-padded with a 0.
pub fn period_returns(history: &[AccountValuePoint]) -> Result<Vec<f64>, BacktestError> {
    let mut returns = Vec::with_capacity(history.len());
    if history.is_empty() {
        return Ok(returns);
    }

    returns.push(0.0);
    for window in history.windows(2) {
        let previous = window[0].account_value;
        let current = window[1].account_value;
        if current == 0.0 {
            return Err(BacktestError::ZeroAccountValue {
                date: window[1].date,
            });
        }
        returns.push((current - previous) / current);
    }

    Ok(returns)
}
