use crate::error::PerformanceError;
use crate::indicators::{rolling_mean, rolling_std};
use crate::models::{round2, MetricValue, RollingPoint};
use statrs::statistics::Statistics;

pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// A trailing view over a return series. `years == 0` views the full series and only supports
/// the statistics that do not need a window length.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceWindow<'a> {
    returns: &'a [f64],
    window_length: usize,
}

impl<'a> PerformanceWindow<'a> {
    pub fn new(returns: &'a [f64], years: u32) -> Result<Self, PerformanceError> {
        if returns.is_empty() {
            return Err(PerformanceError::EmptySeries);
        }

        let window_length = years as usize * TRADING_DAYS_PER_YEAR;
        if years > 0 && returns.len() <= window_length {
            return Err(PerformanceError::InsufficientData {
                required: window_length,
                available: returns.len(),
            });
        }

        Ok(Self {
            returns,
            window_length,
        })
    }

    pub fn full_history(returns: &'a [f64]) -> Result<Self, PerformanceError> {
        Self::new(returns, 0)
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn trailing(&self) -> &'a [f64] {
        if self.window_length == 0 {
            self.returns
        } else {
            &self.returns[self.returns.len() - self.window_length..]
        }
    }

    pub fn cumulative_returns_iter(&self) -> impl Iterator<Item = f64> + Clone + 'a {
        let returns = self.returns;
        returns.iter().scan(1.0, |growth, r| {
            *growth *= 1.0 + r;
            Some(*growth)
        })
    }

    pub fn cumulative_returns(&self) -> Vec<f64> {
        self.cumulative_returns_iter().collect()
    }

    pub fn annualized_return(&self) -> Result<f64, PerformanceError> {
        if self.window_length == 0 {
            return Err(PerformanceError::ZeroWindow);
        }
        let growth: f64 = self.trailing().iter().map(|r| 1.0 + r).product();
        let exponent = TRADING_DAYS_PER_YEAR as f64 / self.window_length as f64;
        Ok(round2((growth.powf(exponent) - 1.0) * 100.0))
    }

    pub fn sharpe(&self) -> MetricValue {
        let trailing = self.trailing();
        MetricValue::ratio(
            trailing.iter().mean(),
            trailing.iter().std_dev(),
            annualization(),
        )
        .rounded()
    }

    pub fn rolling_sharpe(&self) -> Result<Vec<RollingPoint>, PerformanceError> {
        self.rolling_ratio(self.returns)
    }

    /// Mean return over the dispersion of returns below `downside_risk` (others count as zero).
    pub fn sortino(&self, downside_risk: f64) -> MetricValue {
        let trailing = self.trailing();
        let downside = mask_above(trailing, downside_risk);
        MetricValue::ratio(
            trailing.iter().mean(),
            downside.iter().std_dev(),
            annualization(),
        )
        .rounded()
    }

    pub fn rolling_sortino(&self, downside_risk: f64) -> Result<Vec<RollingPoint>, PerformanceError> {
        let downside = mask_above(self.returns, downside_risk);
        self.rolling_ratio(&downside)
    }

    pub fn max_drawdown(&self) -> f64 {
        let mut growth = 1.0;
        let mut peak = f64::NEG_INFINITY;
        let mut deepest = 0.0_f64;
        for r in self.trailing() {
            growth *= 1.0 + r;
            peak = peak.max(growth);
            if peak > 0.0 {
                deepest = deepest.max((peak - growth) / peak);
            }
        }
        round2(deepest * 100.0)
    }

    pub fn drawdown(&self) -> Vec<f64> {
        let mut peak = f64::NEG_INFINITY;
        self.cumulative_returns_iter()
            .map(|growth| {
                peak = peak.max(growth);
                growth / peak - 1.0
            })
            .collect()
    }

    pub fn volatility(&self) -> MetricValue {
        let std = self.trailing().iter().std_dev();
        MetricValue::from_f64(std * annualization() * 100.0).rounded()
    }

    // The mean side is zero-filled before the window fills, the dispersion side is not, so
    // warm-up positions come out as `Warmup` rather than a ratio.
    fn rolling_ratio(&self, dispersion_source: &[f64]) -> Result<Vec<RollingPoint>, PerformanceError> {
        if self.window_length == 0 {
            return Err(PerformanceError::ZeroWindow);
        }

        let means = rolling_mean(self.returns, self.window_length)
            .into_iter()
            .map(|mean| mean.unwrap_or(0.0));
        let deviations = rolling_std(dispersion_source, self.window_length);

        Ok(means
            .zip(deviations)
            .map(|(mean, deviation)| match deviation {
                None => RollingPoint::Warmup,
                Some(deviation) => match MetricValue::ratio(mean, deviation, annualization()) {
                    MetricValue::Defined(value) => RollingPoint::Value(round2(value)),
                    MetricValue::Undefined => RollingPoint::Undefined,
                },
            })
            .collect())
    }
}

pub fn average_rolling(points: &[RollingPoint]) -> MetricValue {
    let values: Vec<f64> = points.iter().filter_map(|point| point.value()).collect();
    if values.is_empty() {
        return MetricValue::Undefined;
    }
    MetricValue::from_f64(values.iter().mean()).rounded()
}

fn annualization() -> f64 {
    (TRADING_DAYS_PER_YEAR as f64).sqrt()
}

fn mask_above(returns: &[f64], threshold: f64) -> Vec<f64> {
    returns
        .iter()
        .map(|&r| if r < threshold { r } else { 0.0 })
        .collect()
}
