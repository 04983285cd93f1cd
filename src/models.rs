use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    // Anything other than exactly -1 or 1 holds.
    pub fn from_raw(value: f64) -> Self {
        if value == 1.0 {
            SignalAction::Buy
        } else if value == -1.0 {
            SignalAction::Sell
        } else {
            SignalAction::Hold
        }
    }

    pub fn from_raw_strict(value: f64) -> Option<Self> {
        if value == 0.0 {
            Some(SignalAction::Hold)
        } else {
            match Self::from_raw(value) {
                SignalAction::Hold => None,
                action => Some(action),
            }
        }
    }

    pub fn as_raw(self) -> i8 {
        match self {
            SignalAction::Buy => 1,
            SignalAction::Sell => -1,
            SignalAction::Hold => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(pub usize);

impl InstrumentId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountValuePoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub asset_value: f64,
    pub account_value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub date: NaiveDate,
    pub instrument: String,
    pub side: ExecutionSide,
    pub quantity: f64,
    pub price: f64,
    pub cash_delta: f64,
}

/// Scalar statistic that may be undefined because its denominator vanished.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    pub fn ratio(numerator: f64, denominator: f64, scale: f64) -> Self {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            return MetricValue::Undefined;
        }
        let value = numerator / denominator * scale;
        if value.is_finite() {
            MetricValue::Defined(value)
        } else {
            MetricValue::Undefined
        }
    }

    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Defined(value)
        } else {
            MetricValue::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            MetricValue::Defined(value) => Some(value),
            MetricValue::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, MetricValue::Undefined)
    }

    pub fn rounded(self) -> Self {
        match self {
            MetricValue::Defined(value) => MetricValue::Defined(round2(value)),
            MetricValue::Undefined => MetricValue::Undefined,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(value) => write!(f, "{:.2}", value),
            MetricValue::Undefined => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum RollingPoint {
    Warmup,
    Undefined,
    Value(f64),
}

impl RollingPoint {
    pub fn value(self) -> Option<f64> {
        match self {
            RollingPoint::Value(value) => Some(value),
            _ => None,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_signal_values_map_to_hold() {
        assert_eq!(SignalAction::from_raw(1.0), SignalAction::Buy);
        assert_eq!(SignalAction::from_raw(-1.0), SignalAction::Sell);
        assert_eq!(SignalAction::from_raw(0.0), SignalAction::Hold);
        assert_eq!(SignalAction::from_raw(2.0), SignalAction::Hold);
        assert_eq!(SignalAction::from_raw(0.5), SignalAction::Hold);
        assert_eq!(SignalAction::from_raw(f64::NAN), SignalAction::Hold);
        assert_eq!(SignalAction::from_raw_strict(2.0), None);
        assert_eq!(SignalAction::from_raw_strict(0.0), Some(SignalAction::Hold));
    }

    #[test]
    fn ratio_is_undefined_for_zero_denominator() {
        assert!(MetricValue::ratio(0.0, 0.0, 1.0).is_undefined());
        assert!(MetricValue::ratio(1.0, 0.0, 1.0).is_undefined());
        assert_eq!(MetricValue::ratio(1.0, 2.0, 4.0), MetricValue::Defined(2.0));
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.456), -0.46);
        assert_eq!(MetricValue::Defined(7.34567).rounded(), MetricValue::Defined(7.35));
    }
}
