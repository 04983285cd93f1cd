use statrs::statistics::Statistics;

/// Trailing mean over `period` values; `None` until the first full window.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut output = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        window_sum += value;
        if i >= period {
            window_sum -= values[i - period];
        }
        if i + 1 >= period {
            output.push(Some(window_sum / period as f64));
        } else {
            output.push(None);
        }
    }

    output
}

/// Trailing sample standard deviation over `period` values; `None` until the first full window.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 >= period {
                Some(values[i + 1 - period..=i].iter().std_dev())
            } else {
                None
            }
        })
        .collect()
}

/// Same as [`rolling_mean`] but tolerates gaps: a window containing a gap yields `None`.
pub fn rolling_mean_sparse(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    sparse_windows(values, period, |window| window.iter().mean())
}

pub fn rolling_std_sparse(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    sparse_windows(values, period, |window| window.iter().std_dev())
}

fn sparse_windows<F>(values: &[Option<f64>], period: usize, reduce: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window: Option<Vec<f64>> = values[i + 1 - period..=i].iter().copied().collect();
            window.map(|w| reduce(&w)).filter(|value| value.is_finite())
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BollingerBand {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Bands around the moving average, `width` deviations of the moving average's own
/// rolling dispersion on each side.
pub fn calculate_bollinger_bands(
    prices: &[Option<f64>],
    period: usize,
    width: f64,
) -> Vec<Option<BollingerBand>> {
    let sma = rolling_mean_sparse(prices, period);
    let dispersion = rolling_std_sparse(&sma, period);

    sma.iter()
        .zip(dispersion.iter())
        .map(|(middle, deviation)| match (middle, deviation) {
            (Some(middle), Some(deviation)) => Some(BollingerBand {
                middle: *middle,
                upper: middle + width * deviation,
                lower: middle - width * deviation,
            }),
            _ => None,
        })
        .collect()
}
