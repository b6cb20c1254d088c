//! Descriptive statistics over per-batch metric samples.
//!
//! Quantiles follow numpy's conventions: for sorted data of length `n` the
//! quantile `q` sits at position `q * (n - 1)`, and the interpolation method
//! decides what happens between two samples.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TermError};

/// Machine epsilon scaled up; keeps ratios finite when a denominator is zero.
pub const NP_EPSILON: f64 = f64::EPSILON * 10.0;

/// How a quantile between two samples is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    Linear,
    Lower,
    Higher,
    Nearest,
    Midpoint,
}

impl QuantileMethod {
    pub const NAMES: [&'static str; 5] = ["linear", "lower", "higher", "nearest", "midpoint"];
}

impl fmt::Display for QuantileMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuantileMethod::Linear => "linear",
            QuantileMethod::Lower => "lower",
            QuantileMethod::Higher => "higher",
            QuantileMethod::Nearest => "nearest",
            QuantileMethod::Midpoint => "midpoint",
        };
        f.write_str(name)
    }
}

impl FromStr for QuantileMethod {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(QuantileMethod::Linear),
            "lower" => Ok(QuantileMethod::Lower),
            "higher" => Ok(QuantileMethod::Higher),
            "nearest" => Ok(QuantileMethod::Nearest),
            "midpoint" => Ok(QuantileMethod::Midpoint),
            other => Err(TermError::configuration(format!(
                "unknown quantile interpolation method '{other}' (expected one of {:?})",
                QuantileMethod::NAMES
            ))),
        }
    }
}

fn sorted(values: &[f64], what: &str) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(TermError::configuration(format!(
            "cannot compute the {what} of an empty sample"
        )));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(TermError::configuration(format!(
            "cannot compute the {what} of a sample containing NaN"
        )));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Rounds half to even, as numpy does when picking the nearest sample.
pub(crate) fn round_half_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    }
}

/// The `q`-th quantile of `values`.
///
/// # Examples
///
/// ```rust
/// use term_expectations::profiler::statistics::{quantile, QuantileMethod};
///
/// let data = [0.0, 0.1, 0.2, 0.3, 0.4];
/// assert_eq!(quantile(&data, 0.2, QuantileMethod::Nearest).unwrap(), 0.1);
/// assert!((quantile(&data, 0.2, QuantileMethod::Linear).unwrap() - 0.08).abs() < 1e-12);
/// ```
pub fn quantile(values: &[f64], q: f64, method: QuantileMethod) -> Result<f64> {
    if !(0.0..=1.0).contains(&q) {
        return Err(TermError::configuration(format!(
            "quantile must be between 0 and 1, got {q}"
        )));
    }
    let data = sorted(values, "quantile")?;
    let position = q * (data.len() - 1) as f64;
    let lower = position.floor() as usize;
    let higher = (position.ceil() as usize).min(data.len() - 1);
    let fraction = position - lower as f64;

    Ok(match method {
        QuantileMethod::Linear => data[lower] + (data[higher] - data[lower]) * fraction,
        QuantileMethod::Lower => data[lower],
        QuantileMethod::Higher => data[higher],
        QuantileMethod::Nearest => {
            data[(round_half_even(position) as usize).min(data.len() - 1)]
        }
        QuantileMethod::Midpoint => (data[lower] + data[higher]) / 2.0,
    })
}

pub fn mean(values: &[f64]) -> Result<f64> {
    sorted(values, "mean")?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0).
pub fn std(values: &[f64]) -> Result<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

pub fn median(values: &[f64]) -> Result<f64> {
    let data = sorted(values, "median")?;
    let mid = data.len() / 2;
    Ok(if data.len() % 2 == 0 {
        (data[mid - 1] + data[mid]) / 2.0
    } else {
        data[mid]
    })
}

/// Digits past which an `f64` carries no further decimal precision.
const MAX_SIGNIFICANT_DECIMALS: u32 = 17;

/// Rounds to `decimals` decimal places, ties to even.
///
/// Values are returned unchanged when `decimals` exceeds `f64` precision or
/// the scaled value would overflow.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if decimals > MAX_SIGNIFICANT_DECIMALS {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    round_half_even(scaled) / factor
}
