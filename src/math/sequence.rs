//! Shape predicates over numeric series.
//!
//! Used to check expected outcomes of a simulation, e.g. "S1 decreases
//! monotonically", "S2 rises then falls", "pyruvate stays above glucose after
//! the transient".

use crate::domain::Direction;
use crate::error::AnalysisError;

/// True iff every consecutive difference, multiplied by the direction sign,
/// is strictly positive.
///
/// A series with zero or one element has no differences and is therefore
/// monotone in both directions.
pub fn is_monotone(series: &[f64], direction: Direction) -> bool {
    let sign = direction.sign();
    series.windows(2).all(|w| sign * (w[1] - w[0]) > 0.0)
}

/// True iff the series strictly rises to a single interior peak and then
/// strictly falls.
///
/// Formally: some `i` in `1 ..= len - 2` has `series[..=i]` increasing and
/// `series[i..]` decreasing. Series shorter than 3 are never concave.
pub fn is_concave(series: &[f64]) -> bool {
    if series.len() < 3 {
        return false;
    }
    (1..=series.len() - 2).any(|i| {
        is_monotone(&series[..=i], Direction::Increasing)
            && is_monotone(&series[i..], Direction::Decreasing)
    })
}

/// Fraction of positions `>= start_index` where `a > b` strictly.
///
/// An empty window (start beyond the end) yields `0.0`.
pub fn fraction_larger(a: &[f64], b: &[f64], start_index: usize) -> Result<f64, AnalysisError> {
    if a.len() != b.len() {
        return Err(AnalysisError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let window = a.len().saturating_sub(start_index);
    if window == 0 {
        return Ok(0.0);
    }
    let hits = a[start_index..]
        .iter()
        .zip(&b[start_index..])
        .filter(|(x, y)| x > y)
        .count();
    Ok(hits as f64 / window as f64)
}

/// True iff at least `fraction_true` of the positions from `start_index` on
/// have `a > b`.
pub fn is_larger(
    a: &[f64],
    b: &[f64],
    start_index: usize,
    fraction_true: f64,
) -> Result<bool, AnalysisError> {
    Ok(fraction_larger(a, b, start_index)? >= fraction_true)
}
