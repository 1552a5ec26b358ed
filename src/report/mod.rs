//! Reporting utilities: effect rankings and formatted terminal output.

pub mod format;

pub use format::*;

use std::cmp::Ordering;

use crate::domain::ResponseTable;

/// Largest absolute effect of one factor.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorEffect {
    pub factor: String,
    /// `max_k |alpha[factor][k]|`.
    pub max_abs_effect: f64,
    /// Level (percent) where that effect occurs.
    pub level: f64,
}

/// Rank factors by their largest absolute effect, strongest first.
///
/// Ties keep the table's factor order.
pub fn rank_effects(alpha: &ResponseTable) -> Vec<FactorEffect> {
    let mut ranked: Vec<FactorEffect> = alpha
        .factors()
        .iter()
        .zip(alpha.values().row_iter())
        .map(|(factor, row)| {
            let (k, v) = row
                .iter()
                .enumerate()
                .fold((0usize, 0.0f64), |best, (k, v)| {
                    if v.abs() > best.1 { (k, v.abs()) } else { best }
                });
            FactorEffect {
                factor: factor.clone(),
                max_abs_effect: v,
                level: alpha.levels().get(k).copied().unwrap_or(f64::NAN),
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.max_abs_effect
            .partial_cmp(&a.max_abs_effect)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}
