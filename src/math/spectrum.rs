//! Frequency-domain responses of a simulated time series.
//!
//! The response used by studies is the *peak frequency*: the frequency of the
//! largest-magnitude DFT component of one variable, after dropping a startup
//! transient.
//!
//! Conventions:
//! - sample spacing `d = (t_last - t_first) / (n - 1)` over the whole trajectory
//! - with `m` retained samples, bin `k` sits at `k / (m * d)`
//! - only the one-sided spectrum `k = 1 ..= m / 2` is reported; the DC bin
//!   never takes part in peak picking

use rustfft::{FftPlanner, num_complex::Complex};

use crate::domain::Trajectory;
use crate::error::AnalysisError;

/// One-sided magnitude spectrum (DC excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Distance between neighbouring bins.
    pub fn resolution(&self) -> f64 {
        self.frequencies.first().copied().unwrap_or(0.0)
    }

    /// Component indices ordered by magnitude, largest first.
    ///
    /// Equal magnitudes keep ascending bin order.
    pub fn ranked(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.magnitudes.len()).collect();
        idx.sort_by(|&a, &b| {
            self.magnitudes[b]
                .partial_cmp(&self.magnitudes[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        idx
    }
}

/// DFT magnitudes of `variable` after discarding `discard_count` leading samples.
pub fn magnitude_spectrum(
    trajectory: &Trajectory,
    variable: &str,
    discard_count: usize,
) -> Result<Spectrum, AnalysisError> {
    let values = trajectory.column(variable)?;
    let total = values.len();
    let count = total.saturating_sub(discard_count);
    if count < 2 {
        return Err(AnalysisError::InsufficientSamples {
            variable: variable.to_string(),
            available: count,
            required: 2,
        });
    }

    let spacing = trajectory.duration() / (total as f64 - 1.0);

    let mut buffer: Vec<Complex<f64>> = values[discard_count..]
        .iter()
        .map(|&v| Complex::new(v, 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(count);
    fft.process(&mut buffer);

    let span = count as f64 * spacing;
    let half = count / 2;
    let mut frequencies = Vec::with_capacity(half);
    let mut magnitudes = Vec::with_capacity(half);
    for (k, c) in buffer.iter().enumerate().take(half + 1).skip(1) {
        frequencies.push(k as f64 / span);
        magnitudes.push(c.norm());
    }

    Ok(Spectrum {
        frequencies,
        magnitudes,
    })
}

/// Frequency of the strongest component of `variable`.
///
/// With `suppress_count > 0`, the `suppress_count` strongest components are
/// ignored and the next one is reported. Components are ranked once; ignoring
/// a component never changes the order of the rest.
pub fn peak_frequency(
    trajectory: &Trajectory,
    variable: &str,
    discard_count: usize,
    suppress_count: usize,
) -> Result<f64, AnalysisError> {
    let spectrum = magnitude_spectrum(trajectory, variable, discard_count)?;
    let ranked = spectrum.ranked();
    let Some(&idx) = ranked.get(suppress_count) else {
        return Err(AnalysisError::InsufficientSamples {
            variable: variable.to_string(),
            available: ranked.len(),
            required: suppress_count + 1,
        });
    };
    Ok(spectrum.frequencies[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sampled(end: f64, n: usize, f: impl Fn(f64) -> f64) -> Trajectory {
        let times: Vec<f64> = (0..n).map(|i| end * i as f64 / (n as f64 - 1.0)).collect();
        let values = times.iter().map(|&t| f(t)).collect();
        Trajectory::from_columns(times, vec![("X".to_string(), values)]).unwrap()
    }

    #[test]
    fn pure_sinusoid_peaks_within_one_bin() {
        let freq = 2.3;
        let traj = sampled(10.0, 1001, |t| (2.0 * PI * freq * t).sin());
        let spectrum = magnitude_spectrum(&traj, "X", 0).unwrap();
        let peak = peak_frequency(&traj, "X", 0, 0).unwrap();
        assert!(
            (peak - freq).abs() <= spectrum.resolution(),
            "peak {peak} vs {freq} (bin {})",
            spectrum.resolution()
        );
    }

    #[test]
    fn dc_offset_never_wins() {
        let traj = sampled(10.0, 501, |t| 100.0 + 0.1 * (2.0 * PI * 1.5 * t).sin());
        let peak = peak_frequency(&traj, "X", 0, 0).unwrap();
        assert!((peak - 1.5).abs() < 0.2, "peak {peak}");
    }

    #[test]
    fn suppression_reports_next_component() {
        // Strong 1 Hz, weaker 3 Hz; both land exactly on bins (span = 10s).
        let traj = sampled(9.99, 1000, |t| {
            5.0 * (2.0 * PI * 1.0 * t).sin() + 2.0 * (2.0 * PI * 3.0 * t).sin()
        });
        let first = peak_frequency(&traj, "X", 0, 0).unwrap();
        let second = peak_frequency(&traj, "X", 0, 1).unwrap();
        assert!((first - 1.0).abs() < 1e-9, "first {first}");
        assert!((second - 3.0).abs() < 1e-9, "second {second}");
    }

    #[test]
    fn discarding_shortens_the_transform() {
        let traj = sampled(10.0, 200, |t| (2.0 * PI * 0.5 * t).cos());
        let full = magnitude_spectrum(&traj, "X", 0).unwrap();
        let cut = magnitude_spectrum(&traj, "X", 100).unwrap();
        assert_eq!(full.len(), 100);
        assert_eq!(cut.len(), 50);
        assert!(cut.resolution() > full.resolution());
    }

    #[test]
    fn errors_name_the_variable() {
        let traj = sampled(1.0, 10, |t| t);
        match peak_frequency(&traj, "Glucose", 0, 0) {
            Err(AnalysisError::InvalidVariable { variable, .. }) => assert_eq!(variable, "Glucose"),
            other => panic!("unexpected: {other:?}"),
        }
        match peak_frequency(&traj, "X", 9, 0) {
            Err(AnalysisError::InsufficientSamples { available, .. }) => assert_eq!(available, 1),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(peak_frequency(&traj, "X", 0, 5).is_err());
        assert!(peak_frequency(&traj, "X", 0, 4).is_ok());
    }

    #[test]
    fn ties_rank_lowest_bin_first() {
        let spectrum = Spectrum {
            frequencies: vec![0.1, 0.2, 0.3, 0.4],
            magnitudes: vec![1.0, 3.0, 3.0, 2.0],
        };
        assert_eq!(spectrum.ranked(), vec![1, 2, 3, 0]);
    }
}
