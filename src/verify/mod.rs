//! Declarative trajectory verification.
//!
//! A `VerificationSuite` is a named list of `Expectation`s about one simulated
//! trajectory: monotone species, a transient species rising then falling, one
//! species overtaking another, or an oscillation at a known frequency. Suites
//! are plain JSON so they can live next to model definitions.
//!
//! Each expectation yields one `CheckOutcome`. A check that cannot be
//! evaluated (unknown variable, too few samples) is reported as `Skipped`
//! rather than aborting the rest of the suite.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{DEFAULT_DISCARD_COUNT, Direction, Trajectory};
use crate::error::AnalysisError;
use crate::math::{fraction_larger, is_concave, is_monotone, peak_frequency};
use crate::models::ModelKind;

fn default_fraction() -> f64 {
    1.0
}

fn default_discard() -> usize {
    DEFAULT_DISCARD_COUNT
}

/// One property a trajectory is expected to have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "lowercase")]
pub enum Expectation {
    /// `variable` strictly moves in `direction` from `start_index` on.
    Monotone {
        variable: String,
        direction: Direction,
        #[serde(default)]
        start_index: usize,
    },
    /// `variable` rises to an interior peak and then falls.
    Concave { variable: String },
    /// `a > b` on at least `fraction_true` of the samples from `start_index` on.
    Larger {
        a: String,
        b: String,
        #[serde(default)]
        start_index: usize,
        #[serde(default = "default_fraction")]
        fraction_true: f64,
    },
    /// Peak frequency of `variable` is within `tolerance` of `frequency`.
    Oscillates {
        variable: String,
        frequency: f64,
        tolerance: f64,
        #[serde(default = "default_discard")]
        discard_count: usize,
    },
}

impl Expectation {
    pub fn describe(&self) -> String {
        match self {
            Expectation::Monotone {
                variable,
                direction,
                start_index,
            } => {
                let dir = match direction {
                    Direction::Increasing => "increasing",
                    Direction::Decreasing => "decreasing",
                };
                if *start_index > 0 {
                    format!("{variable} {dir} from sample {start_index}")
                } else {
                    format!("{variable} {dir}")
                }
            }
            Expectation::Concave { variable } => format!("{variable} rises then falls"),
            Expectation::Larger {
                a,
                b,
                start_index,
                fraction_true,
            } => format!(
                "{a} > {b} on >= {:.0}% of samples from {start_index}",
                fraction_true * 100.0
            ),
            Expectation::Oscillates {
                variable,
                frequency,
                tolerance,
                ..
            } => format!("{variable} oscillates at {frequency} ± {tolerance}"),
        }
    }

    /// `Ok((passed, detail))`, or the error that prevented evaluation.
    fn check(&self, trajectory: &Trajectory) -> Result<(bool, String), AnalysisError> {
        match self {
            Expectation::Monotone {
                variable,
                direction,
                start_index,
            } => {
                let series = trajectory.column(variable)?;
                let tail = series.get(*start_index..).unwrap_or(&[]);
                Ok((is_monotone(tail, *direction), format!("{} samples", tail.len())))
            }
            Expectation::Concave { variable } => {
                let series = trajectory.column(variable)?;
                let peak = series
                    .iter()
                    .enumerate()
                    .fold((0usize, f64::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 { (i, v) } else { best }
                    });
                Ok((is_concave(&series), format!("max at sample {}", peak.0)))
            }
            Expectation::Larger {
                a,
                b,
                start_index,
                fraction_true,
            } => {
                let left = trajectory.column(a)?;
                let right = trajectory.column(b)?;
                let fraction = fraction_larger(&left, &right, *start_index)?;
                Ok((
                    fraction >= *fraction_true,
                    format!("{:.1}% of samples", fraction * 100.0),
                ))
            }
            Expectation::Oscillates {
                variable,
                frequency,
                tolerance,
                discard_count,
            } => {
                let peak = peak_frequency(trajectory, variable, *discard_count, 0)?;
                Ok((
                    (peak - frequency).abs() <= *tolerance,
                    format!("peak frequency {peak:.4}"),
                ))
            }
        }
    }
}

/// A named list of expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSuite {
    pub name: String,
    pub expectations: Vec<Expectation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub description: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub suite: String,
    pub outcomes: Vec<CheckOutcome>,
}

impl VerificationReport {
    pub fn count(&self, status: CheckStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// True when every check ran and passed.
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == CheckStatus::Passed)
    }
}

impl VerificationSuite {
    pub fn evaluate(&self, trajectory: &Trajectory) -> VerificationReport {
        let outcomes: Vec<CheckOutcome> = self
            .expectations
            .iter()
            .map(|expectation| {
                let description = expectation.describe();
                match expectation.check(trajectory) {
                    Ok((passed, detail)) => CheckOutcome {
                        description,
                        status: if passed {
                            CheckStatus::Passed
                        } else {
                            CheckStatus::Failed
                        },
                        detail,
                    },
                    Err(err) => {
                        warn!(check = %description, error = %err, "check skipped");
                        CheckOutcome {
                            description,
                            status: CheckStatus::Skipped,
                            detail: err.to_string(),
                        }
                    }
                }
            })
            .collect();

        let report = VerificationReport {
            suite: self.name.clone(),
            outcomes,
        };
        info!(
            suite = %self.name,
            passed = report.count(CheckStatus::Passed),
            failed = report.count(CheckStatus::Failed),
            skipped = report.count(CheckStatus::Skipped),
            "suite evaluated"
        );
        report
    }
}

/// Expectations every default-parameter model of `kind` should satisfy.
pub fn default_suite(kind: ModelKind) -> VerificationSuite {
    let expectations = match kind {
        ModelKind::LinearPathway => vec![
            Expectation::Monotone {
                variable: "S1".to_string(),
                direction: Direction::Decreasing,
                start_index: 0,
            },
            Expectation::Monotone {
                variable: "S3".to_string(),
                direction: Direction::Increasing,
                start_index: 1,
            },
            Expectation::Concave {
                variable: "S2".to_string(),
            },
            Expectation::Larger {
                a: "S3".to_string(),
                b: "S1".to_string(),
                start_index: 0,
                fraction_true: 0.6,
            },
        ],
        ModelKind::Oscillator => vec![
            Expectation::Oscillates {
                variable: "X".to_string(),
                frequency: 5.0,
                tolerance: 0.5,
                discard_count: DEFAULT_DISCARD_COUNT,
            },
            Expectation::Oscillates {
                variable: "Y".to_string(),
                frequency: 5.0,
                tolerance: 0.5,
                discard_count: DEFAULT_DISCARD_COUNT,
            },
        ],
    };
    VerificationSuite {
        name: format!("{} defaults", kind.display_name()),
        expectations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_WINDOW;
    use crate::models::{AnalyticModel, Simulator, catalog};

    #[test]
    fn default_suites_pass_on_catalog_models() {
        for def in [catalog::linear_pathway(), catalog::oscillator()] {
            let traj = AnalyticModel::load(&def).unwrap().simulate(&DEFAULT_WINDOW).unwrap();
            let report = default_suite(def.kind).evaluate(&traj);
            assert!(report.all_passed(), "{report:?}");
        }
    }

    #[test]
    fn wrong_frequency_fails_and_unknown_variable_is_skipped() {
        let traj = AnalyticModel::load(&catalog::oscillator())
            .unwrap()
            .simulate(&DEFAULT_WINDOW)
            .unwrap();
        let suite = VerificationSuite {
            name: "mixed".to_string(),
            expectations: vec![
                Expectation::Oscillates {
                    variable: "X".to_string(),
                    frequency: 9.0,
                    tolerance: 0.5,
                    discard_count: 100,
                },
                Expectation::Concave {
                    variable: "Z".to_string(),
                },
            ],
        };
        let report = suite.evaluate(&traj);
        assert_eq!(report.outcomes[0].status, CheckStatus::Failed);
        assert_eq!(report.outcomes[1].status, CheckStatus::Skipped);
        assert!(report.outcomes[1].detail.contains('Z'));
        assert!(!report.all_passed());
    }

    #[test]
    fn suite_json_uses_check_tag_and_defaults() {
        let json = r#"{
            "name": "pathway",
            "expectations": [
                {"check": "monotone", "variable": "S1", "direction": "decreasing"},
                {"check": "larger", "a": "S3", "b": "S1", "start_index": 200}
            ]
        }"#;
        let suite: VerificationSuite = serde_json::from_str(json).unwrap();
        assert_eq!(
            suite.expectations[0],
            Expectation::Monotone {
                variable: "S1".to_string(),
                direction: Direction::Decreasing,
                start_index: 0,
            }
        );
        assert_eq!(
            suite.expectations[1],
            Expectation::Larger {
                a: "S3".to_string(),
                b: "S1".to_string(),
                start_index: 200,
                fraction_true: 1.0,
            }
        );
    }
}
