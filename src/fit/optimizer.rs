//! Reference optimizers for fit objectives.
//!
//! The fitting workflow only needs an objective `f(x) -> f64` plus two entry
//! points:
//!
//! - `LocalOptimizer::minimize(objective, initial, bounds)`
//! - `GlobalOptimizer::global_search(objective, bounds)`
//!
//! Implementations here are small and deterministic:
//!
//! - `CompassSearch`: bounded derivative-free pattern search (local)
//! - `GridSearch`: exhaustive grid, evaluated in parallel (global)
//! - `DifferentialEvolution`: seeded rand/1/bin evolution (global)
//!
//! Points where the simulation fails or the objective is non-finite are
//! treated as infeasible and skipped, not as errors.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::debug;

use crate::domain::Bounds;
use crate::error::AnalysisError;
use crate::fit::grid::{Spacing, parameter_grid};
use crate::fit::objective::Objective;

/// Best point found by an optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
}

pub trait LocalOptimizer {
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: &[f64],
        bounds: &[Bounds],
    ) -> Result<Optimum, AnalysisError>;
}

pub trait GlobalOptimizer {
    fn global_search(
        &self,
        objective: &dyn Objective,
        bounds: &[Bounds],
    ) -> Result<Optimum, AnalysisError>;
}

fn check_bounds(objective: &dyn Objective, bounds: &[Bounds]) -> Result<(), AnalysisError> {
    if bounds.len() != objective.dimension() {
        return Err(AnalysisError::LengthMismatch {
            left: objective.dimension(),
            right: bounds.len(),
        });
    }
    if bounds.is_empty() {
        return Err(AnalysisError::InvalidConfig(
            "at least one bounded dimension is required".to_string(),
        ));
    }
    for (i, b) in bounds.iter().enumerate() {
        if !(b.lower.is_finite() && b.upper.is_finite() && b.lower <= b.upper) {
            return Err(AnalysisError::InvalidConfig(format!(
                "bounds #{i} [{}, {}] must be finite with lower <= upper",
                b.lower, b.upper
            )));
        }
    }
    Ok(())
}

/// Objective value, or `None` when the point is infeasible.
fn score(objective: &dyn Objective, x: &[f64]) -> Result<Option<f64>, AnalysisError> {
    match objective.evaluate(x) {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) | Err(AnalysisError::Simulation(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn no_feasible_point() -> AnalysisError {
    AnalysisError::Simulation("no feasible point: every evaluation failed or was non-finite".to_string())
}

/// Bounded compass search.
///
/// Polls `x ± step_i e_i` one coordinate at a time and moves to the first
/// improvement. When a full sweep finds none, every step is multiplied by
/// `shrink`. Stops when all steps fall below `tolerance * width_i` or the
/// evaluation budget is spent.
#[derive(Debug, Clone, Copy)]
pub struct CompassSearch {
    /// Initial step as a fraction of each interval width.
    pub initial_step: f64,
    pub shrink: f64,
    pub tolerance: f64,
    pub max_evaluations: usize,
}

impl Default for CompassSearch {
    fn default() -> Self {
        Self {
            initial_step: 0.25,
            shrink: 0.5,
            tolerance: 1e-9,
            max_evaluations: 5_000,
        }
    }
}

impl LocalOptimizer for CompassSearch {
    fn minimize(
        &self,
        objective: &dyn Objective,
        initial: &[f64],
        bounds: &[Bounds],
    ) -> Result<Optimum, AnalysisError> {
        check_bounds(objective, bounds)?;
        if initial.len() != bounds.len() {
            return Err(AnalysisError::LengthMismatch {
                left: bounds.len(),
                right: initial.len(),
            });
        }
        if !(self.shrink > 0.0 && self.shrink < 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "compass shrink factor {} must be in (0, 1)",
                self.shrink
            )));
        }

        let mut x: Vec<f64> = initial.iter().zip(bounds).map(|(&v, b)| b.clamp(v)).collect();
        let mut evaluations = 1;
        let mut best = score(objective, &x)?.ok_or_else(no_feasible_point)?;
        let mut steps: Vec<f64> = bounds.iter().map(|b| self.initial_step * b.width()).collect();

        'search: while evaluations < self.max_evaluations {
            let mut improved = false;
            for i in 0..x.len() {
                if steps[i] <= 0.0 {
                    continue;
                }
                for sign in [1.0, -1.0] {
                    let mut candidate = x.clone();
                    candidate[i] = bounds[i].clamp(x[i] + sign * steps[i]);
                    if candidate[i] == x[i] {
                        continue;
                    }
                    if evaluations >= self.max_evaluations {
                        break 'search;
                    }
                    evaluations += 1;
                    if let Some(v) = score(objective, &candidate)? {
                        if v < best {
                            best = v;
                            x = candidate;
                            improved = true;
                            break;
                        }
                    }
                }
            }

            if !improved {
                for s in steps.iter_mut() {
                    *s *= self.shrink;
                }
                let converged = steps
                    .iter()
                    .zip(bounds)
                    .all(|(s, b)| *s <= self.tolerance * b.width().max(f64::MIN_POSITIVE));
                if converged {
                    break;
                }
            }
        }

        debug!(evaluations, best, "compass search finished");
        Ok(Optimum {
            x,
            value: best,
            evaluations,
        })
    }
}

/// Exhaustive grid search over the bounds.
///
/// Candidates are scored in parallel; the lowest value wins and ties go to
/// the earliest grid point.
#[derive(Debug, Clone, Copy)]
pub struct GridSearch {
    pub steps: usize,
    pub spacing: Spacing,
}

impl GlobalOptimizer for GridSearch {
    fn global_search(
        &self,
        objective: &dyn Objective,
        bounds: &[Bounds],
    ) -> Result<Optimum, AnalysisError> {
        check_bounds(objective, bounds)?;
        let grid = parameter_grid(bounds, self.steps, self.spacing)?;

        let scored: Vec<(usize, f64)> = grid
            .par_iter()
            .enumerate()
            .map(|(idx, x)| score(objective, x).map(|s| s.map(|v| (idx, v))))
            .collect::<Result<Vec<Option<(usize, f64)>>, AnalysisError>>()?
            .into_iter()
            .flatten()
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (idx, v) in scored {
            best = match best {
                Some((bi, bv)) if bv < v || (bv == v && bi < idx) => Some((bi, bv)),
                _ => Some((idx, v)),
            };
        }
        let (idx, value) = best.ok_or_else(no_feasible_point)?;

        debug!(candidates = grid.len(), value, "grid search finished");
        Ok(Optimum {
            x: grid[idx].clone(),
            value,
            evaluations: grid.len(),
        })
    }
}

/// Differential evolution (rand/1/bin) with a seeded RNG.
///
/// Trial vectors are generated sequentially from the RNG (so runs are
/// reproducible for a seed) and scored in parallel.
#[derive(Debug, Clone, Copy)]
pub struct DifferentialEvolution {
    pub population: usize,
    pub generations: usize,
    /// Differential weight `F`.
    pub mutation: f64,
    /// Crossover probability `CR`.
    pub crossover: f64,
    pub seed: u64,
}

impl DifferentialEvolution {
    pub fn new(population: usize, generations: usize, seed: u64) -> Self {
        Self {
            population,
            generations,
            mutation: 0.8,
            crossover: 0.9,
            seed,
        }
    }
}

fn sample_in(rng: &mut StdRng, b: &Bounds) -> f64 {
    if b.lower == b.upper {
        b.lower
    } else {
        rng.gen_range(b.lower..=b.upper)
    }
}

fn score_all(objective: &dyn Objective, points: &[Vec<f64>]) -> Result<Vec<f64>, AnalysisError> {
    points
        .par_iter()
        .map(|x| score(objective, x).map(|s| s.unwrap_or(f64::INFINITY)))
        .collect()
}

impl GlobalOptimizer for DifferentialEvolution {
    fn global_search(
        &self,
        objective: &dyn Objective,
        bounds: &[Bounds],
    ) -> Result<Optimum, AnalysisError> {
        check_bounds(objective, bounds)?;
        if self.population < 4 {
            return Err(AnalysisError::InvalidConfig(format!(
                "differential evolution needs a population of at least 4, got {}",
                self.population
            )));
        }
        if !(self.crossover >= 0.0 && self.crossover <= 1.0 && self.mutation > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "differential evolution needs mutation > 0 and crossover in [0, 1]".to_string(),
            ));
        }

        let dim = bounds.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut members: Vec<Vec<f64>> = (0..self.population)
            .map(|_| bounds.iter().map(|b| sample_in(&mut rng, b)).collect())
            .collect();
        let mut scores = score_all(objective, &members)?;
        let mut evaluations = members.len();

        for generation in 0..self.generations {
            let mut trials = Vec::with_capacity(self.population);
            for i in 0..self.population {
                let mut pick = || loop {
                    let k = rng.gen_range(0..self.population);
                    if k != i {
                        break k;
                    }
                };
                let a = pick();
                let b = loop {
                    let k = pick();
                    if k != a {
                        break k;
                    }
                };
                let c = loop {
                    let k = pick();
                    if k != a && k != b {
                        break k;
                    }
                };

                let forced = rng.gen_range(0..dim);
                let trial: Vec<f64> = (0..dim)
                    .map(|j| {
                        if j == forced || rng.gen_range(0.0..1.0) < self.crossover {
                            let v = members[a][j] + self.mutation * (members[b][j] - members[c][j]);
                            bounds[j].clamp(v)
                        } else {
                            members[i][j]
                        }
                    })
                    .collect();
                trials.push(trial);
            }

            let trial_scores = score_all(objective, &trials)?;
            evaluations += trials.len();
            for (i, (trial, s)) in trials.into_iter().zip(trial_scores).enumerate() {
                if s <= scores[i] {
                    members[i] = trial;
                    scores[i] = s;
                }
            }
            debug!(generation, best = scores.iter().cloned().fold(f64::INFINITY, f64::min), "evolution step");
        }

        let mut best_idx = 0;
        for i in 1..scores.len() {
            if scores[i] < scores[best_idx] {
                best_idx = i;
            }
        }
        if !scores[best_idx].is_finite() {
            return Err(no_feasible_point());
        }

        Ok(Optimum {
            x: members[best_idx].clone(),
            value: scores[best_idx],
            evaluations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::objective::FnObjective;

    fn bowl() -> FnObjective<impl Fn(&[f64]) -> f64 + Sync> {
        FnObjective::new(2, |x: &[f64]| (x[0] - 1.5).powi(2) + 3.0 * (x[1] + 0.5).powi(2))
    }

    fn square_bounds() -> Vec<Bounds> {
        vec![Bounds { lower: -4.0, upper: 4.0 }; 2]
    }

    #[test]
    fn compass_search_finds_bowl_minimum() {
        let opt = CompassSearch::default()
            .minimize(&bowl(), &[0.0, 0.0], &square_bounds())
            .unwrap();
        assert!((opt.x[0] - 1.5).abs() < 1e-6, "{:?}", opt.x);
        assert!((opt.x[1] + 0.5).abs() < 1e-6, "{:?}", opt.x);
        assert!(opt.value < 1e-10);
    }

    #[test]
    fn compass_search_respects_bounds() {
        let bounds = vec![Bounds { lower: 2.0, upper: 4.0 }, Bounds { lower: -4.0, upper: 4.0 }];
        let opt = CompassSearch::default().minimize(&bowl(), &[3.0, 0.0], &bounds).unwrap();
        assert!((opt.x[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn grid_search_picks_best_grid_point() {
        let grid = GridSearch {
            steps: 17,
            spacing: Spacing::Linear,
        };
        let opt = grid.global_search(&bowl(), &square_bounds()).unwrap();
        assert_eq!(opt.x, vec![1.5, -0.5]);
        assert_eq!(opt.evaluations, 17 * 17);
    }

    #[test]
    fn differential_evolution_is_reproducible_and_converges() {
        let de = DifferentialEvolution::new(20, 80, 7);
        let a = de.global_search(&bowl(), &square_bounds()).unwrap();
        let b = de.global_search(&bowl(), &square_bounds()).unwrap();
        assert_eq!(a, b);
        assert!(a.value < 1e-4, "value {}", a.value);
        assert_eq!(a.evaluations, 20 * 81);
    }

    #[test]
    fn infeasible_points_are_skipped() {
        let objective = FnObjective::new(1, |x: &[f64]| if x[0] < 0.0 { f64::NAN } else { x[0] });
        let bounds = [Bounds { lower: -1.0, upper: 1.0 }];
        let opt = GridSearch {
            steps: 5,
            spacing: Spacing::Linear,
        }
        .global_search(&objective, &bounds)
        .unwrap();
        assert_eq!(opt.x, vec![0.0]);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let bounds = [Bounds { lower: 0.0, upper: 1.0 }];
        assert!(CompassSearch::default().minimize(&bowl(), &[0.0], &bounds).is_err());
        assert!(DifferentialEvolution::new(3, 1, 0).global_search(&bowl(), &square_bounds()).is_err());
    }

    #[test]
    fn zero_dimensional_objective_is_rejected_by_every_optimizer() {
        let flat = FnObjective::new(0, |_: &[f64]| 1.0);
        let grid = GridSearch {
            steps: 3,
            spacing: Spacing::Linear,
        };
        assert!(matches!(
            DifferentialEvolution::new(5, 1, 0).global_search(&flat, &[]),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(matches!(
            CompassSearch::default().minimize(&flat, &[], &[]),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(matches!(grid.global_search(&flat, &[]), Err(AnalysisError::InvalidConfig(_))));
    }
}
