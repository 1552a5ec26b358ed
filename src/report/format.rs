//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the analysis code stays clean and testable
//! - output changes are localized

use crate::doe::{StudyOutcome, Sweep};
use crate::domain::{ResponseTable, Trajectory};
use crate::fit::FitReport;
use crate::models::{ModelDefinition, catalog};
use crate::report::rank_effects;
use crate::verify::{CheckStatus, VerificationReport};

/// Factor x level table with one column per level.
pub fn format_response_table(table: &ResponseTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<16}", "factor"));
    for level in table.levels() {
        out.push_str(&format!(" {:>12}", format!("{level:+}%")));
    }
    out.push('\n');
    out.push_str(&format!("{:-<16}", ""));
    for _ in table.levels() {
        out.push_str(&format!(" {:-<12}", ""));
    }
    out.push('\n');

    for (factor, row) in table.factors().iter().zip(table.values().row_iter()) {
        out.push_str(&format!("{:<16}", truncate(factor, 16)));
        for v in row.iter() {
            out.push_str(&format!(" {v:>12.4}"));
        }
        out.push('\n');
    }
    out
}

/// Study summary: baseline, effects, and influential factors.
pub fn format_study_summary(model: &str, outcome: &StudyOutcome, tolerance: f64) -> String {
    let mut out = String::new();

    out.push_str("=== kstudy - One-factor-at-a-time study ===\n");
    out.push_str(&format!("Model: {model}\n"));
    out.push_str(&format!("Response: peak frequency of {}\n", outcome.variable));
    out.push_str(&format!(
        "Baseline: {} at {:+}% -> mu = {:.6}\n",
        outcome.baseline_factor, outcome.baseline_level, outcome.mu
    ));

    out.push_str("\nResponses:\n");
    out.push_str(&format_response_table(&outcome.responses));
    out.push_str("\nEffects (alpha = y - mu):\n");
    out.push_str(&format_response_table(&outcome.alpha));

    let influential = outcome.influential_factors(tolerance);
    out.push('\n');
    if influential.is_empty() {
        out.push_str(&format!("No factor changes the response by more than {tolerance:e}.\n"));
    } else {
        out.push_str("Influential factors (largest |alpha| first):\n");
        for effect in rank_effects(&outcome.alpha)
            .iter()
            .filter(|e| influential.contains(&e.factor.as_str()))
        {
            out.push_str(&format!(
                "- {:<16} |alpha| = {:.6} at {:+}%\n",
                effect.factor, effect.max_abs_effect, effect.level
            ));
        }
    }
    out
}

/// One line per sweep level with the parameter value used.
pub fn format_sweep(sweep: &Sweep) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Sweep of '{}' (baseline {:.6}):\n",
        sweep.parameter, sweep.baseline_value
    ));
    out.push_str(&format!(
        "{:>10} {:>10} {:>14} {:>8}\n",
        "level", "applied", "value", "samples"
    ));
    for run in &sweep.runs {
        let clamped = if run.applied_pct != run.level { " (clamped)" } else { "" };
        out.push_str(&format!(
            "{:>9}% {:>9}% {:>14.6} {:>8}{clamped}\n",
            run.level,
            run.applied_pct,
            run.value,
            run.trajectory.len()
        ));
    }
    out
}

/// Range and final value of every variable.
pub fn format_trajectory_summary(trajectory: &Trajectory) -> String {
    let mut out = String::new();
    let times = trajectory.times();
    out.push_str(&format!(
        "Samples: n={} | t=[{:.3}, {:.3}]\n",
        trajectory.len(),
        times.first().copied().unwrap_or(f64::NAN),
        times.last().copied().unwrap_or(f64::NAN),
    ));
    out.push_str(&format!("{:<12} {:>12} {:>12} {:>12}\n", "variable", "min", "max", "final"));
    for (name, col) in trajectory
        .variable_names()
        .iter()
        .zip(trajectory.values().column_iter())
    {
        let last = col.iter().last().copied().unwrap_or(f64::NAN);
        out.push_str(&format!(
            "{:<12} {:>12.4} {:>12.4} {:>12.4}\n",
            truncate(name, 12),
            col.min(),
            col.max(),
            last
        ));
    }
    out
}

pub fn format_fit_report(model: &str, report: &FitReport) -> String {
    let mut out = String::new();
    out.push_str("=== kstudy - Parameter fit ===\n");
    out.push_str(&format!("Model: {model}\n"));
    out.push_str(&format!("Method: {}\n", report.method.display_name()));
    out.push_str(&format!("Fitted on: {}\n", report.columns.join(", ")));
    out.push_str(&format!(
        "Quality: SSR={:.6e} RMSE={:.6e} (n={}) | evaluations={}\n\n",
        report.ssr, report.rmse, report.n_observations, report.evaluations
    ));
    out.push_str(&format!(
        "{:<16} {:>12} {:>12} {:>12} {:>12}\n",
        "parameter", "fitted", "initial", "lower", "upper"
    ));
    for p in &report.parameters {
        let flag = if p.at_bound() { "  at bound" } else { "" };
        out.push_str(&format!(
            "{:<16} {:>12.6} {:>12.6} {:>12.6} {:>12.6}{flag}\n",
            truncate(&p.name, 16),
            p.value,
            p.initial,
            p.lower,
            p.upper
        ));
    }
    out
}

pub fn format_verification(report: &VerificationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Suite: {}\n", report.suite));
    for outcome in &report.outcomes {
        let tag = match outcome.status {
            CheckStatus::Passed => "PASS",
            CheckStatus::Failed => "FAIL",
            CheckStatus::Skipped => "SKIP",
        };
        out.push_str(&format!("[{tag}] {} ({})\n", outcome.description, outcome.detail));
    }
    out.push_str(&format!(
        "{} passed, {} failed, {} skipped\n",
        report.count(CheckStatus::Passed),
        report.count(CheckStatus::Failed),
        report.count(CheckStatus::Skipped)
    ));
    out
}

/// Catalog listing for `kstudy models`.
pub fn format_model_list() -> String {
    let mut out = String::new();
    for name in catalog::names() {
        if let Ok(def) = catalog::lookup(name) {
            out.push_str(&format_model(&def));
        }
    }
    out
}

fn format_model(def: &ModelDefinition) -> String {
    let params: Vec<String> = def
        .kind
        .default_parameters()
        .iter()
        .map(|(name, value)| {
            let value = def.parameters.get(*name).copied().unwrap_or(*value);
            format!("{name}={value}")
        })
        .collect();
    format!(
        "{:<16} {}\n  variables: {}\n  parameters: {}\n",
        def.name,
        def.kind.display_name(),
        def.kind.variable_names().join(", "),
        params.join(", ")
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
