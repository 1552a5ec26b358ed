//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs logging
//! - parses CLI arguments
//! - resolves the model and builds run configuration
//! - runs the requested workflow (via `pipeline`)
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Command, FitArgs, SimulateArgs, StudyArgs, SweepArgs, VerifyArgs};
use crate::doe::SweepSettings;
use crate::domain::{FitConfig, StudyConfig};
use crate::error::AppError;
use crate::io::{
    StudyFile, write_fit_report_json, write_response_table_csv, write_study_json,
    write_trajectory_csv, write_verification_json,
};
use crate::report;

pub mod pipeline;

use pipeline::ObservationSource;

/// Default `RUST_LOG` filter.
const DEFAULT_LOG_FILTER: &str = "kinetic_studies=info";

/// Entry point for the `kstudy` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Sweep(args) => handle_sweep(args),
        Command::Study(args) => handle_study(args),
        Command::Fit(args) => handle_fit(args),
        Command::Verify(args) => handle_verify(args),
        Command::Models => {
            print!("{}", report::format_model_list());
            Ok(())
        }
    }
}

/// Logs go to stderr so reports on stdout stay pipeable.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let definition = pipeline::load_definition(&args.model)?;
    let window = pipeline::window_from_args(&args.window)?;
    let trajectory = pipeline::run_simulation(&definition, &window)?;

    println!("Model: {} ({})", definition.name, definition.kind.display_name());
    print!("{}", report::format_trajectory_summary(&trajectory));

    if let Some(path) = &args.export {
        write_trajectory_csv(path, &trajectory)?;
    }
    Ok(())
}

fn handle_sweep(args: SweepArgs) -> Result<(), AppError> {
    let definition = pipeline::load_definition(&args.model)?;
    let settings = SweepSettings {
        window: pipeline::window_from_args(&args.window)?,
        level_floor_pct: args.level_floor,
    };
    let output = pipeline::run_sweep_command(
        &definition,
        &args.parameter,
        &args.levels,
        &settings,
        args.variable.as_deref(),
        args.discard,
    )?;

    print!("{}", report::format_sweep(&output.sweep));
    if let Some((variable, peaks)) = &output.peaks {
        println!("\nPeak frequency of {variable}:");
        for (run, peak) in output.sweep.runs.iter().zip(peaks) {
            println!("{:>9}% {peak:>12.6}", run.level);
        }
    }
    Ok(())
}

fn handle_study(args: StudyArgs) -> Result<(), AppError> {
    let definition = pipeline::load_definition(&args.model)?;
    let config = study_config_from_args(&args)?;
    let outcome = pipeline::run_study_command(
        &definition,
        &args.factors,
        &args.levels,
        &args.variable,
        args.baseline_factor.as_deref(),
        &config,
        args.parallel,
    )?;

    print!(
        "{}",
        report::format_study_summary(&definition.name, &outcome, config.effect_tolerance)
    );

    if let Some(path) = &args.export_table {
        write_response_table_csv(path, &outcome.responses)?;
    }
    if let Some(path) = &args.export_study {
        write_study_json(path, &StudyFile::new(&definition.name, &outcome, &config))?;
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let definition = pipeline::load_definition(&args.model)?;
    let config = fit_config_from_args(&args)?;
    let source = match &args.observed {
        Some(path) => ObservationSource::File(path),
        None => ObservationSource::Synthetic {
            truth: &args.truth,
            window: config.window,
            noise_std: args.noise,
            seed: args.seed,
        },
    };
    let observed = pipeline::load_observations(&definition, &source, args.fit_until)?;
    let fit = pipeline::run_fit_command(&definition, &observed, &config)?;

    print!("{}", report::format_fit_report(&definition.name, &fit));

    if let Some(path) = &args.export {
        write_fit_report_json(path, &definition.name, &fit)?;
    }
    Ok(())
}

fn handle_verify(args: VerifyArgs) -> Result<(), AppError> {
    let definition = pipeline::load_definition(&args.model)?;
    let window = pipeline::window_from_args(&args.window)?;
    let outcome = pipeline::run_verification(&definition, args.suite.as_deref(), &window)?;

    print!("{}", report::format_verification(&outcome));

    if let Some(path) = &args.export {
        write_verification_json(path, &outcome)?;
    }
    if !outcome.all_passed() {
        return Err(AppError::new(
            4,
            format!(
                "Verification '{}' did not pass ({} failed, {} skipped).",
                outcome.suite,
                outcome.count(crate::verify::CheckStatus::Failed),
                outcome.count(crate::verify::CheckStatus::Skipped)
            ),
        ));
    }
    Ok(())
}

pub fn study_config_from_args(args: &StudyArgs) -> Result<StudyConfig, AppError> {
    let config = StudyConfig {
        window: pipeline::window_from_args(&args.window)?,
        discard_count: args.discard,
        suppress_count: args.suppress,
        level_floor_pct: args.level_floor,
        baseline_level: args.baseline_level,
        effect_tolerance: args.tolerance,
    };
    config.validate()?;
    Ok(config)
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let config = FitConfig {
        window: pipeline::window_from_args(&args.window)?,
        parameters: args.params.clone(),
        method: args.method,
        grid_steps: args.grid_steps,
        population: args.population,
        generations: args.generations,
        max_evaluations: args.max_evaluations,
        seed: args.seed,
        columns: (!args.columns.is_empty()).then(|| args.columns.clone()),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn study_config_follows_flags() {
        let Command::Study(args) = parse(&[
            "kstudy", "study", "--discard", "50", "--suppress", "1", "--level-floor", "-90",
            "--points", "500",
        ]) else {
            panic!("expected study");
        };
        let config = study_config_from_args(&args).unwrap();
        assert_eq!(config.discard_count, 50);
        assert_eq!(config.suppress_count, 1);
        assert_eq!(config.level_floor_pct, -90.0);
        assert_eq!(config.window.num_points, 500);
    }

    #[test]
    fn study_config_rejects_discard_beyond_window() {
        let Command::Study(args) = parse(&["kstudy", "study", "--points", "50", "--discard", "100"]) else {
            panic!("expected study");
        };
        assert_eq!(study_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn fit_config_rejects_duplicate_parameters() {
        let Command::Fit(args) = parse(&[
            "kstudy", "fit", "--param", "k1=0:1:2", "--param", "k1=0:1:3",
        ]) else {
            panic!("expected fit");
        };
        assert!(fit_config_from_args(&args).is_err());
    }

    #[test]
    fn fit_columns_are_optional() {
        let Command::Fit(args) = parse(&["kstudy", "fit", "--param", "k1=0:1:3"]) else {
            panic!("expected fit");
        };
        assert_eq!(fit_config_from_args(&args).unwrap().columns, None);

        let Command::Fit(args) = parse(&[
            "kstudy", "fit", "--param", "k1=0:1:3", "--column", "S2,S3",
        ]) else {
            panic!("expected fit");
        };
        assert_eq!(
            fit_config_from_args(&args).unwrap().columns,
            Some(vec!["S2".to_string(), "S3".to_string()])
        );
    }
}
