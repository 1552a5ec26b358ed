//! Export results to CSV / JSON.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts; trajectory CSVs use the same layout `ingest` reads.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{ResponseTable, Trajectory};
use crate::error::AppError;
use crate::fit::FitReport;
use crate::verify::VerificationReport;

/// Write a trajectory as `time,<var1>,<var2>,...`.
pub fn write_trajectory_csv(path: &Path, trajectory: &Trajectory) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create trajectory CSV '{}': {e}", path.display()))
    })?;
    write_trajectory(&mut file, trajectory)
}

fn write_trajectory<W: Write>(out: &mut W, trajectory: &Trajectory) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["time".to_string()];
    header.extend(trajectory.variable_names().iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write trajectory CSV header: {e}")))?;

    let values = trajectory.values();
    for (i, t) in trajectory.times().iter().enumerate() {
        let mut record = vec![format!("{t:.10}")];
        record.extend(values.row(i).iter().map(|v| format!("{v:.10}")));
        writer
            .write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write trajectory CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush trajectory CSV: {e}")))
}

/// Write a response table as `factor,<level1>,<level2>,...`.
pub fn write_response_table_csv(path: &Path, table: &ResponseTable) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create response CSV '{}': {e}", path.display()))
    })?;

    let levels: Vec<String> = table.levels().iter().map(|l| format!("{l}")).collect();
    writeln!(file, "factor,{}", levels.join(","))
        .map_err(|e| AppError::new(2, format!("Failed to write response CSV header: {e}")))?;

    for (factor, row) in table.factors().iter().zip(table.values().row_iter()) {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.10}")).collect();
        writeln!(file, "{factor},{}", cells.join(","))
            .map_err(|e| AppError::new(2, format!("Failed to write response CSV row: {e}")))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct FitExport<'a> {
    tool: &'a str,
    model: &'a str,
    #[serde(flatten)]
    report: &'a FitReport,
}

/// Write a fit report JSON file.
pub fn write_fit_report_json(path: &Path, model: &str, report: &FitReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    let export = FitExport {
        tool: "kstudy",
        model,
        report,
    };
    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))
}

/// Write a verification report JSON file.
pub fn write_verification_json(path: &Path, report: &VerificationReport) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create verification JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write verification JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeWindow;
    use crate::io::read_trajectory_csv;
    use crate::models::{AnalyticModel, Simulator, catalog};
    use nalgebra::DMatrix;

    fn temp(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("kstudy-{name}-{}", std::process::id()))
    }

    #[test]
    fn trajectory_csv_is_readable_by_ingest() {
        let window = TimeWindow::new(0.0, 4.0, 41).unwrap();
        let traj = AnalyticModel::load(&catalog::linear_pathway())
            .unwrap()
            .simulate(&window)
            .unwrap();
        let path = temp("traj.csv");
        write_trajectory_csv(&path, &traj).unwrap();
        let back = read_trajectory_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.variable_names(), traj.variable_names());
        assert!(back.same_grid(&traj, 1e-9));
        let diff = (back.values() - traj.values()).abs().max();
        assert!(diff < 1e-9, "diff={diff}");
    }

    #[test]
    fn response_csv_has_factor_rows() {
        let table = ResponseTable::new(
            vec!["k1".to_string(), "k2".to_string()],
            vec![-10.0, 0.0, 10.0],
            DMatrix::from_row_slice(2, 3, &[4.5, 5.0, 5.5, 5.0, 5.0, 5.0]),
        )
        .unwrap();
        let path = temp("resp.csv");
        write_response_table_csv(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "factor,-10,0,10");
        assert!(lines[1].starts_with("k1,4.5"));
        assert_eq!(lines.len(), 3);
    }
}
