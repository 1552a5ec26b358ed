//! Trajectory CSV ingest.
//!
//! Observed data arrives as a CSV with a `time` column followed by one column
//! per variable:
//!
//! ```text
//! time,S1,S2,S3
//! 0.0,10.0,0.0,0.0
//! 0.1,9.05,0.90,0.05
//! ```
//!
//! Unlike study inputs, a trajectory is all-or-nothing: a malformed row is an
//! error (exit code 2) naming the line, never silently skipped.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use nalgebra::DMatrix;
use tracing::info;

use crate::domain::Trajectory;
use crate::error::AppError;

/// Read a trajectory CSV file.
pub fn read_trajectory_csv(path: &Path) -> Result<Trajectory, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open trajectory CSV '{}': {e}", path.display()),
        )
    })?;
    let trajectory = parse_trajectory_csv(file)?;
    info!(
        path = %path.display(),
        samples = trajectory.len(),
        variables = trajectory.variable_names().len(),
        "loaded trajectory"
    );
    Ok(trajectory)
}

/// Parse trajectory CSV text from any reader.
pub fn parse_trajectory_csv<R: Read>(reader: R) -> Result<Trajectory, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let names = variable_columns(&headers)?;

    let mut times = Vec::new();
    let mut data: Vec<f64> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, which is line 1
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        if record.len() != names.len() + 1 {
            return Err(AppError::new(
                2,
                format!(
                    "Line {line}: expected {} fields, found {}",
                    names.len() + 1,
                    record.len()
                ),
            ));
        }
        for (col, field) in record.iter().enumerate() {
            let value = parse_number(field).ok_or_else(|| {
                AppError::new(2, format!("Line {line}: invalid number '{field}' in column {}", col + 1))
            })?;
            if col == 0 {
                times.push(value);
            } else {
                data.push(value);
            }
        }
    }

    let values = DMatrix::from_row_slice(times.len(), names.len(), &data);
    Ok(Trajectory::new(times, names, values)?)
}

fn variable_columns(headers: &StringRecord) -> Result<Vec<String>, AppError> {
    let mut columns = headers.iter().map(normalize_header_name);
    match columns.next() {
        Some(first) if first.eq_ignore_ascii_case("time") => {}
        Some(first) => {
            return Err(AppError::new(
                2,
                format!("First CSV column must be 'time', found '{first}'"),
            ));
        }
        None => return Err(AppError::new(2, "Trajectory CSV has no header")),
    }
    let names: Vec<String> = columns.collect();
    if names.is_empty() {
        return Err(AppError::new(2, "Trajectory CSV has no variable columns"));
    }
    if let Some(blank) = names.iter().position(|n| n.is_empty()) {
        return Err(AppError::new(2, format!("Empty column name at position {}", blank + 2)));
    }
    Ok(names)
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_and_variables() {
        let csv = "\u{feff}time,S1,S2\n0,10,0\n0.5, 6.0 ,3.5\n1.0,3.6,5\n";
        let traj = parse_trajectory_csv(csv.as_bytes()).unwrap();
        assert_eq!(traj.times(), &[0.0, 0.5, 1.0]);
        assert_eq!(traj.variable_names(), &["S1".to_string(), "S2".to_string()]);
        assert_eq!(traj.column("S2").unwrap(), vec![0.0, 3.5, 5.0]);
    }

    #[test]
    fn rejects_bad_inputs() {
        // first column is not time
        assert!(parse_trajectory_csv("t,S1\n0,1\n".as_bytes()).is_err());
        // no variables
        assert!(parse_trajectory_csv("time\n0\n".as_bytes()).is_err());
        // non-numeric value
        let err = parse_trajectory_csv("time,S1\n0,1\n1,abc\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Line 3"));
        // times not increasing
        assert!(parse_trajectory_csv("time,S1\n1,1\n0,2\n".as_bytes()).is_err());
        // ragged row
        assert!(parse_trajectory_csv("time,S1,S2\n0,1\n".as_bytes()).is_err());
    }
}
