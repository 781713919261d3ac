//! CSV ingest for the measured series.
//!
//! Each curve lives in its own two-column CSV with a header row:
//!
//! ```text
//! t,It            x,Ix
//! 0,110.0         0,55.0
//! 1,91.9          1,48.6
//! ```
//!
//! Column names are matched case-insensitively (`t`/`time` and `it`/`i`/
//! `intensity` for the time file, `x`/`distance` and `ix`/`i`/`intensity` for
//! the space file). Files whose headers match none of these use their first
//! two columns.
//!
//! One bad sample invalidates the curve, so any unparsable or non-finite
//! cell fails the whole load.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::domain::SampleSet;
use crate::error::AppError;

/// Which curve a CSV holds; decides the accepted column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Time,
    Space,
}

impl SeriesKind {
    fn axis_names(self) -> &'static [&'static str] {
        match self {
            SeriesKind::Time => &["t", "time"],
            SeriesKind::Space => &["x", "distance"],
        }
    }

    fn value_names(self) -> &'static [&'static str] {
        match self {
            SeriesKind::Time => &["it", "i", "intensity"],
            SeriesKind::Space => &["ix", "i", "intensity"],
        }
    }
}

/// One loaded `(axis, value)` series.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub axis: Vec<f64>,
    pub values: Vec<f64>,
}

/// Load both CSVs into a [`SampleSet`].
pub fn load_sample_set(time_path: &Path, space_path: &Path) -> Result<SampleSet, AppError> {
    let time = load_series(time_path, SeriesKind::Time)?;
    let space = load_series(space_path, SeriesKind::Space)?;
    Ok(SampleSet::new(time.axis, time.values, space.axis, space.values))
}

/// Load one series from a CSV file.
pub fn load_series(path: &Path, kind: SeriesKind) -> Result<Series, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let series = read_series(file, kind)
        .map_err(|e| AppError::new(e.kind(), format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), rows = series.axis.len(), "loaded series");
    Ok(series)
}

/// Parse one series from any CSV reader.
pub fn read_series<R: Read>(reader: R, kind: SeriesKind) -> Result<Series, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid_input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let (axis_col, value_col) = resolve_columns(&headers, kind)?;

    let mut axis = Vec::new();
    let mut values = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // 1-based file line; the header is line 1.
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::invalid_input(format!("line {line}: CSV parse error: {e}")))?;

        // Blank trailing lines come through as a single empty field.
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        axis.push(parse_cell(&record, axis_col, &headers, line)?);
        values.push(parse_cell(&record, value_col, &headers, line)?);
    }

    if axis.is_empty() {
        return Err(AppError::invalid_input("CSV contains no data rows."));
    }

    Ok(Series { axis, values })
}

fn resolve_columns(headers: &StringRecord, kind: SeriesKind) -> Result<(usize, usize), AppError> {
    let header_map = build_header_map(headers);
    let find = |names: &[&str]| names.iter().find_map(|n| header_map.get(*n).copied());

    match (find(kind.axis_names()), find(kind.value_names())) {
        (Some(a), Some(v)) if a != v => Ok((a, v)),
        _ if headers.len() >= 2 => Ok((0, 1)),
        _ => Err(AppError::invalid_input(format!(
            "CSV needs two columns ({} and {}), found {}.",
            kind.axis_names()[0],
            kind.value_names()[0],
            headers.len()
        ))),
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn parse_cell(record: &StringRecord, col: usize, headers: &StringRecord, line: usize) -> Result<f64, AppError> {
    let name = headers.get(col).unwrap_or("?");
    let raw = record
        .get(col)
        .ok_or_else(|| AppError::invalid_input(format!("line {line}: missing column '{name}'.")))?;
    let v: f64 = raw
        .parse()
        .map_err(|_| AppError::invalid_input(format!("line {line}: '{raw}' in '{name}' is not a number.")))?;
    if !v.is_finite() {
        return Err(AppError::invalid_input(format!("line {line}: non-finite value in '{name}'.")));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn reads_named_columns_in_any_order() {
        let csv = "\u{feff}It,T\n110,0\n91.87,1\n";
        let s = read_series(csv.as_bytes(), SeriesKind::Time).unwrap();
        assert_eq!(s.axis, vec![0.0, 1.0]);
        assert_eq!(s.values, vec![110.0, 91.87]);
    }

    #[test]
    fn falls_back_to_first_two_columns() {
        let csv = "pos,signal\n0, 55\n1, 48.5\n\n";
        let s = read_series(csv.as_bytes(), SeriesKind::Space).unwrap();
        assert_eq!(s.axis, vec![0.0, 1.0]);
        assert_eq!(s.values, vec![55.0, 48.5]);
    }

    #[test]
    fn bad_cells_fail_with_line_numbers() {
        let csv = "t,It\n0,1\n1,abc\n";
        let err = read_series(csv.as_bytes(), SeriesKind::Time).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.message().contains("line 3"), "{err}");

        let csv = "t,It\n0,NaN\n";
        let err = read_series(csv.as_bytes(), SeriesKind::Time).unwrap_err();
        assert!(err.message().contains("non-finite"), "{err}");
    }

    #[test]
    fn header_only_file_is_rejected() {
        let err = read_series("x,Ix\n".as_bytes(), SeriesKind::Space).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn load_sample_set_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let time = dir.path().join("time.csv");
        let space = dir.path().join("space.csv");
        std::fs::write(&time, "t,It\n0,110\n1,91.9\n2,77.0\n").unwrap();
        std::fs::write(&space, "x,Ix\n0,55\n1,48.6\n").unwrap();

        let s = load_sample_set(&time, &space).unwrap();
        assert_eq!(s.t.len(), 3);
        assert_eq!(s.ix, vec![55.0, 48.6]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_series(Path::new("/definitely/not/here.csv"), SeriesKind::Time).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
