// loglens - core/export.rs
//
// CSV and JSON export of line records.
// Core layer: writes to any Write trait object.

use crate::core::model::LineRecord;
use crate::util::constants::MAX_EXPORT_LINES;
use crate::util::error::{EngineError, Result};
use std::io::Write;
use std::path::Path;

/// Export records to CSV format.
///
/// Writes: line, level, timestamp_ms, text
pub fn export_csv<W: Write>(records: &[LineRecord], writer: W, export_path: &Path) -> Result<usize> {
    check_size(records)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(["line", "level", "timestamp_ms", "text"])
        .map_err(|e| csv_error(export_path, e))?;

    let mut count = 0;
    for record in records {
        csv_writer
            .write_record([
                record.line_number.to_string().as_str(),
                record.level.map(|l| l.label()).unwrap_or(""),
                record
                    .timestamp_ms
                    .map(|t| t.to_string())
                    .unwrap_or_default()
                    .as_str(),
                record.text.as_str(),
            ])
            .map_err(|e| csv_error(export_path, e))?;
        count += 1;
    }

    csv_writer
        .flush()
        .map_err(|e| EngineError::io(export_path, "flush", e))?;
    Ok(count)
}

/// Export records to JSON format (array of objects).
pub fn export_json<W: Write>(
    records: &[LineRecord],
    writer: W,
    export_path: &Path,
) -> Result<usize> {
    check_size(records)?;
    serde_json::to_writer_pretty(writer, records).map_err(|e| EngineError::Corrupt {
        path: export_path.to_path_buf(),
        detail: format!("JSON serialisation failed: {e}"),
    })?;
    Ok(records.len())
}

fn check_size(records: &[LineRecord]) -> Result<()> {
    if records.len() > MAX_EXPORT_LINES {
        return Err(EngineError::invalid(format!(
            "export of {} lines exceeds maximum of {MAX_EXPORT_LINES}",
            records.len()
        )));
    }
    Ok(())
}

fn csv_error(path: &Path, source: csv::Error) -> EngineError {
    EngineError::Corrupt {
        path: path.to_path_buf(),
        detail: format!("CSV write failed: {source}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Level;
    use std::path::PathBuf;

    fn make_record(line: u64, text: &str) -> LineRecord {
        LineRecord {
            line_number: line,
            text: text.to_string(),
            level: Some(Level::Error),
            timestamp_ms: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn test_csv_export() {
        let records = vec![make_record(1, "Error one"), make_record(2, "Error two")];
        let mut buf = Vec::new();
        let count = export_csv(&records, &mut buf, &PathBuf::from("out.csv")).unwrap();
        assert_eq!(count, 2);

        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("line,level"));
        assert!(output.contains("Error one"));
        assert!(output.contains("Error two"));
    }

    #[test]
    fn test_json_export() {
        let records = vec![make_record(1, "Test message")];
        let mut buf = Vec::new();
        let count = export_json(&records, &mut buf, &PathBuf::from("out.json")).unwrap();
        assert_eq!(count, 1);

        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("Test message"));
        assert!(output.contains("\"level\": \"error\""));
    }
}
