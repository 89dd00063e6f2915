//! Reference CSV exporter. Downstream callers only need two operations —
//! write the valid records, write the error bucket — and no promises about
//! styling; this is the minimal implementation that makes those promises
//! true. A header row is always written, even for zero data rows, since the
//! canonical schema promises the header is always present.

use std::fs;
use std::path::{Path, PathBuf};

use harvester_core::{ErrorRecord, ProductRecord, CANONICAL_COLUMNS};
use tracing::info;

/// Write `records` as CSV to `destination`, sorted ascending by `Name`
/// (case-insensitive), in the canonical column order. Creates parent
/// directories as needed. Returns the path written.
pub fn write_records(records: &[ProductRecord], destination: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
    let destination = destination.as_ref().to_path_buf();
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut sorted: Vec<&ProductRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let mut writer = csv::Writer::from_path(&destination)?;
    writer.write_record(CANONICAL_COLUMNS)?;
    for record in sorted {
        let row: Vec<&str> = record.columns().into_iter().map(|(_, v)| v).collect();
        writer.write_record(row)?;
    }
    writer.flush()?;

    info!(path = %destination.display(), count = records.len(), "exported product records to csv");
    Ok(destination)
}

/// Write the QC error bucket as CSV: one row per violation, `(subject, kind,
/// detail)`.
pub fn write_errors(
    errors: &std::collections::HashMap<String, Vec<ErrorRecord>>,
    destination: impl AsRef<Path>,
) -> anyhow::Result<PathBuf> {
    let destination = destination.as_ref().to_path_buf();
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut subjects: Vec<&String> = errors.keys().collect();
    subjects.sort();

    let mut writer = csv::Writer::from_path(&destination)?;
    writer.write_record(["Subject", "ErrorKind", "Detail"])?;
    for subject in subjects {
        for violation in &errors[subject] {
            writer.write_record([subject.as_str(), &violation.error_kind.to_string(), violation.detail.as_str()])?;
        }
    }
    writer.flush()?;

    let total: usize = errors.values().map(|v| v.len()).sum();
    info!(path = %destination.display(), count = total, "exported qc errors to csv");
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::ErrorKind;

    fn record(name: &str) -> ProductRecord {
        ProductRecord { name: name.to_string(), ..ProductRecord::default() }
    }

    #[test]
    fn records_are_sorted_case_insensitively_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_records(&[record("bord"), record("Alfa")], &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let alfa_pos = content.find("Alfa").unwrap();
        let bord_pos = content.find("bord").unwrap();
        assert!(alfa_pos < bord_pos);
    }

    #[test]
    fn header_row_matches_canonical_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_records(&[], &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert!(header.starts_with("Name,SKU,Color"));
    }

    #[test]
    fn creates_destination_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/out.csv");
        let written = write_records(&[record("x")], &path).unwrap();
        assert!(written.exists());
    }

    #[test]
    fn error_csv_has_one_row_per_violation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.csv");
        let mut errors = std::collections::HashMap::new();
        errors.insert(
            "sku-1".to_string(),
            vec![
                ErrorRecord { error_kind: ErrorKind::MissingField, subject_key: "sku-1".into(), detail: "Missing: Name".into() },
                ErrorRecord { error_kind: ErrorKind::InvalidPrice, subject_key: "sku-1".into(), detail: "Price is not a number".into() },
            ],
        );
        write_errors(&errors, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
