//! Artifact reading and spreadsheet export.
//!
//! The exporter never sees the PDFs: it re-parses the combined text
//! artifact the aggregator wrote, using the same line-prefix schema
//! from `posconvert_core::artifact`, and writes one spreadsheet row
//! per parsed record.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, Workbook};

use posconvert_core::{ConvertError, PosRecord, artifact};

/// Spreadsheet column headers, fixed order. The first column is the
/// source file name; the rest mirror the artifact's field order.
pub const SHEET_COLUMNS: [&str; 12] = [
    "File Name",
    "Business Name",
    "Address",
    "Serial Number",
    "Device Type",
    "Group/Machine Code",
    "Notes",
    "MID",
    "TID",
    "TID 00",
    "TID V-TOP",
    "POS V-TOP",
];

/// One parsed per-file block from a combined artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub file_name: String,
    pub record: PosRecord,
}

/// Parse a combined text artifact back into records.
///
/// A line starting with the file-header marker begins a new record,
/// flushing the previous one; label-prefixed lines populate fields;
/// anything else (blank lines, separators) is ignored.
pub fn read_artifact(path: &Path) -> Result<Vec<ArtifactEntry>, ConvertError> {
    if !path.exists() {
        return Err(ConvertError::ArtifactMissing(path.to_path_buf()));
    }
    let is_txt = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    if !is_txt {
        return Err(ConvertError::ArtifactWrongType(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    let mut current: Option<ArtifactEntry> = None;

    for line in content.lines() {
        if let Some(file_name) = line.strip_prefix(artifact::FILE_HEADER_PREFIX) {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(ArtifactEntry {
                file_name: file_name.trim().to_string(),
                record: PosRecord::default(),
            });
            continue;
        }
        if let Some(ref mut entry) = current {
            artifact::set_field(&mut entry.record, line);
        }
    }
    if let Some(entry) = current.take() {
        entries.push(entry);
    }

    Ok(entries)
}

/// Convert a combined text artifact into a spreadsheet next to it.
///
/// Output path is the artifact path with its extension replaced by
/// `xlsx`, overwriting any prior run's output.
pub fn export_to_xlsx(artifact_path: &Path) -> Result<PathBuf, ConvertError> {
    let entries = read_artifact(artifact_path)?;
    let out_path = artifact_path.with_extension("xlsx");
    write_sheet(&entries, &out_path)?;
    tracing::info!(
        artifact = %artifact_path.display(),
        rows = entries.len(),
        out = %out_path.display(),
        "wrote spreadsheet"
    );
    Ok(out_path)
}

fn write_sheet(entries: &[ArtifactEntry], out_path: &Path) -> Result<(), ConvertError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name("POS Data")
        .map_err(|e| ConvertError::Spreadsheet(e.to_string()))?;

    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    for (col, name) in SHEET_COLUMNS.iter().enumerate() {
        sheet
            .write_with_format(0, col as u16, *name, &header)
            .map_err(|e| ConvertError::Spreadsheet(e.to_string()))?;
    }

    for (i, entry) in entries.iter().enumerate() {
        let row = (i + 1) as u32;
        let record = &entry.record;
        let cells: [Option<&str>; 12] = [
            Some(entry.file_name.as_str()),
            record.business_name.as_deref(),
            record.address.as_deref(),
            record.serial_number.as_deref(),
            record.device_type.as_deref(),
            record.group_name.as_deref(),
            record.notes.as_deref(),
            record.merchant_id.as_deref(),
            record.terminal_id.as_deref(),
            record.terminal_id_00.as_deref(),
            record.terminal_vtop_id.as_deref(),
            record.pos_vtop.as_deref(),
        ];
        for (col, cell) in cells.iter().enumerate() {
            // Missing fields stay blank cells.
            if let Some(value) = cell {
                sheet
                    .write(row, col as u16, *value)
                    .map_err(|e| ConvertError::Spreadsheet(e.to_string()))?;
            }
        }
    }

    sheet.autofit();
    workbook
        .save(out_path)
        .map_err(|e| ConvertError::Spreadsheet(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use posconvert_core::artifact::render_block;

    fn sample_record() -> PosRecord {
        PosRecord {
            group_name: Some("HN01".into()),
            business_name: Some("CUA HANG ABC".into()),
            address: Some("12 Lê Lợi, Quận 1".into()),
            serial_number: Some("F12345678".into()),
            device_type: Some("PAX A920".into()),
            notes: Some("null".into()),
            merchant_id: Some("970400123456".into()),
            terminal_id: Some("1239567890".into()),
            terminal_id_00: Some("1200567890".into()),
            terminal_vtop_id: Some("9988776655".into()),
            pos_vtop: Some("POS_9988776655".into()),
        }
    }

    #[test]
    fn missing_artifact_is_rejected() {
        let err = read_artifact(Path::new("/nonexistent/run.txt")).unwrap_err();
        assert!(matches!(err, ConvertError::ArtifactMissing(_)));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        std::fs::write(&path, "File: a.pdf\n").unwrap();

        let err = read_artifact(&path).unwrap_err();
        assert!(matches!(err, ConvertError::ArtifactWrongType(_)));
    }

    #[test]
    fn round_trip_preserves_set_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");

        let full = sample_record();
        let sparse = PosRecord {
            merchant_id: Some("970400999".into()),
            notes: Some("giao sáng".into()),
            ..Default::default()
        };
        let mut content = render_block("a.pdf", &full);
        content.push_str(&render_block("b.pdf", &sparse));
        std::fs::write(&path, content).unwrap();

        let entries = read_artifact(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "a.pdf");
        assert_eq!(entries[0].record, full);
        assert_eq!(entries[1].file_name, "b.pdf");
        assert_eq!(entries[1].record, sparse);
    }

    #[test]
    fn trailing_record_without_separator_is_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        std::fs::write(&path, "File: tail.pdf\nMID: 1234\n").unwrap();

        let entries = read_artifact(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.merchant_id.as_deref(), Some("1234"));
    }

    #[test]
    fn empty_artifact_yields_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        std::fs::write(&path, "").unwrap();
        assert!(read_artifact(&path).unwrap().is_empty());
    }

    #[test]
    fn export_writes_spreadsheet_next_to_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        std::fs::write(&path, render_block("a.pdf", &sample_record())).unwrap();

        let out = export_to_xlsx(&path).unwrap();
        assert_eq!(out, dir.path().join("run.xlsx"));
        assert!(out.exists());
        assert!(std::fs::metadata(&out).unwrap().len() > 0);
    }

    #[test]
    fn export_rejects_non_artifact_input() {
        let err = export_to_xlsx(Path::new("/nonexistent/run.txt")).unwrap_err();
        assert!(matches!(err, ConvertError::ArtifactMissing(_)));
    }
}
