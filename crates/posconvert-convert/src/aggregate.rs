//! Per-folder PDF aggregation: read every PDF in a folder, extract
//! form fields, and write one combined text artifact.

use std::path::{Path, PathBuf};

use posconvert_core::{ConvertError, PdfBackend, Severity, artifact, artifact_path_for};

/// Result of aggregating one folder.
#[derive(Debug)]
pub struct AggregateOutcome {
    /// Per-file status lines, in processing order.
    pub status: Vec<(Severity, String)>,
    /// Path of the written artifact; `None` when the folder held no PDFs.
    pub artifact_path: Option<PathBuf>,
    /// Files that yielded an artifact block.
    pub converted: usize,
}

/// Convert every PDF in `folder` into one combined text artifact.
///
/// Files are processed in lexicographic name order so the artifact is
/// reproducible. A file that cannot be read or yields no fields gets a
/// status line and is skipped; only folder-level problems (missing
/// directory, artifact write failure) fail the whole operation.
pub fn aggregate_folder(
    folder: &Path,
    backend: &dyn PdfBackend,
) -> Result<AggregateOutcome, ConvertError> {
    if !folder.exists() {
        return Err(ConvertError::FolderMissing(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(ConvertError::NotADirectory(folder.to_path_buf()));
    }

    let pdf_files = list_pdf_files(folder)?;
    if pdf_files.is_empty() {
        tracing::warn!(folder = %folder.display(), "no PDF files found");
        return Ok(AggregateOutcome {
            status: vec![(
                Severity::Info,
                format!("no PDF files found in {}", folder.display()),
            )],
            artifact_path: None,
            converted: 0,
        });
    }

    let mut status = Vec::with_capacity(pdf_files.len());
    let mut combined = String::new();
    let mut converted = 0usize;

    for path in &pdf_files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let text = match backend.extract_text(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "failed to process PDF");
                status.push((Severity::Warning, format!("{name}: failed to process: {e}")));
                continue;
            }
        };

        let record = posconvert_extract::extract(&text);
        if record.is_empty() {
            tracing::debug!(file = %name, "no form fields found");
            status.push((Severity::Warning, format!("{name}: no form fields found")));
            continue;
        }

        combined.push_str(&artifact::render_block(&name, &record));
        status.push((Severity::Info, format!("{name}: converted")));
        converted += 1;
    }

    // Rewritten from scratch each run, even when no file yielded a
    // block, so stale output from a prior run never survives.
    let artifact_path = artifact_path_for(folder);
    std::fs::write(&artifact_path, &combined)?;
    tracing::info!(
        folder = %folder.display(),
        files = pdf_files.len(),
        converted,
        artifact = %artifact_path.display(),
        "aggregated folder"
    );

    Ok(AggregateOutcome {
        status,
        artifact_path: Some(artifact_path),
        converted,
    })
}

/// Immediate children of `folder` named `*.pdf` (case-insensitive),
/// sorted by file name.
fn list_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            files.push(path);
        }
    }
    files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(files)
}
