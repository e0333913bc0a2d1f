use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub mod artifact;
pub mod backend;

pub use artifact::{BLOCK_SEPARATOR, FILE_HEADER_PREFIX, field_lines, render_block, set_field};
pub use backend::{BackendError, PdfBackend};

/// One structured registration form extracted from a single PDF.
///
/// Every field is optional; `None` means the pattern did not match
/// anywhere in the source text. `terminal_id_00` and `pos_vtop` are
/// derived, never extracted directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosRecord {
    pub group_name: Option<String>,
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub serial_number: Option<String>,
    pub device_type: Option<String>,
    pub notes: Option<String>,
    pub merchant_id: Option<String>,
    pub terminal_id: Option<String>,
    pub terminal_id_00: Option<String>,
    pub terminal_vtop_id: Option<String>,
    pub pos_vtop: Option<String>,
}

impl PosRecord {
    /// True when no pattern matched at all ("no data found" case).
    pub fn is_empty(&self) -> bool {
        self.group_name.is_none()
            && self.business_name.is_none()
            && self.address.is_none()
            && self.serial_number.is_none()
            && self.device_type.is_none()
            && self.notes.is_none()
            && self.merchant_id.is_none()
            && self.terminal_id.is_none()
            && self.terminal_id_00.is_none()
            && self.terminal_vtop_id.is_none()
            && self.pos_vtop.is_none()
    }
}

/// Which phases a batch run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    /// Only write the combined text artifact.
    PdfOnly,
    /// Only convert an existing artifact to a spreadsheet.
    ExcelOnly,
    /// Artifact then spreadsheet, per folder.
    Both,
}

impl ConversionMode {
    pub fn includes_pdf(self) -> bool {
        matches!(self, Self::PdfOnly | Self::Both)
    }

    pub fn includes_excel(self) -> bool {
        matches!(self, Self::ExcelOnly | Self::Both)
    }
}

/// Lifecycle of one folder's conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    PdfPhase,
    ExportPhase,
    Done,
    Failed,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Severity attached to a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Counts of terminal job states for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Terminal result of one folder's job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub folder: PathBuf,
    pub phase: JobPhase,
    pub status_lines: Vec<String>,
}

/// Final result of a batch run, returned by `BatchHandle::wait`.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub outcomes: Vec<JobOutcome>,
    pub stats: BatchStats,
    pub elapsed: Duration,
}

/// Progress events emitted during a batch run.
///
/// The core pushes these into a caller-supplied callback; it holds no
/// reference to any rendering object. The presentation layer decides
/// how (or whether) to render each variant.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    FolderStarted {
        index: usize,
        total: usize,
        folder: PathBuf,
    },
    /// Aggregate run progress, monotonically non-decreasing in [0, 1].
    Progress { fraction: f64, label: String },
    Status { line: String, severity: Severity },
    FolderFinished {
        index: usize,
        total: usize,
        folder: PathBuf,
        phase: JobPhase,
    },
    /// Wall-clock heartbeat, emitted about once per second.
    Tick { elapsed: Duration },
    /// Emitted exactly once, after every job has reached a terminal state.
    Completed {
        elapsed: Duration,
        stats: BatchStats,
    },
}

/// Error taxonomy for the conversion pipeline.
///
/// All of these are fatal to a single folder's job only; the batch
/// records them as status lines and keeps going.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("folder does not exist: {0}")]
    FolderMissing(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("artifact not found: {0}")]
    ArtifactMissing(PathBuf),
    #[error("not a text artifact: {0}")]
    ArtifactWrongType(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker tasks in the conversion pool.
    pub num_workers: usize,
    /// Interval between `Tick` events.
    pub tick_interval: Duration,
    /// Grace period for `cancel_and_wait` before the run is aborted.
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            tick_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Path of the combined text artifact for `folder`.
///
/// Named after the folder itself and placed inside it, overwriting any
/// prior run's output.
pub fn artifact_path_for(folder: &Path) -> PathBuf {
    let base = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "combined".to_string());
    folder.join(format!("{base}.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_reports_empty() {
        assert!(PosRecord::default().is_empty());

        let record = PosRecord {
            merchant_id: Some("123".into()),
            ..Default::default()
        };
        assert!(!record.is_empty());
    }

    #[test]
    fn mode_phase_inclusion() {
        assert!(ConversionMode::Both.includes_pdf());
        assert!(ConversionMode::Both.includes_excel());
        assert!(ConversionMode::PdfOnly.includes_pdf());
        assert!(!ConversionMode::PdfOnly.includes_excel());
        assert!(!ConversionMode::ExcelOnly.includes_pdf());
        assert!(ConversionMode::ExcelOnly.includes_excel());
    }

    #[test]
    fn artifact_path_uses_folder_base_name() {
        let path = artifact_path_for(Path::new("/data/Q3 forms"));
        assert_eq!(path, Path::new("/data/Q3 forms/Q3 forms.txt"));
    }
}
