//! Concurrent batch conversion of POS registration folders.
//!
//! [`Converter`] is the entry point: select folders, pick a
//! [`ConversionMode`], and start a run. Heavy lifting lives in
//! [`aggregate`] (per-folder PDF aggregation) and [`batch`] (the worker
//! pool and progress accounting).

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use posconvert_core::{Config, ConversionMode, PdfBackend, ProgressEvent};

pub mod aggregate;
pub mod batch;

pub use aggregate::{AggregateOutcome, aggregate_folder};
pub use batch::{BatchHandle, start_batch};

/// Batch converter over a fixed PDF backend.
///
/// Holds the folder selection between runs; each
/// [`start`](Converter::start) call snapshots the current selection.
pub struct Converter {
    backend: Arc<dyn PdfBackend>,
    config: Config,
    folders: Vec<PathBuf>,
}

impl Converter {
    pub fn new(backend: Arc<dyn PdfBackend>, config: Config) -> Self {
        Self {
            backend,
            config,
            folders: Vec::new(),
        }
    }

    /// Replace the current folder selection.
    pub fn select_folders(&mut self, folders: Vec<PathBuf>) {
        self.folders = folders;
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// Start a batch run over the selected folders.
    ///
    /// Returns immediately with a handle; progress events are pushed
    /// into `progress` from the runtime. Cancel via the supplied token
    /// or through the handle.
    pub fn start(
        &self,
        mode: ConversionMode,
        progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
        cancel: CancellationToken,
    ) -> BatchHandle {
        start_batch(
            self.folders.clone(),
            mode,
            self.config.clone(),
            self.backend.clone(),
            progress,
            cancel,
        )
    }
}
