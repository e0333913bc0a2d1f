use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;
use posconvert_convert::Converter;
use posconvert_core::{Config, ConversionMode, ProgressEvent, Severity};
use posconvert_pdf::PdfExtractBackend;

// Bar positions are integer; scale the [0, 1] fraction up.
const BAR_SCALE: u64 = 1000;

/// POS Form Converter - Batch-convert POS registration PDFs to text and spreadsheets
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one or more folders of registration PDFs
    Convert {
        /// Folders to convert; each folder becomes one job
        folders: Vec<PathBuf>,

        /// Which outputs to produce
        #[arg(long, value_enum, default_value_t = Mode::Both)]
        mode: Mode,

        /// Number of worker tasks (default: CPU count)
        #[arg(long)]
        workers: Option<usize>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Suppress per-file status lines
        #[arg(short, long)]
        quiet: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    /// Combined text artifact, then spreadsheet
    Both,
    /// Combined text artifact only
    Pdf,
    /// Spreadsheet from an existing artifact only
    Excel,
}

impl From<Mode> for ConversionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Both => ConversionMode::Both,
            Mode::Pdf => ConversionMode::PdfOnly,
            Mode::Excel => ConversionMode::ExcelOnly,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            folders,
            mode,
            workers,
            no_color,
            quiet,
        } => convert(folders, mode.into(), workers, no_color, quiet).await,
    }
}

async fn convert(
    folders: Vec<PathBuf>,
    mode: ConversionMode,
    workers: Option<usize>,
    no_color: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if folders.is_empty() {
        anyhow::bail!("No folders given. Pass one or more folders to convert.");
    }

    // Resolve configuration: CLI flags > env vars > defaults
    let workers = workers.or_else(|| {
        std::env::var("POSCONVERT_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
    });
    let mut config = Config::default();
    if let Some(workers) = workers {
        config.num_workers = workers.max(1);
    }

    let color = ColorMode(!no_color);

    let mut converter = Converter::new(Arc::new(PdfExtractBackend::new()), config);
    converter.select_folders(folders);

    let bar = ProgressBar::new(BAR_SCALE);
    let template = if color.enabled() {
        "{spinner:.cyan} [{bar:40.cyan/dim}] {percent}% {msg} ({elapsed})"
    } else {
        "{spinner} [{bar:40}] {percent}% {msg} ({elapsed})"
    };
    bar.set_style(
        ProgressStyle::with_template(template)
            .expect("bar template is static")
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let progress_bar = bar.clone();
    let progress_cb = move |event: ProgressEvent| match event {
        ProgressEvent::FolderStarted {
            index,
            total,
            folder,
        } => {
            if !quiet {
                progress_bar.println(format!("[{}/{}] {}", index + 1, total, folder.display()));
            }
        }
        ProgressEvent::Progress { fraction, label } => {
            progress_bar.set_position((fraction * BAR_SCALE as f64) as u64);
            progress_bar.set_message(label);
        }
        ProgressEvent::Status { line, severity } => {
            if !quiet || severity != Severity::Info {
                progress_bar.println(output::format_status(&line, severity, color));
            }
        }
        ProgressEvent::FolderFinished { .. } => {}
        ProgressEvent::Tick { .. } => progress_bar.tick(),
        ProgressEvent::Completed { .. } => {}
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let handle = converter.start(mode, progress_cb, cancel);
    let summary = handle.wait().await;
    bar.finish_and_clear();

    let mut stdout = std::io::stdout();
    output::print_summary(&mut stdout, &summary, color)?;

    if summary.stats.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
