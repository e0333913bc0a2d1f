use std::io::Write;

use owo_colors::OwoColorize;

use posconvert_core::{BatchSummary, JobPhase, Severity};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Render one status line for display, color keyed by severity.
pub fn format_status(line: &str, severity: Severity, color: ColorMode) -> String {
    if !color.enabled() {
        return match severity {
            Severity::Info => line.to_string(),
            Severity::Warning => format!("WARNING: {line}"),
            Severity::Error => format!("ERROR: {line}"),
        };
    }
    match severity {
        Severity::Info => line.to_string(),
        Severity::Warning => format!("{} {line}", "WARNING:".yellow()),
        Severity::Error => format!("{} {line}", "ERROR:".red()),
    }
}

/// Print the final per-folder report and totals.
pub fn print_summary(
    w: &mut dyn Write,
    summary: &BatchSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    for outcome in &summary.outcomes {
        let name = outcome.folder.display();
        match outcome.phase {
            JobPhase::Done => {
                if color.enabled() {
                    writeln!(w, "{} {}", "DONE".green(), name)?;
                } else {
                    writeln!(w, "DONE {}", name)?;
                }
            }
            JobPhase::Failed => {
                if color.enabled() {
                    writeln!(w, "{} {}", "FAILED".red(), name)?;
                } else {
                    writeln!(w, "FAILED {}", name)?;
                }
                for line in &outcome.status_lines {
                    writeln!(w, "    {}", line)?;
                }
            }
            JobPhase::Cancelled => {
                if color.enabled() {
                    writeln!(w, "{} {}", "CANCELLED".yellow(), name)?;
                } else {
                    writeln!(w, "CANCELLED {}", name)?;
                }
            }
            // All outcomes are terminal by the time the summary exists.
            _ => {}
        }
    }

    let stats = &summary.stats;
    writeln!(
        w,
        "\n{} folders: {} done, {} failed, {} cancelled in {:.1?}",
        stats.total, stats.done, stats.failed, stats.cancelled, summary.elapsed
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use posconvert_core::{BatchStats, JobOutcome};

    #[test]
    fn plain_status_lines_carry_severity_prefix() {
        let color = ColorMode(false);
        assert_eq!(format_status("x: converted", Severity::Info, color), "x: converted");
        assert_eq!(
            format_status("x: skipped", Severity::Warning, color),
            "WARNING: x: skipped"
        );
        assert_eq!(
            format_status("x: broken", Severity::Error, color),
            "ERROR: x: broken"
        );
    }

    #[test]
    fn summary_lists_failed_folder_details() {
        let summary = BatchSummary {
            outcomes: vec![
                JobOutcome {
                    folder: PathBuf::from("/data/a"),
                    phase: JobPhase::Done,
                    status_lines: vec!["form.pdf: converted".into()],
                },
                JobOutcome {
                    folder: PathBuf::from("/data/b"),
                    phase: JobPhase::Failed,
                    status_lines: vec!["/data/b: folder does not exist".into()],
                },
            ],
            stats: BatchStats {
                total: 2,
                done: 1,
                failed: 1,
                cancelled: 0,
            },
            elapsed: Duration::from_secs(2),
        };

        let mut buf = Vec::new();
        print_summary(&mut buf, &summary, ColorMode(false)).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("DONE /data/a"));
        assert!(text.contains("FAILED /data/b"));
        assert!(text.contains("folder does not exist"));
        assert!(text.contains("2 folders: 1 done, 1 failed, 0 cancelled"));
    }
}
