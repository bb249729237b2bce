use crate::accounting::LogEntry;
use crate::engine::SkipReason;
use crate::error::ExportError;
use crate::fill::ProcessingSummary;
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Successful writes listed before the rest are elided.
pub const SUCCESS_SAMPLE_LIMIT: usize = 100;
/// Element ids listed per skip reason.
pub const SKIP_IDS_PER_REASON: usize = 20;

const RULE: &str = "============================================================";

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "-".repeat(title.len()))
}

fn entry_line(f: &mut fmt::Formatter<'_>, entry: &LogEntry) -> fmt::Result {
    writeln!(
        f,
        "[{}] {} {}: {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.element_id,
        entry.category,
        entry.message
    )
}

/// Plain-text processing report. Its output depends only on the summary and
/// the generation time.
pub struct Report<'a> {
    summary: &'a ProcessingSummary,
    generated_at: DateTime<Local>,
}

impl<'a> Report<'a> {
    #[must_use]
    pub fn new(summary: &'a ProcessingSummary, generated_at: DateTime<Local>) -> Self {
        Self {
            summary,
            generated_at,
        }
    }

    fn header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        writeln!(f, "{RULE}")?;
        writeln!(f, "PARAMETER AUTO-FILL REPORT")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Document:  {}", summary.document)?;
        writeln!(f, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Started:   {}", summary.started_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Duration:  {:.2}s", summary.duration.as_secs_f64())?;

        section(f, "SUMMARY")?;
        writeln!(f, "Elements scanned:    {}", summary.elements_scanned)?;
        writeln!(f, "Elements updated:    {}", summary.elements_updated)?;
        writeln!(f, "Successful writes:   {}", summary.successful_writes)?;
        writeln!(f, "Skipped:             {}", summary.skipped)?;
        writeln!(f, "Errors:              {}", summary.errors)?;
        writeln!(f, "Rooms touched:       {}", summary.rooms_touched)?;
        writeln!(f, "Group types touched: {}", summary.group_types_touched)?;

        if !summary.modes.is_empty() {
            section(f, "MODES")?;
            for mode in &summary.modes {
                writeln!(
                    f,
                    "{}: {} processed, {} updated, {} writes, {} skipped, {} errors ({:.2}s)",
                    mode.mode,
                    mode.elements_processed,
                    mode.elements_updated,
                    mode.successes,
                    mode.skipped,
                    mode.errors,
                    mode.duration.as_secs_f64()
                )?;
            }
        }

        if !summary.warnings.is_empty() {
            section(f, "WARNINGS")?;
            for warning in &summary.warnings {
                writeln!(f, "! {warning}")?;
            }
        }
        Ok(())
    }

    fn skipped(&self, f: &mut fmt::Formatter<'_>, by_count: &[(SkipReason, usize)]) -> fmt::Result {
        section(f, "SKIPPED ELEMENTS")?;
        for (reason, _) in by_count {
            let ids = self
                .summary
                .skipped_elements
                .get(reason)
                .map_or(&[][..], Vec::as_slice);
            let listed: Vec<String> = ids
                .iter()
                .take(SKIP_IDS_PER_REASON)
                .map(ToString::to_string)
                .collect();
            writeln!(f, "{reason} ({} elements):", ids.len())?;
            write!(f, "  {}", listed.join(", "))?;
            if ids.len() > SKIP_IDS_PER_REASON {
                write!(f, " ... and {} more", ids.len() - SKIP_IDS_PER_REASON)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = &self.summary.log;
        self.header(f)?;

        let by_count = log.skip_reasons_by_count();
        if !by_count.is_empty() {
            section(f, "SKIP REASONS")?;
            for (reason, count) in &by_count {
                writeln!(f, "{reason}: {count}")?;
            }
        }

        if !log.successes.is_empty() {
            let shown = log.successes.len().min(SUCCESS_SAMPLE_LIMIT);
            section(f, &format!("SUCCESSES ({shown} of {})", log.successes.len()))?;
            for entry in log.successes.iter().take(SUCCESS_SAMPLE_LIMIT) {
                entry_line(f, entry)?;
            }
        }

        if !by_count.is_empty() {
            self.skipped(f, &by_count)?;
        }

        if !log.errors.is_empty() {
            section(f, "ERRORS")?;
            for entry in &log.errors {
                entry_line(f, entry)?;
                if let Some(exception) = &entry.exception {
                    writeln!(f, "    {exception}")?;
                }
            }
        }
        Ok(())
    }
}

/// Renders the plain-text processing report.
#[must_use]
pub fn render_report(summary: &ProcessingSummary, generated_at: DateTime<Local>) -> String {
    Report::new(summary, generated_at).to_string()
}

/// Inserts `_YYYYMMDD_HHMMSS` before the extension; `.txt` when none.
#[must_use]
pub fn timestamped_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "fill_report".into(), |s| s.to_string_lossy());
    let extension = path
        .extension()
        .map_or_else(|| "txt".into(), |e| e.to_string_lossy());
    let name = format!("{stem}_{}.{extension}", at.format("%Y%m%d_%H%M%S"));
    path.with_file_name(name)
}

/// Writes the report next to `path` with the current time in its name.
///
/// Returns the path actually written.
///
/// # Errors
///
/// Returns [`ExportError::FileCreate`] when the timestamped file cannot be
/// created and [`ExportError::Write`] when writing to it fails.
pub fn export_report<P: AsRef<Path>>(
    summary: &ProcessingSummary,
    path: P,
) -> Result<PathBuf, ExportError> {
    let now = Local::now();
    let target = timestamped_path(path.as_ref(), now);
    let mut file = File::create(&target).map_err(|source| ExportError::FileCreate {
        path: target.clone(),
        source,
    })?;
    write!(file, "{}", Report::new(summary, now)).map_err(|source| ExportError::Write {
        path: target.clone(),
        source,
    })?;
    Ok(target)
}
