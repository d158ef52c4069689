//! Progress bar and run summary.

use super::colors::{Styled, Symbols, stdout_supports_color};
use crate::coordinator::RunReport;
use crate::error::FailureKind;
use crate::progress::ProgressSnapshot;
use std::io::{self, IsTerminal, Write};

/// Longest file name shown next to the bar.
const MAX_FILE_DISPLAY: usize = 30;

/// Progress bar configuration.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Width of the bar in characters.
    pub width: usize,
    /// Whether to draw at all.
    pub enabled: bool,
    pub filled_char: char,
    pub empty_char: char,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            width: 20,
            enabled: io::stdout().is_terminal(),
            filled_char: '\u{2588}', // Full block
            empty_char: '\u{2591}',  // Light shade
        }
    }
}

/// Single-line progress bar redrawn from [`ProgressSnapshot`]s.
pub struct ProgressBar {
    config: ProgressConfig,
    color_enabled: bool,
    last_width: usize,
}

impl ProgressBar {
    pub fn new() -> Self {
        Self::with_config(ProgressConfig::default())
    }

    pub fn with_config(config: ProgressConfig) -> Self {
        Self {
            config,
            color_enabled: stdout_supports_color(),
            last_width: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Redraw the bar for `snapshot`.
    pub fn update(&mut self, snapshot: &ProgressSnapshot) {
        if !self.config.enabled {
            return;
        }

        let percent = snapshot.percentage();
        let status = self.status(snapshot);
        let visible = self.config.width + 2 + status.chars().count();
        let padding = self.last_width.saturating_sub(visible);
        self.last_width = visible;

        let bar = Styled::with_color_support(self.bar(percent), self.color_enabled).cyan();
        let mut stdout = io::stdout().lock();
        // Carriage return overwrites the previous line; padding clears its tail.
        let _ = write!(stdout, "\r[{}]{}{:padding$}", bar, status, "");
        let _ = stdout.flush();
    }

    fn bar(&self, percent: f64) -> String {
        let filled = ((percent / 100.0) * self.config.width as f64) as usize;
        let filled = filled.min(self.config.width);
        std::iter::repeat_n(self.config.filled_char, filled)
            .chain(std::iter::repeat_n(
                self.config.empty_char,
                self.config.width - filled,
            ))
            .collect()
    }

    /// Text drawn after the bar.
    fn status(&self, snapshot: &ProgressSnapshot) -> String {
        let file = snapshot
            .current_file
            .as_deref()
            .and_then(|path| path.file_name())
            .map(|name| truncate_left(&name.to_string_lossy(), MAX_FILE_DISPLAY))
            .unwrap_or_default();

        format!(
            " {}/{} files ({:.0}%) {} images - {}",
            snapshot.processed_files,
            snapshot.total_files,
            snapshot.percentage(),
            snapshot.extracted_images,
            file
        )
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the last `max` characters of `text`, marking the cut with `...`.
fn truncate_left(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}

/// Print the end-of-run summary box.
pub fn print_summary(report: &RunReport, quiet: bool) {
    if quiet {
        return;
    }
    for line in summary_lines(report, stdout_supports_color()) {
        println!("{}", line);
    }
}

fn summary_lines(report: &RunReport, color_enabled: bool) -> Vec<String> {
    const WIDTH: usize = 40;
    let inner = WIDTH - 2;
    let symbols = Symbols::new(color_enabled);
    let horizontal: String = "\u{2500}".repeat(inner);

    // Width is measured on the plain text; styled markers are one column.
    let row = |marker: Option<Styled>, text: String| {
        let plain_len = text.chars().count() + if marker.is_some() { 4 } else { 2 };
        let pad = inner.saturating_sub(plain_len);
        match marker {
            Some(marker) => format!("\u{2502}  {} {}{:pad$}\u{2502}", marker, text, ""),
            None => format!("\u{2502}  {}{:pad$}\u{2502}", text, ""),
        }
    };

    let title = "Extraction Complete";
    let left = (inner - title.len()) / 2;
    let right = inner - left - title.len();

    let mut lines = vec![
        String::new(),
        format!("\u{256D}{}\u{256E}", horizontal),
        format!(
            "\u{2502}{:left$}{}{:right$}\u{2502}",
            "",
            Styled::with_color_support(title, color_enabled).bold(),
            ""
        ),
        format!("\u{251C}{}\u{2524}", horizontal),
        row(
            Some(symbols.success()),
            format!("Documents:  {}", report.progress.processed_files),
        ),
        row(
            Some(symbols.success()),
            format!("Images:     {}", report.new_images),
        ),
    ];

    if !report.skipped_documents.is_empty() {
        lines.push(row(
            Some(symbols.warning()),
            format!("Skipped:    {}", report.skipped_documents.len()),
        ));
    }
    if !report.failed_documents.is_empty() {
        lines.push(row(
            Some(symbols.error()),
            format!("Failed:     {}", report.failed_documents.len()),
        ));
    }
    let image_failures = report
        .failures
        .iter()
        .filter(|failure| failure.kind != FailureKind::DocumentOpen)
        .count();
    if image_failures > 0 {
        lines.push(row(
            Some(symbols.error()),
            format!("Bad images: {}", image_failures),
        ));
    }

    lines.push(format!("\u{2502}{:inner$}\u{2502}", ""));
    lines.push(row(None, format!("Index size:   {} records", report.total_records)));
    lines.push(row(
        None,
        format!("Time elapsed: {:.1}s", report.elapsed.as_secs_f64()),
    ));
    lines.push(format!("\u{2570}{}\u{256F}", horizontal));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::SkippedDocument;
    use std::path::PathBuf;
    use std::time::Duration;

    fn quiet_bar() -> ProgressBar {
        ProgressBar::with_config(ProgressConfig {
            enabled: false,
            ..ProgressConfig::default()
        })
    }

    fn snapshot(processed: usize, total: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            processed_files: processed,
            total_files: total,
            current_file: Some(PathBuf::from("/docs/annual-report.pdf")),
            extracted_images: 12,
        }
    }

    #[test]
    fn test_bar_fill() {
        let bar = quiet_bar();
        assert_eq!(bar.bar(0.0).chars().filter(|&c| c == '\u{2588}').count(), 0);
        assert_eq!(bar.bar(50.0).chars().filter(|&c| c == '\u{2588}').count(), 10);
        assert_eq!(bar.bar(100.0).chars().count(), 20);
    }

    #[test]
    fn test_line_contents() {
        let bar = quiet_bar();
        let line = bar.status(&snapshot(1, 4));
        assert!(line.contains("1/4 files (25%)"));
        assert!(line.contains("12 images"));
        assert!(line.ends_with("annual-report.pdf"));
    }

    #[test]
    fn test_update_when_disabled_is_silent() {
        let mut bar = quiet_bar();
        bar.update(&snapshot(2, 4));
        assert_eq!(bar.last_width, 0);
    }

    #[test]
    fn test_truncate_left() {
        assert_eq!(truncate_left("short.pdf", 30), "short.pdf");
        let long = "a".repeat(40) + ".pdf";
        let cut = truncate_left(&long, 30);
        assert_eq!(cut.chars().count(), 30);
        assert!(cut.starts_with("..."));
        assert!(cut.ends_with(".pdf"));
    }

    #[test]
    fn test_summary_lines() {
        let report = RunReport {
            progress: snapshot(3, 3),
            new_images: 5,
            total_records: 9,
            skipped_documents: vec![SkippedDocument {
                path: PathBuf::from("big.pdf"),
                pages: 80,
            }],
            failed_documents: Vec::new(),
            failures: Vec::new(),
            elapsed: Duration::from_millis(1500),
        };

        let lines = summary_lines(&report, false);
        let text = lines.join("\n");
        assert!(text.contains("Extraction Complete"));
        assert!(text.contains("Documents:  3"));
        assert!(text.contains("Images:     5"));
        assert!(text.contains("Skipped:    1"));
        assert!(!text.contains("Failed:"));
        assert!(text.contains("9 records"));
        assert!(text.contains("1.5s"));

        // Every boxed row has the same width.
        let widths: Vec<usize> = lines[1..].iter().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|&w| w == 40), "{:?}", widths);
    }
}
