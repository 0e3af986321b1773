//! Progress bar utilities for CLI output
//!
//! Key features:
//! - One progress bar per pipeline phase, fed from worker threads
//! - Consistent visual styling across all operations
//! - Box-drawn headers and bullet helpers for the run summary

use crate::core::pipeline::{Phase, PhaseProgress};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::time::Duration;

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Style of a phase that has not started yet
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("  {spinner:.dim} {msg}")
        .unwrap()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
}

/// Get the progress bar style for a running phase
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap()
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap()
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

// ============================================================================
// Phase progress
// ============================================================================

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Hashing => "Hashing",
        Phase::Materializing => "Materializing",
    }
}

/// Progress bars for the hashing and materializing phases
///
/// Updates arrive from worker threads, one per finished job.
pub struct PhaseProgressBars {
    hashing: ProgressBar,
    materializing: ProgressBar,
}

impl PhaseProgressBars {
    /// Create both bars; `hidden` suppresses all drawing
    pub fn new(hidden: bool) -> Self {
        let multi = if hidden {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let make = |phase: Phase| {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(pending_style());
            pb.set_message(format!("⋯ {}", phase_label(phase)));
            pb
        };
        let hashing = make(Phase::Hashing);
        let materializing = make(Phase::Materializing);

        Self {
            hashing,
            materializing,
        }
    }

    fn bar(&self, phase: Phase) -> &ProgressBar {
        match phase {
            Phase::Hashing => &self.hashing,
            Phase::Materializing => &self.materializing,
        }
    }

    /// Record one finished job
    pub fn update(&self, progress: PhaseProgress) {
        let bar = self.bar(progress.phase);
        let total = progress.total as u64;

        if bar.length() != Some(total) {
            bar.set_style(progress_bar_style());
            bar.set_length(total);
            bar.set_message(phase_label(progress.phase));
            bar.enable_steady_tick(Duration::from_millis(100));
        }

        bar.inc(1);
        if bar.position() >= total && !bar.is_finished() {
            bar.set_style(completed_style());
            bar.finish_with_message(phase_label(progress.phase));
        }
    }

    /// Close any bar whose phase had nothing to do
    pub fn finish(&self) {
        for bar in [&self.hashing, &self.materializing] {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_phase_bars_finish_on_last_job() {
        let bars = PhaseProgressBars::new(true);
        for completed in 1..=3 {
            bars.update(PhaseProgress {
                phase: Phase::Hashing,
                completed,
                total: 3,
            });
        }

        assert_eq!(bars.hashing.position(), 3);
        assert!(bars.hashing.is_finished());
        assert!(!bars.materializing.is_finished());

        bars.finish();
        assert!(bars.materializing.is_finished());
    }
}
