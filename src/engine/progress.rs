//! Per-window progress reporting for long-running retrievals.

use indicatif::{ProgressBar, ProgressStyle};

/// Reports window-level progress during a run.
///
/// The orchestrator ticks the reporter once per finished window; the bar
/// variant renders the familiar terminal progress display while `Silent`
/// keeps library and test usage quiet.
#[derive(Debug, Clone, Default)]
pub enum ProgressReporter {
    /// No visible output
    #[default]
    Silent,
    /// An indicatif bar sized to the planned window count
    Bar(ProgressBar),
}

impl ProgressReporter {
    /// Create a terminal progress bar reporter.
    pub fn bar() -> Self {
        ProgressReporter::Bar(ProgressBar::hidden())
    }

    /// Initialize the reporter for a run over `total_windows` windows.
    pub fn begin(&self, total_windows: u64) {
        if let ProgressReporter::Bar(bar) = self {
            bar.set_length(total_windows);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} windows {msg}",
                    )
                    .expect("hardcoded template is valid")
                    .progress_chars("#>-"),
            );
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
    }

    /// Record one finished window.
    pub fn advance(&self) {
        if let ProgressReporter::Bar(bar) = self {
            bar.inc(1);
        }
    }

    /// Update the trailing message (e.g. running unique-user count).
    pub fn set_message(&self, message: String) {
        if let ProgressReporter::Bar(bar) = self {
            bar.set_message(message);
        }
    }

    /// Finish and clear the display.
    pub fn finish(&self) {
        if let ProgressReporter::Bar(bar) = self {
            bar.finish_and_clear();
        }
    }
}
